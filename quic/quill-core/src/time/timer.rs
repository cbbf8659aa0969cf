// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::time::Timestamp;

/// A cancellable one-shot timer
///
/// The owner is responsible for polling the timer against the connection
/// clock; no background task is involved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timer {
    expiration: Option<Timestamp>,
}

impl Timer {
    /// Arms the timer to expire at `expiration`
    #[inline]
    pub fn set(&mut self, expiration: Timestamp) {
        self.expiration = Some(expiration);
    }

    /// Arms the timer only if it would expire earlier than the current value
    #[inline]
    pub fn set_min(&mut self, expiration: Timestamp) {
        match self.expiration {
            Some(current) if current <= expiration => {}
            _ => self.expiration = Some(expiration),
        }
    }

    /// Disarms the timer
    #[inline]
    pub fn cancel(&mut self) {
        self.expiration = None;
    }

    /// Returns `true` if the timer is armed
    #[inline]
    pub fn is_armed(&self) -> bool {
        self.expiration.is_some()
    }

    /// Returns `true` if the timer is armed and has expired at `now`
    #[inline]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        match self.expiration {
            Some(expiration) => expiration.has_elapsed(now),
            None => false,
        }
    }

    /// Returns the expiration, if armed
    #[inline]
    pub fn next_expiration(&self) -> Option<Timestamp> {
        self.expiration
    }

    /// Disarms and reports an expired timer.
    ///
    /// Returns `true` exactly once per expiration.
    #[inline]
    pub fn poll_expiration(&mut self, now: Timestamp) -> bool {
        if self.is_expired(now) {
            self.cancel();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    #[test]
    fn poll_expiration_test() {
        let start = Timestamp::from_duration(Duration::from_millis(1));
        let mut timer = Timer::default();

        assert!(!timer.poll_expiration(start));

        timer.set(start + Duration::from_millis(10));
        assert!(timer.is_armed());
        assert!(!timer.poll_expiration(start));

        let now = start + Duration::from_millis(10);
        assert!(timer.poll_expiration(now));
        // a timer only fires once per arming
        assert!(!timer.poll_expiration(now));
        assert!(!timer.is_armed());
    }

    #[test]
    fn set_min_test() {
        let start = Timestamp::from_duration(Duration::from_millis(1));
        let mut timer = Timer::default();

        timer.set_min(start + Duration::from_millis(10));
        timer.set_min(start + Duration::from_millis(5));
        assert_eq!(timer.next_expiration(), Some(start + Duration::from_millis(5)));

        timer.set_min(start + Duration::from_millis(20));
        assert_eq!(timer.next_expiration(), Some(start + Duration::from_millis(5)));
    }
}
