// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Time related datatypes and functions
//!
//! All connection timing (idle timeout, loss recovery, ack delay, closing
//! period) is driven against a monotonic [`Clock`] owned by the socket
//! context, never against the ambient system time.

mod timer;

pub use timer::Timer;

use core::{fmt, num::NonZeroU64, ops, time::Duration};

/// An absolute point in time.
///
/// The absolute value of `Timestamp`s should be treated as opaque. It is not
/// necessarily related to any calendar time. `Timestamp`s should only be
/// compared if they are sourced from the same clock.
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash)]
pub struct Timestamp(NonZeroU64);

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Timestamp({:?})", self.as_duration())
    }
}

impl Timestamp {
    /// Creates a `Timestamp` from a `Duration` since the clock's epoch.
    ///
    /// The duration must be nonzero; the zero value is reserved so that
    /// `Option<Timestamp>` costs no extra space.
    #[inline]
    pub fn from_duration(duration: Duration) -> Self {
        let micros = duration.as_micros().min(u64::MAX as u128) as u64;
        let micros = NonZeroU64::new(micros).expect("duration must be nonzero");
        Self(micros)
    }

    /// Returns the `Duration` since the clock's epoch
    #[inline]
    pub fn as_duration(self) -> Duration {
        Duration::from_micros(self.0.get())
    }

    /// Returns the `Duration` elapsed since `earlier`, or zero when `earlier`
    /// is in the future
    #[inline]
    pub fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.get().saturating_sub(earlier.0.get()))
    }

    #[inline]
    pub fn checked_add(self, duration: Duration) -> Option<Self> {
        let micros = self.0.get().checked_add(duration.as_micros().try_into().ok()?)?;
        NonZeroU64::new(micros).map(Self)
    }

    #[inline]
    pub fn checked_sub(self, duration: Duration) -> Option<Self> {
        let micros = self.0.get().checked_sub(duration.as_micros().try_into().ok()?)?;
        NonZeroU64::new(micros).map(Self)
    }

    /// Returns `true` if the timestamp has passed at `now`
    #[inline]
    pub fn has_elapsed(self, now: Self) -> bool {
        self <= now
    }
}

impl ops::Add<Duration> for Timestamp {
    type Output = Self;

    #[inline]
    #[track_caller]
    fn add(self, duration: Duration) -> Self {
        self.checked_add(duration)
            .expect("timestamp overflow occurred")
    }
}

impl ops::AddAssign<Duration> for Timestamp {
    #[inline]
    #[track_caller]
    fn add_assign(&mut self, duration: Duration) {
        *self = *self + duration;
    }
}

impl ops::Sub<Timestamp> for Timestamp {
    type Output = Duration;

    #[inline]
    #[track_caller]
    fn sub(self, earlier: Timestamp) -> Duration {
        Duration::from_micros(
            self.0
                .get()
                .checked_sub(earlier.0.get())
                .expect("timestamps subtracted in the wrong order"),
        )
    }
}

/// A source of monotonic, strictly advancing `Timestamp`s
pub trait Clock {
    fn get_time(&self) -> Timestamp;
}

impl<C: Clock> Clock for &C {
    #[inline]
    fn get_time(&self) -> Timestamp {
        (*self).get_time()
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::*;
    use core::cell::Cell;

    /// A manually advanced clock for deterministic tests
    #[derive(Debug)]
    pub struct MockClock {
        now: Cell<Timestamp>,
    }

    impl Default for MockClock {
        fn default() -> Self {
            Self {
                now: Cell::new(Timestamp::from_duration(Duration::from_millis(1))),
            }
        }
    }

    impl MockClock {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn advance(&self, duration: Duration) {
            self.now.set(self.now.get() + duration);
        }
    }

    impl Clock for MockClock {
        fn get_time(&self) -> Timestamp {
            self.now.get()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_test() {
        let base = Timestamp::from_duration(Duration::from_millis(10));
        let later = base + Duration::from_millis(5);

        assert_eq!(later - base, Duration::from_millis(5));
        assert_eq!(base.saturating_duration_since(later), Duration::ZERO);
        assert!(base.has_elapsed(later));
        assert!(!later.has_elapsed(base));
    }
}
