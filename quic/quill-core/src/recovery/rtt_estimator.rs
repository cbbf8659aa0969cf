// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{packet::number::PacketNumberSpace, time::Timestamp};
use core::{cmp::max, time::Duration};

//= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#6.2.2
//# When no previous RTT is available, the initial RTT SHOULD be set to
//# 500ms, resulting in a 1 second initial timeout as recommended in
//# [RFC6298].

pub const DEFAULT_INITIAL_RTT: Duration = Duration::from_millis(500);

/// The lowest RTT value the estimator is capable of tracking
pub const MIN_RTT: Duration = Duration::from_micros(1);

//= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#6.1.2
//# The RECOMMENDED value of the timer granularity (kGranularity) is
//# 1ms.

pub const K_GRANULARITY: Duration = Duration::from_millis(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RttEstimator {
    /// Latest RTT sample
    latest_rtt: Duration,
    /// The minimum value observed over the lifetime of the connection
    min_rtt: Duration,
    /// An exponentially-weighted moving average
    smoothed_rtt: Duration,
    /// The variance in the observed RTT samples
    rttvar: Duration,
    /// The maximum amount of time by which the peer intends to delay
    /// acknowledgments in the application packet number space
    max_ack_delay: Duration,
    /// The time that the first RTT sample was obtained
    first_rtt_sample: Option<Timestamp>,
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_RTT)
    }
}

impl RttEstimator {
    /// Creates a new estimator with the given `initial_rtt`.
    ///
    /// `on_max_ack_delay` must be called when the peer's `max_ack_delay`
    /// transport parameter arrives.
    #[inline]
    pub fn new(initial_rtt: Duration) -> Self {
        let initial_rtt = initial_rtt.max(MIN_RTT);

        //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#5.3
        //# smoothed_rtt = kInitialRtt
        //# rttvar = kInitialRtt / 2
        Self {
            latest_rtt: initial_rtt,
            min_rtt: initial_rtt,
            smoothed_rtt: initial_rtt,
            rttvar: initial_rtt / 2,
            max_ack_delay: Duration::ZERO,
            first_rtt_sample: None,
        }
    }

    #[inline]
    pub fn latest_rtt(&self) -> Duration {
        self.latest_rtt
    }

    #[inline]
    pub fn smoothed_rtt(&self) -> Duration {
        self.smoothed_rtt
    }

    #[inline]
    pub fn min_rtt(&self) -> Duration {
        self.min_rtt
    }

    #[inline]
    pub fn rttvar(&self) -> Duration {
        self.rttvar
    }

    #[inline]
    pub fn first_rtt_sample(&self) -> Option<Timestamp> {
        self.first_rtt_sample
    }

    #[inline]
    pub fn max_ack_delay(&self) -> Duration {
        self.max_ack_delay
    }

    /// Sets the `max_ack_delay` value from the peer's transport parameters
    #[inline]
    pub fn on_max_ack_delay(&mut self, max_ack_delay: Duration) {
        self.max_ack_delay = max_ack_delay;
    }

    //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#6.2.1
    //# PTO = smoothed_rtt + max(4*rttvar, kGranularity) + max_ack_delay
    #[inline]
    pub fn pto_period(&self, pto_backoff: u32, space: PacketNumberSpace) -> Duration {
        let mut pto_period = self.smoothed_rtt;

        //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#6.2.1
        //# The PTO period MUST be at least kGranularity, to avoid the timer
        //# expiring immediately.
        pto_period += max(self.rttvar * 4, K_GRANULARITY);

        //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#6.2.1
        //# When the PTO is armed for Initial or Handshake packet number
        //# spaces, the max_ack_delay is 0
        if space.is_application_data() {
            pto_period += self.max_ack_delay;
        }

        //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#6.2.1
        //# When a PTO timer expires, the PTO period MUST be set to twice its
        //# current value.
        pto_period * pto_backoff
    }

    /// Updates the estimate with a new sample
    #[inline]
    pub fn update_rtt(
        &mut self,
        mut ack_delay: Duration,
        rtt_sample: Duration,
        timestamp: Timestamp,
        is_handshake_confirmed: bool,
        space: PacketNumberSpace,
    ) {
        self.latest_rtt = rtt_sample.max(MIN_RTT);

        if self.first_rtt_sample.is_none() {
            self.first_rtt_sample = Some(timestamp);

            //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#5.2
            //# min_rtt MUST be set to the latest_rtt on the first RTT sample.
            self.min_rtt = self.latest_rtt;

            //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#5.3
            //# smoothed_rtt = latest_rtt
            //# rttvar = latest_rtt / 2
            self.smoothed_rtt = self.latest_rtt;
            self.rttvar = self.latest_rtt / 2;
            return;
        }

        //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#5.2
        //# min_rtt MUST be set to the lesser of min_rtt and latest_rtt on all
        //# other samples.
        self.min_rtt = self.min_rtt.min(self.latest_rtt);

        //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#5.3
        //# *  MUST use the lesser of the value reported in Ack Delay field of
        //#    the ACK frame and the peer's max_ack_delay transport parameter.
        if is_handshake_confirmed && space.is_application_data() {
            ack_delay = ack_delay.min(self.max_ack_delay);
        }

        //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#5.3
        //# *  MUST NOT apply the adjustment if the resulting RTT sample
        //#    is smaller than the min_rtt.
        let mut adjusted_rtt = self.latest_rtt;
        if self.min_rtt + ack_delay <= self.latest_rtt {
            adjusted_rtt -= ack_delay;
        }

        //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#5.3
        //# smoothed_rtt = 7/8 * smoothed_rtt + 1/8 * adjusted_rtt
        //# rttvar_sample = abs(smoothed_rtt - adjusted_rtt)
        //# rttvar = 3/4 * rttvar + 1/4 * rttvar_sample
        let rttvar_sample = if self.smoothed_rtt > adjusted_rtt {
            self.smoothed_rtt - adjusted_rtt
        } else {
            adjusted_rtt - self.smoothed_rtt
        };
        self.rttvar = (self.rttvar * 3 + rttvar_sample) / 4;
        self.smoothed_rtt = (self.smoothed_rtt * 7 + adjusted_rtt) / 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> Timestamp {
        Timestamp::from_duration(Duration::from_millis(1))
    }

    #[test]
    fn first_sample_test() {
        let mut estimator = RttEstimator::default();
        assert_eq!(estimator.smoothed_rtt(), DEFAULT_INITIAL_RTT);

        estimator.update_rtt(
            Duration::ZERO,
            Duration::from_millis(100),
            now(),
            false,
            PacketNumberSpace::Initial,
        );

        assert_eq!(estimator.latest_rtt(), Duration::from_millis(100));
        assert_eq!(estimator.smoothed_rtt(), Duration::from_millis(100));
        assert_eq!(estimator.min_rtt(), Duration::from_millis(100));
        assert_eq!(estimator.rttvar(), Duration::from_millis(50));
        assert_eq!(estimator.first_rtt_sample(), Some(now()));
    }

    #[test]
    fn ack_delay_adjustment_test() {
        let mut estimator = RttEstimator::default();
        estimator.on_max_ack_delay(Duration::from_millis(25));

        estimator.update_rtt(
            Duration::ZERO,
            Duration::from_millis(100),
            now(),
            true,
            PacketNumberSpace::ApplicationData,
        );

        // the second sample subtracts the ack delay, clamped to max_ack_delay
        estimator.update_rtt(
            Duration::from_millis(80),
            Duration::from_millis(200),
            now(),
            true,
            PacketNumberSpace::ApplicationData,
        );

        // adjusted = 200 - 25 = 175; smoothed = 7/8*100 + 1/8*175
        assert_eq!(estimator.latest_rtt(), Duration::from_millis(200));
        assert_eq!(estimator.smoothed_rtt(), Duration::from_micros(109_375));
    }

    #[test]
    fn pto_period_test() {
        let mut estimator = RttEstimator::default();
        estimator.on_max_ack_delay(Duration::from_millis(25));

        estimator.update_rtt(
            Duration::ZERO,
            Duration::from_millis(100),
            now(),
            true,
            PacketNumberSpace::ApplicationData,
        );

        // smoothed = 100ms, rttvar = 50ms
        let initial_pto = estimator.pto_period(1, PacketNumberSpace::Initial);
        assert_eq!(initial_pto, Duration::from_millis(300));

        // max_ack_delay applies in the application space only
        let app_pto = estimator.pto_period(1, PacketNumberSpace::ApplicationData);
        assert_eq!(app_pto, Duration::from_millis(325));

        // backoff doubles the whole period
        assert_eq!(
            estimator.pto_period(2, PacketNumberSpace::ApplicationData),
            Duration::from_millis(650)
        );
    }
}
