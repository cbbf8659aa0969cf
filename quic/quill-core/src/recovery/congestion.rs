// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::time::Timestamp;

//= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#7.2
//# Endpoints SHOULD use an initial congestion window of 10 times the
//# maximum packet size (max_datagram_size), limited to the larger of
//# 14720 bytes or twice the maximum packet size.

const INITIAL_WINDOW_PACKETS: u64 = 10;
const INITIAL_WINDOW_LIMIT: u64 = 14_720;

//= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#7.2
//# The RECOMMENDED value is 2 * max_datagram_size.

const MINIMUM_WINDOW_PACKETS: u64 = 2;

//= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#7.1
//# The RECOMMENDED factor is 0.5.

const LOSS_REDUCTION_FACTOR: u64 = 2;

/// The default congestion controller, following the NewReno-shaped curve
/// defined by the recovery draft: slow start until the first loss, then
/// additive increase with a multiplicative decrease per congestion event.
#[derive(Clone, Debug)]
pub struct CongestionController {
    max_datagram_size: u64,
    congestion_window: u64,
    bytes_in_flight: u64,
    slow_start_threshold: u64,
    recovery_start_time: Option<Timestamp>,
}

impl CongestionController {
    #[inline]
    pub fn new(max_datagram_size: u16) -> Self {
        let max_datagram_size = max_datagram_size as u64;
        Self {
            max_datagram_size,
            congestion_window: initial_window(max_datagram_size),
            bytes_in_flight: 0,
            slow_start_threshold: u64::MAX,
            recovery_start_time: None,
        }
    }

    #[inline]
    pub fn congestion_window(&self) -> u64 {
        self.congestion_window
    }

    #[inline]
    pub fn bytes_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }

    /// Returns the number of bytes the sender may still put in flight
    #[inline]
    pub fn available_window(&self) -> u64 {
        self.congestion_window.saturating_sub(self.bytes_in_flight)
    }

    #[inline]
    pub fn is_slow_start(&self) -> bool {
        self.congestion_window < self.slow_start_threshold
    }

    /// Called when an in-flight packet is transmitted
    #[inline]
    pub fn on_packet_sent(&mut self, sent_bytes: usize) {
        self.bytes_in_flight += sent_bytes as u64;
    }

    //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#7.3
    //# QUIC defines the end of recovery as a packet sent after the start of
    //# recovery being acknowledged
    #[inline]
    fn in_recovery(&self, sent_time: Timestamp) -> bool {
        match self.recovery_start_time {
            Some(recovery_start) => sent_time <= recovery_start,
            None => false,
        }
    }

    /// Called for each newly acknowledged in-flight packet
    #[inline]
    pub fn on_packet_ack(&mut self, sent_time: Timestamp, sent_bytes: usize) {
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(sent_bytes as u64);

        //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#7.3.2
        //# Do not increase congestion window in recovery period.
        if self.in_recovery(sent_time) {
            return;
        }

        if self.is_slow_start() {
            //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#7.3.1
            //# While a sender is in slow start, the congestion window
            //# increases by the number of bytes acknowledged
            self.congestion_window += sent_bytes as u64;
        } else {
            //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#7.3.3
            //# In congestion avoidance, ... the congestion window increases
            //# by maximum packet size when the congestion window is fully
            //# acknowledged.
            self.congestion_window +=
                (self.max_datagram_size * sent_bytes as u64) / self.congestion_window;
        }
    }

    /// Called when a congestion event (loss) involving a packet sent at
    /// `sent_time` is detected
    #[inline]
    pub fn on_congestion_event(&mut self, sent_time: Timestamp, now: Timestamp) {
        //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#7.3.2
        //# A recovery period ends and the sender enters congestion avoidance
        //# when a packet sent during the recovery period is acknowledged.
        if self.in_recovery(sent_time) {
            return;
        }

        self.recovery_start_time = Some(now);
        self.congestion_window = (self.congestion_window / LOSS_REDUCTION_FACTOR)
            .max(minimum_window(self.max_datagram_size));
        self.slow_start_threshold = self.congestion_window;
    }

    /// Called when an in-flight packet is declared lost or its packet number
    /// space is discarded
    #[inline]
    pub fn on_packet_discarded(&mut self, sent_bytes: usize) {
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(sent_bytes as u64);
    }
}

#[inline]
fn initial_window(max_datagram_size: u64) -> u64 {
    (INITIAL_WINDOW_PACKETS * max_datagram_size)
        .min(INITIAL_WINDOW_LIMIT.max(MINIMUM_WINDOW_PACKETS * max_datagram_size))
}

#[inline]
fn minimum_window(max_datagram_size: u64) -> u64 {
    MINIMUM_WINDOW_PACKETS * max_datagram_size
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    fn time(millis: u64) -> Timestamp {
        Timestamp::from_duration(Duration::from_millis(millis))
    }

    #[test]
    fn slow_start_test() {
        let mut cc = CongestionController::new(1200);
        let initial = cc.congestion_window();
        assert_eq!(initial, 12_000);
        assert!(cc.is_slow_start());

        cc.on_packet_sent(1200);
        assert_eq!(cc.bytes_in_flight(), 1200);
        assert_eq!(cc.available_window(), initial - 1200);

        cc.on_packet_ack(time(1), 1200);
        assert_eq!(cc.bytes_in_flight(), 0);
        // slow start grows by the acked bytes
        assert_eq!(cc.congestion_window(), initial + 1200);
    }

    #[test]
    fn congestion_event_test() {
        let mut cc = CongestionController::new(1200);
        let initial = cc.congestion_window();

        cc.on_packet_sent(1200);
        cc.on_congestion_event(time(5), time(10));
        assert_eq!(cc.congestion_window(), initial / 2);
        assert!(!cc.is_slow_start());

        // a second loss from before the recovery point changes nothing
        cc.on_congestion_event(time(8), time(12));
        assert_eq!(cc.congestion_window(), initial / 2);

        // acks for packets sent during recovery do not grow the window
        cc.on_packet_ack(time(9), 1200);
        assert_eq!(cc.congestion_window(), initial / 2);

        // a loss after recovery starts a new event
        cc.on_packet_sent(1200);
        cc.on_congestion_event(time(20), time(25));
        assert_eq!(cc.congestion_window(), initial / 4);
    }

    #[test]
    fn minimum_window_test() {
        let mut cc = CongestionController::new(1200);

        for round in 0..20 {
            cc.on_congestion_event(time(100 + round * 2), time(101 + round * 2));
        }

        assert_eq!(cc.congestion_window(), 2 * 1200);
    }

    #[test]
    fn congestion_avoidance_test() {
        let mut cc = CongestionController::new(1200);
        cc.on_congestion_event(time(1), time(2));
        let window = cc.congestion_window();

        // a full window of acked bytes grows the window by one datagram
        let mut acked = 0;
        while acked < window {
            cc.on_packet_sent(1200);
            cc.on_packet_ack(time(10), 1200);
            acked += 1200;
        }

        assert!(cc.congestion_window() >= window + 1000);
        assert!(cc.congestion_window() <= window + 1400);
    }
}
