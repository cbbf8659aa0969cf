// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-space loss recovery: sent-packet records, acknowledgment processing,
//! and loss detection.
//!
//! Each sent packet carries a list of restitutions describing what must be
//! re-marked pending if the packet is declared lost; the connection's send
//! path consumes the lost list and applies them.

use quill_core::{
    frame::AckRanges,
    packet::number::PacketNumberSpace,
    recovery::{time_threshold, CongestionController, RttEstimator, K_GRANULARITY, K_PACKET_THRESHOLD},
    stream::{StreamId, StreamType},
    time::{Timer, Timestamp},
};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// What to re-mark pending when the carrying packet is lost, or confirm
/// when it is acknowledged
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Restitution {
    StreamData {
        id: StreamId,
        offset: u64,
        len: usize,
        is_fin: bool,
    },
    Crypto {
        offset: u64,
        len: usize,
    },
    ResetStream {
        id: StreamId,
    },
    StopSending {
        id: StreamId,
    },
    MaxStreamData {
        id: StreamId,
    },
    MaxData,
    MaxStreams {
        stream_type: StreamType,
    },
    /// Acknowledging this lets the receiver forget everything at or below
    /// the largest acknowledged packet number it reported
    Ack {
        largest_acknowledged: u64,
    },
    NewConnectionId {
        sequence: u64,
    },
    RetireConnectionId {
        sequence: u64,
    },
    HandshakeDone,
}

/// The record of one sent packet
#[derive(Debug)]
pub struct SentPacket {
    pub time_sent: Timestamp,
    pub sent_bytes: usize,
    pub ack_eliciting: bool,
    pub in_flight: bool,
    pub frames: SmallVec<[Restitution; 4]>,
}

/// The outcome of processing one ACK frame
#[derive(Debug, Default)]
pub struct AckOutcome {
    pub newly_acked: Vec<SentPacket>,
    pub lost: Vec<SentPacket>,
    /// Set when the largest acknowledged packet was newly acknowledged
    pub largest_newly_acked: Option<(u64, Timestamp)>,
}

#[derive(Debug)]
pub struct Manager {
    space: PacketNumberSpace,
    sent_packets: BTreeMap<u64, SentPacket>,
    largest_acked: Option<u64>,
    /// Armed when reordered packets are waiting out the time threshold
    loss_timer: Timer,
    /// When the most recent ack-eliciting packet was sent; input to the PTO
    /// timer
    time_of_last_ack_eliciting: Option<Timestamp>,
}

impl Manager {
    pub fn new(space: PacketNumberSpace) -> Self {
        Self {
            space,
            sent_packets: BTreeMap::new(),
            largest_acked: None,
            loss_timer: Timer::default(),
            time_of_last_ack_eliciting: None,
        }
    }

    #[inline]
    pub fn space(&self) -> PacketNumberSpace {
        self.space
    }

    #[inline]
    pub fn largest_acked(&self) -> Option<u64> {
        self.largest_acked
    }

    #[inline]
    pub fn time_of_last_ack_eliciting(&self) -> Option<Timestamp> {
        self.time_of_last_ack_eliciting
    }

    #[inline]
    pub fn loss_timer(&self) -> &Timer {
        &self.loss_timer
    }

    pub fn has_ack_eliciting_in_flight(&self) -> bool {
        self.sent_packets.values().any(|packet| packet.ack_eliciting)
    }

    /// Records a sent packet
    pub fn on_packet_sent(
        &mut self,
        packet_number: u64,
        packet: SentPacket,
        congestion: &mut CongestionController,
    ) {
        if packet.in_flight {
            congestion.on_packet_sent(packet.sent_bytes);
        }
        if packet.ack_eliciting {
            self.time_of_last_ack_eliciting = Some(packet.time_sent);
        }
        self.sent_packets.insert(packet_number, packet);
    }

    /// Processes an ACK frame: removes the acknowledged records, feeds the
    /// RTT estimator and congestion controller, and re-runs loss detection.
    pub fn on_ack_received(
        &mut self,
        ranges: &AckRanges,
        ack_delay: core::time::Duration,
        now: Timestamp,
        rtt: &mut RttEstimator,
        congestion: &mut CongestionController,
        is_handshake_confirmed: bool,
    ) -> AckOutcome {
        let mut outcome = AckOutcome::default();

        let largest_acknowledged = match ranges.max_value() {
            Some(value) => value,
            None => return outcome,
        };

        let mut any_eliciting_newly_acked = false;

        for interval in ranges.intervals() {
            let acked: Vec<u64> = self
                .sent_packets
                .range(interval.start..=interval.end)
                .map(|(pn, _)| *pn)
                .collect();

            for pn in acked {
                let packet = self
                    .sent_packets
                    .remove(&pn)
                    .expect("the key was just observed");

                any_eliciting_newly_acked |= packet.ack_eliciting;

                if pn == largest_acknowledged {
                    outcome.largest_newly_acked = Some((pn, packet.time_sent));
                }

                if packet.in_flight {
                    congestion.on_packet_ack(packet.time_sent, packet.sent_bytes);
                }

                outcome.newly_acked.push(packet);
            }
        }

        self.largest_acked = Some(
            self.largest_acked
                .map_or(largest_acknowledged, |prev| prev.max(largest_acknowledged)),
        );

        //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#5.1
        //# An endpoint generates an RTT sample on receiving an ACK frame that
        //# meets the following two conditions:
        //#
        //# o  the largest acknowledged packet number is newly acknowledged,
        //#    and
        //#
        //# o  at least one of the newly acknowledged packets was ack-
        //#    eliciting.
        if let Some((_, time_sent)) = outcome.largest_newly_acked {
            if any_eliciting_newly_acked {
                let rtt_sample = now.saturating_duration_since(time_sent);
                rtt.update_rtt(ack_delay, rtt_sample, now, is_handshake_confirmed, self.space);
            }
        }

        outcome.lost = self.detect_lost_packets(now, rtt, congestion);

        outcome
    }

    //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#6.1
    //# A packet is declared lost if it meets all the following conditions:
    //#
    //# o  The packet is unacknowledged, in-flight, and was sent prior to an
    //#    acknowledged packet.
    //#
    //# o  Either its packet number is kPacketThreshold smaller than an
    //#    acknowledged packet (Section 6.1.1), or it was sent long enough in
    //#    the past (Section 6.1.2).
    fn detect_lost_packets(
        &mut self,
        now: Timestamp,
        rtt: &mut RttEstimator,
        congestion: &mut CongestionController,
    ) -> Vec<SentPacket> {
        let largest_acked = match self.largest_acked {
            Some(value) => value,
            None => return Vec::new(),
        };

        self.loss_timer.cancel();

        //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#6.1.2
        //# The time threshold is:
        //#
        //# kTimeThreshold * max(smoothed_rtt, latest_rtt)
        //#
        //# ... the time threshold MUST be set to at least kGranularity
        let loss_delay =
            time_threshold(rtt.smoothed_rtt().max(rtt.latest_rtt())).max(K_GRANULARITY);

        let mut lost_pns = Vec::new();
        let mut next_loss_time: Option<Timestamp> = None;

        for (pn, packet) in self.sent_packets.range(..=largest_acked) {
            let lost_by_reordering = pn + K_PACKET_THRESHOLD <= largest_acked;
            let lost_by_time = packet
                .time_sent
                .checked_add(loss_delay)
                .map_or(true, |deadline| deadline.has_elapsed(now));

            if lost_by_reordering || lost_by_time {
                lost_pns.push(*pn);
            } else if let Some(deadline) = packet.time_sent.checked_add(loss_delay) {
                next_loss_time = Some(match next_loss_time {
                    Some(current) => current.min(deadline),
                    None => deadline,
                });
            }
        }

        if let Some(deadline) = next_loss_time {
            self.loss_timer.set(deadline);
        }

        let mut lost = Vec::with_capacity(lost_pns.len());
        let mut latest_lost_sent: Option<Timestamp> = None;
        for pn in lost_pns {
            let packet = self
                .sent_packets
                .remove(&pn)
                .expect("the key was just observed");

            if packet.in_flight {
                congestion.on_packet_discarded(packet.sent_bytes);
                latest_lost_sent = Some(
                    latest_lost_sent.map_or(packet.time_sent, |t| t.max(packet.time_sent)),
                );
            }

            lost.push(packet);
        }

        //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#7.5
        //# A sender that receives an acknowledgement for packets that it
        //# declared lost enters a recovery period once per congestion event.
        if let Some(sent_time) = latest_lost_sent {
            congestion.on_congestion_event(sent_time, now);
        }

        lost
    }

    /// Re-runs loss detection after the loss timer fires
    pub fn on_loss_timeout(
        &mut self,
        now: Timestamp,
        rtt: &mut RttEstimator,
        congestion: &mut CongestionController,
    ) -> Vec<SentPacket> {
        if self.loss_timer.poll_expiration(now) {
            self.detect_lost_packets(now, rtt, congestion)
        } else {
            Vec::new()
        }
    }

    /// Declares every record lost without congestion feedback; used when a
    /// probe must regenerate data after a PTO
    pub fn mark_oldest_eliciting_lost(&mut self) -> Option<SentPacket> {
        let pn = self
            .sent_packets
            .iter()
            .find(|(_, packet)| packet.ack_eliciting)
            .map(|(pn, _)| *pn)?;
        self.sent_packets.remove(&pn)
    }

    /// Discards the whole space, returning the bytes to the congestion
    /// controller
    pub fn on_space_discarded(&mut self, congestion: &mut CongestionController) {
        for (_, packet) in core::mem::take(&mut self.sent_packets) {
            if packet.in_flight {
                congestion.on_packet_discarded(packet.sent_bytes);
            }
        }
        self.loss_timer.cancel();
        self.time_of_last_ack_eliciting = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use quill_core::interval_set::Interval;
    use smallvec::smallvec;

    fn time(millis: u64) -> Timestamp {
        Timestamp::from_duration(Duration::from_millis(millis))
    }

    fn sent(time_sent: Timestamp) -> SentPacket {
        SentPacket {
            time_sent,
            sent_bytes: 1200,
            ack_eliciting: true,
            in_flight: true,
            frames: smallvec![Restitution::MaxData],
        }
    }

    fn ranges(intervals: &[(u64, u64)]) -> AckRanges {
        let mut ranges = AckRanges::new();
        for (start, end) in intervals {
            ranges.insert(Interval::new(*start, *end));
        }
        ranges
    }

    #[test]
    fn ack_updates_rtt_test() {
        let mut manager = Manager::new(PacketNumberSpace::ApplicationData);
        let mut rtt = RttEstimator::default();
        let mut congestion = CongestionController::new(1200);

        manager.on_packet_sent(0, sent(time(10)), &mut congestion);
        assert!(manager.has_ack_eliciting_in_flight());

        let outcome = manager.on_ack_received(
            &ranges(&[(0, 0)]),
            Duration::ZERO,
            time(110),
            &mut rtt,
            &mut congestion,
            false,
        );

        assert_eq!(outcome.newly_acked.len(), 1);
        assert!(outcome.lost.is_empty());
        assert_eq!(outcome.largest_newly_acked.map(|(pn, _)| pn), Some(0));
        assert_eq!(rtt.latest_rtt(), Duration::from_millis(100));
        assert_eq!(congestion.bytes_in_flight(), 0);
        assert!(!manager.has_ack_eliciting_in_flight());
    }

    #[test]
    fn reordering_loss_test() {
        let mut manager = Manager::new(PacketNumberSpace::ApplicationData);
        let mut rtt = RttEstimator::default();
        let mut congestion = CongestionController::new(1200);
        let window_before = congestion.congestion_window();

        for pn in 0..=4u64 {
            manager.on_packet_sent(pn, sent(time(10 + pn)), &mut congestion);
        }

        // acking 4 leaves 0 and 1 beyond the packet threshold
        let outcome = manager.on_ack_received(
            &ranges(&[(4, 4)]),
            Duration::ZERO,
            time(50),
            &mut rtt,
            &mut congestion,
            false,
        );

        assert_eq!(outcome.lost.len(), 2);
        // 2 and 3 wait out the time threshold
        assert!(manager.loss_timer().is_armed());
        // a congestion event halves the window
        assert_eq!(congestion.congestion_window(), window_before / 2);
    }

    #[test]
    fn time_loss_test() {
        let mut manager = Manager::new(PacketNumberSpace::ApplicationData);
        let mut rtt = RttEstimator::default();
        let mut congestion = CongestionController::new(1200);

        manager.on_packet_sent(0, sent(time(10)), &mut congestion);
        manager.on_packet_sent(1, sent(time(2000)), &mut congestion);

        // ack only the later packet; the earlier one exceeds the time
        // threshold
        let outcome = manager.on_ack_received(
            &ranges(&[(1, 1)]),
            Duration::ZERO,
            time(2100),
            &mut rtt,
            &mut congestion,
            false,
        );

        assert_eq!(outcome.lost.len(), 1);
        assert_eq!(outcome.lost[0].time_sent, time(10));
    }

    #[test]
    fn loss_timer_fires_test() {
        let mut manager = Manager::new(PacketNumberSpace::ApplicationData);
        let mut rtt = RttEstimator::default();
        let mut congestion = CongestionController::new(1200);

        // establish a 100ms rtt so the loss delay is 112.5ms
        manager.on_packet_sent(0, sent(time(10)), &mut congestion);
        manager.on_ack_received(
            &ranges(&[(0, 0)]),
            Duration::ZERO,
            time(110),
            &mut rtt,
            &mut congestion,
            false,
        );

        manager.on_packet_sent(1, sent(time(200)), &mut congestion);
        manager.on_packet_sent(2, sent(time(210)), &mut congestion);

        let outcome = manager.on_ack_received(
            &ranges(&[(2, 2)]),
            Duration::ZERO,
            time(250),
            &mut rtt,
            &mut congestion,
            false,
        );
        assert!(outcome.lost.is_empty());
        let deadline = manager.loss_timer().next_expiration().unwrap();

        // nothing fires early
        assert!(manager
            .on_loss_timeout(time(260), &mut rtt, &mut congestion)
            .is_empty());

        let lost = manager.on_loss_timeout(deadline, &mut rtt, &mut congestion);
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].time_sent, time(200));
    }

    #[test]
    fn space_discard_test() {
        let mut manager = Manager::new(PacketNumberSpace::Initial);
        let mut congestion = CongestionController::new(1200);

        manager.on_packet_sent(0, sent(time(10)), &mut congestion);
        manager.on_packet_sent(1, sent(time(11)), &mut congestion);
        assert_eq!(congestion.bytes_in_flight(), 2400);

        manager.on_space_discarded(&mut congestion);
        assert_eq!(congestion.bytes_in_flight(), 0);
        assert!(!manager.has_ack_eliciting_in_flight());
    }
}
