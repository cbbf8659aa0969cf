// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-epoch state: packet numbering in both directions, acknowledgment
//! bookkeeping, the crypto streams, and the seals protecting the level.

use crate::recovery;
use quill_core::{
    interval_set::{Interval, IntervalSet},
    packet::{
        number::{PacketNumber, PacketNumberSpace, SlidingWindow, SlidingWindowError},
        KeyPhase, PacketType,
    },
    time::{Timer, Timestamp},
    transport,
    varint::VarInt,
};
use quill_crypto::Seal;
use std::collections::BTreeMap;

/// The outbound crypto stream of one level.
///
/// The handshake volume is small, so the whole flight is buffered and
/// ranges of it are tracked for (re)transmission.
#[derive(Debug, Default)]
pub struct CryptoTx {
    buffer: Vec<u8>,
    /// Byte ranges that still need to go on the wire
    pending: IntervalSet<u64>,
}

impl CryptoTx {
    /// Appends handshake bytes produced by the TLS session
    pub fn push(&mut self, data: &[u8]) {
        let offset = self.buffer.len() as u64;
        self.buffer.extend_from_slice(data);
        if let Some(interval) = Interval::from_offset_len(offset, data.len() as u64) {
            self.pending.insert(interval);
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns the next pending range, bounded by `max_len`
    pub fn next_range(&self, max_len: usize) -> Option<(u64, usize)> {
        let first = self.pending.get(0)?;
        let len = (first.len() as usize).min(max_len);
        Some((first.start, len))
    }

    /// Copies `[offset, offset + len)` into `buffer` and removes it from
    /// the pending set
    pub fn check_out(&mut self, offset: u64, len: usize, buffer: &mut [u8]) {
        let begin = offset as usize;
        buffer[..len].copy_from_slice(&self.buffer[begin..begin + len]);
        if let Some(interval) = Interval::from_offset_len(offset, len as u64) {
            self.pending.remove(interval);
        }
    }

    /// A carrying packet was lost; the range becomes pending again
    pub fn on_lost(&mut self, offset: u64, len: usize) {
        if let Some(interval) = Interval::from_offset_len(offset, len as u64) {
            self.pending.insert(interval);
        }
    }
}

/// The inbound crypto stream of one level: reassembles CRYPTO frames into
/// the contiguous byte sequence the TLS session consumes
#[derive(Debug, Default)]
pub struct CryptoRx {
    received: IntervalSet<u64>,
    storage: BTreeMap<u64, Vec<u8>>,
    delivered: u64,
}

impl CryptoRx {
    pub fn on_data(&mut self, offset: u64, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let end = offset + data.len() as u64;

        let mut missing = IntervalSet::new();
        missing.insert(Interval::new(offset, end - 1));
        for covered in self.received.intervals().collect::<Vec<_>>() {
            missing.remove(covered);
        }

        for gap in missing.intervals() {
            let begin = (gap.start - offset) as usize;
            let len = gap.len() as usize;
            self.storage
                .insert(gap.start, data[begin..begin + len].to_vec());
        }

        self.received.insert(Interval::new(offset, end - 1));
    }

    /// Drains the contiguous prefix past what was already delivered
    pub fn take_contiguous(&mut self) -> Option<Vec<u8>> {
        let mut out = Vec::new();

        while self.received.contains(&self.delivered) {
            let (entry_offset, entry) = self
                .storage
                .range(..=self.delivered)
                .next_back()
                .map(|(offset, entry)| (*offset, entry))
                .expect("received bytes are backed by storage");
            let begin = (self.delivered - entry_offset) as usize;
            out.extend_from_slice(&entry[begin..]);
            self.delivered = entry_offset + self.storage[&entry_offset].len() as u64;
            self.storage.remove(&entry_offset);
        }

        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

/// Per-space state for one epoch
#[derive(Debug)]
pub struct PacketSpace {
    space: PacketNumberSpace,

    /// The next packet number to send; strictly increasing
    next_packet_number: u64,

    pub largest_received: Option<PacketNumber>,
    pub largest_received_time: Option<Timestamp>,

    /// Received packet numbers for which an ACK frame is still owed to the
    /// peer (retained until our ACK frame itself is acknowledged)
    pub unacked: IntervalSet<u64>,

    /// Duplicate rejection window
    received_window: SlidingWindow,

    /// An ack-eliciting packet arrived since the last ACK went out
    pub ack_elicited: bool,

    pub last_ack_sent_at: Option<Timestamp>,

    /// When the next ACK must be sent at the latest
    pub ack_timer: Timer,

    pub crypto_tx: CryptoTx,
    pub crypto_rx: CryptoRx,

    pub sealer: Option<Seal>,
    pub opener: Option<Seal>,

    pub recovery: recovery::Manager,
}

impl PacketSpace {
    pub fn new(space: PacketNumberSpace) -> Self {
        Self {
            space,
            next_packet_number: 0,
            largest_received: None,
            largest_received_time: None,
            unacked: IntervalSet::new(),
            received_window: SlidingWindow::default(),
            ack_elicited: false,
            last_ack_sent_at: None,
            ack_timer: Timer::default(),
            crypto_tx: CryptoTx::default(),
            crypto_rx: CryptoRx::default(),
            sealer: None,
            opener: None,
            recovery: recovery::Manager::new(space),
        }
    }

    #[inline]
    pub fn space(&self) -> PacketNumberSpace {
        self.space
    }

    /// The packet number the next sent packet will carry
    #[inline]
    pub fn next_packet_number(&self) -> u64 {
        self.next_packet_number
    }

    /// Commits the packet number after a packet was protected and queued
    #[inline]
    pub fn commit_packet_number(&mut self) -> u64 {
        let pn = self.next_packet_number;
        self.next_packet_number += 1;
        pn
    }

    /// The largest packet number the peer acknowledged, used to pick the
    /// truncated encoding
    #[inline]
    pub fn largest_acked_for_truncation(&self) -> PacketNumber {
        let largest = self.recovery.largest_acked().unwrap_or(0);
        self.space
            .new_packet_number(VarInt::new(largest).expect("packet numbers fit a varint"))
    }

    /// Rejects duplicate and untrackably old packet numbers
    pub fn check_duplicate(&self, packet_number: PacketNumber) -> Result<(), SlidingWindowError> {
        self.received_window.check(packet_number)
    }

    /// Records a successfully authenticated packet.
    ///
    /// Arms the ACK timer: long header levels acknowledge immediately,
    /// short header packets may be delayed by `max_ack_delay`.
    pub fn on_packet_received(
        &mut self,
        packet_number: PacketNumber,
        is_ack_eliciting: bool,
        now: Timestamp,
        max_ack_delay: core::time::Duration,
    ) -> Result<(), transport::Error> {
        self.received_window
            .insert(packet_number)
            .map_err(|_| transport::Error::INTERNAL_ERROR.with_reason("duplicate packet"))?;

        self.unacked.insert_value(packet_number.as_u64());

        if self
            .largest_received
            .map_or(true, |largest| packet_number > largest)
        {
            self.largest_received = Some(packet_number);
            self.largest_received_time = Some(now);
        }

        if is_ack_eliciting {
            self.ack_elicited = true;
        }

        if self.unacked.is_empty() {
            return Ok(());
        }

        let deadline = if self.space.is_application_data() {
            now + max_ack_delay
        } else {
            now
        };
        self.ack_timer.set_min(deadline);

        Ok(())
    }

    /// Returns `true` if an ACK frame should go into the next packet
    pub fn ack_due(&self, now: Timestamp) -> bool {
        if self.unacked.is_empty() {
            return false;
        }
        self.ack_elicited && self.ack_timer.is_expired(now)
    }

    /// Builds the ACK frame contents, marking the elicitation satisfied
    pub fn ack_to_send(&mut self, now: Timestamp, ack_delay: VarInt) -> Option<quill_core::frame::Ack> {
        if self.unacked.is_empty() {
            return None;
        }

        let mut ranges = quill_core::frame::AckRanges::new();
        for interval in self.unacked.intervals() {
            ranges.insert(interval);
        }

        self.ack_elicited = false;
        self.ack_timer.cancel();
        self.last_ack_sent_at = Some(now);

        Some(quill_core::frame::Ack {
            ack_delay,
            ack_ranges: ranges,
            ecn_counts: None,
        })
    }

    /// Our ACK frame was acknowledged; the peer no longer needs to hear
    /// about packet numbers at or below `largest`
    pub fn on_ack_frame_acked(&mut self, largest: u64) {
        self.unacked.remove(Interval::new(0, largest));
    }
}

/// The key generations of the application space.
///
/// At most one update is in flight: the next generation is pre-derived on a
/// remote phase flip, and the previous opener is retained for one PTO
/// window to tolerate reordering.
#[derive(Default)]
pub struct KeySet {
    pub key_phase: KeyPhase,
    /// Pre-derived `(sealer, opener)` for the next phase
    pub next: Option<(Seal, Seal)>,
    /// The previous opener and when it can be dropped
    pub prev_opener: Option<(Seal, Timestamp)>,
    /// A local update was requested; it takes effect on the next sent
    /// packet
    pub update_requested: bool,
}

impl core::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("KeySet")
            .field("key_phase", &self.key_phase)
            .field("update_pending", &self.next.is_some())
            .field("update_requested", &self.update_requested)
            .finish()
    }
}

impl KeySet {
    /// Drops the previous generation's opener once the reordering window
    /// has passed
    pub fn retire_prev(&mut self, now: Timestamp) {
        let expired = matches!(
            &self.prev_opener,
            Some((_, retire_at)) if retire_at.has_elapsed(now)
        );
        if expired {
            self.prev_opener = None;
        }
    }
}

pub fn packet_type_for(space: PacketNumberSpace) -> PacketType {
    match space {
        PacketNumberSpace::Initial => PacketType::Initial,
        PacketNumberSpace::Handshake => PacketType::Handshake,
        PacketNumberSpace::ApplicationData => PacketType::OneRtt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use quill_core::varint::VarInt;

    fn time(millis: u64) -> Timestamp {
        Timestamp::from_duration(Duration::from_millis(millis))
    }

    fn pn(space: &PacketSpace, value: u64) -> PacketNumber {
        space
            .space()
            .new_packet_number(VarInt::new(value).unwrap())
    }

    #[test]
    fn packet_number_monotonic_test() {
        let mut space = PacketSpace::new(PacketNumberSpace::Initial);
        assert_eq!(space.next_packet_number(), 0);
        assert_eq!(space.commit_packet_number(), 0);
        assert_eq!(space.commit_packet_number(), 1);
        assert_eq!(space.next_packet_number(), 2);
    }

    #[test]
    fn duplicate_rejection_test() {
        let mut space = PacketSpace::new(PacketNumberSpace::ApplicationData);
        let number = pn(&space, 3);

        assert!(space.check_duplicate(number).is_ok());
        space
            .on_packet_received(number, true, time(10), Duration::from_millis(25))
            .unwrap();
        assert!(space.check_duplicate(number).is_err());
    }

    #[test]
    fn ack_elicitation_test() {
        let mut space = PacketSpace::new(PacketNumberSpace::ApplicationData);
        let max_ack_delay = Duration::from_millis(25);

        space
            .on_packet_received(pn(&space, 0), false, time(10), max_ack_delay)
            .unwrap();
        // nothing is owed for a non-eliciting packet
        assert!(!space.ack_due(time(100)));

        space
            .on_packet_received(pn(&space, 1), true, time(20), max_ack_delay)
            .unwrap();
        // the short header delay applies
        assert!(!space.ack_due(time(21)));
        assert!(space.ack_due(time(45)));

        let ack = space.ack_to_send(time(45), VarInt::ZERO).unwrap();
        assert_eq!(ack.largest_acknowledged(), 1);
        assert!(!space.ack_due(time(100)));

        // the ranges are retained until our ACK is acknowledged
        assert!(!space.unacked.is_empty());
        space.on_ack_frame_acked(1);
        assert!(space.unacked.is_empty());
    }

    #[test]
    fn long_header_acks_immediately_test() {
        let mut space = PacketSpace::new(PacketNumberSpace::Initial);
        space
            .on_packet_received(pn(&space, 0), true, time(10), Duration::from_millis(25))
            .unwrap();
        assert!(space.ack_due(time(10)));
    }

    #[test]
    fn crypto_tx_retransmit_test() {
        let mut tx = CryptoTx::default();
        tx.push(b"client hello");

        let (offset, len) = tx.next_range(1200).unwrap();
        assert_eq!((offset, len), (0, 12));

        let mut buffer = [0u8; 12];
        tx.check_out(offset, len, &mut buffer);
        assert_eq!(&buffer, b"client hello");
        assert!(tx.is_empty());

        tx.on_lost(0, 12);
        assert_eq!(tx.next_range(4), Some((0, 4)));
    }

    #[test]
    fn crypto_rx_reassembly_test() {
        let mut rx = CryptoRx::default();

        rx.on_data(6, b"finished");
        assert!(rx.take_contiguous().is_none());

        rx.on_data(0, b"server");
        assert_eq!(rx.take_contiguous().unwrap(), b"serverfinished");

        // duplicates deliver nothing new
        rx.on_data(0, b"server");
        assert!(rx.take_contiguous().is_none());
    }
}
