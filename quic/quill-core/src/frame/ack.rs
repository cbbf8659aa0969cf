// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    interval_set::{Interval, IntervalSet},
    varint::VarInt,
};
use quill_codec::{decoder_parameterized_value, decoder_value, Encoder, EncoderValue};

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.3
//# Receivers send ACK frames (types 0x02 and 0x03) to inform senders of
//# packets they have received and processed.  The ACK frame contains one
//# or more ACK Ranges.  ACK Ranges identify acknowledged packets.  If
//# the frame type is 0x03, ACK frames also contain the sum of QUIC
//# packets with associated ECN marks received on the connection up until
//# this point.

macro_rules! ack_tag {
    () => {
        0x02u8..=0x03u8
    };
}

const ACK_TAG: u8 = 0x02;
const ACK_W_ECN_TAG: u8 = 0x03;

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.3
//# An ACK frame is as follows:
//#
//# ACK Frame {
//#   Type (i) = 0x02..0x03,
//#   Largest Acknowledged (i),
//#   ACK Delay (i),
//#   ACK Range Count (i),
//#   First ACK Range (i),
//#   ACK Range (..) ...,
//#   [ECN Counts (..)],
//# }

/// The set of packet numbers acknowledged by an ACK frame, maintained as
/// disjoint inclusive ranges in ascending order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AckRanges(IntervalSet<u64>);

impl AckRanges {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn insert(&mut self, range: Interval<u64>) {
        self.0.insert(range)
    }

    #[inline]
    pub fn insert_value(&mut self, packet_number: u64) {
        self.0.insert_value(packet_number)
    }

    #[inline]
    pub fn contains(&self, packet_number: u64) -> bool {
        self.0.contains(&packet_number)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn min_value(&self) -> Option<u64> {
        self.0.min_value()
    }

    #[inline]
    pub fn max_value(&self) -> Option<u64> {
        self.0.max_value()
    }

    #[inline]
    pub fn interval_len(&self) -> usize {
        self.0.interval_len()
    }

    /// Iterates over the acknowledged ranges in ascending order
    #[inline]
    pub fn intervals(&self) -> crate::interval_set::Intervals<u64> {
        self.0.intervals()
    }
}

impl From<IntervalSet<u64>> for AckRanges {
    #[inline]
    fn from(set: IntervalSet<u64>) -> Self {
        Self(set)
    }
}

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.3.2
//# The ACK frame uses the least significant bit (that is, type 0x03) to
//# indicate ECN feedback and report receipt of QUIC packets with
//# associated ECN codepoints of ECT(0), ECT(1), or CE in the packet's IP
//# header.

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EcnCounts {
    /// The total number of packets received with the ECT(0) codepoint
    pub ect_0_count: VarInt,

    /// The total number of packets received with the ECT(1) codepoint
    pub ect_1_count: VarInt,

    /// The total number of packets received with the CE codepoint
    pub ce_count: VarInt,
}

decoder_value!(
    impl<'a> EcnCounts {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (ect_0_count, buffer) = buffer.decode()?;
            let (ect_1_count, buffer) = buffer.decode()?;
            let (ce_count, buffer) = buffer.decode()?;

            let counts = EcnCounts {
                ect_0_count,
                ect_1_count,
                ce_count,
            };

            Ok((counts, buffer))
        }
    }
);

impl EncoderValue for EcnCounts {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.ect_0_count);
        buffer.encode(&self.ect_1_count);
        buffer.encode(&self.ce_count);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ack {
    /// The acknowledgement delay in microseconds, already scaled by the
    /// sender's `ack_delay_exponent`
    pub ack_delay: VarInt,

    /// The packet number ranges being acknowledged
    pub ack_ranges: AckRanges,

    /// ECN feedback, present only for frame type 0x03
    pub ecn_counts: Option<EcnCounts>,
}

impl Ack {
    #[inline]
    pub fn tag(&self) -> u8 {
        if self.ecn_counts.is_some() {
            ACK_W_ECN_TAG
        } else {
            ACK_TAG
        }
    }

    /// The largest packet number being acknowledged
    #[inline]
    pub fn largest_acknowledged(&self) -> u64 {
        self.ack_ranges.max_value().expect("ack ranges are never empty")
    }
}

decoder_parameterized_value!(
    impl<'a> Ack {
        fn decode(tag: u8, buffer: Buffer) -> Result<Self> {
            let (largest_acknowledged, buffer) = buffer.decode::<VarInt>()?;
            let (ack_delay, buffer) = buffer.decode::<VarInt>()?;
            let (ack_range_count, buffer) = buffer.decode::<VarInt>()?;

            //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.3.1
            //# The value of the First ACK Range is the number of contiguous
            //# packets preceding the Largest Acknowledged that are being
            //# acknowledged.
            let (first_ack_range, buffer) = buffer.decode::<VarInt>()?;

            let mut smallest = largest_acknowledged
                .as_u64()
                .checked_sub(first_ack_range.as_u64())
                .ok_or(quill_codec::DecoderError::InvariantViolation(
                    "first ack range exceeds largest acknowledged",
                ))?;

            let mut ack_ranges = AckRanges::new();
            ack_ranges.insert(Interval::new(smallest, largest_acknowledged.as_u64()));

            let mut buffer = buffer;
            for _ in 0..ack_range_count.as_u64() {
                let (gap, remaining) = buffer.decode::<VarInt>()?;
                let (ack_range, remaining) = remaining.decode::<VarInt>()?;
                buffer = remaining;

                //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.3.1
                //# Gap:  A variable-length integer indicating the number of
                //#    contiguous unacknowledged packets preceding the packet
                //#    number one lower than the smallest in the preceding ACK
                //#    Range.
                let largest = smallest
                    .checked_sub(gap.as_u64())
                    .and_then(|value| value.checked_sub(2))
                    .ok_or(quill_codec::DecoderError::InvariantViolation(
                        "ack range gap underflow",
                    ))?;

                smallest = largest.checked_sub(ack_range.as_u64()).ok_or(
                    quill_codec::DecoderError::InvariantViolation("ack range underflow"),
                )?;

                ack_ranges.insert(Interval::new(smallest, largest));
            }

            let (ecn_counts, buffer) = if tag == ACK_W_ECN_TAG {
                let (counts, buffer) = buffer.decode::<EcnCounts>()?;
                (Some(counts), buffer)
            } else {
                (None, buffer)
            };

            let frame = Ack {
                ack_delay,
                ack_ranges,
                ecn_counts,
            };

            Ok((frame, buffer))
        }
    }
);

impl EncoderValue for Ack {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        debug_assert!(!self.ack_ranges.is_empty(), "ack ranges must not be empty");

        buffer.encode(&self.tag());

        let mut intervals = self.ack_ranges.intervals().rev();

        let first = intervals
            .next()
            .expect("ack ranges are checked for emptiness above");
        let largest_acknowledged = first.end;
        let first_ack_range = first.end - first.start;

        buffer.encode(&VarInt::new(largest_acknowledged).expect("packet numbers fit a varint"));
        buffer.encode(&self.ack_delay);
        buffer.encode(&VarInt::new(self.ack_ranges.interval_len() as u64 - 1).expect("range count fits a varint"));
        buffer.encode(&VarInt::new(first_ack_range).expect("range length fits a varint"));

        let mut previous_smallest = first.start;
        for interval in intervals {
            let gap = previous_smallest - interval.end - 2;
            let ack_range = interval.end - interval.start;
            previous_smallest = interval.start;

            buffer.encode(&VarInt::new(gap).expect("gap fits a varint"));
            buffer.encode(&VarInt::new(ack_range).expect("range length fits a varint"));
        }

        if let Some(ecn_counts) = self.ecn_counts.as_ref() {
            buffer.encode(ecn_counts);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_codec::{DecoderBufferMut, Encoder, EncoderBuffer};

    fn round_trip(frame: &Ack) {
        let mut bytes = [0u8; 1500];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        encoder.encode(frame);
        let len = encoder.len();

        let buffer = DecoderBufferMut::new(&mut bytes[..len]);
        let (tag, buffer) = buffer.decode::<u8>().unwrap();
        let (decoded, buffer) = buffer.decode_parameterized::<Ack>(tag).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(&decoded, frame);
    }

    #[test]
    fn single_range_test() {
        let mut ack_ranges = AckRanges::new();
        ack_ranges.insert(Interval::new(0, 5));

        round_trip(&Ack {
            ack_delay: VarInt::from_u8(20),
            ack_ranges,
            ecn_counts: None,
        });
    }

    #[test]
    fn multi_range_test() {
        let mut ack_ranges = AckRanges::new();
        ack_ranges.insert(Interval::new(1, 2));
        ack_ranges.insert(Interval::new(5, 5));
        ack_ranges.insert(Interval::new(9, 20));

        round_trip(&Ack {
            ack_delay: VarInt::from_u8(0),
            ack_ranges,
            ecn_counts: None,
        });
    }

    #[test]
    fn ecn_test() {
        let mut ack_ranges = AckRanges::new();
        ack_ranges.insert(Interval::new(3, 4));

        round_trip(&Ack {
            ack_delay: VarInt::from_u16(1000),
            ack_ranges,
            ecn_counts: Some(EcnCounts {
                ect_0_count: VarInt::from_u8(1),
                ect_1_count: VarInt::from_u8(2),
                ce_count: VarInt::from_u8(3),
            }),
        });
    }

    #[test]
    fn underflow_rejected_test() {
        // largest = 1, first range = 4 would acknowledge negative packet
        // numbers
        let mut bytes = [0x01u8, 0x00, 0x00, 0x04];
        let buffer = DecoderBufferMut::new(&mut bytes);
        assert!(buffer.decode_parameterized::<Ack>(ACK_TAG).is_err());
    }
}
