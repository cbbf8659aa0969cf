// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

mod sliding_window;
pub use sliding_window::{SlidingWindow, SlidingWindowError};

use crate::varint::VarInt;
use core::fmt;
use quill_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#12.3
//# The packet number is an integer in the range 0 to 2^62-1.  This
//# number is used in determining the cryptographic nonce for packet
//# protection.  Each endpoint maintains a separate packet number for
//# sending and receiving.

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#12.3
//# Packet numbers are divided into 3 spaces in QUIC:
//#
//# o  Initial space: All Initial packets (Section 17.2.2) are in this
//#    space.
//#
//# o  Handshake space: All Handshake packets (Section 17.2.4) are in
//#    this space.
//#
//# o  Application data space: All 0-RTT and 1-RTT encrypted packets
//#    (Section 12.1) are in this space.

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PacketNumberSpace {
    Initial,
    Handshake,
    ApplicationData,
}

impl PacketNumberSpace {
    #[inline]
    pub fn is_initial(self) -> bool {
        matches!(self, Self::Initial)
    }

    #[inline]
    pub fn is_handshake(self) -> bool {
        matches!(self, Self::Handshake)
    }

    #[inline]
    pub fn is_application_data(self) -> bool {
        matches!(self, Self::ApplicationData)
    }

    /// Creates a `PacketNumber` in this space
    #[inline]
    pub fn new_packet_number(self, value: VarInt) -> PacketNumber {
        PacketNumber { space: self, value }
    }

    /// Reads the packet number length out of an unprotected first byte
    #[inline]
    pub fn new_packet_number_len(self, first_byte: u8) -> PacketNumberLen {
        PacketNumberLen::from_first_byte(first_byte, self)
    }

    #[inline]
    pub(crate) fn assert_eq(self, other: Self) {
        debug_assert_eq!(self, other, "packet numbers are compared across spaces");
    }
}

/// A full 62-bit packet number, tagged with its space so values from
/// different spaces cannot be compared accidentally
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketNumber {
    space: PacketNumberSpace,
    value: VarInt,
}

impl fmt::Debug for PacketNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}#{}", self.space, self.value)
    }
}

impl PartialOrd for PacketNumber {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PacketNumber {
    #[inline]
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.space.assert_eq(other.space);
        self.value.cmp(&other.value)
    }
}

impl PacketNumber {
    #[inline]
    pub fn space(self) -> PacketNumberSpace {
        self.space
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.value.as_u64()
    }

    #[inline]
    pub fn as_varint(self) -> VarInt {
        self.value
    }

    /// Returns the next packet number in the same space
    #[inline]
    pub fn next(self) -> Option<Self> {
        let value = self.value.checked_add(VarInt::from_u8(1))?;
        Some(self.space.new_packet_number(value))
    }

    /// Returns the distance `self - other`, or `None` when `other` is larger
    #[inline]
    pub fn checked_distance(self, other: Self) -> Option<u64> {
        self.space.assert_eq(other.space);
        self.as_u64().checked_sub(other.as_u64())
    }

    //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#17.1
    //# The sender MUST use a packet number size able to represent more than
    //# twice as large a range than the difference between the largest
    //# acknowledged packet and packet number being sent.
    #[inline]
    pub fn truncate(self, largest_acknowledged: Self) -> Option<TruncatedPacketNumber> {
        self.space.assert_eq(largest_acknowledged.space);

        let len = self
            .as_u64()
            .checked_sub(largest_acknowledged.as_u64())
            .and_then(|value| value.checked_mul(2))
            .and_then(PacketNumberLen::for_range)?;

        let mask = len.max_value();
        let value = (self.as_u64() & mask) as u32;

        Some(TruncatedPacketNumber {
            space: self.space,
            len,
            value,
        })
    }
}

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#17.1
//# Packet numbers are integers in the range 0 to 2^62-1 (Section 12.3).
//# When present in long or short packet headers, they are encoded in 1
//# to 4 bytes.

/// The packet number len is stored in the two least significant bits of the
/// (unprotected) packet tag
pub(crate) const PACKET_NUMBER_LEN_MASK: u8 = 0b11;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PacketNumberLen {
    U8,
    U16,
    U24,
    U32,
}

impl PacketNumberLen {
    /// Reads the len out of the two low bits of an unprotected first byte
    #[inline]
    pub fn from_first_byte(first_byte: u8, _space: PacketNumberSpace) -> Self {
        match first_byte & PACKET_NUMBER_LEN_MASK {
            0b00 => Self::U8,
            0b01 => Self::U16,
            0b10 => Self::U24,
            _ => Self::U32,
        }
    }

    /// Returns the smallest len capable of representing `range` distinct
    /// values
    #[inline]
    fn for_range(range: u64) -> Option<Self> {
        match range {
            r if r <= u8::MAX as u64 => Some(Self::U8),
            r if r <= u16::MAX as u64 => Some(Self::U16),
            r if r <= 0x00ff_ffff => Some(Self::U24),
            r if r <= u32::MAX as u64 => Some(Self::U32),
            _ => None,
        }
    }

    /// The value stored in the two low bits of the packet tag
    #[inline]
    pub fn into_packet_tag_mask(self) -> u8 {
        match self {
            Self::U8 => 0b00,
            Self::U16 => 0b01,
            Self::U24 => 0b10,
            Self::U32 => 0b11,
        }
    }

    #[inline]
    pub fn bytesize(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U24 => 3,
            Self::U32 => 4,
        }
    }

    #[inline]
    pub fn bitsize(self) -> usize {
        self.bytesize() * 8
    }

    #[inline]
    fn max_value(self) -> u64 {
        (1u64 << self.bitsize()) - 1
    }
}

/// A truncated packet number, as it appears on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TruncatedPacketNumber {
    space: PacketNumberSpace,
    len: PacketNumberLen,
    value: u32,
}

impl TruncatedPacketNumber {
    #[inline]
    pub fn space(self) -> PacketNumberSpace {
        self.space
    }

    #[inline]
    pub fn len(self) -> PacketNumberLen {
        self.len
    }

    #[inline]
    pub fn into_u64(self) -> u64 {
        self.value as u64
    }

    /// Decodes a truncated packet number of `len` bytes
    #[inline]
    pub fn decode(
        buffer: DecoderBuffer,
        len: PacketNumberLen,
        space: PacketNumberSpace,
    ) -> DecoderBufferResult<Self> {
        let (value, buffer) = match len {
            PacketNumberLen::U8 => {
                let (value, buffer) = buffer.decode::<u8>()?;
                (value as u32, buffer)
            }
            PacketNumberLen::U16 => {
                let (value, buffer) = buffer.decode::<u16>()?;
                (value as u32, buffer)
            }
            PacketNumberLen::U24 => {
                let (bytes, buffer) = buffer.decode_slice(3)?;
                let bytes = bytes.as_less_safe_slice();
                let value = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
                (value, buffer)
            }
            PacketNumberLen::U32 => buffer.decode::<u32>()?,
        };

        Ok((Self { space, len, value }, buffer))
    }

    //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#A
    //# DecodePacketNumber(largest_pn, truncated_pn, pn_nbits):
    //#    expected_pn  = largest_pn + 1
    //#    pn_win       = 1 << pn_nbits
    //#    pn_hwin      = pn_win / 2
    //#    pn_mask      = pn_win - 1
    //#    // The incoming packet number should be greater than
    //#    // expected_pn - pn_hwin and less than or equal to
    //#    // expected_pn + pn_hwin
    //#    //
    //#    // This means we can't just strip the trailing bits from
    //#    // expected_pn and add the truncated_pn because that might
    //#    // yield a value outside the window.
    //#    //
    //#    // The following code calculates a candidate value and
    //#    // makes sure it's within the packet number window.
    //#    candidate_pn = (expected_pn & ~pn_mask) | truncated_pn
    //#    if candidate_pn <= expected_pn - pn_hwin:
    //#       return candidate_pn + pn_win
    //#    // Note the extra check for underflow when candidate_pn
    //#    // is near zero.
    //#    if candidate_pn > expected_pn + pn_hwin and
    //#       candidate_pn > pn_win:
    //#       return candidate_pn - pn_win
    //#    return candidate_pn
    #[inline]
    pub fn expand(self, largest_received: Option<PacketNumber>) -> PacketNumber {
        let largest_pn = match largest_received {
            Some(largest) => {
                self.space.assert_eq(largest.space);
                largest.as_u64()
            }
            // before any packet is received the truncated value is taken
            // at face value
            None => {
                return self
                    .space
                    .new_packet_number(VarInt::new(self.into_u64()).expect("fits in 32 bits"));
            }
        };

        let pn_nbits = self.len.bitsize();
        let expected_pn = largest_pn + 1;
        let pn_win = 1u64 << pn_nbits;
        let pn_hwin = pn_win / 2;
        let pn_mask = pn_win - 1;

        let mut candidate_pn = (expected_pn & !pn_mask) | self.into_u64();

        if candidate_pn.saturating_add(pn_hwin) <= expected_pn
            && candidate_pn + pn_win <= VarInt::MAX.as_u64()
        {
            candidate_pn += pn_win;
        } else if candidate_pn > expected_pn.saturating_add(pn_hwin) && candidate_pn >= pn_win {
            candidate_pn -= pn_win;
        }

        let value = VarInt::new(candidate_pn).unwrap_or(VarInt::MAX);
        self.space.new_packet_number(value)
    }
}

impl EncoderValue for TruncatedPacketNumber {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        let bytes = self.value.to_be_bytes();
        encoder.write_slice(&bytes[4 - self.len.bytesize()..]);
    }

    #[inline]
    fn encoding_size(&self) -> usize {
        self.len.bytesize()
    }

    #[inline]
    fn encoding_size_for_encoder<E: Encoder>(&self, _encoder: &E) -> usize {
        self.len.bytesize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolero::check;

    fn new(space: PacketNumberSpace, value: u64) -> PacketNumber {
        space.new_packet_number(VarInt::new(value).unwrap())
    }

    //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#17.1
    //= type=test
    //# For example, if an endpoint has received an acknowledgment for packet
    //# 0xabe8bc, sending a packet with a number of 0xac5c02 requires a
    //# packet number encoding with 16 bits or more; whereas the 24-bit
    //# packet number encoding is needed to send a packet with a number of
    //# 0xace8fe.
    #[test]
    fn truncation_len_example_test() {
        let space = PacketNumberSpace::ApplicationData;
        let largest_acked = new(space, 0x00ab_e8bc);

        assert_eq!(
            new(space, 0x00ac_5c02)
                .truncate(largest_acked)
                .unwrap()
                .len()
                .bitsize(),
            16
        );
        assert_eq!(
            new(space, 0x00ac_e8fe)
                .truncate(largest_acked)
                .unwrap()
                .len()
                .bitsize(),
            24
        );
    }

    //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#A
    //= type=test
    //# For example, if the highest successfully authenticated packet had a
    //# packet number of 0xa82f30ea, then a packet containing a 16-bit value
    //# of 0x9b32 will be decoded as 0xa82f9b32.
    #[test]
    fn expansion_example_test() {
        let space = PacketNumberSpace::ApplicationData;
        let largest = new(space, 0xa82f_30ea);
        let truncated = TruncatedPacketNumber {
            space,
            len: PacketNumberLen::U16,
            value: 0x9b32,
        };

        assert_eq!(truncated.expand(Some(largest)), new(space, 0xa82f_9b32));
    }

    #[test]
    fn truncate_expand_round_trip_test() {
        check!()
            .with_type::<(u64, u64)>()
            .cloned()
            .for_each(|(largest_acked, packet_number)| {
                let largest_acked = largest_acked & VarInt::MAX.as_u64();
                let packet_number = packet_number & VarInt::MAX.as_u64();

                // a packet number may only be truncated against an older ack
                if packet_number < largest_acked {
                    return;
                }

                let space = PacketNumberSpace::Initial;
                let largest_acked = new(space, largest_acked);
                let packet_number = new(space, packet_number);

                if let Some(truncated) = packet_number.truncate(largest_acked) {
                    // the receiver expands against the packet before this one
                    // at minimum
                    let expanded = truncated.expand(Some(largest_acked));
                    assert_eq!(expanded, packet_number);
                }
            });
    }

    #[test]
    fn encode_decode_test() {
        use quill_codec::Encoder;

        let space = PacketNumberSpace::Handshake;
        let largest_acked = new(space, 0x1000);
        let packet_number = new(space, 0x1234);
        let truncated = packet_number.truncate(largest_acked).unwrap();

        let mut bytes = [0u8; 4];
        let mut encoder = quill_codec::EncoderBuffer::new(&mut bytes);
        encoder.encode(&truncated);
        let len = encoder.len();
        assert_eq!(len, truncated.len().bytesize());

        let buffer = DecoderBuffer::new(&bytes[..len]);
        let (decoded, _) = TruncatedPacketNumber::decode(buffer, truncated.len(), space).unwrap();
        assert_eq!(decoded, truncated);
    }
}
