// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::*;
use bolero::check;
use quill_codec::{DecoderBuffer, Encoder, EncoderBuffer};

fn round_trip(value: VarInt) -> usize {
    let mut bytes = [0u8; 8];
    let mut encoder = EncoderBuffer::new(&mut bytes);
    encoder.encode(&value);
    let len = encoder.len();
    assert_eq!(len, value.encoding_size());

    let buffer = DecoderBuffer::new(&bytes[..len]);
    let (actual, buffer) = buffer.decode::<VarInt>().unwrap();
    assert!(buffer.is_empty());
    assert_eq!(actual, value);

    len
}

#[test]
fn round_trip_test() {
    check!().with_type::<u64>().cloned().for_each(|value| {
        if let Ok(value) = VarInt::new(value) {
            round_trip(value);
        }
    });
}

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#16
//= type=test
//# +------+--------+-------------+------------------------+
//# | 2Bit | Length | Usable Bits | Range                  |
//# +------+--------+-------------+------------------------+
//# | 00   | 1      | 6           | 0-63                   |
//# | 01   | 2      | 14          | 0-16383                |
//# | 10   | 4      | 30          | 0-1073741823           |
//# | 11   | 8      | 62          | 0-4611686018427387903  |
//# +------+--------+-------------+------------------------+
#[test]
fn encoding_boundary_test() {
    assert_eq!(round_trip(VarInt::from_u8(0)), 1);
    assert_eq!(round_trip(VarInt::from_u8(63)), 1);
    assert_eq!(round_trip(VarInt::from_u8(64)), 2);
    assert_eq!(round_trip(VarInt::from_u16(16_383)), 2);
    assert_eq!(round_trip(VarInt::from_u16(16_384)), 4);
    assert_eq!(round_trip(VarInt::from_u32(1_073_741_823)), 4);
    assert_eq!(round_trip(VarInt::from_u32(1_073_741_824)), 8);
    assert_eq!(round_trip(VarInt::MAX), 8);
}

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#A.1
//= type=test
//# For example, the eight byte sequence c2 19 7c 5e ff 14 e8 8c (in
//# hexadecimal) decodes to the decimal value 151288809941952652;
#[test]
fn draft_example_test() {
    let examples: &[(&[u8], u64)] = &[
        (&[0xc2, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c], 151_288_809_941_952_652),
        (&[0x9d, 0x7f, 0x3e, 0x7d], 494_878_333),
        (&[0x7b, 0xbd], 15_293),
        (&[0x25], 37),
    ];

    for (bytes, expected) in examples {
        let buffer = DecoderBuffer::new(bytes);
        let (value, buffer) = buffer.decode::<VarInt>().unwrap();
        assert!(buffer.is_empty());
        assert_eq!(value.as_u64(), *expected);
    }
}

#[test]
fn truncated_decode_test() {
    // first byte declares a 4 byte encoding but only 2 are present
    let bytes = [0x80, 0x01];
    let buffer = DecoderBuffer::new(&bytes);
    assert!(buffer.decode::<VarInt>().is_err());
}

#[test]
fn out_of_range_test() {
    assert!(VarInt::new(MAX_VARINT_VALUE).is_ok());
    assert!(VarInt::new(MAX_VARINT_VALUE + 1).is_err());
}
