// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::*;
use quill_codec::{Encoder, EncoderBuffer};

fn round_trip(parameters: &TransportParameters) -> TransportParameters {
    let mut bytes = [0u8; 512];
    let mut encoder = EncoderBuffer::new(&mut bytes);
    encoder.encode(parameters);
    let len = encoder.len();

    TransportParameters::decode(DecoderBuffer::new(&bytes[..len])).unwrap()
}

#[test]
fn default_round_trip_test() {
    let parameters = TransportParameters::default();
    assert_eq!(round_trip(&parameters), parameters);
}

#[test]
fn full_round_trip_test() {
    let parameters = TransportParameters {
        original_connection_id: Some(ConnectionId::try_from_slice(&[1, 2, 3, 4]).unwrap()),
        max_idle_timeout: VarInt::from_u32(30_000),
        stateless_reset_token: Some([7u8; 16]),
        max_packet_size: VarInt::from_u16(1350),
        initial_max_data: VarInt::from_u32(1 << 20),
        initial_max_stream_data_bidi_local: VarInt::from_u32(65_536),
        initial_max_stream_data_bidi_remote: VarInt::from_u32(65_537),
        initial_max_stream_data_uni: VarInt::from_u32(65_538),
        initial_max_streams_bidi: VarInt::from_u8(100),
        initial_max_streams_uni: VarInt::from_u8(3),
        ack_delay_exponent: 2,
        max_ack_delay: VarInt::from_u8(40),
        disable_active_migration: true,
        active_connection_id_limit: VarInt::from_u8(4),
    };

    assert_eq!(round_trip(&parameters), parameters);
}

#[test]
fn unknown_parameter_ignored_test() {
    let mut bytes = vec![];
    // grease-style parameter id 0x31 with a 3 byte value
    bytes.extend_from_slice(&[0x31, 0x03, 1, 2, 3]);
    // initial_max_data = 64
    bytes.extend_from_slice(&[0x04, 0x02, 0x40, 0x40]);

    let parameters = TransportParameters::decode(DecoderBuffer::new(&bytes)).unwrap();
    assert_eq!(parameters.initial_max_data, VarInt::from_u8(64));
}

#[test]
fn duplicate_rejected_test() {
    let mut bytes = vec![];
    bytes.extend_from_slice(&[0x04, 0x01, 0x08]);
    bytes.extend_from_slice(&[0x04, 0x01, 0x09]);

    assert!(TransportParameters::decode(DecoderBuffer::new(&bytes)).is_err());
}

#[test]
fn ack_delay_exponent_bound_test() {
    // ack_delay_exponent = 21
    let bytes = [0x0au8, 0x01, 21];
    assert!(TransportParameters::decode(DecoderBuffer::new(&bytes)).is_err());

    let bytes = [0x0au8, 0x01, 20];
    let parameters = TransportParameters::decode(DecoderBuffer::new(&bytes)).unwrap();
    assert_eq!(parameters.ack_delay_exponent, 20);
}

#[test]
fn max_packet_size_bound_test() {
    // max_packet_size = 1199 encoded as a 2 byte varint
    let bytes = [0x03u8, 0x02, 0x44, 0xaf];
    assert!(TransportParameters::decode(DecoderBuffer::new(&bytes)).is_err());
}

#[test]
fn client_restriction_test() {
    let parameters = TransportParameters {
        stateless_reset_token: Some([0u8; 16]),
        ..Default::default()
    };

    assert!(parameters.validate_as_client().is_err());
    assert!(TransportParameters::default().validate_as_client().is_ok());
}

#[test]
fn truncated_value_rejected_test() {
    // declared length of 4 with only 2 bytes present
    let bytes = [0x04u8, 0x04, 0x40, 0x40];
    assert!(TransportParameters::decode(DecoderBuffer::new(&bytes)).is_err());
}
