// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::*;
use crate::{interval_set::Interval, stream::StreamType, varint::VarInt};
use quill_codec::{Encoder, EncoderBuffer, EncoderValue};

/// Encodes the frame, decodes it through the frame dispatcher, and hands
/// the decoded value to `check`
fn round_trip<F: EncoderValue, C: FnOnce(FrameMut)>(frame: &F, check: C) {
    let mut bytes = [0u8; 1500];
    let mut encoder = EncoderBuffer::new(&mut bytes);
    encoder.encode(frame);
    let len = encoder.len();
    assert_eq!(len, frame.encoding_size());

    let buffer = quill_codec::DecoderBufferMut::new(&mut bytes[..len]);
    let (decoded, remaining) = buffer.decode::<FrameMut>().unwrap();
    assert!(remaining.is_empty());

    check(decoded);
}

#[test]
fn padding_test() {
    round_trip(&Padding { length: 100 }, |frame| {
        assert_eq!(frame, FrameMut::Padding(Padding { length: 100 }));
        assert!(!frame.ack_elicitation().is_ack_eliciting());
    });
}

#[test]
fn ping_test() {
    round_trip(&Ping, |frame| {
        assert_eq!(frame, FrameMut::Ping(Ping));
        assert!(frame.ack_elicitation().is_ack_eliciting());
    });
}

#[test]
fn ack_test() {
    let mut ack_ranges = AckRanges::new();
    ack_ranges.insert(Interval::new(2, 4));
    ack_ranges.insert(Interval::new(10, 15));
    let ack = Ack {
        ack_delay: VarInt::from_u16(320),
        ack_ranges,
        ecn_counts: None,
    };

    round_trip(&ack, |frame| {
        assert_eq!(frame, FrameMut::Ack(ack.clone()));
        assert!(!frame.ack_elicitation().is_ack_eliciting());
        assert!(frame.is_allowed_in(PacketType::Initial));
    });
}

#[test]
fn reset_stream_test() {
    let reset = ResetStream {
        stream_id: VarInt::from_u8(4),
        application_error_code: VarInt::from_u8(99),
        final_size: VarInt::from_u16(4000),
    };

    round_trip(&reset, |frame| {
        assert_eq!(frame, FrameMut::ResetStream(reset));
        assert!(!frame.is_allowed_in(PacketType::Handshake));
        assert!(frame.is_allowed_in(PacketType::OneRtt));
    });
}

#[test]
fn stop_sending_test() {
    let stop = StopSending {
        stream_id: VarInt::from_u8(8),
        application_error_code: VarInt::from_u8(15),
    };

    round_trip(&stop, |frame| {
        assert_eq!(frame, FrameMut::StopSending(stop));
    });
}

#[test]
fn crypto_test() {
    let payload = [1u8, 2, 3, 4, 5];
    let crypto = Crypto {
        offset: VarInt::from_u16(1200),
        data: &payload[..],
    };

    round_trip(&crypto, |frame| {
        if let FrameMut::Crypto(frame) = frame {
            let frame: CryptoRef = frame.into();
            assert_eq!(frame.offset, VarInt::from_u16(1200));
            assert_eq!(frame.data, &payload[..]);
        } else {
            panic!("expected crypto frame");
        }
    });
}

#[test]
fn new_token_test() {
    let token = [42u8; 32];
    let new_token = NewToken { token: &token };

    round_trip(&new_token, |frame| {
        assert_eq!(frame, FrameMut::NewToken(NewToken { token: &token }));
    });
}

#[test]
fn stream_test() {
    // exercise every OFF/LEN/FIN combination
    for offset in [0u32, 16_000] {
        for is_last_frame in [false, true] {
            for is_fin in [false, true] {
                let payload = [7u8; 11];
                let stream = Stream {
                    stream_id: VarInt::from_u8(2),
                    offset: VarInt::from_u32(offset),
                    is_last_frame,
                    is_fin,
                    data: &payload[..],
                };

                round_trip(&stream, |frame| {
                    if let FrameMut::Stream(frame) = frame {
                        let frame: StreamRef = frame.into();
                        assert_eq!(frame.stream_id, VarInt::from_u8(2));
                        assert_eq!(frame.offset, VarInt::from_u32(offset));
                        assert_eq!(frame.is_last_frame, is_last_frame);
                        assert_eq!(frame.is_fin, is_fin);
                        assert_eq!(frame.data, &payload[..]);
                    } else {
                        panic!("expected stream frame");
                    }
                });
            }
        }
    }
}

#[test]
fn max_data_test() {
    let max_data = MaxData {
        maximum_data: VarInt::from_u32(1 << 20),
    };

    round_trip(&max_data, |frame| {
        assert_eq!(frame, FrameMut::MaxData(max_data));
    });
}

#[test]
fn max_stream_data_test() {
    let max_stream_data = MaxStreamData {
        stream_id: VarInt::from_u8(6),
        maximum_stream_data: VarInt::from_u32(65_536),
    };

    round_trip(&max_stream_data, |frame| {
        assert_eq!(frame, FrameMut::MaxStreamData(max_stream_data));
    });
}

#[test]
fn max_streams_test() {
    for stream_type in [StreamType::Bidirectional, StreamType::Unidirectional] {
        let max_streams = MaxStreams {
            stream_type,
            maximum_streams: VarInt::from_u8(100),
        };

        round_trip(&max_streams, |frame| {
            assert_eq!(frame, FrameMut::MaxStreams(max_streams));
        });
    }
}

#[test]
fn blocked_frames_test() {
    round_trip(
        &DataBlocked {
            data_limit: VarInt::from_u16(500),
        },
        |frame| {
            assert_eq!(
                frame,
                FrameMut::DataBlocked(DataBlocked {
                    data_limit: VarInt::from_u16(500)
                })
            );
        },
    );

    round_trip(
        &StreamDataBlocked {
            stream_id: VarInt::from_u8(3),
            stream_data_limit: VarInt::from_u16(1000),
        },
        |frame| {
            assert!(matches!(frame, FrameMut::StreamDataBlocked(_)));
        },
    );

    for stream_type in [StreamType::Bidirectional, StreamType::Unidirectional] {
        round_trip(
            &StreamsBlocked {
                stream_type,
                stream_limit: VarInt::from_u8(10),
            },
            |frame| {
                if let FrameMut::StreamsBlocked(frame) = frame {
                    assert_eq!(frame.stream_type, stream_type);
                } else {
                    panic!("expected streams blocked frame");
                }
            },
        );
    }
}

#[test]
fn new_connection_id_test() {
    let id = [1u8, 2, 3, 4, 5, 6, 7, 8];
    let token = [9u8; 16];
    let new_connection_id = NewConnectionId {
        sequence_number: VarInt::from_u8(3),
        retire_prior_to: VarInt::from_u8(1),
        connection_id: &id,
        stateless_reset_token: &token,
    };

    round_trip(&new_connection_id, |frame| {
        assert_eq!(frame, FrameMut::NewConnectionId(new_connection_id));
    });
}

#[test]
fn retire_connection_id_test() {
    let retire = RetireConnectionId {
        sequence_number: VarInt::from_u8(2),
    };

    round_trip(&retire, |frame| {
        assert_eq!(frame, FrameMut::RetireConnectionId(retire));
    });
}

#[test]
fn path_frames_test() {
    let data = [0xabu8; 8];

    round_trip(&PathChallenge { data: &data }, |frame| {
        assert_eq!(frame, FrameMut::PathChallenge(PathChallenge { data: &data }));
    });

    round_trip(&PathResponse { data: &data }, |frame| {
        assert_eq!(frame, FrameMut::PathResponse(PathResponse { data: &data }));
    });
}

#[test]
fn connection_close_test() {
    // transport variant
    let close = ConnectionClose {
        error_code: crate::transport::Error::PROTOCOL_VIOLATION.code,
        frame_type: Some(VarInt::from_u8(0x08)),
        reason: Some(b"reserved bits set"),
    };

    round_trip(&close, |frame| {
        assert_eq!(frame, FrameMut::ConnectionClose(close));
        assert!(!frame.ack_elicitation().is_ack_eliciting());
        assert!(frame.is_allowed_in(PacketType::Initial));
    });

    // application variant
    let close = ConnectionClose {
        error_code: VarInt::from_u8(7),
        frame_type: None,
        reason: None,
    };

    round_trip(&close, |frame| {
        assert_eq!(frame, FrameMut::ConnectionClose(close));
    });
}

#[test]
fn handshake_done_test() {
    round_trip(&HandshakeDone, |frame| {
        assert_eq!(frame, FrameMut::HandshakeDone(HandshakeDone));
        assert!(!frame.is_allowed_in(PacketType::Handshake));
        assert!(frame.is_allowed_in(PacketType::OneRtt));
    });
}

#[test]
fn unknown_frame_rejected_test() {
    let mut bytes = [0x1fu8, 0, 0, 0];
    let buffer = quill_codec::DecoderBufferMut::new(&mut bytes);
    assert!(buffer.decode::<FrameMut>().is_err());
}
