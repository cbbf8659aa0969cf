// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use crate::packet::PacketType;
use core::fmt;
use quill_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError, DecoderValueMut};

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#12.4
//# As described in Section 12.4, packets contain one or more frames.
//# This section describes the format and semantics of the core QUIC
//# frame types.

pub(crate) type Tag = u8;

/// Returned when a frame cannot be fit into a packet's remaining capacity
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FitError;

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "frame could not fit in the packet")
    }
}

// This implements a codec for a frame that contains simple
// values that don't vary based on the tag
macro_rules! simple_frame_codec {
    ($name:ident {
        $(
            $field:ident
        ),*
    }, $tag:expr) => {
        quill_codec::decoder_parameterized_value!(
            impl<'a> $name {
                fn decode(_tag: crate::frame::Tag, buffer: Buffer) -> Result<Self> {
                    $(
                        let ($field, buffer) = buffer.decode()?;
                    )*

                    let frame = $name { $($field),* };

                    Ok((frame, buffer))
                }
            }
        );

        impl quill_codec::EncoderValue for $name {
            #[inline]
            fn encode<E: quill_codec::Encoder>(&self, buffer: &mut E) {
                buffer.encode(&$tag);
                $(
                    buffer.encode(&self.$field);
                )*
            }
        }
    };
}

#[macro_use]
pub mod padding;
#[macro_use]
pub mod ping;
#[macro_use]
pub mod ack;
#[macro_use]
pub mod reset_stream;
#[macro_use]
pub mod stop_sending;
#[macro_use]
pub mod crypto;
#[macro_use]
pub mod new_token;
#[macro_use]
pub mod stream;
#[macro_use]
pub mod max_data;
#[macro_use]
pub mod max_stream_data;
#[macro_use]
pub mod max_streams;
#[macro_use]
pub mod data_blocked;
#[macro_use]
pub mod stream_data_blocked;
#[macro_use]
pub mod streams_blocked;
#[macro_use]
pub mod new_connection_id;
#[macro_use]
pub mod retire_connection_id;
#[macro_use]
pub mod path_challenge;
#[macro_use]
pub mod path_response;
#[macro_use]
pub mod connection_close;
#[macro_use]
pub mod handshake_done;

pub use ack::{Ack, AckRanges, EcnCounts};
pub use connection_close::ConnectionClose;
pub use crypto::{Crypto, CryptoMut, CryptoRef};
pub use data_blocked::DataBlocked;
pub use handshake_done::HandshakeDone;
pub use max_data::MaxData;
pub use max_stream_data::MaxStreamData;
pub use max_streams::MaxStreams;
pub use new_connection_id::NewConnectionId;
pub use new_token::NewToken;
pub use padding::Padding;
pub use path_challenge::PathChallenge;
pub use path_response::PathResponse;
pub use ping::Ping;
pub use reset_stream::ResetStream;
pub use retire_connection_id::RetireConnectionId;
pub use stop_sending::StopSending;
pub use stream::{Stream, StreamMut, StreamRef};
pub use stream_data_blocked::StreamDataBlocked;
pub use streams_blocked::StreamsBlocked;

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#13.2
//# Packets containing PADDING, ACK, or CONNECTION_CLOSE frames are not
//# considered ack-eliciting.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum AckElicitation {
    #[default]
    NonEliciting,
    Eliciting,
}

impl AckElicitation {
    #[inline]
    pub fn is_ack_eliciting(self) -> bool {
        matches!(self, Self::Eliciting)
    }

    /// Merges the elicitation of two frames in the same packet
    #[inline]
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        self.max(other)
    }
}

/// A decoded frame borrowing its data out of the packet payload
#[derive(Debug, PartialEq, Eq)]
pub enum FrameMut<'a> {
    Padding(Padding),
    Ping(Ping),
    Ack(Ack),
    ResetStream(ResetStream),
    StopSending(StopSending),
    Crypto(Crypto<DecoderBufferMut<'a>>),
    NewToken(NewToken<'a>),
    Stream(Stream<DecoderBufferMut<'a>>),
    MaxData(MaxData),
    MaxStreamData(MaxStreamData),
    MaxStreams(MaxStreams),
    DataBlocked(DataBlocked),
    StreamDataBlocked(StreamDataBlocked),
    StreamsBlocked(StreamsBlocked),
    NewConnectionId(NewConnectionId<'a>),
    RetireConnectionId(RetireConnectionId),
    PathChallenge(PathChallenge<'a>),
    PathResponse(PathResponse<'a>),
    ConnectionClose(ConnectionClose<'a>),
    HandshakeDone(HandshakeDone),
}

macro_rules! dispatch {
    ($self:ident, |$frame:ident| $body:expr) => {
        match $self {
            FrameMut::Padding($frame) => $body,
            FrameMut::Ping($frame) => $body,
            FrameMut::Ack($frame) => $body,
            FrameMut::ResetStream($frame) => $body,
            FrameMut::StopSending($frame) => $body,
            FrameMut::Crypto($frame) => $body,
            FrameMut::NewToken($frame) => $body,
            FrameMut::Stream($frame) => $body,
            FrameMut::MaxData($frame) => $body,
            FrameMut::MaxStreamData($frame) => $body,
            FrameMut::MaxStreams($frame) => $body,
            FrameMut::DataBlocked($frame) => $body,
            FrameMut::StreamDataBlocked($frame) => $body,
            FrameMut::StreamsBlocked($frame) => $body,
            FrameMut::NewConnectionId($frame) => $body,
            FrameMut::RetireConnectionId($frame) => $body,
            FrameMut::PathChallenge($frame) => $body,
            FrameMut::PathResponse($frame) => $body,
            FrameMut::ConnectionClose($frame) => $body,
            FrameMut::HandshakeDone($frame) => $body,
        }
    };
}

impl<'a> FrameMut<'a> {
    #[inline]
    pub fn tag(&self) -> Tag {
        dispatch!(self, |frame| frame.tag())
    }

    #[inline]
    pub fn ack_elicitation(&self) -> AckElicitation {
        match self {
            FrameMut::Padding(_) | FrameMut::Ack(_) | FrameMut::ConnectionClose(_) => {
                AckElicitation::NonEliciting
            }
            _ => AckElicitation::Eliciting,
        }
    }

    //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#12.4
    //# The payload of Initial (Section 17.2.2) and Handshake
    //# (Section 17.2.4) packets can only contain PADDING, PING, ACK,
    //# CRYPTO, and CONNECTION_CLOSE frames.
    #[inline]
    pub fn is_allowed_in(&self, packet_type: PacketType) -> bool {
        match packet_type {
            PacketType::Initial | PacketType::Handshake => matches!(
                self,
                FrameMut::Padding(_)
                    | FrameMut::Ping(_)
                    | FrameMut::Ack(_)
                    | FrameMut::Crypto(_)
                    | FrameMut::ConnectionClose(_)
            ),
            PacketType::ZeroRtt => !matches!(
                self,
                FrameMut::Ack(_)
                    | FrameMut::Crypto(_)
                    | FrameMut::NewToken(_)
                    | FrameMut::PathResponse(_)
                    | FrameMut::HandshakeDone(_)
            ),
            PacketType::OneRtt => true,
        }
    }
}

impl<'a> DecoderValueMut<'a> for FrameMut<'a> {
    fn decode_mut(buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let tag = buffer.peek_byte(0)?;
        let buffer = buffer.skip(core::mem::size_of::<Tag>())?;

        macro_rules! frame {
            ($variant:ident) => {{
                let (frame, buffer) = buffer.decode_parameterized(tag)?;
                (FrameMut::$variant(frame), buffer)
            }};
        }

        let (frame, buffer) = match tag {
            padding_tag!() => frame!(Padding),
            ping_tag!() => frame!(Ping),
            ack_tag!() => frame!(Ack),
            reset_stream_tag!() => frame!(ResetStream),
            stop_sending_tag!() => frame!(StopSending),
            crypto_tag!() => frame!(Crypto),
            new_token_tag!() => frame!(NewToken),
            stream_tag!() => frame!(Stream),
            max_data_tag!() => frame!(MaxData),
            max_stream_data_tag!() => frame!(MaxStreamData),
            max_streams_tag!() => frame!(MaxStreams),
            data_blocked_tag!() => frame!(DataBlocked),
            stream_data_blocked_tag!() => frame!(StreamDataBlocked),
            streams_blocked_tag!() => frame!(StreamsBlocked),
            new_connection_id_tag!() => frame!(NewConnectionId),
            retire_connection_id_tag!() => frame!(RetireConnectionId),
            path_challenge_tag!() => frame!(PathChallenge),
            path_response_tag!() => frame!(PathResponse),
            connection_close_tag!() => frame!(ConnectionClose),
            handshake_done_tag!() => frame!(HandshakeDone),
            _ => return Err(DecoderError::InvariantViolation("invalid frame")),
        };

        Ok((frame, buffer))
    }
}

#[cfg(test)]
mod tests;
