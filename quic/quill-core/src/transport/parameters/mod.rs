// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{connection::ConnectionId, transport::Error, varint::VarInt};
use quill_codec::{DecoderBuffer, DecoderError, Encoder, EncoderValue};

#[cfg(test)]
mod tests;

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#18
//# The format of the transport parameter extension is shown in Figure 19.
//#
//# Transport Parameters {
//#   Transport Parameter (..) ...,
//# }
//#
//# Each transport parameter is encoded as an (identifier, length, value)
//# tuple:
//#
//# Transport Parameter {
//#   Transport Parameter ID (i),
//#   Transport Parameter Length (i),
//#   Transport Parameter Value (..),
//# }

const ORIGINAL_CONNECTION_ID: u64 = 0x00;
const MAX_IDLE_TIMEOUT: u64 = 0x01;
const STATELESS_RESET_TOKEN: u64 = 0x02;
const MAX_PACKET_SIZE: u64 = 0x03;
const INITIAL_MAX_DATA: u64 = 0x04;
const INITIAL_MAX_STREAM_DATA_BIDI_LOCAL: u64 = 0x05;
const INITIAL_MAX_STREAM_DATA_BIDI_REMOTE: u64 = 0x06;
const INITIAL_MAX_STREAM_DATA_UNI: u64 = 0x07;
const INITIAL_MAX_STREAMS_BIDI: u64 = 0x08;
const INITIAL_MAX_STREAMS_UNI: u64 = 0x09;
const ACK_DELAY_EXPONENT: u64 = 0x0a;
const MAX_ACK_DELAY: u64 = 0x0b;
const DISABLE_ACTIVE_MIGRATION: u64 = 0x0c;
const PREFERRED_ADDRESS: u64 = 0x0d;
const ACTIVE_CONNECTION_ID_LIMIT: u64 = 0x0e;

pub const STATELESS_RESET_TOKEN_LEN: usize = 16;

/// The transport parameters advertised in the TLS handshake.
///
/// Every limit is monotone for the lifetime of the connection: frames such
/// as MAX_DATA and MAX_STREAMS only ever raise the values advertised here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportParameters {
    /// The connection id from the first Initial packet, echoed by the server
    pub original_connection_id: Option<ConnectionId>,

    /// Idle timeout in milliseconds; zero disables the idle timer
    pub max_idle_timeout: VarInt,

    pub stateless_reset_token: Option<[u8; STATELESS_RESET_TOKEN_LEN]>,

    /// The maximum UDP payload size the endpoint is willing to receive
    pub max_packet_size: VarInt,

    pub initial_max_data: VarInt,
    pub initial_max_stream_data_bidi_local: VarInt,
    pub initial_max_stream_data_bidi_remote: VarInt,
    pub initial_max_stream_data_uni: VarInt,
    pub initial_max_streams_bidi: VarInt,
    pub initial_max_streams_uni: VarInt,

    /// Exponent used to scale the ACK Delay field of ACK frames
    pub ack_delay_exponent: u8,

    /// The maximum time in milliseconds the endpoint will delay sending
    /// acknowledgments
    pub max_ack_delay: VarInt,

    pub disable_active_migration: bool,

    pub active_connection_id_limit: VarInt,
}

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#18.2
//# max_packet_size (0x03):  The maximum packet size parameter is an
//#    integer value that limits the size of packets that the endpoint is
//#    willing to receive.  ...  The default for this parameter is the
//#    maximum permitted UDP payload of 65527.

const DEFAULT_MAX_PACKET_SIZE: u32 = 65_527;

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#18.2
//# ack_delay_exponent (0x0a):  ...  If this value is absent, a default
//#    value of 3 is assumed (indicating a multiplier of 8).

const DEFAULT_ACK_DELAY_EXPONENT: u8 = 3;

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#18.2
//# max_ack_delay (0x0b):  ...  If this value is absent, a default of 25
//#    milliseconds is assumed.

const DEFAULT_MAX_ACK_DELAY: u32 = 25;

const DEFAULT_ACTIVE_CONNECTION_ID_LIMIT: u32 = 2;

impl Default for TransportParameters {
    fn default() -> Self {
        Self {
            original_connection_id: None,
            max_idle_timeout: VarInt::ZERO,
            stateless_reset_token: None,
            max_packet_size: VarInt::from_u32(DEFAULT_MAX_PACKET_SIZE),
            initial_max_data: VarInt::ZERO,
            initial_max_stream_data_bidi_local: VarInt::ZERO,
            initial_max_stream_data_bidi_remote: VarInt::ZERO,
            initial_max_stream_data_uni: VarInt::ZERO,
            initial_max_streams_bidi: VarInt::ZERO,
            initial_max_streams_uni: VarInt::ZERO,
            ack_delay_exponent: DEFAULT_ACK_DELAY_EXPONENT,
            max_ack_delay: VarInt::from_u32(DEFAULT_MAX_ACK_DELAY),
            disable_active_migration: false,
            active_connection_id_limit: VarInt::from_u32(DEFAULT_ACTIVE_CONNECTION_ID_LIMIT),
        }
    }
}

impl TransportParameters {
    /// Decodes the parameter sequence.
    ///
    //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#7.3.1
    //# An endpoint MUST NOT send a parameter more than once in a given
    //# transport parameters extension.  An endpoint SHOULD treat receipt of
    //# duplicate transport parameters as a connection error of type
    //# TRANSPORT_PARAMETER_ERROR.
    //
    /// Unknown parameter ids are skipped.
    pub fn decode(buffer: DecoderBuffer) -> Result<Self, Error> {
        let mut parameters = Self::default();
        let mut seen: u64 = 0;

        let mut buffer = buffer;
        while !buffer.is_empty() {
            let (id, remaining) = buffer.decode::<VarInt>().map_err(map_decoder_error)?;
            let (value, remaining) = remaining
                .decode_slice_with_len_prefix::<VarInt>()
                .map_err(map_decoder_error)?;
            buffer = remaining;

            let id = id.as_u64();
            if id < 64 {
                let bit = 1u64 << id;
                if seen & bit != 0 {
                    return Err(Error::TRANSPORT_PARAMETER_ERROR
                        .with_reason("duplicate transport parameter"));
                }
                seen |= bit;
            }

            match id {
                ORIGINAL_CONNECTION_ID => {
                    let id = ConnectionId::try_from_slice(value.as_less_safe_slice()).map_err(
                        |_| {
                            Error::TRANSPORT_PARAMETER_ERROR
                                .with_reason("original connection id too long")
                        },
                    )?;
                    parameters.original_connection_id = Some(id);
                }
                MAX_IDLE_TIMEOUT => {
                    parameters.max_idle_timeout = decode_integer(value)?;
                }
                STATELESS_RESET_TOKEN => {
                    let token = value
                        .as_less_safe_slice()
                        .try_into()
                        .map_err(|_| {
                            Error::TRANSPORT_PARAMETER_ERROR
                                .with_reason("invalid stateless reset token length")
                        })?;
                    parameters.stateless_reset_token = Some(token);
                }
                MAX_PACKET_SIZE => {
                    let value = decode_integer(value)?;

                    //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#18.2
                    //# Values below 1200 are invalid.
                    if value < 1200u64 {
                        return Err(Error::TRANSPORT_PARAMETER_ERROR
                            .with_reason("max_packet_size below 1200"));
                    }
                    parameters.max_packet_size = value;
                }
                INITIAL_MAX_DATA => {
                    parameters.initial_max_data = decode_integer(value)?;
                }
                INITIAL_MAX_STREAM_DATA_BIDI_LOCAL => {
                    parameters.initial_max_stream_data_bidi_local = decode_integer(value)?;
                }
                INITIAL_MAX_STREAM_DATA_BIDI_REMOTE => {
                    parameters.initial_max_stream_data_bidi_remote = decode_integer(value)?;
                }
                INITIAL_MAX_STREAM_DATA_UNI => {
                    parameters.initial_max_stream_data_uni = decode_integer(value)?;
                }
                INITIAL_MAX_STREAMS_BIDI => {
                    parameters.initial_max_streams_bidi = decode_integer(value)?;
                }
                INITIAL_MAX_STREAMS_UNI => {
                    parameters.initial_max_streams_uni = decode_integer(value)?;
                }
                ACK_DELAY_EXPONENT => {
                    let value: VarInt = decode_integer(value)?;

                    //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#18.2
                    //# Values above 20 are invalid.
                    if value > 20u64 {
                        return Err(Error::TRANSPORT_PARAMETER_ERROR
                            .with_reason("ack_delay_exponent above 20"));
                    }
                    parameters.ack_delay_exponent = value.as_u64() as u8;
                }
                MAX_ACK_DELAY => {
                    let value: VarInt = decode_integer(value)?;

                    //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#18.2
                    //# Values of 2^14 or greater are invalid.
                    if value >= (1u64 << 14) {
                        return Err(Error::TRANSPORT_PARAMETER_ERROR
                            .with_reason("max_ack_delay out of range"));
                    }
                    parameters.max_ack_delay = value;
                }
                DISABLE_ACTIVE_MIGRATION => {
                    if !value.is_empty() {
                        return Err(Error::TRANSPORT_PARAMETER_ERROR
                            .with_reason("disable_active_migration carries a value"));
                    }
                    parameters.disable_active_migration = true;
                }
                PREFERRED_ADDRESS => {
                    // decoded for completeness; migration is not supported so
                    // the content is ignored
                }
                ACTIVE_CONNECTION_ID_LIMIT => {
                    parameters.active_connection_id_limit = decode_integer(value)?;
                }
                //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#7.3.1
                //# An endpoint MUST ignore transport parameters that it does
                //# not support.
                _ => {}
            }
        }

        Ok(parameters)
    }

    /// Validates parameters received from a client.
    ///
    //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#18.2
    //# A client MUST NOT include an original connection ID, a stateless
    //# reset token, or a preferred address.  A server MUST treat receipt of
    //# any of these transport parameters as a connection error of type
    //# TRANSPORT_PARAMETER_ERROR.
    pub fn validate_as_client(&self) -> Result<(), Error> {
        if self.original_connection_id.is_some() || self.stateless_reset_token.is_some() {
            return Err(Error::TRANSPORT_PARAMETER_ERROR
                .with_reason("server-only transport parameter received from client"));
        }

        Ok(())
    }
}

#[inline]
fn decode_integer(value: DecoderBuffer) -> Result<VarInt, Error> {
    let (value, remaining) = value.decode::<VarInt>().map_err(map_decoder_error)?;
    remaining.ensure_empty().map_err(map_decoder_error)?;
    Ok(value)
}

#[inline]
fn map_decoder_error(_error: DecoderError) -> Error {
    Error::TRANSPORT_PARAMETER_ERROR.with_reason("malformed transport parameters")
}

impl EncoderValue for TransportParameters {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        #[inline]
        fn encode_integer<E: Encoder>(encoder: &mut E, id: u64, value: VarInt) {
            encoder.encode(&VarInt::new(id).expect("parameter ids are small"));
            encoder.encode_with_len_prefix::<VarInt, _>(&value);
        }

        if let Some(id) = self.original_connection_id.as_ref() {
            encoder.encode(&VarInt::new(ORIGINAL_CONNECTION_ID).expect("id fits"));
            encoder.encode_with_len_prefix::<VarInt, _>(id);
        }

        if self.max_idle_timeout > 0u64 {
            encode_integer(encoder, MAX_IDLE_TIMEOUT, self.max_idle_timeout);
        }

        if let Some(token) = self.stateless_reset_token.as_ref() {
            encoder.encode(&VarInt::new(STATELESS_RESET_TOKEN).expect("id fits"));
            encoder.encode_with_len_prefix::<VarInt, _>(&&token[..]);
        }

        if self.max_packet_size != DEFAULT_MAX_PACKET_SIZE as u64 {
            encode_integer(encoder, MAX_PACKET_SIZE, self.max_packet_size);
        }

        if self.initial_max_data > 0u64 {
            encode_integer(encoder, INITIAL_MAX_DATA, self.initial_max_data);
        }

        if self.initial_max_stream_data_bidi_local > 0u64 {
            encode_integer(
                encoder,
                INITIAL_MAX_STREAM_DATA_BIDI_LOCAL,
                self.initial_max_stream_data_bidi_local,
            );
        }

        if self.initial_max_stream_data_bidi_remote > 0u64 {
            encode_integer(
                encoder,
                INITIAL_MAX_STREAM_DATA_BIDI_REMOTE,
                self.initial_max_stream_data_bidi_remote,
            );
        }

        if self.initial_max_stream_data_uni > 0u64 {
            encode_integer(
                encoder,
                INITIAL_MAX_STREAM_DATA_UNI,
                self.initial_max_stream_data_uni,
            );
        }

        if self.initial_max_streams_bidi > 0u64 {
            encode_integer(encoder, INITIAL_MAX_STREAMS_BIDI, self.initial_max_streams_bidi);
        }

        if self.initial_max_streams_uni > 0u64 {
            encode_integer(encoder, INITIAL_MAX_STREAMS_UNI, self.initial_max_streams_uni);
        }

        if self.ack_delay_exponent != DEFAULT_ACK_DELAY_EXPONENT {
            encode_integer(
                encoder,
                ACK_DELAY_EXPONENT,
                VarInt::from_u8(self.ack_delay_exponent),
            );
        }

        if self.max_ack_delay != DEFAULT_MAX_ACK_DELAY as u64 {
            encode_integer(encoder, MAX_ACK_DELAY, self.max_ack_delay);
        }

        if self.disable_active_migration {
            encoder.encode(&VarInt::new(DISABLE_ACTIVE_MIGRATION).expect("id fits"));
            encoder.encode(&VarInt::ZERO);
        }

        if self.active_connection_id_limit != DEFAULT_ACTIVE_CONNECTION_ID_LIMIT as u64 {
            encode_integer(
                encoder,
                ACTIVE_CONNECTION_ID_LIMIT,
                self.active_connection_id_limit,
            );
        }
    }
}
