// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{application, transport, varint::VarInt};
use quill_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.19
//# An endpoint sends a CONNECTION_CLOSE frame (type=0x1c or 0x1d) to
//# notify its peer that the connection is being closed.  The
//# CONNECTION_CLOSE with a frame type of 0x1c is used to signal errors
//# at only the QUIC layer, or the absence of errors (with the NO_ERROR
//# code).  The CONNECTION_CLOSE frame with a type of 0x1d is used to
//# signal an error with the application that uses QUIC.

macro_rules! connection_close_tag {
    () => {
        0x1cu8..=0x1du8
    };
}

const TRANSPORT_TAG: u8 = 0x1c;
const APPLICATION_TAG: u8 = 0x1d;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConnectionClose<'a> {
    /// The error code which indicates the reason for closing the connection
    pub error_code: VarInt,

    /// The type of the frame that triggered the error.
    ///
    /// Only present in the transport variant (type 0x1c); `None` marks the
    /// application variant.
    pub frame_type: Option<VarInt>,

    /// Additional diagnostic information for the closure
    pub reason: Option<&'a [u8]>,
}

impl<'a> ConnectionClose<'a> {
    #[inline]
    pub fn tag(&self) -> u8 {
        if self.frame_type.is_some() {
            TRANSPORT_TAG
        } else {
            APPLICATION_TAG
        }
    }
}

decoder_parameterized_value!(
    impl<'a> ConnectionClose<'a> {
        fn decode(tag: u8, buffer: Buffer) -> Result<Self> {
            let (error_code, buffer) = buffer.decode()?;

            let (frame_type, buffer) = if tag == TRANSPORT_TAG {
                let (frame_type, buffer) = buffer.decode::<VarInt>()?;
                (Some(frame_type), buffer)
            } else {
                (None, buffer)
            };

            let (reason, buffer) = buffer.decode_slice_with_len_prefix::<VarInt>()?;
            let reason = if reason.is_empty() {
                None
            } else {
                let reason: &[u8] = reason.into_less_safe_slice();
                Some(reason)
            };

            let frame = ConnectionClose {
                error_code,
                frame_type,
                reason,
            };

            Ok((frame, buffer))
        }
    }
);

impl<'a> EncoderValue for ConnectionClose<'a> {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.error_code);

        if let Some(frame_type) = self.frame_type {
            buffer.encode(&frame_type);
        }

        if let Some(reason) = self.reason {
            buffer.encode_with_len_prefix::<VarInt, _>(&reason);
        } else {
            buffer.encode(&VarInt::ZERO);
        }
    }
}

impl<'a> From<transport::Error> for ConnectionClose<'a> {
    #[inline]
    fn from(error: transport::Error) -> Self {
        Self {
            error_code: error.code,
            frame_type: Some(error.frame_type.unwrap_or(VarInt::ZERO)),
            reason: if error.reason.is_empty() {
                None
            } else {
                Some(error.reason.as_bytes())
            },
        }
    }
}

impl<'a> From<application::Error> for ConnectionClose<'a> {
    #[inline]
    fn from(error: application::Error) -> Self {
        Self {
            error_code: error.as_varint(),
            frame_type: None,
            reason: None,
        }
    }
}
