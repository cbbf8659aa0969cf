// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::varint::VarInt;
use core::fmt;
use quill_codec::DecoderError;

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#20
//# QUIC error codes are 62-bit unsigned integers.
//#
//# This section lists the defined QUIC transport error codes that may be
//# used in a CONNECTION_CLOSE frame.  These errors apply to the entire
//# connection.

/// A connection-level error
///
/// Transport errors are signalled to the peer in a CONNECTION_CLOSE frame
/// and transition the connection into the closing state.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Error {
    pub code: VarInt,
    pub frame_type: Option<VarInt>,
    pub reason: &'static str,
}

impl Error {
    /// Creates a new `Error` with the specified code
    pub const fn new(code: VarInt) -> Self {
        Self {
            code,
            frame_type: None,
            reason: "",
        }
    }

    /// Updates the `Error` with the specified `frame_type`
    #[must_use]
    pub const fn with_frame_type(mut self, frame_type: VarInt) -> Self {
        self.frame_type = Some(frame_type);
        self
    }

    /// Updates the `Error` with the specified `reason`
    #[must_use]
    pub const fn with_reason(mut self, reason: &'static str) -> Self {
        self.reason = reason;
        self
    }

    /// Returns `true` for errors in the reserved crypto range
    pub fn is_crypto_error(&self) -> bool {
        (0x100..=0x1ff).contains(&self.code.as_u64())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut d = f.debug_struct("transport::Error");
        d.field("code", &self.code);
        if let Some(frame_type) = self.frame_type {
            d.field("frame_type", &frame_type);
        }
        if !self.reason.is_empty() {
            d.field("reason", &self.reason);
        }
        d.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "transport error {}", self.code)
        } else {
            f.write_str(self.reason)
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Internal convenience macro for defining standard error codes
macro_rules! def_error {
    ($doc:expr, $name:ident, $code:expr) => {
        impl Error {
            #[doc = $doc]
            pub const $name: Self = Self::new(VarInt::from_u32($code));
        }
    };
}

def_error!(
    "An endpoint uses this with CONNECTION_CLOSE to signal that the connection is being closed abruptly in the absence of any error.",
    NO_ERROR,
    0x0
);

def_error!(
    "The endpoint encountered an internal error and cannot continue with the connection.",
    INTERNAL_ERROR,
    0x1
);

def_error!(
    "The server is currently busy and does not accept any new connections.",
    SERVER_BUSY,
    0x2
);

def_error!(
    "An endpoint received more data than it permitted in its advertised data limits.",
    FLOW_CONTROL_ERROR,
    0x3
);

def_error!(
    "An endpoint received a frame for a stream identifier that exceeded its advertised stream limit for the corresponding stream type.",
    STREAM_LIMIT_ERROR,
    0x4
);

def_error!(
    "An endpoint received a frame for a stream that was not in a state that permitted that frame.",
    STREAM_STATE_ERROR,
    0x5
);

def_error!(
    "An endpoint received a STREAM frame containing data that exceeded the previously established final size.",
    FINAL_SIZE_ERROR,
    0x6
);

def_error!(
    "An endpoint received a frame that was badly formatted.",
    FRAME_ENCODING_ERROR,
    0x7
);

def_error!(
    "An endpoint received transport parameters that were badly formatted.",
    TRANSPORT_PARAMETER_ERROR,
    0x8
);

def_error!(
    "An endpoint detected an error with protocol compliance that was not covered by more specific error codes.",
    PROTOCOL_VIOLATION,
    0xA
);

def_error!(
    "An endpoint has received more data in CRYPTO frames than it can buffer.",
    CRYPTO_BUFFER_EXCEEDED,
    0xD
);

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#20
//# CRYPTO_ERROR (0x1XX):  The cryptographic handshake failed.  A range
//#    of 256 values is reserved for carrying error codes specific to the
//#    cryptographic handshake that is used.

impl Error {
    /// Creates a crypto-level `Error` from a TLS alert code
    #[inline]
    pub fn crypto_error(alert: u8) -> Self {
        Self::new(VarInt::from_u32(0x100 | u32::from(alert)))
    }
}

impl From<DecoderError> for Error {
    fn from(error: DecoderError) -> Self {
        match error {
            DecoderError::InvariantViolation(reason) => {
                Self::FRAME_ENCODING_ERROR.with_reason(reason)
            }
            _ => Self::FRAME_ENCODING_ERROR.with_reason("malformed encoding"),
        }
    }
}

impl From<crate::varint::VarIntError> for Error {
    fn from(_error: crate::varint::VarIntError) -> Self {
        Self::INTERNAL_ERROR.with_reason("varint range exceeded")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_error_test() {
        // TLS handshake_failure alert
        let error = Error::crypto_error(40);
        assert_eq!(error.code.as_u64(), 0x128);
        assert!(error.is_crypto_error());
        assert!(!Error::PROTOCOL_VIOLATION.is_crypto_error());
    }

    #[test]
    fn builder_test() {
        let error = Error::STREAM_LIMIT_ERROR
            .with_reason("stream limit exceeded")
            .with_frame_type(VarInt::from_u8(0x08));
        assert_eq!(error.code, Error::STREAM_LIMIT_ERROR.code);
        assert_eq!(error.frame_type, Some(VarInt::from_u8(0x08)));
    }
}
