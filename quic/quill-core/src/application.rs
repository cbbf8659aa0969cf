// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::varint::VarInt;
use core::fmt;

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#20.1
//# Application protocol error codes are 62-bit unsigned integers, but
//# the management of application error codes are left to application
//# protocols.

/// An error code issued by the application, carried by RESET_STREAM,
/// STOP_SENDING, and the application variant of CONNECTION_CLOSE
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Error(VarInt);

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "application::Error({})", self.0)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "application error: {}", self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl Error {
    /// An error code of zero, used when the application closes without error
    pub const UNKNOWN: Self = Self(VarInt::ZERO);

    #[inline]
    pub const fn new(code: VarInt) -> Self {
        Self(code)
    }

    #[inline]
    pub const fn as_varint(self) -> VarInt {
        self.0
    }
}

impl From<VarInt> for Error {
    #[inline]
    fn from(value: VarInt) -> Self {
        Self(value)
    }
}

impl From<Error> for VarInt {
    #[inline]
    fn from(error: Error) -> Self {
        error.0
    }
}

impl From<u32> for Error {
    #[inline]
    fn from(value: u32) -> Self {
        Self(VarInt::from_u32(value))
    }
}
