// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::fmt;

/// A packet protection failure.
///
/// Decryption failures are not connection errors; the packet is dropped as
/// if it never arrived.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Error {
    pub reason: &'static str,
}

impl Error {
    /// The packet failed AEAD authentication
    pub const DECRYPT_ERROR: Self = Self {
        reason: "decrypt error",
    };

    /// The key material could not be derived
    pub const INTERNAL_ERROR: Self = Self {
        reason: "internal crypto error",
    };
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.reason)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
