// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The narrow callback surface between the transport and the TLS 1.3
//! library driving the handshake.
//!
//! The transport never inspects handshake messages: it feeds contiguous
//! CRYPTO stream bytes into the [`Session`] and receives key material and
//! outbound handshake bytes through the [`Context`] callbacks.

use crate::crypto::Level;
use core::fmt;

/// A TLS alert code, as defined in TLS 1.3
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Alert(pub u8);

impl Alert {
    pub const HANDSHAKE_FAILURE: Self = Self(40);
    pub const INTERNAL_ERROR: Self = Self(80);

    #[inline]
    pub const fn code(self) -> u8 {
        self.0
    }
}

impl fmt::Debug for Alert {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Alert({})", self.0)
    }
}

impl From<Alert> for crate::transport::Error {
    #[inline]
    fn from(alert: Alert) -> Self {
        Self::crypto_error(alert.code())
    }
}

//= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#5.3
//# The keys used for packet protection are computed from the TLS secrets
//# using the KDF provided by TLS.

/// The negotiated AEAD algorithm
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CipherSuite {
    Aes128Gcm,
    Aes256Gcm,
    Chacha20Poly1305,
}

impl CipherSuite {
    /// The length of the traffic secret for the suite's hash function
    #[inline]
    pub fn secret_len(self) -> usize {
        match self {
            Self::Aes128Gcm => 32,
            Self::Aes256Gcm => 48,
            Self::Chacha20Poly1305 => 32,
        }
    }
}

/// Progress reported by [`Session::do_handshake`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// The handshake has completed; the application keys are installed
    Complete,
    /// More peer handshake bytes are required before progress can be made
    NeedData,
}

/// Callbacks from the TLS session into the transport
pub trait Context {
    /// Installs the packet protection secrets for `level`.
    ///
    /// Both directions become available at the same time for every level
    /// this transport supports.
    fn on_secrets(
        &mut self,
        level: Level,
        cipher_suite: CipherSuite,
        read_secret: &[u8],
        write_secret: &[u8],
    );

    /// Appends bytes to the outbound crypto stream of `level`
    fn on_handshake_data(&mut self, level: Level, data: &[u8]);

    /// Marks the current flight of handshake data as complete
    fn on_flush(&mut self);
}

/// A TLS 1.3 session, viewed through the transport's narrow lens
pub trait Session: Send {
    /// Feeds contiguous peer CRYPTO stream bytes for `level` into the
    /// session
    fn provide_data(&mut self, level: Level, data: &[u8]) -> Result<(), Alert>;

    /// Drives the handshake as far as the provided data allows.
    ///
    /// Emits key material and outbound handshake data through `context`.
    /// A fatal alert is surfaced as an error and must close the connection
    /// with the corresponding crypto error code.
    fn do_handshake(&mut self, context: &mut dyn Context) -> Result<Progress, Alert>;

    /// The peer's encoded transport parameters, once visible
    fn peer_transport_parameters(&self) -> Option<&[u8]>;

    /// The negotiated application protocol, once visible
    fn alpn(&self) -> Option<&[u8]>;

    /// The negotiated cipher suite
    fn cipher_suite(&self) -> CipherSuite;
}
