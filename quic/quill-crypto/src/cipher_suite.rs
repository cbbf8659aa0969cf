// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use quill_core::crypto::tls::CipherSuite;
use ring::{aead, hkdf};

/// The *ring* algorithm set backing a negotiated cipher suite.
///
/// AES-CCM suites are not provided by the backend and are never negotiated
/// by the TLS sessions this endpoint is built against.
pub(crate) struct Algorithms {
    pub aead: &'static aead::Algorithm,
    pub header_protection: &'static aead::quic::Algorithm,
    pub hkdf: hkdf::Algorithm,
    pub key_len: usize,
    pub iv_len: usize,
}

pub(crate) fn algorithms(cipher_suite: CipherSuite) -> Algorithms {
    match cipher_suite {
        CipherSuite::Aes128Gcm => Algorithms {
            aead: &aead::AES_128_GCM,
            header_protection: &aead::quic::AES_128,
            hkdf: hkdf::HKDF_SHA256,
            key_len: 16,
            iv_len: 12,
        },
        CipherSuite::Aes256Gcm => Algorithms {
            aead: &aead::AES_256_GCM,
            header_protection: &aead::quic::AES_256,
            hkdf: hkdf::HKDF_SHA384,
            key_len: 32,
            iv_len: 12,
        },
        CipherSuite::Chacha20Poly1305 => Algorithms {
            aead: &aead::CHACHA20_POLY1305,
            header_protection: &aead::quic::CHACHA20,
            hkdf: hkdf::HKDF_SHA256,
            key_len: 32,
            iv_len: 12,
        },
    }
}
