// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    cipher_suite::{algorithms, Algorithms},
    secret::{expand_label, expand_label_prk, extract, Secret, MAX_SECRET_LEN},
};
use quill_core::{
    crypto::{self, initial::INITIAL_SALT, tls::CipherSuite, HeaderProtectionMask},
    endpoint,
};
use ring::{aead, hkdf};
use zeroize::Zeroize;

/// Packet protection for one direction of one encryption level.
///
/// A seal owns the AEAD key, the IV, and the header protection key derived
/// from a single traffic secret. The secret itself is retained so a key
/// update can derive the next generation; the header protection key never
/// rotates.
pub struct Seal {
    cipher_suite: CipherSuite,
    secret: Secret,
    key: aead::LessSafeKey,
    iv: [u8; NONCE_LEN],
    header_key: aead::quic::HeaderProtectionKey,
    /// Retained so key updates can rebuild the (unchanged) header key
    header_secret: Secret,
}

const NONCE_LEN: usize = 12;

impl core::fmt::Debug for Seal {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        // key material is never printed
        f.debug_struct("Seal")
            .field("cipher_suite", &self.cipher_suite)
            .finish_non_exhaustive()
    }
}

impl Seal {
    /// Derives a seal from a TLS traffic secret.
    ///
    //= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#5.1
    //# The current encryption level secret and the label "quic key" are
    //# input to the KDF to produce the AEAD key; the label "quic iv" is used
    //# to derive the IV, see Section 5.3.  The header protection key uses
    //# the "quic hp" label, see Section 5.4.
    pub fn from_secret(cipher_suite: CipherSuite, secret: &[u8]) -> Self {
        let algorithms = algorithms(cipher_suite);

        let mut header_secret = [0u8; MAX_SECRET_LEN];
        expand_label(
            algorithms.hkdf,
            secret,
            b"quic hp",
            &mut header_secret[..algorithms.key_len],
        );
        let header_secret = {
            let value = Secret::new(&header_secret[..algorithms.key_len]);
            header_secret.zeroize();
            value
        };

        Self::with_header_secret(cipher_suite, Secret::new(secret), header_secret)
    }

    fn with_header_secret(
        cipher_suite: CipherSuite,
        secret: Secret,
        header_secret: Secret,
    ) -> Self {
        let algorithms = algorithms(cipher_suite);

        let mut key_bytes = [0u8; MAX_SECRET_LEN];
        expand_label(
            algorithms.hkdf,
            secret.as_bytes(),
            b"quic key",
            &mut key_bytes[..algorithms.key_len],
        );

        let key = aead::UnboundKey::new(algorithms.aead, &key_bytes[..algorithms.key_len])
            .expect("key length matches the algorithm");
        let key = aead::LessSafeKey::new(key);
        key_bytes.zeroize();

        let mut iv = [0u8; NONCE_LEN];
        expand_label(algorithms.hkdf, secret.as_bytes(), b"quic iv", &mut iv);
        debug_assert_eq!(algorithms.iv_len, NONCE_LEN);

        let header_key = aead::quic::HeaderProtectionKey::new(
            algorithms.header_protection,
            header_secret.as_bytes(),
        )
        .expect("header key length matches the algorithm");

        Self {
            cipher_suite,
            secret,
            key,
            iv,
            header_key,
            header_secret,
        }
    }

    #[inline]
    pub fn cipher_suite(&self) -> CipherSuite {
        self.cipher_suite
    }

    /// Derives the next key generation.
    ///
    //= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#6.1
    //# The endpoint creates a new write secret from the existing write
    //# secret as performed in Section 7.2 of [TLS13].  This uses the KDF
    //# function provided by TLS with a label of "quic ku".  The
    //# corresponding key and IV are created from that secret as defined in
    //# Section 5.1.  The header protection key is not updated.
    #[must_use]
    pub fn update(&self) -> Self {
        let algorithms = algorithms(self.cipher_suite);
        let secret_len = self.secret.as_bytes().len();

        let mut next_secret = [0u8; MAX_SECRET_LEN];
        expand_label(
            algorithms.hkdf,
            self.secret.as_bytes(),
            b"quic ku",
            &mut next_secret[..secret_len],
        );
        let next = Secret::new(&next_secret[..secret_len]);
        next_secret.zeroize();

        Self::with_header_secret(
            self.cipher_suite,
            next,
            Secret::new(self.header_secret.as_bytes()),
        )
    }

    //= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#5.3
    //# The nonce, N, is formed by combining the packet protection IV with
    //# the packet number.  The 62 bits of the reconstructed QUIC packet
    //# number in network byte order are left-padded with zeros to the size
    //# of the IV.  The exclusive OR of the padded packet number and the IV
    //# forms the AEAD nonce.
    #[inline]
    fn nonce(&self, packet_number: u64) -> aead::Nonce {
        let mut nonce = self.iv;
        for (nonce_byte, pn_byte) in nonce[NONCE_LEN - 8..]
            .iter_mut()
            .zip(packet_number.to_be_bytes())
        {
            *nonce_byte ^= pn_byte;
        }
        aead::Nonce::assume_unique_for_key(nonce)
    }

    fn algorithms(&self) -> Algorithms {
        algorithms(self.cipher_suite)
    }
}

impl crypto::Key for Seal {
    #[inline]
    fn decrypt(
        &self,
        packet_number: u64,
        header: &[u8],
        payload: &mut [u8],
    ) -> Result<(), crypto::Error> {
        self.key
            .open_in_place(self.nonce(packet_number), aead::Aad::from(header), payload)
            .map_err(|_| crypto::Error::DECRYPT_ERROR)?;
        Ok(())
    }

    #[inline]
    fn encrypt(
        &self,
        packet_number: u64,
        header: &[u8],
        payload: &mut [u8],
    ) -> Result<(), crypto::Error> {
        let tag_len = self.tag_len();
        let input_len = payload
            .len()
            .checked_sub(tag_len)
            .ok_or(crypto::Error::INTERNAL_ERROR)?;
        let (input, tag_space) = payload.split_at_mut(input_len);

        let tag = self
            .key
            .seal_in_place_separate_tag(self.nonce(packet_number), aead::Aad::from(header), input)
            .map_err(|_| crypto::Error::INTERNAL_ERROR)?;
        tag_space.copy_from_slice(tag.as_ref());
        Ok(())
    }

    #[inline]
    fn tag_len(&self) -> usize {
        self.algorithms().aead.tag_len()
    }
}

impl crypto::HeaderKey for Seal {
    #[inline]
    fn opening_header_protection_mask(&self, ciphertext_sample: &[u8]) -> HeaderProtectionMask {
        self.header_key
            .new_mask(ciphertext_sample)
            .expect("sample length is checked by the caller")
    }

    #[inline]
    fn opening_sample_len(&self) -> usize {
        self.algorithms().header_protection.sample_len()
    }

    #[inline]
    fn sealing_header_protection_mask(&self, ciphertext_sample: &[u8]) -> HeaderProtectionMask {
        self.opening_header_protection_mask(ciphertext_sample)
    }

    #[inline]
    fn sealing_sample_len(&self) -> usize {
        self.opening_sample_len()
    }
}

/// Derives the client and server Initial traffic secrets for a destination
/// connection id
pub(crate) fn initial_secrets(destination_connection_id: &[u8]) -> (Secret, Secret) {
    let initial_prk = extract(hkdf::HKDF_SHA256, &INITIAL_SALT, destination_connection_id);

    let mut client = [0u8; 32];
    expand_label_prk(&initial_prk, b"client in", &mut client);
    let mut server = [0u8; 32];
    expand_label_prk(&initial_prk, b"server in", &mut server);

    let secrets = (Secret::new(&client), Secret::new(&server));
    client.zeroize();
    server.zeroize();
    secrets
}

/// Derives the Initial `(sealer, opener)` pair for an endpoint.
///
//= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#5.2
//# Initial packets are protected with a secret derived from the
//# Destination Connection ID field from the client's first Initial packet
//# of the connection.
pub fn initial_seals(
    local_endpoint: endpoint::Type,
    destination_connection_id: &[u8],
) -> (Seal, Seal) {
    let (client, server) = initial_secrets(destination_connection_id);

    let client = Seal::from_secret(CipherSuite::Aes128Gcm, client.as_bytes());
    let server = Seal::from_secret(CipherSuite::Aes128Gcm, server.as_bytes());

    match local_endpoint {
        endpoint::Type::Client => (client, server),
        endpoint::Type::Server => (server, client),
    }
}
