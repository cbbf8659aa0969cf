// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use quill_core::crypto::label;
use ring::hkdf;
use zeroize::Zeroize;

/// The largest traffic secret in the supported suite set (SHA-384)
pub(crate) const MAX_SECRET_LEN: usize = 48;

/// A traffic secret, retained so the next key generation can be derived
/// for key updates. Zeroized on drop.
pub(crate) struct Secret {
    bytes: [u8; MAX_SECRET_LEN],
    len: usize,
}

impl Secret {
    pub fn new(secret: &[u8]) -> Self {
        debug_assert!(secret.len() <= MAX_SECRET_LEN);
        let mut bytes = [0; MAX_SECRET_LEN];
        bytes[..secret.len()].copy_from_slice(secret);
        Self {
            bytes,
            len: secret.len(),
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

struct OutLen(usize);

impl hkdf::KeyType for OutLen {
    fn len(&self) -> usize {
        self.0
    }
}

/// HKDF-Expand-Label on an extracted pseudorandom key, with an empty
/// context as TLS 1.3 defines it
pub(crate) fn expand_label_prk(prk: &hkdf::Prk, tls_label: &[u8], out: &mut [u8]) {
    let mut info = Vec::with_capacity(tls_label.len() + 10);
    label::compute_label(out.len(), tls_label, &mut info);

    prk.expand(&[&info], OutLen(out.len()))
        .and_then(|okm| okm.fill(out))
        .expect("label output lengths are within hkdf bounds");
}

/// HKDF-Expand-Label on a raw traffic secret
pub(crate) fn expand_label(
    algorithm: hkdf::Algorithm,
    secret: &[u8],
    tls_label: &[u8],
    out: &mut [u8],
) {
    let prk = hkdf::Prk::new_less_safe(algorithm, secret);
    expand_label_prk(&prk, tls_label, out);
}

/// HKDF-Extract
pub(crate) fn extract(algorithm: hkdf::Algorithm, salt: &[u8], ikm: &[u8]) -> hkdf::Prk {
    hkdf::Salt::new(algorithm, salt).extract(ikm)
}
