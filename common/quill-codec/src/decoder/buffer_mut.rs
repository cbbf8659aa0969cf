// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::decoder::{DecoderBuffer, DecoderError, DecoderParameterizedValueMut, DecoderValueMut};

/// A mutable view of a byte slice that can only be advanced by decoding.
///
/// The mutable flavor exists so header protection and AEAD operations can
/// decrypt packet contents in place while still being bounds checked.
#[derive(Debug, PartialEq, Eq)]
pub struct DecoderBufferMut<'a> {
    bytes: &'a mut [u8],
}

pub type DecoderBufferMutResult<'a, T> = Result<(T, DecoderBufferMut<'a>), DecoderError>;

impl<'a> DecoderBufferMut<'a> {
    /// Creates a new `DecoderBufferMut` from a mutable byte slice
    #[inline]
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    /// Consumes the buffer and returns the underlying mutable slice
    #[inline]
    pub fn into_less_safe_slice(self) -> &'a mut [u8] {
        self.bytes
    }

    /// Borrows the buffer's slice mutably. This should be used with caution,
    /// as it removes any panic protection this struct provides.
    #[inline]
    pub fn as_less_safe_slice_mut(&mut self) -> &mut [u8] {
        self.bytes
    }

    /// Reborrows the buffer as an immutable `DecoderBuffer`
    #[inline]
    pub fn as_decoder_buffer(&self) -> DecoderBuffer {
        DecoderBuffer::new(self.bytes)
    }
}

impl_buffer!(
    DecoderBufferMut,
    DecoderBufferMutResult,
    DecoderValueMut,
    decode_mut,
    DecoderParameterizedValueMut,
    decode_parameterized_mut,
    split_at_mut
);

impl<'a> From<&'a mut [u8]> for DecoderBufferMut<'a> {
    #[inline]
    fn from(bytes: &'a mut [u8]) -> Self {
        Self::new(bytes)
    }
}
