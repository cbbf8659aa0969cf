// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Key traits and header protection arithmetic.
//!
//! The concrete AEAD implementations live in the `quill-crypto` crate; the
//! connection machinery only sees the [`Key`] and [`HeaderKey`] traits plus
//! the [`tls`] callback surface.

pub mod error;
pub mod initial;
pub mod label;
pub mod tls;

pub use error::Error;

use crate::packet::number::{PacketNumberLen, PacketNumberSpace, TruncatedPacketNumber};
use quill_codec::{DecoderBuffer, DecoderError};

/// The encryption level of a packet or handshake message.
///
/// Each level has distinct keys; Initial and Handshake levels additionally
/// have their own packet number spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Initial,
    Handshake,
    Application,
}

impl Level {
    #[inline]
    pub fn space(self) -> PacketNumberSpace {
        match self {
            Self::Initial => PacketNumberSpace::Initial,
            Self::Handshake => PacketNumberSpace::Handshake,
            Self::Application => PacketNumberSpace::ApplicationData,
        }
    }
}

/// A key capable of sealing and opening packet payloads
pub trait Key: Send {
    /// Decrypts `payload` (ciphertext followed by the tag) in place.
    ///
    /// On success the leading `payload.len() - tag_len()` bytes hold the
    /// plaintext.
    fn decrypt(&self, packet_number: u64, header: &[u8], payload: &mut [u8])
        -> Result<(), Error>;

    /// Encrypts `payload` in place.
    ///
    /// The trailing `tag_len()` bytes of `payload` are reserved for the
    /// authentication tag and must not carry plaintext.
    fn encrypt(&self, packet_number: u64, header: &[u8], payload: &mut [u8])
        -> Result<(), Error>;

    /// Length of the appended tag
    fn tag_len(&self) -> usize;
}

//= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#5.4.1
//# The output of this algorithm is a 5 byte mask which is applied to the
//# protected header fields using exclusive OR.

pub const HEADER_PROTECTION_MASK_LEN: usize = 5;
pub type HeaderProtectionMask = [u8; HEADER_PROTECTION_MASK_LEN];

//= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#5.4.2
//# in sampling the packet
//# ciphertext, the Packet Number field is assumed to be 4 bytes long

pub const HEADER_PROTECTION_SAMPLE_LEN: usize = 16;

/// A key capable of deriving header protection masks
pub trait HeaderKey: Send {
    /// Derives a header protection mask from a ciphertext sample, to be used
    /// for opening a packet
    fn opening_header_protection_mask(&self, ciphertext_sample: &[u8]) -> HeaderProtectionMask;

    /// Returns the sample size needed to open a header
    fn opening_sample_len(&self) -> usize;

    /// Derives a header protection mask from a ciphertext sample, to be used
    /// for sealing a packet
    fn sealing_header_protection_mask(&self, ciphertext_sample: &[u8]) -> HeaderProtectionMask;

    /// Returns the sample size needed to seal a header
    fn sealing_sample_len(&self) -> usize;
}

//= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#5.4.1
//# mask = header_protection(hp_key, sample)
//#
//# pn_length = (packet[0] & 0x03) + 1
//# if (packet[0] & 0x80) == 0x80:
//#    # Long header: 4 bits masked
//#    packet[0] ^= mask[0] & 0x0f
//# else:
//#    # Short header: 5 bits masked
//#    packet[0] ^= mask[0] & 0x1f
//#
//# # pn_offset is the start of the Packet Number field.
//# packet[pn_offset:pn_offset+pn_length] ^= mask[1:1+pn_length]

const LONG_HEADER_TAG: u8 = 0x80;
pub(crate) const LONG_HEADER_MASK: u8 = 0x0f;
pub(crate) const SHORT_HEADER_MASK: u8 = 0x1f;

#[inline(always)]
fn mask_from_packet_tag(tag: u8) -> u8 {
    if tag & LONG_HEADER_TAG == LONG_HEADER_TAG {
        LONG_HEADER_MASK
    } else {
        SHORT_HEADER_MASK
    }
}

/// Applies header protection to an encrypted packet.
///
/// `packet` spans the whole packet and the packet number starts at
/// `header_len`; the caller has already derived `mask` from the appropriate
/// ciphertext sample.
#[inline]
pub fn apply_header_protection(
    mask: HeaderProtectionMask,
    packet: &mut [u8],
    header_len: usize,
    pn_len: PacketNumberLen,
) {
    packet[0] ^= mask[0] & mask_from_packet_tag(packet[0]);

    let pn_bytes = &mut packet[header_len..header_len + pn_len.bytesize()];
    for (pn_byte, mask_byte) in pn_bytes.iter_mut().zip(&mask[1..]) {
        *pn_byte ^= mask_byte;
    }
}

/// Removes header protection, recovering the unprotected first byte and the
/// truncated packet number
#[inline]
pub fn remove_header_protection(
    space: PacketNumberSpace,
    mask: HeaderProtectionMask,
    packet: &mut [u8],
    header_len: usize,
) -> Result<TruncatedPacketNumber, DecoderError> {
    packet[0] ^= mask[0] & mask_from_packet_tag(packet[0]);
    let pn_len = space.new_packet_number_len(packet[0]);

    let pn_bytes = packet
        .get_mut(header_len..header_len + pn_len.bytesize())
        .ok_or(DecoderError::UnexpectedEof(header_len))?;
    for (pn_byte, mask_byte) in pn_bytes.iter_mut().zip(&mask[1..]) {
        *pn_byte ^= mask_byte;
    }

    let (packet_number, _) =
        TruncatedPacketNumber::decode(DecoderBuffer::new(pn_bytes), pn_len, space)?;

    Ok(packet_number)
}

/// Computes the range of ciphertext to sample for header protection.
///
//= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#5.4.2
//# An endpoint MUST discard packets that are not long enough to contain
//# a complete sample.
#[inline]
pub fn sample_range(
    packet_len: usize,
    header_len: usize,
    sample_len: usize,
) -> Result<core::ops::Range<usize>, DecoderError> {
    // the packet number is assumed to be 4 bytes long
    let sample_start = header_len + 4;
    let sample_end = sample_start + sample_len;

    if sample_end > packet_len {
        return Err(DecoderError::UnexpectedEof(sample_end));
    }

    Ok(sample_start..sample_end)
}
