// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::fmt;
use quill_codec::{decoder_value, Encoder, EncoderValue};

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#17.2
//# In QUIC version 1, this value MUST NOT exceed 20.  Endpoints that
//# receive a version 1 long header with a value larger than 20 MUST drop
//# the packet.

pub const MAX_LEN: usize = 20;

#[derive(Clone, Copy, Debug)]
pub struct Error;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "connection id exceeds the maximum length")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// A connection identifier of up to 20 bytes.
///
/// Ids are stored inline so looking one up in the endpoint map never
/// allocates.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct ConnectionId {
    bytes: [u8; MAX_LEN],
    len: u8,
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x")?;
        for byte in self.as_bytes() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl ConnectionId {
    /// The empty connection id
    pub const EMPTY: Self = Self {
        bytes: [0; MAX_LEN],
        len: 0,
    };

    /// Creates a `ConnectionId` from a byte slice of at most 20 bytes
    #[inline]
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, Error> {
        if slice.len() > MAX_LEN {
            return Err(Error);
        }

        let mut bytes = [0; MAX_LEN];
        bytes[..slice.len()].copy_from_slice(slice);

        Ok(Self {
            bytes,
            len: slice.len() as u8,
        })
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for ConnectionId {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl TryFrom<&[u8]> for ConnectionId {
    type Error = Error;

    #[inline]
    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        Self::try_from_slice(slice)
    }
}

impl EncoderValue for ConnectionId {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.write_slice(self.as_bytes());
    }

    #[inline]
    fn encoding_size(&self) -> usize {
        self.len()
    }

    #[inline]
    fn encoding_size_for_encoder<E: Encoder>(&self, _encoder: &E) -> usize {
        self.len()
    }
}

decoder_value!(
    impl<'a> ConnectionId {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (len, buffer) = buffer.decode::<u8>()?;
            quill_codec::decoder_invariant!(
                len as usize <= MAX_LEN,
                "connection id exceeds the maximum length"
            );
            let (id, buffer) = buffer.decode_slice(len as usize)?;
            let id = Self::try_from_slice(id.as_less_safe_slice())
                .expect("length already validated");
            Ok((id, buffer))
        }
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_limit_test() {
        assert!(ConnectionId::try_from_slice(&[0u8; MAX_LEN]).is_ok());
        assert!(ConnectionId::try_from_slice(&[0u8; MAX_LEN + 1]).is_err());
        assert!(ConnectionId::try_from_slice(&[]).unwrap().is_empty());
    }

    #[test]
    fn round_trip_test() {
        use quill_codec::{DecoderBuffer, Encoder, EncoderBuffer};

        let id = ConnectionId::try_from_slice(&[1, 2, 3, 4]).unwrap();

        let mut bytes = [0u8; MAX_LEN + 1];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        encoder.encode(&(id.len() as u8));
        encoder.encode(&id);
        let len = encoder.len();

        let buffer = DecoderBuffer::new(&bytes[..len]);
        let (actual, buffer) = buffer.decode::<ConnectionId>().unwrap();
        assert!(buffer.is_empty());
        assert_eq!(actual, id);
    }
}
