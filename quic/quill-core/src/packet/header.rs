// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    connection::ConnectionId,
    packet::{PacketType, FIXED_BIT, FORM_BIT, LONG_TYPE_MASK},
    varint::VarInt,
};
use core::ops::Range;
use quill_codec::{DecoderBuffer, DecoderError};

/// The still-protected header of a single packet inside a UDP datagram.
///
/// Parsing stops at the packet number field, which cannot be read until
/// header protection is removed; everything before it is cleartext. The
/// parsed offsets are relative to the start of the packet, which lets the
/// caller keep working on the mutable datagram storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtectedHeader {
    pub packet_type: PacketType,

    /// The wire version; `None` on short headers
    pub version: Option<u32>,

    pub destination_connection_id: ConnectionId,

    /// The source connection id; empty on short headers
    pub source_connection_id: ConnectionId,

    /// The position of the retry token inside the packet; empty unless the
    /// packet is an Initial
    pub token: Range<usize>,

    /// The offset of the (protected) packet number field
    pub header_len: usize,

    /// The total length of this packet inside the datagram, including the
    /// header, packet number, payload and tag
    pub packet_len: usize,
}

impl ProtectedHeader {
    /// Parses the cleartext portion of the first packet in `packet`.
    ///
    /// `local_connection_id_len` is the length of connection ids issued by
    /// this endpoint and is required to delimit short headers.
    pub fn parse(
        packet: &[u8],
        local_connection_id_len: usize,
    ) -> Result<ProtectedHeader, DecoderError> {
        let total = packet.len();
        let buffer = DecoderBuffer::new(packet);
        let (first_byte, buffer) = buffer.decode::<u8>()?;

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#17.2
        //# Fixed Bit:  The next bit (0x40) of byte 0 is set to 1.  Packets
        //#    containing a zero value for this bit are not valid packets in this
        //#    version and MUST be discarded.
        quill_codec::decoder_invariant!(first_byte & FIXED_BIT == FIXED_BIT, "fixed bit is zero");

        if first_byte & FORM_BIT == 0 {
            return Self::parse_short(packet, local_connection_id_len);
        }

        let (version, buffer) = buffer.decode::<u32>()?;
        quill_codec::decoder_invariant!(version != 0, "version negotiation is not supported");

        let packet_type = match (first_byte & LONG_TYPE_MASK) >> 4 {
            0b00 => PacketType::Initial,
            0b01 => PacketType::ZeroRtt,
            0b10 => PacketType::Handshake,
            _ => return Err(DecoderError::InvariantViolation("retry is not supported")),
        };

        let (destination_connection_id, buffer) = buffer.decode::<ConnectionId>()?;
        let (source_connection_id, buffer) = buffer.decode::<ConnectionId>()?;

        let (token, buffer) = if let PacketType::Initial = packet_type {
            let (token_len, buffer) = buffer.decode::<VarInt>()?;
            let token_len: usize = token_len
                .try_into()
                .map_err(|_| DecoderError::LengthCapacityExceeded)?;
            let token_start = total - buffer.len();
            let buffer = buffer.skip(token_len)?;
            (token_start..token_start + token_len, buffer)
        } else {
            (0..0, buffer)
        };

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#17.2
        //# Length:  The length of the remainder of the packet (that is, the
        //#    Packet Number and Payload fields) in bytes, encoded as a
        //#    variable-length integer (Section 16).
        let (payload_len, buffer) = buffer.decode::<VarInt>()?;
        let payload_len: usize = payload_len
            .try_into()
            .map_err(|_| DecoderError::LengthCapacityExceeded)?;

        let header_len = total - buffer.len();
        let packet_len = header_len
            .checked_add(payload_len)
            .filter(|len| *len <= total)
            .ok_or(DecoderError::UnexpectedEof(payload_len))?;

        Ok(ProtectedHeader {
            packet_type,
            version: Some(version),
            destination_connection_id,
            source_connection_id,
            token,
            header_len,
            packet_len,
        })
    }

    fn parse_short(
        packet: &[u8],
        local_connection_id_len: usize,
    ) -> Result<ProtectedHeader, DecoderError> {
        let buffer = DecoderBuffer::new(packet);
        let buffer = buffer.skip(1)?;
        let (destination_connection_id, _buffer) = buffer.decode_slice(local_connection_id_len)?;
        let destination_connection_id =
            ConnectionId::try_from_slice(destination_connection_id.as_less_safe_slice())
                .expect("local connection ids are always in range");

        Ok(ProtectedHeader {
            packet_type: PacketType::OneRtt,
            version: None,
            destination_connection_id,
            source_connection_id: ConnectionId::EMPTY,
            token: 0..0,
            // first byte + destination connection id
            header_len: 1 + local_connection_id_len,
            // a short header packet extends to the end of the datagram
            packet_len: packet.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{long_first_byte, number::PacketNumberLen, short_first_byte, KeyPhase, VERSION};
    use quill_codec::{Encoder, EncoderBuffer};

    fn long_packet(packet_type: PacketType, token: &[u8], payload_len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; 1500];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        encoder.encode(&long_first_byte(packet_type, PacketNumberLen::U16));
        encoder.encode(&VERSION);
        let dcid = ConnectionId::try_from_slice(&[1, 2, 3, 4]).unwrap();
        let scid = ConnectionId::try_from_slice(&[5, 6]).unwrap();
        encoder.encode(&(dcid.len() as u8));
        encoder.encode(&dcid);
        encoder.encode(&(scid.len() as u8));
        encoder.encode(&scid);
        if let PacketType::Initial = packet_type {
            encoder.encode(&VarInt::try_from(token.len()).unwrap());
            encoder.encode(&token);
        }
        encoder.encode(&VarInt::try_from(payload_len).unwrap());
        encoder.write_repeated(payload_len, 0xaa);
        let len = encoder.len();
        bytes.truncate(len);
        bytes
    }

    #[test]
    fn initial_test() {
        let token = [9u8; 7];
        let packet = long_packet(PacketType::Initial, &token, 30);
        let header = ProtectedHeader::parse(&packet, 4).unwrap();

        assert_eq!(header.packet_type, PacketType::Initial);
        assert_eq!(header.version, Some(VERSION));
        assert_eq!(header.destination_connection_id.as_bytes(), &[1, 2, 3, 4]);
        assert_eq!(header.source_connection_id.as_bytes(), &[5, 6]);
        assert_eq!(&packet[header.token.clone()], &token);
        assert_eq!(header.packet_len, packet.len());
        // the packet number starts right after the length field
        assert_eq!(header.header_len, packet.len() - 30);
    }

    #[test]
    fn handshake_has_no_token_test() {
        let packet = long_packet(PacketType::Handshake, &[], 12);
        let header = ProtectedHeader::parse(&packet, 4).unwrap();

        assert_eq!(header.packet_type, PacketType::Handshake);
        assert!(header.token.is_empty());
    }

    #[test]
    fn coalesced_length_test() {
        // simulate a trailing packet in the same datagram
        let mut packet = long_packet(PacketType::Handshake, &[], 12);
        let first_len = packet.len();
        packet.extend_from_slice(&[0x40, 1, 2, 3]);

        let header = ProtectedHeader::parse(&packet, 4).unwrap();
        assert_eq!(header.packet_len, first_len);
    }

    #[test]
    fn short_test() {
        let mut bytes = vec![0u8; 64];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        encoder.encode(&short_first_byte(KeyPhase::One, PacketNumberLen::U8));
        encoder.encode(&&[7u8, 7, 7, 7][..]);
        encoder.write_repeated(20, 0xbb);
        let len = encoder.len();
        bytes.truncate(len);

        let header = ProtectedHeader::parse(&bytes, 4).unwrap();
        assert_eq!(header.packet_type, PacketType::OneRtt);
        assert_eq!(header.destination_connection_id.as_bytes(), &[7, 7, 7, 7]);
        assert_eq!(header.header_len, 5);
        assert_eq!(header.packet_len, bytes.len());
    }

    #[test]
    fn fixed_bit_zero_rejected_test() {
        let mut packet = long_packet(PacketType::Handshake, &[], 12);
        packet[0] &= !FIXED_BIT;
        assert!(ProtectedHeader::parse(&packet, 4).is_err());
    }

    #[test]
    fn truncated_packet_rejected_test() {
        let packet = long_packet(PacketType::Handshake, &[], 12);
        // a length field pointing past the end of the datagram is invalid
        assert!(ProtectedHeader::parse(&packet[..packet.len() - 1], 4).is_err());
    }
}
