// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{initial_seals, seal::initial_secrets, Seal};
use quill_core::{
    crypto::{
        self, apply_header_protection, initial, remove_header_protection, sample_range,
        tls::CipherSuite, HeaderKey, Key,
    },
    endpoint,
    packet::number::{PacketNumberLen, PacketNumberSpace},
};

//= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#A.1
//= type=test
//# This connection ID is 0x8394c8f03e515708.
#[test]
fn initial_secrets_test() {
    let (client, server) = initial_secrets(&initial::EXAMPLE_DCID);

    assert_eq!(client.as_bytes(), initial::EXAMPLE_CLIENT_INITIAL_SECRET);
    assert_eq!(server.as_bytes(), initial::EXAMPLE_SERVER_INITIAL_SECRET);
}

#[test]
fn initial_seals_are_swapped_test() {
    let dcid = [1u8, 2, 3, 4];

    let (client_sealer, client_opener) = initial_seals(endpoint::Type::Client, &dcid);
    let (server_sealer, server_opener) = initial_seals(endpoint::Type::Server, &dcid);

    // what the client seals, the server opens
    let header = [0xc3u8, 0, 0, 0];
    let mut payload = [0u8; 64];
    payload[..5].copy_from_slice(b"hello");
    client_sealer.encrypt(0, &header, &mut payload).unwrap();
    server_opener.decrypt(0, &header, &mut payload).unwrap();
    assert_eq!(&payload[..5], b"hello");

    // and the reverse
    let mut payload = [0u8; 64];
    payload[..5].copy_from_slice(b"world");
    server_sealer.encrypt(1, &header, &mut payload).unwrap();
    client_opener.decrypt(1, &header, &mut payload).unwrap();
    assert_eq!(&payload[..5], b"world");
}

fn seal_pair(cipher_suite: CipherSuite) -> Seal {
    let secret = [0x42u8; 48];
    Seal::from_secret(cipher_suite, &secret[..cipher_suite.secret_len()])
}

/// AEAD round-trip: decrypt(encrypt(p)) == p, and flipping any bit of the
/// header or ciphertext makes decrypt fail
#[test]
fn seal_round_trip_test() {
    for cipher_suite in [
        CipherSuite::Aes128Gcm,
        CipherSuite::Aes256Gcm,
        CipherSuite::Chacha20Poly1305,
    ] {
        let seal = seal_pair(cipher_suite);
        assert_eq!(seal.tag_len(), 16);

        let header = [0x40u8, 1, 2, 3, 4];
        let plaintext = b"plaintext protected by the seal";

        let mut payload = vec![0u8; plaintext.len() + seal.tag_len()];
        payload[..plaintext.len()].copy_from_slice(plaintext);

        seal.encrypt(7, &header, &mut payload).unwrap();
        assert_ne!(&payload[..plaintext.len()], &plaintext[..]);

        let mut opened = payload.clone();
        seal.decrypt(7, &header, &mut opened).unwrap();
        assert_eq!(&opened[..plaintext.len()], &plaintext[..]);

        // a different packet number produces a different nonce
        assert!(seal.decrypt(8, &header, &mut payload.clone()).is_err());

        // flipping any ciphertext bit breaks authentication
        for index in 0..payload.len() {
            let mut tampered = payload.clone();
            tampered[index] ^= 1;
            assert!(seal.decrypt(7, &header, &mut tampered).is_err());
        }

        // flipping any header (AAD) bit breaks authentication
        for index in 0..header.len() {
            let mut tampered_header = header;
            tampered_header[index] ^= 1;
            assert!(seal.decrypt(7, &tampered_header, &mut payload.clone()).is_err());
        }
    }
}

/// Header protection then unprotection with the same seal restores the
/// first byte and packet number bytes exactly
#[test]
fn header_protection_round_trip_test() {
    for cipher_suite in [
        CipherSuite::Aes128Gcm,
        CipherSuite::Aes256Gcm,
        CipherSuite::Chacha20Poly1305,
    ] {
        let seal = seal_pair(cipher_suite);
        assert_eq!(seal.sealing_sample_len(), 16);

        let header_len = 9;
        let mut packet = [0u8; 64];
        // short header with a 2 byte packet number
        packet[0] = 0x41;
        packet[header_len] = 0xfe;
        packet[header_len + 1] = 0xdc;
        for (index, byte) in packet.iter_mut().enumerate().skip(header_len + 2) {
            *byte = index as u8;
        }
        let original = packet;

        let sample =
            sample_range(packet.len(), header_len, seal.sealing_sample_len()).unwrap();

        let mask = seal.sealing_header_protection_mask(&packet[sample.clone()]);
        apply_header_protection(mask, &mut packet, header_len, PacketNumberLen::U16);

        let mask = seal.opening_header_protection_mask(&packet[sample]);
        let pn = remove_header_protection(
            PacketNumberSpace::ApplicationData,
            mask,
            &mut packet,
            header_len,
        )
        .unwrap();

        assert_eq!(packet, original);
        assert_eq!(pn.into_u64(), 0xfedc);
    }
}

/// A key update produces new packet keys while retaining the header
/// protection key
#[test]
fn key_update_test() {
    let seal = seal_pair(CipherSuite::Aes128Gcm);
    let updated = seal.update();

    let header = [0x40u8];
    let plaintext = b"key update";
    let mut payload = vec![0u8; plaintext.len() + seal.tag_len()];
    payload[..plaintext.len()].copy_from_slice(plaintext);

    seal.encrypt(3, &header, &mut payload).unwrap();

    // the next generation cannot open packets from the previous one
    assert!(updated.decrypt(3, &header, &mut payload.clone()).is_err());
    assert!(seal.decrypt(3, &header, &mut payload).is_ok());

    // header protection is unchanged across the update
    let sample = [0x5au8; 16];
    assert_eq!(
        seal.sealing_header_protection_mask(&sample),
        updated.sealing_header_protection_mask(&sample)
    );

    // two consecutive updates derive a chain, not the same key
    let updated_twice = updated.update();
    let mut payload = vec![0u8; plaintext.len() + crypto::Key::tag_len(&updated)];
    payload[..plaintext.len()].copy_from_slice(plaintext);
    updated.encrypt(4, &header, &mut payload).unwrap();
    assert!(updated_twice.decrypt(4, &header, &mut payload.clone()).is_err());
    assert!(updated.decrypt(4, &header, &mut payload).is_ok());
}
