// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use hex_literal::hex;

//= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#5.2
//# initial_salt = 0xc3eef712c72ebb5a11a7d2432bb46365bef9f502
//#
//# initial_secret = HKDF-Extract(initial_salt,
//#                               client_dst_connection_id)
//#
//# client_initial_secret = HKDF-Expand-Label(initial_secret,
//#                                           "client in", "",
//#                                           Hash.length)
//# server_initial_secret = HKDF-Expand-Label(initial_secret,
//#                                           "server in", "",
//#                                           Hash.length)

pub const INITIAL_SALT: [u8; 20] = hex!("c3eef712c72ebb5a11a7d2432bb46365bef9f502");

//= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#A.1
//# This connection ID is 0x8394c8f03e515708.

#[cfg(any(test, feature = "testing"))]
pub const EXAMPLE_DCID: [u8; 8] = hex!("8394c8f03e515708");

//= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#A.1
//# client_initial_secret
//#     = HKDF-Expand-Label(initial_secret, "client in", _, 32)
//#     = fda3953aecc040e48b34e27ef87de3a6
//#       098ecf0e38b7e032c5c57bcbd5975b84

#[cfg(any(test, feature = "testing"))]
pub const EXAMPLE_CLIENT_INITIAL_SECRET: [u8; 32] =
    hex!("fda3953aecc040e48b34e27ef87de3a6098ecf0e38b7e032c5c57bcbd5975b84");

//= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#A.1
//# server_initial_secret
//#     = HKDF-Expand-Label(initial_secret, "server in", _, 32)
//#     = 554366b81912ff90be41f17e80222130
//#       90ab17d8149179bcadf222f29ff2ddd5

#[cfg(any(test, feature = "testing"))]
pub const EXAMPLE_SERVER_INITIAL_SECRET: [u8; 32] =
    hex!("554366b81912ff90be41f17e8022213090ab17d8149179bcadf222f29ff2ddd5");
