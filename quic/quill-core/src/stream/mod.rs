// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Types and utilities around the QUIC stream identifier and the
//! per-direction stream state machines

pub mod id;
pub mod state;

pub use id::StreamId;

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#2.1
//# Streams can be unidirectional or bidirectional.  Unidirectional
//# streams carry data in one direction: from the initiator of the stream
//# to its peer.  Bidirectional streams allow for data to be sent in both
//# directions.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamType {
    Bidirectional,
    Unidirectional,
}

impl StreamType {
    #[inline]
    pub fn is_bidirectional(self) -> bool {
        matches!(self, Self::Bidirectional)
    }

    #[inline]
    pub fn is_unidirectional(self) -> bool {
        matches!(self, Self::Unidirectional)
    }
}
