// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{endpoint, stream::StreamType, varint::VarInt};

/// The ID of a stream.
///
/// A stream ID is a 62-bit integer (0 to 2^62-1) that is unique for all
/// streams on a connection.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
pub struct StreamId(VarInt);

impl From<StreamId> for VarInt {
    #[inline]
    fn from(id: StreamId) -> Self {
        id.0
    }
}

impl From<StreamId> for u64 {
    #[inline]
    fn from(id: StreamId) -> Self {
        id.0.as_u64()
    }
}

impl StreamId {
    /// Creates a stream ID from a [`VarInt`].
    ///
    /// This is always a safe conversion, since stream IDs and [`VarInt`]s
    /// share the same range.
    #[inline]
    pub const fn from_varint(id: VarInt) -> StreamId {
        StreamId(id)
    }

    /// Converts the stream ID into a [`VarInt`]
    #[inline]
    pub const fn as_varint(self) -> VarInt {
        self.0
    }

    //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#2.1
    //# The two least significant bits from a stream ID therefore identify a
    //# stream as one of four types, as summarized in Table 1.
    //#
    //#    +------+----------------------------------+
    //#    | Bits | Stream Type                      |
    //#    +------+----------------------------------+
    //#    | 0x0  | Client-Initiated, Bidirectional  |
    //#    | 0x1  | Server-Initiated, Bidirectional  |
    //#    | 0x2  | Client-Initiated, Unidirectional |
    //#    | 0x3  | Server-Initiated, Unidirectional |
    //#    +------+----------------------------------+

    /// Returns the initial stream ID for a given initiator and type.
    ///
    /// E.g. the initial stream ID for a server initiated unidirectional
    /// stream is stream ID `3`.
    #[inline]
    pub fn initial(initiator: endpoint::Type, stream_type: StreamType) -> StreamId {
        match (stream_type, initiator) {
            (StreamType::Bidirectional, endpoint::Type::Client) => StreamId(VarInt::from_u32(0)),
            (StreamType::Bidirectional, endpoint::Type::Server) => StreamId(VarInt::from_u32(1)),
            (StreamType::Unidirectional, endpoint::Type::Client) => StreamId(VarInt::from_u32(2)),
            (StreamType::Unidirectional, endpoint::Type::Server) => StreamId(VarInt::from_u32(3)),
        }
    }

    /// Returns the n-th stream ID of a certain type.
    ///
    /// The 0th stream ID is the one returned by [`Self::initial`]; stream IDs
    /// of a given type are spaced apart by 4. Returns `None` when the
    /// resulting ID would be out of range.
    #[inline]
    pub fn nth(initiator: endpoint::Type, stream_type: StreamType, n: u64) -> Option<StreamId> {
        let initial = Self::initial(initiator, stream_type);
        // Calculate as much as possible on u64, to reduce the number of
        // overflow checks for the maximum stream ID to the last operation
        let id = VarInt::new(n.checked_mul(4)?.checked_add(initial.into())?).ok()?;
        Some(StreamId(id))
    }

    /// Returns the index of the stream among the streams of its own type
    #[inline]
    pub fn index(self) -> u64 {
        self.0.as_u64() >> 2
    }

    /// Returns the ID of the next stream of the same type, or `None` when it
    /// would be out of range
    #[inline]
    pub fn next_of_type(self) -> Option<StreamId> {
        self.0
            .checked_add(VarInt::from_u32(4))
            .map(StreamId::from_varint)
    }

    /// Returns whether the client or server initiated the stream
    #[inline]
    pub fn initiator(self) -> endpoint::Type {
        if self.0.as_u64() & 0x01 == 0 {
            endpoint::Type::Client
        } else {
            endpoint::Type::Server
        }
    }

    /// Returns whether the stream is unidirectional or bidirectional
    #[inline]
    pub fn stream_type(self) -> StreamType {
        if self.0.as_u64() & 0x02 == 0 {
            StreamType::Bidirectional
        } else {
            StreamType::Unidirectional
        }
    }

    /// Returns `true` if the local endpoint may receive data on the stream
    #[inline]
    pub fn is_receivable(self, local_endpoint: endpoint::Type) -> bool {
        self.stream_type().is_bidirectional() || self.initiator() != local_endpoint
    }

    /// Returns `true` if the local endpoint may send data on the stream
    #[inline]
    pub fn is_sendable(self, local_endpoint: endpoint::Type) -> bool {
        self.stream_type().is_bidirectional() || self.initiator() == local_endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_stream_ids_test() {
        for stream_type in [StreamType::Bidirectional, StreamType::Unidirectional] {
            for initiator in [endpoint::Type::Client, endpoint::Type::Server] {
                let id = StreamId::initial(initiator, stream_type);
                assert_eq!(stream_type, id.stream_type());
                assert_eq!(initiator, id.initiator());
                assert_eq!(id.index(), 0);
            }
        }
    }

    #[test]
    fn nth_test() {
        assert_eq!(
            StreamId::nth(endpoint::Type::Client, StreamType::Unidirectional, 3),
            Some(StreamId::from_varint(VarInt::from_u32(14)))
        );
        assert_eq!(
            StreamId::nth(endpoint::Type::Server, StreamType::Bidirectional, 2),
            Some(StreamId::from_varint(VarInt::from_u32(9)))
        );
        assert!(StreamId::nth(endpoint::Type::Client, StreamType::Bidirectional, u64::MAX).is_none());
    }

    #[test]
    fn directionality_test() {
        let client_uni = StreamId::initial(endpoint::Type::Client, StreamType::Unidirectional);
        assert!(client_uni.is_sendable(endpoint::Type::Client));
        assert!(!client_uni.is_receivable(endpoint::Type::Client));
        assert!(client_uni.is_receivable(endpoint::Type::Server));
        assert!(!client_uni.is_sendable(endpoint::Type::Server));

        let client_bidi = StreamId::initial(endpoint::Type::Client, StreamType::Bidirectional);
        assert!(client_bidi.is_sendable(endpoint::Type::Server));
        assert!(client_bidi.is_receivable(endpoint::Type::Server));
    }
}
