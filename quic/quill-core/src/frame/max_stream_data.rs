// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::varint::VarInt;

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.10
//# The MAX_STREAM_DATA frame (type=0x11) is used in flow control to
//# inform a peer of the maximum amount of data that can be sent on a
//# stream.

macro_rules! max_stream_data_tag {
    () => {
        0x11u8
    };
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MaxStreamData {
    /// The stream ID of the stream that is affected
    pub stream_id: VarInt,

    /// The maximum amount of data that can be sent on the identified
    /// stream, in units of bytes
    pub maximum_stream_data: VarInt,
}

impl MaxStreamData {
    pub const fn tag(&self) -> u8 {
        max_stream_data_tag!()
    }
}

simple_frame_codec!(
    MaxStreamData {
        stream_id,
        maximum_stream_data
    },
    max_stream_data_tag!()
);
