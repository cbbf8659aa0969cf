// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use quill_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.2
//# Endpoints can use PING frames (type=0x01) to verify that their peers
//# are still alive or to check reachability to the peer.  The PING frame
//# contains no additional fields.

macro_rules! ping_tag {
    () => {
        0x01u8
    };
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Ping;

impl Ping {
    pub const fn tag(&self) -> u8 {
        ping_tag!()
    }
}

decoder_parameterized_value!(
    impl<'a> Ping {
        fn decode(_tag: u8, buffer: Buffer) -> Result<Self> {
            Ok((Ping, buffer))
        }
    }
);

impl EncoderValue for Ping {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
    }
}
