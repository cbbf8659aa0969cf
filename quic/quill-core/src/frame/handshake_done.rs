// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use quill_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.20
//# The server uses the HANDSHAKE_DONE frame (type=0x1e) to signal
//# confirmation of the handshake to the client.  The HANDSHAKE_DONE
//# frame contains no additional fields.

macro_rules! handshake_done_tag {
    () => {
        0x1eu8
    };
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct HandshakeDone;

impl HandshakeDone {
    pub const fn tag(&self) -> u8 {
        handshake_done_tag!()
    }
}

decoder_parameterized_value!(
    impl<'a> HandshakeDone {
        fn decode(_tag: u8, buffer: Buffer) -> Result<Self> {
            Ok((HandshakeDone, buffer))
        }
    }
);

impl EncoderValue for HandshakeDone {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
    }
}
