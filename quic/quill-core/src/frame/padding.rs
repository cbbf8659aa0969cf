// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use quill_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.1
//# The PADDING frame (type=0x00) has no semantic value.  PADDING frames
//# can be used to increase the size of a packet.

macro_rules! padding_tag {
    () => {
        0x00u8
    };
}

/// A run of consecutive PADDING frames.
///
/// Padding runs are decoded as a single frame so a fully padded Initial
/// packet costs one enum value instead of a thousand.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Padding {
    pub length: usize,
}

impl Padding {
    pub const fn tag(&self) -> u8 {
        padding_tag!()
    }
}

decoder_parameterized_value!(
    impl<'a> Padding {
        fn decode(_tag: u8, buffer: Buffer) -> Result<Self> {
            // extend the run over every following zero byte
            let extra = buffer
                .as_less_safe_slice()
                .iter()
                .take_while(|byte| **byte == 0)
                .count();

            let buffer = buffer.skip(extra)?;

            Ok((Padding { length: extra + 1 }, buffer))
        }
    }
);

impl EncoderValue for Padding {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.write_repeated(self.length, 0)
    }
}
