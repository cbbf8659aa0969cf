// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::frame::path_challenge::DATA_LEN;
use quill_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.18
//# The PATH_RESPONSE frame (type=0x1b) is sent in response to a
//# PATH_CHALLENGE frame.  Its format is identical to the PATH_CHALLENGE
//# frame.

macro_rules! path_response_tag {
    () => {
        0x1bu8
    };
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PathResponse<'a> {
    /// The data received in the corresponding PATH_CHALLENGE frame
    pub data: &'a [u8; DATA_LEN],
}

impl<'a> PathResponse<'a> {
    pub const fn tag(&self) -> u8 {
        path_response_tag!()
    }
}

decoder_parameterized_value!(
    impl<'a> PathResponse<'a> {
        fn decode(_tag: u8, buffer: Buffer) -> Result<Self> {
            let (data, buffer) = buffer.decode_slice(DATA_LEN)?;
            let data: &[u8] = data.into_less_safe_slice();
            let data = data.try_into().expect("length already validated");

            Ok((PathResponse { data }, buffer))
        }
    }
);

impl<'a> EncoderValue for PathResponse<'a> {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&&self.data[..]);
    }
}
