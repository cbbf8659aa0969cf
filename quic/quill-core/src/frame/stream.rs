// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    frame::{FitError, Tag},
    varint::VarInt,
};
use core::mem::size_of;
use quill_codec::{
    decoder_parameterized_value, DecoderBuffer, DecoderBufferMut, Encoder, EncoderValue,
};

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.8
//# STREAM frames implicitly create a stream and carry stream data.  The
//# STREAM frame takes the form 0b00001XXX (or the set of values from
//# 0x08 to 0x0f).

macro_rules! stream_tag {
    () => {
        0x08u8..=0x0fu8
    };
}

const STREAM_TAG: u8 = 0x08;

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.8
//# *  The OFF bit (0x04) in the frame type is set to indicate that there
//#    is an Offset field present.  When set to 1, the Offset field is
//#    present.  When set to 0, the Offset field is absent and the Stream
//#    Data starts at an offset of 0.

const OFF_BIT: u8 = 0x04;

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.8
//# *  The LEN bit (0x02) in the frame type is set to indicate that there
//#    is a Length field present.  If this bit is set to 0, the Length
//#    field is absent and the Stream Data field extends to the end of
//#    the packet.  If this bit is set to 1, the Length field is present.

const LEN_BIT: u8 = 0x02;

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.8
//# *  The FIN bit (0x01) of the frame type is set only on frames that
//#    contain the final size of the stream.  Setting this bit indicates
//#    that the frame marks the end of the stream.

const FIN_BIT: u8 = 0x01;

#[derive(Debug, PartialEq, Eq)]
pub struct Stream<Data> {
    /// The stream ID of the stream
    pub stream_id: VarInt,

    /// The byte offset in the stream for the data in this STREAM frame
    pub offset: VarInt,

    /// If true, the frame is the last frame in the payload and omits its
    /// length prefix
    pub is_last_frame: bool,

    /// If true, the frame marks the end of the stream
    pub is_fin: bool,

    /// The bytes from the designated stream to be delivered
    pub data: Data,
}

pub type StreamRef<'a> = Stream<&'a [u8]>;
pub type StreamMut<'a> = Stream<&'a mut [u8]>;

impl<Data> Stream<Data> {
    #[inline]
    pub fn tag(&self) -> u8 {
        let mut tag: u8 = STREAM_TAG;

        if *self.offset != 0 {
            tag |= OFF_BIT;
        }

        if !self.is_last_frame {
            tag |= LEN_BIT;
        }

        if self.is_fin {
            tag |= FIN_BIT;
        }

        tag
    }

    /// Converts the stream data from one type to another
    #[inline]
    pub fn map_data<F: FnOnce(Data) -> Out, Out>(self, map: F) -> Stream<Out> {
        Stream {
            stream_id: self.stream_id,
            offset: self.offset,
            is_last_frame: self.is_last_frame,
            is_fin: self.is_fin,
            data: map(self.data),
        }
    }
}

impl<Data: EncoderValue> Stream<Data> {
    /// Tries to fit the frame into the provided capacity
    ///
    /// The `is_last_frame` field will be updated with this call.
    ///
    /// If ok, the maximum payload length is returned, otherwise the frame
    /// cannot fit.
    #[inline]
    pub fn try_fit(&mut self, capacity: usize) -> Result<usize, FitError> {
        let mut header_len = size_of::<Tag>() + self.stream_id.encoding_size();
        if self.offset != 0u64 {
            header_len += self.offset.encoding_size();
        }

        let available = capacity.checked_sub(header_len).ok_or(FitError)?;
        let data_len = self.data.encoding_size();

        // a payload filling the capacity exactly can drop its length prefix
        if data_len >= available {
            self.is_last_frame = true;
            return Ok(available);
        }

        self.is_last_frame = false;

        // otherwise budget for the prefix the payload needs
        let prefix_len = VarInt::try_from(data_len)
            .map_err(|_| FitError)?
            .encoding_size();
        let budget = available.checked_sub(prefix_len).ok_or(FitError)?;

        Ok(budget.min(data_len))
    }
}

decoder_parameterized_value!(
    impl<'a, Data> Stream<Data> {
        fn decode(tag: Tag, buffer: Buffer) -> Result<Self> {
            let has_offset = tag & OFF_BIT == OFF_BIT;
            let is_last_frame = tag & LEN_BIT != LEN_BIT;
            let is_fin = tag & FIN_BIT == FIN_BIT;

            let (stream_id, buffer) = buffer.decode()?;

            let (offset, buffer) = if has_offset {
                buffer.decode()?
            } else {
                (Default::default(), buffer)
            };

            let (data, buffer) = if !is_last_frame {
                buffer.decode_with_len_prefix::<VarInt, Data>()?
            } else {
                let len = buffer.len();
                let (data, buffer) = buffer.decode_slice(len)?;
                let (data, remaining) = data.decode()?;
                remaining.ensure_empty()?;
                (data, buffer)
            };

            let frame = Stream {
                stream_id,
                offset,
                is_last_frame,
                is_fin,
                data,
            };

            Ok((frame, buffer))
        }
    }
);

impl<Data: EncoderValue> EncoderValue for Stream<Data> {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.stream_id);

        if *self.offset != 0 {
            buffer.encode(&self.offset);
        }

        if self.is_last_frame {
            buffer.encode(&self.data);
        } else {
            buffer.encode_with_len_prefix::<VarInt, _>(&self.data);
        }
    }
}

impl<'a> From<Stream<DecoderBuffer<'a>>> for StreamRef<'a> {
    #[inline]
    fn from(s: Stream<DecoderBuffer<'a>>) -> Self {
        s.map_data(|data| data.into_less_safe_slice())
    }
}

impl<'a> From<Stream<DecoderBufferMut<'a>>> for StreamRef<'a> {
    #[inline]
    fn from(s: Stream<DecoderBufferMut<'a>>) -> Self {
        s.map_data(|data| &*data.into_less_safe_slice())
    }
}

impl<'a> From<Stream<DecoderBufferMut<'a>>> for StreamMut<'a> {
    #[inline]
    fn from(s: Stream<DecoderBufferMut<'a>>) -> Self {
        s.map_data(|data| data.into_less_safe_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolero::check;

    #[test]
    fn try_fit_test() {
        check!()
            .with_type::<(u32, u32, u16, u16)>()
            .cloned()
            .for_each(|(stream_id, offset, length, capacity)| {
                let length = length as usize;
                let capacity = capacity as usize;

                let mut frame = Stream {
                    stream_id: VarInt::from_u32(stream_id),
                    offset: VarInt::from_u32(offset),
                    is_last_frame: false,
                    is_fin: false,
                    data: crate::frame::Padding { length },
                };

                if let Ok(new_length) = frame.try_fit(capacity) {
                    frame.data = crate::frame::Padding { length: new_length };

                    // we should never exceed the capacity
                    assert!(frame.encoding_size() <= capacity);

                    if frame.is_last_frame {
                        // the `is_last_frame` should only be set when the
                        // encoding size == capacity
                        assert_eq!(frame.encoding_size(), capacity);
                    }
                } else {
                    assert!(frame.encoding_size() > capacity);
                }
            });
    }
}
