// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::stream::StreamError;
use atomic_waker::AtomicWaker;
use core::task::{Context, Poll};
use quill_core::{
    application,
    interval_set::{Interval, IntervalSet},
    stream::{state::Receiver, StreamId},
    transport,
};
use std::collections::BTreeMap;

/// The connection-owned half of an inbound stream.
///
/// Out-of-order frame payloads are stored as non-overlapping slices keyed
/// by offset; the reader consumes the contiguous prefix past `read_offset`.
/// Overlapping retransmissions keep the first copy.
#[derive(Debug)]
pub struct ReceiveStream {
    id: StreamId,
    state: Receiver,

    /// Every byte range observed so far
    received: IntervalSet<u64>,

    /// Reassembly storage; entries never overlap
    storage: BTreeMap<u64, Vec<u8>>,

    /// Bytes already consumed by the application
    read_offset: u64,

    /// The stream's final size, once a FIN or reset declared it
    final_size: Option<u64>,

    /// The flow control limit currently advertised to the peer
    max_stream_data: u64,

    /// The receive window size used when advancing the limit
    window: u64,

    reset_error: Option<application::Error>,

    /// The application asked to discard incoming data with this code
    stop_sending: Option<application::Error>,

    reader_waker: AtomicWaker,
}

impl ReceiveStream {
    pub fn new(id: StreamId, initial_max_stream_data: u64) -> Self {
        Self {
            id,
            state: Receiver::default(),
            received: IntervalSet::new(),
            storage: BTreeMap::new(),
            read_offset: 0,
            final_size: None,
            max_stream_data: initial_max_stream_data,
            window: initial_max_stream_data,
            reset_error: None,
            stop_sending: None,
            reader_waker: AtomicWaker::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> StreamId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> &Receiver {
        &self.state
    }

    /// The highest stream offset observed so far; connection flow control
    /// is charged against this value
    #[inline]
    pub fn highest_received(&self) -> u64 {
        self.received.max_value().map_or(0, |end| end + 1)
    }

    fn check_final_size(&self, end: u64, declared: Option<u64>) -> Result<(), transport::Error> {
        if let Some(declared) = declared {
            //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#4.4
            //# Once a final size for a stream is known, it cannot change.  If a
            //# RESET_STREAM or STREAM frame is received indicating a change in
            //# the final size for the stream, an endpoint SHOULD respond with a
            //# FINAL_SIZE_ERROR error
            if let Some(known) = self.final_size {
                if known != declared {
                    return Err(transport::Error::FINAL_SIZE_ERROR
                        .with_reason("final size changed"));
                }
            }

            if self.highest_received() > declared || end > declared {
                return Err(transport::Error::FINAL_SIZE_ERROR
                    .with_reason("data received past the final size"));
            }
        } else if let Some(known) = self.final_size {
            if end > known {
                return Err(transport::Error::FINAL_SIZE_ERROR
                    .with_reason("data received past the final size"));
            }
        }

        Ok(())
    }

    /// Ingests one STREAM frame's payload.
    ///
    /// Returns the number of bytes newly charged against connection flow
    /// control (growth of the highest received offset).
    pub fn on_data(
        &mut self,
        offset: u64,
        data: &[u8],
        is_fin: bool,
    ) -> Result<u64, transport::Error> {
        let end = offset + data.len() as u64;

        self.check_final_size(end, is_fin.then_some(end))?;

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#4.1
        //# A receiver MUST close the connection with a FLOW_CONTROL_ERROR
        //# error (Section 11) if the sender violates the advertised connection
        //# or stream data limits.
        if end > self.max_stream_data {
            return Err(
                transport::Error::FLOW_CONTROL_ERROR.with_reason("stream data limit exceeded")
            );
        }

        let previous_highest = self.highest_received();

        if self.state.is_reset() {
            // data arriving after a reset is discarded
            return Ok(0);
        }

        if is_fin {
            self.final_size = Some(end);
            let _ = self.state.on_receive_fin();
        }

        if !data.is_empty() {
            // keep the first copy of any overlapping bytes
            let mut missing = IntervalSet::new();
            missing.insert(Interval::new(offset, end - 1));
            for covered in self.received.intervals().collect::<Vec<_>>() {
                missing.remove(covered);
            }

            for gap in missing.intervals() {
                let begin = (gap.start - offset) as usize;
                let len = gap.len() as usize;
                self.storage
                    .insert(gap.start, data[begin..begin + len].to_vec());
            }

            self.received.insert(Interval::new(offset, end - 1));
        }

        if self.all_data_received() {
            let _ = self.state.on_receive_all_data();
        }

        // wake the reader on contiguous progress or a FIN
        if self.received.contains(&self.read_offset) || self.read_end_reached() {
            self.reader_waker.wake();
        }

        Ok(self.highest_received() - previous_highest)
    }

    fn all_data_received(&self) -> bool {
        match self.final_size {
            Some(0) => true,
            Some(final_size) => self
                .received
                .contains_interval(Interval::new(0, final_size - 1)),
            None => false,
        }
    }

    fn read_end_reached(&self) -> bool {
        self.final_size == Some(self.read_offset)
    }

    /// The peer reset the stream
    pub fn on_reset(
        &mut self,
        error: application::Error,
        final_size: u64,
    ) -> Result<(), transport::Error> {
        self.check_final_size(final_size, Some(final_size))?;
        self.final_size = Some(final_size);

        if self.state.on_reset().is_ok() {
            self.reset_error = Some(error);
            self.storage.clear();
            self.reader_waker.wake();
        }

        Ok(())
    }

    /// The application no longer wants the data; elicit a RESET_STREAM from
    /// the peer via STOP_SENDING
    pub fn abort_read(&mut self, error: application::Error) {
        if self.stop_sending.is_none() && !self.state.is_terminal() && !self.state.is_reset() {
            self.stop_sending = Some(error);
            self.storage.clear();
        }
    }

    /// The error code to put in an outgoing STOP_SENDING frame
    #[inline]
    pub fn stop_sending_to_send(&self) -> Option<application::Error> {
        self.stop_sending
    }

    /// The flow control limit currently advertised to the peer
    #[inline]
    pub fn advertised_max_stream_data(&self) -> u64 {
        self.max_stream_data
    }

    /// Reads the maximum contiguous prefix past `read_offset` into `buf`.
    ///
    /// Returns `(0, true)` at the end of the stream and
    /// `StreamAborted(code)` once a reset was received.
    pub fn poll_read(
        &mut self,
        cx: &mut Context,
        buf: &mut [u8],
    ) -> Poll<Result<(usize, bool), StreamError>> {
        if let Some(error) = self.reset_error {
            let _ = self.state.on_app_read_reset();
            return Poll::Ready(Err(StreamError::StreamAborted(error)));
        }

        let mut copied = 0;
        while copied < buf.len() {
            let offset = self.read_offset;
            if !self.received.contains(&offset) {
                break;
            }

            let (entry_offset, len, entry_consumed) = {
                let (entry_offset, entry) = self
                    .storage
                    .range(..=offset)
                    .next_back()
                    .expect("received bytes are backed by storage");
                let begin = (offset - entry_offset) as usize;
                let len = (buf.len() - copied).min(entry.len() - begin);
                buf[copied..copied + len].copy_from_slice(&entry[begin..begin + len]);
                (*entry_offset, len, begin + len == entry.len())
            };

            copied += len;
            self.read_offset += len as u64;

            if entry_consumed {
                self.storage.remove(&entry_offset);
            }
        }

        let at_end = self.read_end_reached();

        if copied > 0 || at_end {
            if at_end {
                let _ = self.state.on_app_read_all_data();
            }
            return Poll::Ready(Ok((copied, at_end)));
        }

        self.reader_waker.register(cx.waker());

        // a reset or delivery may have landed between the check and the
        // registration
        if self.reset_error.is_some() || self.received.contains(&self.read_offset) {
            self.reader_waker.take();
            return self.poll_read(cx, buf);
        }

        Poll::Pending
    }

    /// Advances the advertised limit once the reader consumed half the
    /// window.
    ///
    /// Returns the new limit to put in a MAX_STREAM_DATA frame.
    pub fn max_stream_data_update(&mut self) -> Option<u64> {
        if self.final_size.is_some() || self.stop_sending.is_some() {
            // the limit is fixed once the size is known or reading stopped
            return None;
        }

        let remaining = self.max_stream_data - self.read_offset;
        if remaining >= self.window / 2 {
            return None;
        }

        self.max_stream_data = self.read_offset + self.window;
        Some(self.max_stream_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_test::task::{new_count_waker, noop_waker};
    use quill_core::{endpoint, stream::StreamType, varint::VarInt};

    fn stream() -> ReceiveStream {
        let id = StreamId::initial(endpoint::Type::Client, StreamType::Unidirectional);
        ReceiveStream::new(id, 1000)
    }

    fn read(stream: &mut ReceiveStream, buf: &mut [u8]) -> Poll<Result<(usize, bool), StreamError>> {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        stream.poll_read(&mut cx, buf)
    }

    #[test]
    fn in_order_delivery_test() {
        let mut stream = stream();

        assert_eq!(stream.on_data(0, b"hello ", false).unwrap(), 6);
        assert_eq!(stream.on_data(6, b"world", true).unwrap(), 5);
        assert!(stream.state().is_data_received());

        let mut buf = [0u8; 32];
        assert_eq!(read(&mut stream, &mut buf), Poll::Ready(Ok((11, true))));
        assert_eq!(&buf[..11], b"hello world");
        assert!(stream.state().is_terminal());

        // end of stream is sticky
        assert_eq!(read(&mut stream, &mut buf), Poll::Ready(Ok((0, true))));
    }

    #[test]
    fn out_of_order_reassembly_test() {
        let mut stream = stream();
        let (waker, count) = new_count_waker();
        let mut cx = Context::from_waker(&waker);

        stream.on_data(6, b"world", false).unwrap();

        let mut buf = [0u8; 32];
        assert_eq!(stream.poll_read(&mut cx, &mut buf), Poll::Pending);
        assert_eq!(count, 0);

        // filling the gap wakes the reader
        stream.on_data(0, b"hello ", false).unwrap();
        assert_eq!(count, 1);
        assert_eq!(read(&mut stream, &mut buf), Poll::Ready(Ok((11, false))));
        assert_eq!(&buf[..11], b"hello world");
    }

    #[test]
    fn overlap_keeps_first_copy_test() {
        let mut stream = stream();

        stream.on_data(0, b"abcd", false).unwrap();
        // the overlap carries different bytes; the first copy wins
        assert_eq!(stream.on_data(2, b"XXef", false).unwrap(), 2);

        let mut buf = [0u8; 8];
        assert_eq!(read(&mut stream, &mut buf), Poll::Ready(Ok((6, false))));
        assert_eq!(&buf[..6], b"abcdef");
    }

    #[test]
    fn final_size_conflicts_test() {
        let mut stream = stream();
        stream.on_data(0, b"0123456789", true).unwrap();

        // shrinking the final size is an error
        assert!(stream.on_data(0, b"0123", true).is_err());
        // data past the final size is an error
        assert!(stream.on_data(10, b"x", false).is_err());
    }

    #[test]
    fn flow_control_test() {
        let id = StreamId::initial(endpoint::Type::Client, StreamType::Unidirectional);
        let mut stream = ReceiveStream::new(id, 4);

        assert!(stream.on_data(0, b"12345", false).is_err());
        assert!(stream.on_data(0, b"1234", false).is_ok());
    }

    #[test]
    fn window_update_test() {
        let mut stream = stream();
        stream.on_data(0, &[0u8; 600], false).unwrap();

        // nothing read yet, no update owed
        assert_eq!(stream.max_stream_data_update(), None);

        let mut buf = [0u8; 600];
        assert_eq!(read(&mut stream, &mut buf), Poll::Ready(Ok((600, false))));

        // 600 of 1000 consumed leaves less than half the window
        assert_eq!(stream.max_stream_data_update(), Some(1600));
        assert_eq!(stream.max_stream_data_update(), None);
    }

    #[test]
    fn reset_test() {
        let mut stream = stream();
        stream.on_data(0, b"partial", false).unwrap();

        stream
            .on_reset(application::Error::new(VarInt::from_u8(9)), 7)
            .unwrap();
        assert!(stream.state().is_reset());

        let mut buf = [0u8; 8];
        assert_eq!(
            read(&mut stream, &mut buf),
            Poll::Ready(Err(StreamError::StreamAborted(application::Error::new(
                VarInt::from_u8(9)
            ))))
        );
        assert!(stream.state().is_terminal());
    }

    #[test]
    fn reset_final_size_conflict_test() {
        // a reset conflicting with received data is a connection error
        let mut stream = stream();
        stream.on_data(0, b"too long", false).unwrap();
        assert!(stream
            .on_reset(application::Error::new(VarInt::from_u8(9)), 4)
            .is_err());
    }

    /// Any delivery order reassembles into the stream-offset order, and the
    /// readable prefix is exactly the contiguous prefix of what arrived
    #[test]
    fn reassembly_model_test() {
        bolero::check!()
            .with_type::<Vec<(u8, u8)>>()
            .for_each(|segments| {
                let id =
                    StreamId::initial(quill_core::endpoint::Type::Client, quill_core::stream::StreamType::Unidirectional);
                let mut stream = ReceiveStream::new(id, 1 << 16);
                let mut covered = [false; 300];

                for (offset, len) in segments {
                    let offset = *offset as u64;
                    let len = (*len as usize % 16) + 1;

                    // every position always carries the same byte, so
                    // overlapping deliveries are consistent
                    let data: Vec<u8> =
                        (offset..offset + len as u64).map(|position| position as u8).collect();
                    stream.on_data(offset, &data, false).unwrap();

                    for position in offset as usize..offset as usize + len {
                        covered[position] = true;
                    }
                }

                let expected = covered.iter().take_while(|position| **position).count();

                let waker = noop_waker();
                let mut cx = Context::from_waker(&waker);
                let mut collected = Vec::new();
                let mut buf = [0u8; 64];
                while let Poll::Ready(Ok((len, _))) = stream.poll_read(&mut cx, &mut buf) {
                    if len == 0 {
                        break;
                    }
                    collected.extend_from_slice(&buf[..len]);
                }

                assert_eq!(collected.len(), expected);
                for (position, byte) in collected.iter().enumerate() {
                    assert_eq!(*byte, position as u8);
                }
            });
    }
}
