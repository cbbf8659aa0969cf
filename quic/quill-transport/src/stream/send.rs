// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::stream::{
    chunks::{Chunk, ChunkQueue},
    StreamError,
};
use atomic_waker::AtomicWaker;
use core::task::{Context, Poll};
use quill_core::{
    application,
    interval_set::{Interval, IntervalSet},
    stream::{state::Sender, StreamId},
};
use std::{collections::VecDeque, sync::Arc};

/// A frame's worth of stream data checked out of the stream
#[derive(Debug, PartialEq, Eq)]
pub struct CheckedOut {
    pub offset: u64,
    pub len: usize,
    pub is_fin: bool,
    /// Bytes past the previous `unsent_offset`; what the caller charges
    /// against connection-level flow control
    pub newly_sent: u64,
}

/// The connection-owned half of an outbound stream.
///
/// Bytes flow in from the producer through the chunk queue; three disjoint
/// range sets account for every dequeued byte until the peer acknowledges
/// it:
///
/// * `pending`: dequeued, never sent or declared lost
/// * `in_flight`: carried by an unacknowledged packet
/// * `acked`: confirmed by the peer
///
/// Their union is always exactly `[0, dequeued)`.
#[derive(Debug)]
pub struct SendStream {
    id: StreamId,
    state: Sender,
    queue: Arc<ChunkQueue>,

    /// Drained chunks, sorted by offset; the front is released once fully
    /// acknowledged
    chunks: VecDeque<Chunk>,

    /// Bytes moved from the producer queue into `chunks`
    dequeued: u64,

    /// Total bytes accepted from the producer, as last observed
    written: u64,

    size_known: bool,

    /// The first byte never yet emitted
    unsent_offset: u64,

    /// The peer-advertised per-stream flow control limit
    max_stream_data: u64,

    acked: IntervalSet<u64>,
    in_flight: IntervalSet<u64>,
    pending: IntervalSet<u64>,

    fin_acked: bool,
    /// A frame carrying the FIN is currently in flight
    fin_in_flight: bool,

    error: Option<application::Error>,
    /// The final size to declare in RESET_STREAM
    reset_final_size: u64,

    /// Wakes a `poll_finish` waiter
    finish_waker: AtomicWaker,
}

impl SendStream {
    pub fn new(id: StreamId, max_stream_data: u64) -> Self {
        Self {
            id,
            state: Sender::default(),
            queue: ChunkQueue::new(),
            chunks: VecDeque::new(),
            dequeued: 0,
            written: 0,
            size_known: false,
            unsent_offset: 0,
            max_stream_data,
            acked: IntervalSet::new(),
            in_flight: IntervalSet::new(),
            pending: IntervalSet::new(),
            fin_acked: false,
            fin_in_flight: false,
            error: None,
            reset_final_size: 0,
            finish_waker: AtomicWaker::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> StreamId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> &Sender {
        &self.state
    }

    #[inline]
    pub fn error(&self) -> Option<application::Error> {
        self.error
    }

    /// The producer half of the stream
    #[inline]
    pub fn producer(&self) -> Arc<ChunkQueue> {
        self.queue.clone()
    }

    /// Raises the peer's flow control limit; limits never shrink
    #[inline]
    pub fn on_max_stream_data(&mut self, max_stream_data: u64) {
        self.max_stream_data = self.max_stream_data.max(max_stream_data);
    }

    /// The peer's current flow control limit, for STREAM_DATA_BLOCKED
    #[inline]
    pub fn max_stream_data(&self) -> u64 {
        self.max_stream_data
    }

    /// The first byte never yet emitted; bytes below it are retransmissions
    #[inline]
    pub fn unsent_offset(&self) -> u64 {
        self.unsent_offset
    }

    /// Drains the producer queue into the chunk list, observing aborts and
    /// the end of the stream. Never suspends.
    fn drain_queue(&mut self) {
        let drained = self.queue.drain();
        self.written = drained.written;
        self.size_known = drained.size_known;

        for chunk in drained.chunks {
            debug_assert_eq!(chunk.offset, self.dequeued);
            let end = chunk.end();
            if let Some(interval) = Interval::from_offset_len(chunk.offset, chunk.data.len() as u64)
            {
                self.pending.insert(interval);
            }
            self.chunks.push_back(chunk);
            self.dequeued = end;
        }

        if let Some(error) = drained.reset {
            self.queue_reset(error);
        }
    }

    fn queue_reset(&mut self, error: application::Error) {
        if self.state.is_resetting() || self.state.is_terminal() {
            return;
        }

        if self.state.on_queue_reset().is_ok() {
            self.error = Some(error);
            self.reset_final_size = self.unsent_offset;
        }
    }

    /// The peer no longer wants the data; answer with RESET_STREAM carrying
    /// the same error code
    pub fn on_stop_sending(&mut self, error: application::Error) {
        // the producer observes the abort on its next operation
        self.queue.request_abort(error);
        self.drain_queue();
        self.queue_reset(error);
    }

    /// Returns the next sendable range under the flow control limit, or
    /// `(written, 0)` when nothing is sendable
    pub fn get_next_sendable_range(&mut self) -> (u64, usize) {
        self.drain_queue();

        if self.state.is_resetting() || self.state.is_terminal() {
            return (self.written, 0);
        }

        if let Some(first) = self.pending.get(0) {
            if first.start < self.max_stream_data {
                let available = (self.max_stream_data - first.start).min(first.len());
                return (first.start, available as usize);
            }
        }

        (self.written, 0)
    }

    /// Returns `true` if the stream has bytes or a FIN that could go into
    /// the next packet
    pub fn is_flushable(&mut self) -> bool {
        let (_, count) = self.get_next_sendable_range();
        if count > 0 {
            return true;
        }

        self.fin_sendable()
    }

    /// Returns `true` if the stream is blocked by the peer's stream limit
    pub fn is_blocked(&mut self) -> bool {
        self.drain_queue();

        if self.state.is_resetting() || self.state.is_terminal() {
            return false;
        }

        match self.pending.get(0) {
            Some(first) => first.start >= self.max_stream_data,
            None => false,
        }
    }

    fn fin_sendable(&self) -> bool {
        self.size_known
            && !self.fin_acked
            && !self.fin_in_flight
            && !self.state.is_resetting()
            && !self.state.is_terminal()
            && self.unsent_offset == self.written
            && self.pending.is_empty()
    }

    /// Copies the next contiguous sendable bytes into `buffer`, moving the
    /// range from `pending` to `in_flight` and advancing `unsent_offset`.
    ///
    /// `max_new_bytes` bounds how far past `unsent_offset` the range may
    /// extend; retransmissions below it are never limited. Returns `None`
    /// when neither data nor a FIN can be emitted.
    pub fn check_out(&mut self, buffer: &mut [u8], max_new_bytes: u64) -> Option<CheckedOut> {
        let (offset, count) = self.get_next_sendable_range();
        let mut len = count.min(buffer.len());

        // connection-level flow control only applies to never-sent bytes
        let new_bytes_end = self.unsent_offset.saturating_add(max_new_bytes);
        if offset + len as u64 > new_bytes_end {
            len = (new_bytes_end - offset) as usize;
        }

        if len == 0 {
            // an empty frame may still carry the FIN
            if self.fin_sendable() {
                self.fin_in_flight = true;
                let _ = self.state.on_send_fin();
                return Some(CheckedOut {
                    offset: self.written,
                    len: 0,
                    is_fin: true,
                    newly_sent: 0,
                });
            }
            return None;
        }

        self.copy_range(offset, &mut buffer[..len]);

        let interval = Interval::from_offset_len(offset, len as u64).expect("len is non-zero");
        self.pending.remove(interval);
        self.in_flight.insert(interval);

        let end = offset + len as u64;
        let newly_sent = end.saturating_sub(self.unsent_offset);
        self.unsent_offset = self.unsent_offset.max(end);

        let is_fin = self.size_known && end == self.written && self.pending.is_empty();

        if is_fin {
            self.fin_in_flight = true;
            let _ = self.state.on_send_fin();
        } else {
            let _ = self.state.on_send_stream();
        }

        Some(CheckedOut {
            offset,
            len,
            is_fin,
            newly_sent,
        })
    }

    fn copy_range(&self, offset: u64, buffer: &mut [u8]) {
        let mut copied = 0;
        let mut position = offset;

        let start = self
            .chunks
            .partition_point(|chunk| chunk.end() <= offset);

        for chunk in self.chunks.iter().skip(start) {
            if copied == buffer.len() {
                break;
            }
            debug_assert!(chunk.offset <= position && position < chunk.end());

            let begin = (position - chunk.offset) as usize;
            let len = (buffer.len() - copied).min(chunk.data.len() - begin);
            buffer[copied..copied + len].copy_from_slice(&chunk.data[begin..begin + len]);
            copied += len;
            position += len as u64;
        }

        debug_assert_eq!(
            copied,
            buffer.len(),
            "checked out bytes must be covered by retained chunks"
        );
    }

    /// The peer acknowledged `[offset, offset + count)`, possibly with a FIN
    pub fn on_ack(&mut self, offset: u64, count: usize, is_fin: bool) {
        if let Some(interval) = Interval::from_offset_len(offset, count as u64) {
            self.in_flight.remove(interval);
            self.pending.remove(interval);
            self.acked.insert(interval);
        }

        if is_fin {
            debug_assert_eq!(offset + count as u64, self.written);
            self.fin_acked = true;
            self.fin_in_flight = false;
        }

        self.release_acked_chunks();

        if self.state.is_data_sent() && self.fin_acked && self.all_data_acked() {
            let _ = self.state.on_recv_all_acks();
            self.finish_waker.wake();
        }
    }

    fn all_data_acked(&self) -> bool {
        if self.written == 0 {
            return true;
        }

        match self.acked.get(0) {
            Some(first) => first.start == 0 && first.end >= self.written - 1,
            None => false,
        }
    }

    /// Returns slabs whose every byte has been acknowledged
    fn release_acked_chunks(&mut self) {
        let acked_prefix = match self.acked.get(0) {
            Some(first) if first.start == 0 => first.end + 1,
            _ => return,
        };

        while let Some(chunk) = self.chunks.front() {
            if chunk.end() > acked_prefix {
                break;
            }
            let chunk = self.chunks.pop_front().expect("front was just observed");
            self.queue.release(chunk.data);
        }
    }

    /// The range was carried by a packet that was declared lost
    pub fn on_lost(&mut self, offset: u64, count: usize, is_fin: bool) {
        if let Some(interval) = Interval::from_offset_len(offset, count as u64) {
            self.in_flight.remove(interval);
            self.pending.insert(interval);

            // bytes that were acknowledged through another packet stay acked
            for acked in self.acked.intervals().collect::<Vec<_>>() {
                self.pending.remove(acked);
            }
        }

        if is_fin && !self.fin_acked {
            self.fin_in_flight = false;
        }
    }

    /// Returns the reset frame fields once a reset is queued
    pub fn reset_to_send(&mut self) -> Option<(application::Error, u64)> {
        self.drain_queue();

        if self.state.is_reset_queued() {
            Some((
                self.error.expect("a queued reset always records an error"),
                self.reset_final_size,
            ))
        } else {
            None
        }
    }

    /// A RESET_STREAM frame was put on the wire; buffered data is dropped
    pub fn on_reset_sent(&mut self) {
        if self.state.on_send_reset().is_ok() {
            for chunk in self.chunks.drain(..) {
                self.queue.release(chunk.data);
            }
            self.pending.clear();
            self.in_flight.clear();
        }
    }

    pub fn on_reset_acked(&mut self) {
        if self.state.on_recv_reset_ack().is_ok() {
            self.finish_waker.wake();
        }
    }

    pub fn on_reset_lost(&mut self) {
        let _ = self.state.on_reset_lost();
    }

    /// Waits for every byte and the FIN to be acknowledged
    pub fn poll_finish(&mut self, cx: &mut Context) -> Poll<Result<(), StreamError>> {
        if self.state.is_data_received() {
            return Poll::Ready(Ok(()));
        }

        if let (true, Some(error)) = (self.state.is_resetting() || self.state.is_terminal(), self.error) {
            return Poll::Ready(Err(StreamError::StreamAborted(error)));
        }

        self.finish_waker.register(cx.waker());
        Poll::Pending
    }

    #[cfg(test)]
    pub(crate) fn assert_range_invariants(&self) {
        // acked, in_flight, and pending are pairwise disjoint and their
        // union is [0, dequeued)
        let mut union: IntervalSet<u64> = IntervalSet::new();
        let mut total = 0;

        for set in [&self.acked, &self.in_flight, &self.pending] {
            total += set.count();
            union.union(set);
        }

        assert_eq!(total, union.count(), "range sets must be disjoint");
        assert_eq!(union.count(), self.dequeued, "range sets must cover [0, dequeued)");
        if self.dequeued > 0 {
            assert_eq!(union.min_value(), Some(0));
            assert_eq!(union.max_value(), Some(self.dequeued - 1));
        }

        assert!(self.unsent_offset <= self.written);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_test::task::noop_waker;
    use quill_core::{endpoint, stream::StreamType, varint::VarInt};

    fn stream() -> SendStream {
        let id = StreamId::initial(endpoint::Type::Client, StreamType::Unidirectional);
        SendStream::new(id, 100_000)
    }

    fn enqueue(stream: &mut SendStream, bytes: &[u8]) {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert_eq!(
            stream.producer().poll_enqueue(&mut cx, bytes),
            Poll::Ready(Ok(bytes.len()))
        );
        stream.producer().flush();
    }

    #[test]
    fn check_out_and_ack_test() {
        let mut stream = stream();
        enqueue(&mut stream, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);

        assert_eq!(stream.get_next_sendable_range(), (0, 11));
        stream.assert_range_invariants();

        let mut buffer = [0u8; 1200];
        let out = stream.check_out(&mut buffer, u64::MAX).unwrap();
        assert_eq!(out, CheckedOut { offset: 0, len: 11, is_fin: false, newly_sent: 11 });
        assert_eq!(&buffer[..11], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
        assert!(stream.state().is_sending());
        stream.assert_range_invariants();

        // everything is in flight now
        assert_eq!(stream.get_next_sendable_range(), (11, 0));

        stream.on_ack(0, 11, false);
        stream.assert_range_invariants();
        assert!(!stream.state().is_terminal());
    }

    #[test]
    fn fin_rides_last_frame_test() {
        let mut stream = stream();
        enqueue(&mut stream, b"hello");
        stream.producer().mark_end_of_data().unwrap();

        let mut buffer = [0u8; 1200];
        let out = stream.check_out(&mut buffer, u64::MAX).unwrap();
        assert_eq!(out, CheckedOut { offset: 0, len: 5, is_fin: true, newly_sent: 5 });
        assert!(stream.state().is_data_sent());

        stream.on_ack(0, 5, true);
        assert!(stream.state().is_data_received());

        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert_eq!(stream.poll_finish(&mut cx), Poll::Ready(Ok(())));
    }

    #[test]
    fn empty_fin_after_data_test() {
        let mut stream = stream();
        enqueue(&mut stream, b"hello");

        let mut buffer = [0u8; 1200];
        let out = stream.check_out(&mut buffer, u64::MAX).unwrap();
        assert!(!out.is_fin);

        // no FIN requested yet, nothing more to send
        assert!(stream.check_out(&mut buffer, u64::MAX).is_none());

        stream.producer().mark_end_of_data().unwrap();
        let out = stream.check_out(&mut buffer, u64::MAX).unwrap();
        assert_eq!(out, CheckedOut { offset: 5, len: 0, is_fin: true, newly_sent: 0 });
        assert!(stream.state().is_data_sent());

        // the FIN is in flight; nothing further is emitted
        assert!(stream.check_out(&mut buffer, u64::MAX).is_none());

        stream.on_ack(0, 5, false);
        stream.on_ack(5, 0, true);
        assert!(stream.state().is_data_received());
    }

    #[test]
    fn flow_control_limits_range_test() {
        let id = StreamId::initial(endpoint::Type::Client, StreamType::Unidirectional);
        let mut stream = SendStream::new(id, 4);
        enqueue(&mut stream, b"too much data");

        assert_eq!(stream.get_next_sendable_range(), (0, 4));
        assert!(!stream.is_blocked());

        let mut buffer = [0u8; 1200];
        let out = stream.check_out(&mut buffer, u64::MAX).unwrap();
        assert_eq!(out.len, 4);
        assert!(stream.is_blocked());

        stream.on_max_stream_data(8);
        assert_eq!(stream.get_next_sendable_range(), (4, 4));
        stream.assert_range_invariants();
    }

    #[test]
    fn loss_returns_bytes_to_pending_test() {
        let mut stream = stream();
        enqueue(&mut stream, &[7u8; 100]);

        let mut buffer = [0u8; 40];
        let first = stream.check_out(&mut buffer, u64::MAX).unwrap();
        assert_eq!((first.offset, first.len), (0, 40));
        let second = stream.check_out(&mut buffer, u64::MAX).unwrap();
        assert_eq!((second.offset, second.len), (40, 40));
        stream.assert_range_invariants();

        // the second packet is acked, the first is lost
        stream.on_ack(40, 40, false);
        stream.on_lost(0, 40, false);
        stream.assert_range_invariants();

        // the lost range is sendable again
        assert_eq!(stream.get_next_sendable_range(), (0, 40));

        let retransmit = stream.check_out(&mut buffer, u64::MAX).unwrap();
        assert_eq!((retransmit.offset, retransmit.len), (0, 40));
        stream.assert_range_invariants();
    }

    #[test]
    fn stop_sending_queues_reset_test() {
        let mut stream = stream();
        enqueue(&mut stream, b"discarded");
        let mut buffer = [0u8; 4];
        stream.check_out(&mut buffer, u64::MAX).unwrap();

        stream.on_stop_sending(application::Error::new(VarInt::from_u8(15)));

        let (error, final_size) = stream.reset_to_send().unwrap();
        assert_eq!(error, application::Error::new(VarInt::from_u8(15)));
        assert_eq!(final_size, 4);

        // no data is sendable while the reset is queued
        assert!(stream.check_out(&mut buffer, u64::MAX).is_none());

        stream.on_reset_sent();
        assert!(stream.state().is_reset_sent());

        stream.on_reset_lost();
        assert!(stream.state().is_reset_queued());
        stream.on_reset_sent();

        stream.on_reset_acked();
        assert!(stream.state().is_terminal());
    }

    #[test]
    fn chunk_release_on_ack_test() {
        use crate::stream::chunks::{CHUNK_SIZE, MAX_HELD_CHUNKS};

        let mut stream = stream();
        let producer = stream.producer();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        // saturate the producer
        let bytes = vec![0u8; CHUNK_SIZE * MAX_HELD_CHUNKS];
        assert_eq!(
            producer.poll_enqueue(&mut cx, &bytes),
            Poll::Ready(Ok(bytes.len()))
        );
        assert_eq!(producer.poll_enqueue(&mut cx, &[1]), Poll::Pending);

        // send and ack the first chunk; its slab returns to the pool
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let out = stream.check_out(&mut buffer, u64::MAX).unwrap();
        assert_eq!(out.len, CHUNK_SIZE);
        stream.on_ack(0, CHUNK_SIZE, false);

        assert_eq!(producer.poll_enqueue(&mut cx, &[1]), Poll::Ready(Ok(1)));
        stream.assert_range_invariants();
    }
}
