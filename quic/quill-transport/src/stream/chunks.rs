// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The producer side of a send stream.
//!
//! Application bytes are staged in fixed-size pooled slabs. The producer
//! fills a private tail slab and publishes it to the connection through a
//! single-producer/single-consumer queue; the connection returns slabs to
//! the pool once every byte they carried has been acknowledged. Back
//! pressure is a bound on outstanding slabs, enforced with a waker rather
//! than a blocking semaphore.

use crate::stream::StreamError;
use atomic_waker::AtomicWaker;
use bytes::{BufMut, BytesMut};
use core::task::{Context, Poll};
use quill_core::application;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

/// The size of one pooled slab
pub const CHUNK_SIZE: usize = 4096;

/// The maximum number of slabs a producer may have outstanding before it is
/// suspended
pub const MAX_HELD_CHUNKS: usize = 19;

/// A contiguous run of stream bytes backed by one pooled slab
#[derive(Debug)]
pub struct Chunk {
    /// The stream offset of the first byte
    pub offset: u64,
    pub data: BytesMut,
}

impl Chunk {
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset + self.data.len() as u64
    }
}

#[derive(Debug, Default)]
struct State {
    /// Published, producer-visible-no-more chunks in offset order
    chunks: VecDeque<Chunk>,
    /// The partially filled tail slab, owned by the producer
    tail: Option<Chunk>,
    /// Recycled slabs
    pool: Vec<BytesMut>,
    /// Slabs currently outstanding (tail, queued, and connection-held)
    held_chunks: usize,
    /// Total bytes accepted from the producer
    written: u64,
    /// Set once by `mark_end_of_data`
    size_known: bool,
    /// Set once by `request_abort`
    reset: Option<application::Error>,
}

/// The channel shared between a stream's producer handle and the
/// connection worker.
///
/// The mutex guards only short queue manipulations; neither side ever
/// suspends while holding it.
#[derive(Debug, Default)]
pub struct ChunkQueue {
    state: Mutex<State>,
    /// Wakes the producer when back pressure releases
    producer: AtomicWaker,
}

impl ChunkQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Appends bytes from the producer, publishing slabs as they fill.
    ///
    /// Returns the number of bytes accepted; suspends the producer when
    /// [`MAX_HELD_CHUNKS`] slabs are outstanding.
    pub fn poll_enqueue(
        &self,
        cx: &mut Context,
        bytes: &[u8],
    ) -> Poll<Result<usize, StreamError>> {
        let mut state = self.state.lock().unwrap();

        if let Some(error) = state.reset {
            return Poll::Ready(Err(StreamError::StreamAborted(error)));
        }

        if state.size_known {
            return Poll::Ready(Err(StreamError::SendAfterFinish));
        }

        if bytes.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let mut accepted = 0;
        while accepted < bytes.len() {
            if state.tail.is_none() {
                if state.held_chunks >= MAX_HELD_CHUNKS {
                    break;
                }

                let data = state.pool.pop().unwrap_or_else(|| {
                    BytesMut::with_capacity(CHUNK_SIZE)
                });
                state.held_chunks += 1;
                state.tail = Some(Chunk {
                    offset: state.written,
                    data,
                });
            }

            let tail = state.tail.as_mut().expect("tail was just installed");
            let available = CHUNK_SIZE - tail.data.len();
            let len = available.min(bytes.len() - accepted);
            tail.data.put_slice(&bytes[accepted..accepted + len]);
            let tail_len = tail.data.len();
            accepted += len;
            state.written += len as u64;

            if tail_len == CHUNK_SIZE {
                let full = state.tail.take().expect("tail is full");
                state.chunks.push_back(full);
            }
        }

        if accepted == 0 {
            self.producer.register(cx.waker());

            // check the queue again in case the consumer drained between the
            // lock and the registration
            if state.held_chunks >= MAX_HELD_CHUNKS && state.reset.is_none() {
                return Poll::Pending;
            }

            drop(state);
            return self.poll_enqueue(cx, bytes);
        }

        Poll::Ready(Ok(accepted))
    }

    /// Publishes the partially filled tail so buffered bytes become
    /// sendable
    pub fn flush(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(tail) = state.tail.take() {
            if tail.data.is_empty() {
                state.held_chunks -= 1;
                let data = tail.data;
                state.pool.push(data);
            } else {
                state.chunks.push_back(tail);
            }
        }
    }

    /// Marks the end of the stream; all later enqueues fail
    pub fn mark_end_of_data(&self) -> Result<(), StreamError> {
        let mut state = self.state.lock().unwrap();

        if let Some(error) = state.reset {
            return Err(StreamError::StreamAborted(error));
        }

        if state.size_known {
            return Err(StreamError::SendAfterFinish);
        }

        state.size_known = true;
        if let Some(tail) = state.tail.take() {
            if tail.data.is_empty() {
                state.held_chunks -= 1;
                let data = tail.data;
                state.pool.push(data);
            } else {
                state.chunks.push_back(tail);
            }
        }

        Ok(())
    }

    /// Requests an abort: drops the in-progress tail, releases a suspended
    /// producer, and records the error. Idempotent.
    pub fn request_abort(&self, error: application::Error) {
        let mut state = self.state.lock().unwrap();

        if state.reset.is_some() {
            return;
        }
        state.reset = Some(error);

        if let Some(tail) = state.tail.take() {
            state.held_chunks -= 1;
            let mut data = tail.data;
            data.clear();
            state.pool.push(data);
        }

        drop(state);
        self.producer.wake();
    }

    /// Consumer side: drains published chunks and observes the producer
    /// counters. Never suspends.
    pub fn drain(&self) -> Drained {
        let mut state = self.state.lock().unwrap();

        Drained {
            chunks: core::mem::take(&mut state.chunks),
            written: state.written,
            size_known: state.size_known,
            reset: state.reset,
        }
    }

    /// Consumer side: returns a fully acknowledged slab to the pool and
    /// releases a producer suspended on back pressure
    pub fn release(&self, mut data: BytesMut) {
        let mut state = self.state.lock().unwrap();
        data.clear();
        state.held_chunks -= 1;
        state.pool.push(data);
        drop(state);

        self.producer.wake();
    }
}

/// The consumer's view of one `drain` call
#[derive(Debug)]
pub struct Drained {
    pub chunks: VecDeque<Chunk>,
    pub written: u64,
    pub size_known: bool,
    pub reset: Option<application::Error>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_test::task::{new_count_waker, panic_waker};

    fn ready_cx() -> Context<'static> {
        // the waker is only invoked on suspension paths
        Context::from_waker(Box::leak(Box::new(panic_waker())))
    }

    #[test]
    fn enqueue_publishes_full_chunks_test() {
        let queue = ChunkQueue::new();
        let mut cx = ready_cx();

        let bytes = vec![3u8; CHUNK_SIZE + 10];
        assert_eq!(
            queue.poll_enqueue(&mut cx, &bytes),
            Poll::Ready(Ok(CHUNK_SIZE + 10))
        );

        let drained = queue.drain();
        assert_eq!(drained.chunks.len(), 1);
        assert_eq!(drained.chunks[0].offset, 0);
        assert_eq!(drained.chunks[0].data.len(), CHUNK_SIZE);
        assert_eq!(drained.written, (CHUNK_SIZE + 10) as u64);

        // the partial tail is not visible until flushed
        queue.flush();
        let drained = queue.drain();
        assert_eq!(drained.chunks.len(), 1);
        assert_eq!(drained.chunks[0].offset, CHUNK_SIZE as u64);
        assert_eq!(drained.chunks[0].data.len(), 10);
    }

    #[test]
    fn back_pressure_test() {
        let queue = ChunkQueue::new();
        let (waker, count) = new_count_waker();
        let mut cx = Context::from_waker(&waker);

        // fill the maximum number of slabs
        let bytes = vec![0u8; CHUNK_SIZE * MAX_HELD_CHUNKS];
        assert_eq!(
            queue.poll_enqueue(&mut cx, &bytes),
            Poll::Ready(Ok(bytes.len()))
        );

        // the next byte suspends
        assert_eq!(queue.poll_enqueue(&mut cx, &[1]), Poll::Pending);
        assert_eq!(count, 0);

        // releasing any slab wakes the producer and accepts the byte
        let mut drained = queue.drain();
        let chunk = drained.chunks.pop_front().unwrap();
        queue.release(chunk.data);
        assert_eq!(count, 1);
        assert_eq!(queue.poll_enqueue(&mut cx, &[1]), Poll::Ready(Ok(1)));
    }

    #[test]
    fn abort_releases_producer_test() {
        let queue = ChunkQueue::new();
        let (waker, count) = new_count_waker();
        let mut cx = Context::from_waker(&waker);

        let bytes = vec![0u8; CHUNK_SIZE * MAX_HELD_CHUNKS];
        assert_eq!(
            queue.poll_enqueue(&mut cx, &bytes),
            Poll::Ready(Ok(bytes.len()))
        );
        assert_eq!(queue.poll_enqueue(&mut cx, &[1]), Poll::Pending);

        queue.request_abort(application::Error::new(7u8.into()));
        assert_eq!(count, 1);

        // the producer observes the abort on its next call
        assert!(matches!(
            queue.poll_enqueue(&mut cx, &[1]),
            Poll::Ready(Err(StreamError::StreamAborted(_)))
        ));
    }

    #[test]
    fn end_of_data_test() {
        let queue = ChunkQueue::new();
        let mut cx = ready_cx();

        assert_eq!(queue.poll_enqueue(&mut cx, b"final"), Poll::Ready(Ok(5)));
        queue.mark_end_of_data().unwrap();

        // the tail is published by the fin
        let drained = queue.drain();
        assert_eq!(drained.chunks.len(), 1);
        assert!(drained.size_known);

        // writing after the fin is a programming error
        assert!(matches!(
            queue.poll_enqueue(&mut cx, b"more"),
            Poll::Ready(Err(StreamError::SendAfterFinish))
        ));
        assert!(queue.mark_end_of_data().is_err());
    }
}
