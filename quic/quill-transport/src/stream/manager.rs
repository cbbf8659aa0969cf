// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::stream::{ReceiveStream, SendStream};
use atomic_waker::AtomicWaker;
use core::task::{Context, Poll};
use hashbrown::{HashMap, HashSet};
use quill_core::{
    endpoint,
    stream::{StreamId, StreamType},
    transport::{self, parameters::TransportParameters},
};
use std::collections::VecDeque;

/// One entry in the stream map; bidirectional streams own both halves
#[derive(Debug, Default)]
pub struct StreamEntry {
    pub send: Option<SendStream>,
    pub recv: Option<ReceiveStream>,
}

impl StreamEntry {
    fn is_terminal(&self) -> bool {
        let send_done = self
            .send
            .as_ref()
            .map_or(true, |send| send.state().is_terminal());
        let recv_done = self
            .recv
            .as_ref()
            .map_or(true, |recv| recv.state().is_terminal());
        send_done && recv_done
    }
}

fn type_index(stream_type: StreamType) -> usize {
    match stream_type {
        StreamType::Bidirectional => 0,
        StreamType::Unidirectional => 1,
    }
}

/// The stream registry: the id to stream mapping, creation limits, the
/// accept queue, and the flush/update schedulers.
///
/// Streams are stored by id so the connection and its streams never hold
/// references to each other.
#[derive(Debug)]
pub struct StreamManager {
    local_endpoint: endpoint::Type,

    streams: HashMap<StreamId, StreamEntry>,

    /// Remote-initiated streams not yet claimed by the application
    accept_queue: VecDeque<StreamId>,
    accept_waker: AtomicWaker,

    /// Streams with sendable bytes or an unacked FIN, in round-robin order
    flushable: VecDeque<StreamId>,
    flushable_set: HashSet<StreamId>,

    /// Streams owing MAX_STREAM_DATA, STOP_SENDING, or RESET_STREAM
    updates: VecDeque<StreamId>,
    update_set: HashSet<StreamId>,

    /// Locally opened streams per type
    local_opened: [u64; 2],
    /// Remotely opened streams per type
    remote_opened: [u64; 2],
    /// Fully closed remote streams per type; drives MAX_STREAMS windows
    remote_closed: [u64; 2],

    /// How many streams the peer allows us to open
    peer_max_streams: [u64; 2],
    /// How many streams we allow the peer to open (advertised)
    local_max_streams: [u64; 2],
    /// The per-type window used when re-advertising MAX_STREAMS
    local_streams_window: [u64; 2],

    local_parameters: TransportParameters,
    peer_parameters: TransportParameters,
}

impl StreamManager {
    pub fn new(local_endpoint: endpoint::Type, local_parameters: TransportParameters) -> Self {
        let local_max_streams = [
            local_parameters.initial_max_streams_bidi.as_u64(),
            local_parameters.initial_max_streams_uni.as_u64(),
        ];

        Self {
            local_endpoint,
            streams: HashMap::new(),
            accept_queue: VecDeque::new(),
            accept_waker: AtomicWaker::new(),
            flushable: VecDeque::new(),
            flushable_set: HashSet::new(),
            updates: VecDeque::new(),
            update_set: HashSet::new(),
            local_opened: [0; 2],
            remote_opened: [0; 2],
            remote_closed: [0; 2],
            peer_max_streams: [0; 2],
            local_max_streams,
            local_streams_window: local_max_streams,
            local_parameters,
            peer_parameters: TransportParameters::default(),
        }
    }

    /// Installs the peer's transport parameters, lifting the limits of
    /// every stream opened before the handshake delivered them
    pub fn on_peer_parameters(&mut self, peer: &TransportParameters) {
        self.peer_parameters = peer.clone();
        self.on_max_streams(StreamType::Bidirectional, peer.initial_max_streams_bidi.as_u64());
        self.on_max_streams(StreamType::Unidirectional, peer.initial_max_streams_uni.as_u64());

        let ids: Vec<_> = self.streams.keys().copied().collect();
        for id in ids {
            let limit = self.send_limit_for(id);
            if let Some(send) = self.streams.get_mut(&id).and_then(|e| e.send.as_mut()) {
                send.on_max_stream_data(limit);
            }
        }
    }

    /// The peer raised a stream count limit; limits never shrink
    pub fn on_max_streams(&mut self, stream_type: StreamType, maximum_streams: u64) {
        let index = type_index(stream_type);
        self.peer_max_streams[index] = self.peer_max_streams[index].max(maximum_streams);
    }

    /// The initial flow control limit for the send half of `id`
    fn send_limit_for(&self, id: StreamId) -> u64 {
        let peer = &self.peer_parameters;
        match (id.stream_type(), id.initiator() == self.local_endpoint) {
            (StreamType::Unidirectional, _) => peer.initial_max_stream_data_uni.as_u64(),
            // our streams are "remote" from the peer's point of view
            (StreamType::Bidirectional, true) => {
                peer.initial_max_stream_data_bidi_remote.as_u64()
            }
            (StreamType::Bidirectional, false) => {
                peer.initial_max_stream_data_bidi_local.as_u64()
            }
        }
    }

    /// The initial flow control limit we advertise for the receive half of
    /// `id`
    fn recv_limit_for(&self, id: StreamId) -> u64 {
        let local = &self.local_parameters;
        match (id.stream_type(), id.initiator() == self.local_endpoint) {
            (StreamType::Unidirectional, _) => local.initial_max_stream_data_uni.as_u64(),
            (StreamType::Bidirectional, true) => {
                local.initial_max_stream_data_bidi_local.as_u64()
            }
            (StreamType::Bidirectional, false) => {
                local.initial_max_stream_data_bidi_remote.as_u64()
            }
        }
    }

    fn insert_stream(&mut self, id: StreamId) {
        let mut entry = StreamEntry::default();

        if id.is_sendable(self.local_endpoint) {
            entry.send = Some(SendStream::new(id, self.send_limit_for(id)));
        }
        if id.is_receivable(self.local_endpoint) {
            entry.recv = Some(ReceiveStream::new(id, self.recv_limit_for(id)));
        }

        self.streams.insert(id, entry);
    }

    /// Opens a locally initiated stream.
    ///
    /// Returns `None` when the peer's stream limit is reached; the caller
    /// should announce STREAMS_BLOCKED and retry after MAX_STREAMS.
    pub fn open(&mut self, stream_type: StreamType) -> Option<StreamId> {
        let index = type_index(stream_type);

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#4.5
        //# An endpoint MUST NOT open more streams than permitted by the
        //# current stream limit set by its peer.
        if self.local_opened[index] >= self.peer_max_streams[index] {
            return None;
        }

        let id = StreamId::nth(self.local_endpoint, stream_type, self.local_opened[index])?;
        self.local_opened[index] += 1;
        self.insert_stream(id);
        Some(id)
    }

    /// Returns the stream for a remote reference, creating it and every
    /// lower-indexed stream of the same type on first sight.
    ///
    //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#3.2
    //# Before a stream is created, all streams of the same type
    //# with lower-numbered stream IDs MUST be created.
    pub fn on_remote_reference(&mut self, id: StreamId) -> Result<(), transport::Error> {
        let index = type_index(id.stream_type());

        if id.initiator() == self.local_endpoint {
            // a peer reference to one of our streams never creates it
            return Ok(());
        }

        let required = id.index() + 1;

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#4.5
        //# Endpoints MUST NOT exceed the limit set by their peer.  An endpoint
        //# that receives a frame with a stream ID exceeding the limit it has
        //# sent MUST treat this as a connection error of type
        //# STREAM_LIMIT_ERROR
        if required > self.local_max_streams[index] {
            return Err(transport::Error::STREAM_LIMIT_ERROR
                .with_reason("peer exceeded the advertised stream limit"));
        }

        while self.remote_opened[index] < required {
            let id = StreamId::nth(
                self.local_endpoint.peer_type(),
                id.stream_type(),
                self.remote_opened[index],
            )
            .expect("stream indexes below the limit are representable");
            self.remote_opened[index] += 1;
            self.insert_stream(id);
            self.accept_queue.push_back(id);
        }

        if !self.accept_queue.is_empty() {
            self.accept_waker.wake();
        }

        Ok(())
    }

    #[inline]
    pub fn contains(&self, id: StreamId) -> bool {
        self.streams.contains_key(&id)
    }

    #[inline]
    pub fn send_stream_mut(&mut self, id: StreamId) -> Option<&mut SendStream> {
        self.streams.get_mut(&id).and_then(|entry| entry.send.as_mut())
    }

    #[inline]
    pub fn recv_stream_mut(&mut self, id: StreamId) -> Option<&mut ReceiveStream> {
        self.streams.get_mut(&id).and_then(|entry| entry.recv.as_mut())
    }

    /// Accepts the next remote-initiated stream
    pub fn poll_accept(&mut self, cx: &mut Context) -> Poll<StreamId> {
        if let Some(id) = self.accept_queue.pop_front() {
            return Poll::Ready(id);
        }

        self.accept_waker.register(cx.waker());

        match self.accept_queue.pop_front() {
            Some(id) => Poll::Ready(id),
            None => Poll::Pending,
        }
    }

    /// Marks a stream as having sendable data or an unacked FIN
    pub fn schedule_flush(&mut self, id: StreamId) {
        if self.update_membership(id) && self.flushable_set.insert(id) {
            self.flushable.push_back(id);
        }
    }

    /// Pops the next flushable stream in round-robin order
    pub fn next_flushable(&mut self) -> Option<StreamId> {
        let id = self.flushable.pop_front()?;
        self.flushable_set.remove(&id);
        Some(id)
    }

    /// Marks a stream as owing MAX_STREAM_DATA, STOP_SENDING, or
    /// RESET_STREAM
    pub fn schedule_update(&mut self, id: StreamId) {
        if self.update_membership(id) && self.update_set.insert(id) {
            self.updates.push_back(id);
        }
    }

    pub fn next_update(&mut self) -> Option<StreamId> {
        let id = self.updates.pop_front()?;
        self.update_set.remove(&id);
        Some(id)
    }

    #[inline]
    pub fn has_flushable(&self) -> bool {
        !self.flushable.is_empty()
    }

    #[inline]
    pub fn has_updates(&self) -> bool {
        !self.updates.is_empty()
    }

    fn update_membership(&mut self, id: StreamId) -> bool {
        self.streams.contains_key(&id)
    }

    /// Drops a stream once both halves are terminal.
    ///
    /// Remote streams additionally widen the advertised MAX_STREAMS window.
    pub fn remove_if_terminal(&mut self, id: StreamId) {
        let terminal = self
            .streams
            .get(&id)
            .map_or(false, |entry| entry.is_terminal());
        if !terminal {
            return;
        }

        self.streams.remove(&id);
        self.flushable_set.remove(&id);
        self.update_set.remove(&id);

        if id.initiator() != self.local_endpoint {
            self.remote_closed[type_index(id.stream_type())] += 1;
        }
    }

    /// Advances the advertised stream limit once half the window of remote
    /// streams has been consumed and closed.
    ///
    /// Returns the new limit to put in a MAX_STREAMS frame.
    pub fn max_streams_update(&mut self, stream_type: StreamType) -> Option<u64> {
        let index = type_index(stream_type);
        let window = self.local_streams_window[index];
        if window == 0 {
            return None;
        }

        let remaining = self.local_max_streams[index] - self.remote_opened[index];
        if remaining >= window / 2 {
            return None;
        }

        let limit = self.remote_closed[index] + window;
        if limit <= self.local_max_streams[index] {
            return None;
        }

        self.local_max_streams[index] = limit;
        Some(limit)
    }

    /// Returns `true` if opening a stream of `stream_type` is currently
    /// blocked on the peer's limit
    pub fn is_open_blocked(&self, stream_type: StreamType) -> bool {
        let index = type_index(stream_type);
        self.local_opened[index] >= self.peer_max_streams[index]
    }

    /// The peer's current limit for `stream_type`, for STREAMS_BLOCKED
    pub fn peer_max_streams(&self, stream_type: StreamType) -> u64 {
        self.peer_max_streams[type_index(stream_type)]
    }

    /// Iterates over every stream id currently tracked
    pub fn ids(&self) -> Vec<StreamId> {
        self.streams.keys().copied().collect()
    }
}
