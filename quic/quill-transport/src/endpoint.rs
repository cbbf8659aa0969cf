// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Binds one or more connections to a UDP endpoint.
//!
//! The I/O loop owns the socket: it reads datagrams and hands them in via
//! [`Endpoint::on_datagram_received`], and it calls [`Endpoint::on_timeout`]
//! and [`Endpoint::on_wake`] when the scheduled deadline or an application
//! wake-up fires. The endpoint dispatches to connections by destination
//! connection id and pushes outgoing datagrams through the
//! [`SocketContext`].

use crate::connection::Connection;
use hashbrown::HashMap;
use quill_core::{connection::ConnectionId, time::Timestamp};
use std::net::SocketAddr;
use tracing::trace;

/// The collaborator wrapping the UDP socket and the worker's scheduler.
///
/// No reliability, ordering, or fragmentation guarantees are assumed.
pub trait SocketContext {
    /// Queues one UDP datagram for transmission
    fn send_to(&mut self, payload: &[u8], peer: SocketAddr);

    /// Requests a callback at `timestamp`
    fn schedule_at(&mut self, timestamp: Timestamp);

    /// Signals the worker to run the endpoint soon
    fn wake(&mut self);
}

/// The largest UDP payload this endpoint emits
pub const MAX_DATAGRAM_LEN: usize = 1500;

struct Entry {
    connection: Connection,
    peer: SocketAddr,
}

pub struct Endpoint<Ctx: SocketContext> {
    context: Ctx,
    connections: Vec<Entry>,
    by_id: HashMap<ConnectionId, usize>,
    /// The length of connection ids issued by this endpoint
    local_connection_id_len: usize,
}

impl<Ctx: SocketContext> Endpoint<Ctx> {
    pub fn new(context: Ctx, local_connection_id_len: usize) -> Self {
        Self {
            context,
            connections: Vec::new(),
            by_id: HashMap::new(),
            local_connection_id_len,
        }
    }

    #[inline]
    pub fn context_mut(&mut self) -> &mut Ctx {
        &mut self.context
    }

    /// Registers a connection and indexes it by its local connection id
    pub fn insert(&mut self, connection: Connection, peer: SocketAddr) {
        let id = *connection.local_connection_id();
        let index = self.connections.len();
        self.connections.push(Entry { connection, peer });
        self.by_id.insert(id, index);
    }

    pub fn connection_mut(&mut self, id: &ConnectionId) -> Option<&mut Connection> {
        let index = *self.by_id.get(id)?;
        Some(&mut self.connections[index].connection)
    }

    /// Extracts the destination connection id from the first packet of a
    /// datagram
    fn destination_id(&self, datagram: &[u8]) -> Option<ConnectionId> {
        let first = *datagram.first()?;

        let id = if first & quill_core::packet::FORM_BIT != 0 {
            // long header: version(4) + dcid len(1) + dcid
            let len = *datagram.get(5)? as usize;
            ConnectionId::try_from_slice(datagram.get(6..6 + len)?).ok()?
        } else {
            ConnectionId::try_from_slice(datagram.get(1..1 + self.local_connection_id_len)?)
                .ok()?
        };

        Some(id)
    }

    /// Dispatches one received UDP datagram
    pub fn on_datagram_received(
        &mut self,
        now: Timestamp,
        peer: SocketAddr,
        datagram: &mut [u8],
    ) {
        let id = match self.destination_id(datagram) {
            Some(id) => id,
            None => {
                trace!("dropping datagram without a parsable connection id");
                return;
            }
        };

        let index = match self.by_id.get(&id) {
            Some(index) => *index,
            None => {
                // an unknown id may still belong to a connection identified
                // by its peer address (client connections before the server
                // echoes their id)
                match self
                    .connections
                    .iter()
                    .position(|entry| entry.peer == peer)
                {
                    Some(index) => index,
                    None => {
                        trace!(?id, "dropping datagram for an unknown connection");
                        return;
                    }
                }
            }
        };

        self.connections[index]
            .connection
            .on_datagram_received(now, datagram);

        self.flush(now);
    }

    /// Runs expired connection timers
    pub fn on_timeout(&mut self, now: Timestamp) {
        for entry in &mut self.connections {
            entry.connection.on_timeout(now);
        }
        self.flush(now);
    }

    /// An application enqueued data, aborted, or read; drive the send path
    pub fn on_wake(&mut self, now: Timestamp) {
        self.flush(now);
    }

    /// Transmits every pending datagram and schedules the next deadline
    fn flush(&mut self, now: Timestamp) {
        let mut buf = [0u8; MAX_DATAGRAM_LEN];

        for entry in &mut self.connections {
            loop {
                let len = entry.connection.on_transmit(now, &mut buf);
                if len == 0 {
                    break;
                }
                self.context.send_to(&buf[..len], entry.peer);
            }
        }

        let next = self
            .connections
            .iter()
            .filter_map(|entry| entry.connection.next_expiration())
            .min();
        if let Some(deadline) = next {
            self.context.schedule_at(deadline);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::TestSession;
    use core::time::Duration;
    use quill_core::{
        time::{testing::MockClock, Clock},
        transport::parameters::TransportParameters,
        varint::VarInt,
    };
    use quill_codec::EncoderValue;

    #[derive(Default)]
    struct LoopbackContext {
        sent: Vec<(Vec<u8>, SocketAddr)>,
        scheduled: Option<Timestamp>,
    }

    impl SocketContext for LoopbackContext {
        fn send_to(&mut self, payload: &[u8], peer: SocketAddr) {
            self.sent.push((payload.to_vec(), peer));
        }

        fn schedule_at(&mut self, timestamp: Timestamp) {
            self.scheduled = Some(timestamp);
        }

        fn wake(&mut self) {}
    }

    fn parameters() -> TransportParameters {
        TransportParameters {
            initial_max_data: VarInt::from_u32(1 << 20),
            initial_max_stream_data_bidi_local: VarInt::from_u32(1 << 16),
            initial_max_stream_data_bidi_remote: VarInt::from_u32(1 << 16),
            initial_max_stream_data_uni: VarInt::from_u32(1 << 16),
            initial_max_streams_bidi: VarInt::from_u32(16),
            initial_max_streams_uni: VarInt::from_u32(16),
            ..Default::default()
        }
    }

    #[test]
    fn dispatch_and_schedule_test() {
        let clock = MockClock::new();
        let now = clock.get_time();
        let mut endpoint = Endpoint::new(LoopbackContext::default(), 4);

        let parameters = parameters();
        let tls = TestSession::new_client(parameters.encode_to_vec());
        let client = Connection::new_client(
            Box::new(tls),
            parameters,
            ConnectionId::try_from_slice(&[1, 1, 1, 1]).unwrap(),
            ConnectionId::try_from_slice(&[9, 9, 9, 9, 9, 9, 9, 9]).unwrap(),
        )
        .unwrap();

        let peer: SocketAddr = "127.0.0.1:4433".parse().unwrap();
        endpoint.insert(client, peer);

        // waking the endpoint emits the client's first flight
        endpoint.on_wake(now);
        let sent = core::mem::take(&mut endpoint.context_mut().sent);
        assert_eq!(sent.len(), 1);
        let (datagram, to) = &sent[0];
        assert_eq!(*to, peer);
        // the initial datagram is padded to the minimum
        assert!(datagram.len() >= 1200);

        // a pto deadline was scheduled
        let scheduled = endpoint.context_mut().scheduled.unwrap();
        assert!(scheduled > now);

        // garbage datagrams are dropped without panicking
        let unknown: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let mut garbage = [0u8; 8];
        endpoint.on_datagram_received(now + Duration::from_millis(1), unknown, &mut garbage);
    }
}
