// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The per-connection state machine: the receive and send pipelines, the
//! handshake driver, key updates, and the closing/draining lifecycle.

#[cfg(any(test, feature = "testing"))]
pub mod testing;


use crate::{
    recovery::{Restitution, SentPacket},
    space::{packet_type_for, KeySet, PacketSpace},
    stream::{chunks::ChunkQueue, StreamError, StreamManager},
};
use core::{
    task::{Context, Poll},
    time::Duration,
};
use quill_core::{
    application,
    connection::ConnectionId,
    crypto::{
        self,
        tls::{self, CipherSuite},
        Level,
    },
    endpoint,
    frame::{self, FrameMut},
    packet::{
        self,
        number::{PacketNumber, PacketNumberLen, PacketNumberSpace},
        KeyPhase, PacketType, ProtectedHeader,
    },
    recovery::{CongestionController, RttEstimator},
    state::{event, is},
    stream::{StreamId, StreamType},
    time::{Timer, Timestamp},
    transport::{self, parameters::TransportParameters},
    varint::VarInt,
};
use quill_crypto::{initial_seals, Seal};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, trace};

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#14
//# A client MUST expand the payload of all UDP datagrams carrying
//# Initial packets to at least 1200 bytes

const MIN_INITIAL_DATAGRAM_LEN: usize = 1200;

/// The hard ceiling on any packet we emit
const MAX_PACKET_LEN: usize = (1 << 14) - 1;

/// Bytes of payload that must follow the packet number so the header
/// protection sample never runs past the packet
const MIN_SAMPLE_PAYLOAD: usize = 4;

/// Accesses a packet space through direct field projection so sibling
/// fields (rtt, congestion) can be borrowed at the same time
macro_rules! space_mut {
    ($self:ident, $space_id:expr) => {
        match $space_id {
            PacketNumberSpace::Initial => $self.initial_space.as_mut(),
            PacketNumberSpace::Handshake => $self.handshake_space.as_mut(),
            PacketNumberSpace::ApplicationData => Some(&mut $self.application_space),
        }
    };
}
pub(crate) use space_mut;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum State {
    /// The handshake is still in progress
    #[default]
    Handshaking,
    Connected,
    /// A local close; only CONNECTION_CLOSE may be sent
    Closing,
    /// A peer close; nothing may be sent
    Draining,
    Closed,
}

impl State {
    is!(is_closing, Closing);
    is!(is_closed, Closed);
    is!(is_open, Handshaking | Connected);

    event! {
        on_handshake_complete(Handshaking => Connected);
        on_close(Handshaking | Connected => Closing);
        on_peer_close(Handshaking | Connected | Closing => Draining);
        on_drain_complete(Closing | Draining => Closed);
    }
}

/// Records what to send in CONNECTION_CLOSE frames while closing
#[derive(Clone, Debug)]
struct CloseReason {
    error_code: VarInt,
    frame_type: Option<VarInt>,
    reason: &'static str,
}

impl From<transport::Error> for CloseReason {
    fn from(error: transport::Error) -> Self {
        Self {
            error_code: error.code,
            frame_type: Some(error.frame_type.unwrap_or(VarInt::ZERO)),
            reason: error.reason,
        }
    }
}

/// Collects the callbacks of one `do_handshake` call so they can be applied
/// to the connection after the TLS session releases its borrow
#[derive(Default)]
struct HandshakeOutput {
    secrets: Vec<(Level, CipherSuite, Vec<u8>, Vec<u8>)>,
    data: Vec<(Level, Vec<u8>)>,
}

impl tls::Context for HandshakeOutput {
    fn on_secrets(
        &mut self,
        level: Level,
        cipher_suite: CipherSuite,
        read_secret: &[u8],
        write_secret: &[u8],
    ) {
        self.secrets
            .push((level, cipher_suite, read_secret.to_vec(), write_secret.to_vec()));
    }

    fn on_handshake_data(&mut self, level: Level, data: &[u8]) {
        self.data.push((level, data.to_vec()));
    }

    fn on_flush(&mut self) {}
}

pub struct Connection {
    local_endpoint: endpoint::Type,
    state: State,

    tls: Box<dyn tls::Session>,
    handshake_complete: bool,
    handshake_confirmed: bool,
    /// Server only: an ACK arrived in the handshake space
    handshake_ack_received: bool,
    peer_parameters_applied: bool,

    local_connection_id: ConnectionId,
    peer_connection_id: ConnectionId,
    /// Client only: still waiting for the server's chosen connection id
    peer_connection_id_is_provisional: bool,

    initial_space: Option<PacketSpace>,
    handshake_space: Option<PacketSpace>,
    application_space: PacketSpace,
    key_set: KeySet,

    streams: StreamManager,

    local_parameters: TransportParameters,
    peer_parameters: TransportParameters,

    /// Connection-level flow control
    local_max_data: u64,
    local_max_data_window: u64,
    total_received: u64,
    peer_max_data: u64,
    total_sent: u64,

    rtt: RttEstimator,
    congestion: CongestionController,
    pto_backoff: u32,
    pto_timer: Timer,
    /// A PTO fired; the next packet may ignore the congestion window
    probe_pending: bool,

    idle_timer: Timer,
    idle_timeout: Option<Duration>,
    ack_eliciting_sent_since_last_receive: bool,

    close: Option<CloseReason>,
    close_timer: Timer,
    /// A packet arrived while closing; repeat the close frame
    close_resend: bool,

    // pending control frames
    handshake_done_pending: bool,
    max_data_pending: bool,
    max_streams_pending: [Option<u64>; 2],
    data_blocked_pending: bool,
    streams_blocked_pending: [bool; 2],
    path_response_pending: Option<[u8; 8]>,

    /// Tokens received in NEW_TOKEN frames, surfaced to the endpoint
    received_tokens: Vec<Vec<u8>>,
    /// Passive NEW_CONNECTION_ID table: `(sequence, id, reset token)`
    peer_connection_ids: Vec<(u64, ConnectionId, [u8; 16])>,

    /// Connection ids this endpoint issued to the peer; sequence zero is
    /// the handshake id
    local_connection_ids: Vec<IssuedConnectionId>,
    next_connection_id_sequence: u64,
    /// Issued sequences still owing a NEW_CONNECTION_ID frame
    new_connection_ids_pending: Vec<u64>,
    /// Peer-issued sequences still owing a RETIRE_CONNECTION_ID frame
    retirements_pending: Vec<u64>,
}

/// One connection id announced to the peer
struct IssuedConnectionId {
    sequence: u64,
    id: ConnectionId,
    stateless_reset_token: [u8; 16],
    /// The peer sent RETIRE_CONNECTION_ID for it
    retired: bool,
}

impl Connection {
    fn new(
        local_endpoint: endpoint::Type,
        tls: Box<dyn tls::Session>,
        local_parameters: TransportParameters,
        local_connection_id: ConnectionId,
        peer_connection_id: ConnectionId,
        initial_seal_id: &ConnectionId,
    ) -> Self {
        let mut initial_space = PacketSpace::new(PacketNumberSpace::Initial);
        let (sealer, opener) = initial_seals(local_endpoint, initial_seal_id.as_bytes());
        initial_space.sealer = Some(sealer);
        initial_space.opener = Some(opener);

        let local_max_data = local_parameters.initial_max_data.as_u64();

        Self {
            local_endpoint,
            state: State::default(),
            tls,
            handshake_complete: false,
            handshake_confirmed: false,
            handshake_ack_received: false,
            peer_parameters_applied: false,
            local_connection_id,
            peer_connection_id,
            // both sides learn the peer's chosen id from the first long
            // header they receive
            peer_connection_id_is_provisional: true,
            initial_space: Some(initial_space),
            handshake_space: Some(PacketSpace::new(PacketNumberSpace::Handshake)),
            application_space: PacketSpace::new(PacketNumberSpace::ApplicationData),
            key_set: KeySet::default(),
            streams: StreamManager::new(local_endpoint, local_parameters.clone()),
            local_max_data,
            local_max_data_window: local_max_data,
            total_received: 0,
            peer_max_data: 0,
            total_sent: 0,
            local_parameters,
            peer_parameters: TransportParameters::default(),
            rtt: RttEstimator::default(),
            congestion: CongestionController::new(1200),
            pto_backoff: 1,
            pto_timer: Timer::default(),
            probe_pending: false,
            idle_timer: Timer::default(),
            idle_timeout: None,
            ack_eliciting_sent_since_last_receive: false,
            close: None,
            close_timer: Timer::default(),
            close_resend: false,
            handshake_done_pending: false,
            max_data_pending: false,
            max_streams_pending: [None, None],
            data_blocked_pending: false,
            streams_blocked_pending: [false, false],
            path_response_pending: None,
            received_tokens: Vec::new(),
            peer_connection_ids: Vec::new(),
            local_connection_ids: vec![IssuedConnectionId {
                sequence: 0,
                id: local_connection_id,
                stateless_reset_token: [0; 16],
                retired: false,
            }],
            next_connection_id_sequence: 1,
            new_connection_ids_pending: Vec::new(),
            retirements_pending: Vec::new(),
        }
    }

    /// Creates a client connection and starts the handshake.
    ///
    /// `initial_dcid` is the randomized destination connection id that keys
    /// the Initial packet protection.
    pub fn new_client(
        tls: Box<dyn tls::Session>,
        local_parameters: TransportParameters,
        local_connection_id: ConnectionId,
        initial_dcid: ConnectionId,
    ) -> Result<Self, transport::Error> {
        let mut connection = Self::new(
            endpoint::Type::Client,
            tls,
            local_parameters,
            local_connection_id,
            initial_dcid,
            &initial_dcid,
        );

        connection.drive_handshake()?;
        Ok(connection)
    }

    /// Creates a server connection for a freshly observed Initial packet.
    ///
    /// `original_dcid` is the destination connection id of that packet; it
    /// keys the Initial packet protection.
    pub fn new_server(
        tls: Box<dyn tls::Session>,
        local_parameters: TransportParameters,
        local_connection_id: ConnectionId,
        original_dcid: ConnectionId,
    ) -> Self {
        Self::new(
            endpoint::Type::Server,
            tls,
            local_parameters,
            local_connection_id,
            // learned from the client's first Initial
            ConnectionId::EMPTY,
            &original_dcid,
        )
    }

    #[inline]
    pub fn local_endpoint(&self) -> endpoint::Type {
        self.local_endpoint
    }

    #[inline]
    pub fn local_connection_id(&self) -> &ConnectionId {
        &self.local_connection_id
    }

    #[inline]
    pub fn is_handshake_complete(&self) -> bool {
        self.handshake_complete
    }

    #[inline]
    pub fn is_handshake_confirmed(&self) -> bool {
        self.handshake_confirmed
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// Tokens received from the server in NEW_TOKEN frames
    #[inline]
    pub fn take_received_tokens(&mut self) -> Vec<Vec<u8>> {
        core::mem::take(&mut self.received_tokens)
    }

    /// Announces an additional local connection id to the peer.
    ///
    /// The socket context owns the connection id namespace, so it supplies
    /// both the id and the stateless reset token to store for it. The
    /// NEW_CONNECTION_ID frame is queued behind the other control frames;
    /// the assigned sequence number is returned.
    pub fn issue_connection_id(
        &mut self,
        id: ConnectionId,
        stateless_reset_token: [u8; 16],
    ) -> u64 {
        let sequence = self.next_connection_id_sequence;
        self.next_connection_id_sequence += 1;

        self.local_connection_ids.push(IssuedConnectionId {
            sequence,
            id,
            stateless_reset_token,
            retired: false,
        });
        self.new_connection_ids_pending.push(sequence);

        sequence
    }

    // === application surface ===
    //
    // Applications hold stream producer/consumer capabilities that resolve
    // through the registry by id; every call here runs under the worker's
    // connection lock and never suspends.

    /// Opens a locally initiated stream, or `None` when the peer's stream
    /// limit is reached
    pub fn open_stream(&mut self, stream_type: StreamType) -> Option<StreamId> {
        match self.streams.open(stream_type) {
            Some(id) => Some(id),
            None => {
                self.streams_blocked_pending[stream_type_index(stream_type)] = true;
                None
            }
        }
    }

    /// The producer capability for an outbound stream
    pub fn stream_producer(&mut self, id: StreamId) -> Option<Arc<ChunkQueue>> {
        self.streams.send_stream_mut(id).map(|send| send.producer())
    }

    /// Publishes buffered producer bytes and schedules the stream
    pub fn flush_stream(&mut self, id: StreamId) {
        if let Some(send) = self.streams.send_stream_mut(id) {
            send.producer().flush();
            if send.is_flushable() {
                self.streams.schedule_flush(id);
            }
        }
    }

    /// Marks the end of an outbound stream
    pub fn finish_stream(&mut self, id: StreamId) -> Result<(), StreamError> {
        let send = self
            .streams
            .send_stream_mut(id)
            .ok_or(StreamError::ConnectionClosed)?;
        send.producer().mark_end_of_data()?;
        self.streams.schedule_flush(id);
        Ok(())
    }

    /// Aborts the sending side of a stream
    pub fn abort_send(&mut self, id: StreamId, error: application::Error) {
        if let Some(send) = self.streams.send_stream_mut(id) {
            send.producer().request_abort(error);
            // pull the abort through so the reset frame gets scheduled
            let _ = send.reset_to_send();
            self.streams.schedule_update(id);
        }
    }

    /// Asks the peer to stop sending on a stream
    pub fn abort_read(&mut self, id: StreamId, error: application::Error) {
        if let Some(recv) = self.streams.recv_stream_mut(id) {
            recv.abort_read(error);
            self.streams.schedule_update(id);
        }
    }

    /// Reads from an inbound stream
    pub fn poll_read(
        &mut self,
        id: StreamId,
        cx: &mut Context,
        buf: &mut [u8],
    ) -> Poll<Result<(usize, bool), StreamError>> {
        let recv = match self.streams.recv_stream_mut(id) {
            Some(recv) => recv,
            None => return Poll::Ready(Err(StreamError::ConnectionClosed)),
        };

        let result = recv.poll_read(cx, buf);

        if let Poll::Ready(Ok((len, _))) = &result {
            if *len > 0 {
                if recv.max_stream_data_update().is_some() {
                    self.streams.schedule_update(id);
                }
                self.check_max_data_window();
            }
        }
        self.remove_stream_if_terminal(id);

        result
    }

    /// Drops a completed stream and re-advertises the stream count window
    /// it freed
    fn remove_stream_if_terminal(&mut self, id: StreamId) {
        self.streams.remove_if_terminal(id);

        let stream_type = id.stream_type();
        if let Some(limit) = self.streams.max_streams_update(stream_type) {
            self.max_streams_pending[stream_type_index(stream_type)] = Some(limit);
        }
    }

    /// Accepts the next remote-initiated stream
    pub fn poll_accept(&mut self, cx: &mut Context) -> Poll<StreamId> {
        self.streams.poll_accept(cx)
    }

    /// Waits for the peer to acknowledge all data and the FIN of a stream
    pub fn poll_finish(
        &mut self,
        id: StreamId,
        cx: &mut Context,
    ) -> Poll<Result<(), StreamError>> {
        match self.streams.send_stream_mut(id) {
            Some(send) => send.poll_finish(cx),
            // the stream completed and was destroyed
            None => Poll::Ready(Ok(())),
        }
    }

    /// Closes the connection with an application error code
    pub fn close(&mut self, error: application::Error, now: Timestamp) {
        if !self.state.is_open() {
            return;
        }

        self.close = Some(CloseReason {
            error_code: error.as_varint(),
            frame_type: None,
            reason: "",
        });
        self.enter_closing(now);
    }

    fn close_with_error(&mut self, error: transport::Error, now: Timestamp) {
        if !self.state.is_open() {
            return;
        }

        debug!(code = %error.code, reason = %error.reason, "closing connection");
        self.close = Some(error.into());
        self.enter_closing(now);
    }

    fn enter_closing(&mut self, now: Timestamp) {
        let _ = self.state.on_close();
        self.close_resend = true;
        self.idle_timer.cancel();
        self.pto_timer.cancel();

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#10.3
        //# The closing and draining connection states exist to ensure that
        //# connections close cleanly and that delayed or reordered packets are
        //# properly discarded.  These states SHOULD persist for at least three
        //# times the current Probe Timeout (PTO) interval
        self.close_timer.set(now + self.pto_period() * 3);
    }

    fn pto_period(&self) -> Duration {
        self.rtt
            .pto_period(self.pto_backoff, PacketNumberSpace::ApplicationData)
    }

    // === receive path ===

    /// Processes every coalesced packet in one UDP datagram
    pub fn on_datagram_received(&mut self, now: Timestamp, datagram: &mut [u8]) {
        let datagram_len = datagram.len();
        let mut offset = 0;

        while offset < datagram_len {
            let remaining = &mut datagram[offset..];
            let header =
                match ProtectedHeader::parse(remaining, self.local_connection_id.len()) {
                    Ok(header) => header,
                    Err(_) => {
                        trace!("dropping undecodable datagram remainder");
                        break;
                    }
                };

            let packet_len = header.packet_len;
            let packet = &mut remaining[..packet_len];

            match self.process_packet(now, packet, &header, datagram_len) {
                Ok(()) => {}
                Err(error) => {
                    self.close_with_error(error, now);
                    return;
                }
            }

            offset += packet_len;
        }
    }

    fn space_mut(&mut self, space: PacketNumberSpace) -> Option<&mut PacketSpace> {
        match space {
            PacketNumberSpace::Initial => self.initial_space.as_mut(),
            PacketNumberSpace::Handshake => self.handshake_space.as_mut(),
            PacketNumberSpace::ApplicationData => Some(&mut self.application_space),
        }
    }

    fn process_packet(
        &mut self,
        now: Timestamp,
        packet: &mut [u8],
        header: &ProtectedHeader,
        datagram_len: usize,
    ) -> Result<(), transport::Error> {
        match self.state {
            State::Closed | State::Draining => return Ok(()),
            State::Closing => {
                // answer with another close frame, rate limited by transmit
                self.close_resend = true;
                return Ok(());
            }
            _ => {}
        }

        let packet_type = header.packet_type;

        if packet_type == PacketType::ZeroRtt {
            // zero-rtt is not supported; the packet is not an error
            return Ok(());
        }

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#14
        //# A server MUST discard an Initial packet that is carried in a UDP
        //# datagram with a payload that is smaller than the smallest allowed
        //# maximum packet size of 1200 bytes.
        if packet_type == PacketType::Initial {
            if self.local_endpoint.is_server() && datagram_len < MIN_INITIAL_DATAGRAM_LEN {
                return Err(transport::Error::PROTOCOL_VIOLATION
                    .with_reason("initial datagram below the 1200 byte minimum"));
            }

            //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#17.2.2
            //# Token Length:  A variable-length integer specifying the
            //#    length of the Token field, in bytes.  ...  A server SHOULD
            //#    treat receipt of an Initial packet with a non-empty Token
            //#    field as a protocol violation.
            if self.local_endpoint.is_client() && !header.token.is_empty() {
                return Err(transport::Error::PROTOCOL_VIOLATION
                    .with_reason("client received an initial packet with a token"));
            }
        }

        let space_id = packet_type.space();
        let key_phase_current = self.key_set.key_phase;

        // retire the previous key generation once its reordering window
        // passed
        self.key_set.retire_prev(now);

        let (largest_received, header_len) = {
            let space = match self.space_mut(space_id) {
                Some(space) => space,
                None => {
                    trace!(?packet_type, "dropping packet for discarded space");
                    return Ok(());
                }
            };
            if space.opener.is_none() {
                trace!(?packet_type, "dropping packet without receive keys");
                return Ok(());
            }
            (space.largest_received, header.header_len)
        };

        // header protection removal
        let (truncated_pn, key_phase) = {
            let space = self.space_mut(space_id).expect("space presence checked");
            let opener = space.opener.as_ref().expect("opener presence checked");

            let sample_range = match crypto::sample_range(
                packet.len(),
                header_len,
                crypto::HeaderKey::opening_sample_len(opener),
            ) {
                Ok(range) => range,
                Err(_) => return Ok(()),
            };

            let mask = crypto::HeaderKey::opening_header_protection_mask(
                opener,
                &packet[sample_range],
            );
            let truncated_pn =
                match crypto::remove_header_protection(space_id, mask, packet, header_len) {
                    Ok(pn) => pn,
                    Err(_) => return Ok(()),
                };

            let key_phase = if packet_type == PacketType::OneRtt {
                Some(KeyPhase::from_first_byte(packet[0]))
            } else {
                None
            };

            (truncated_pn, key_phase)
        };

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#17.2
        //# An endpoint MUST treat receipt of a packet that has a non-zero
        //# value for these bits, after removing both packet and header
        //# protection, as a connection error of type PROTOCOL_VIOLATION.
        packet::validate_reserved_bits(packet[0])?;

        let packet_number = truncated_pn.expand(largest_received);

        // duplicate rejection
        {
            let space = self.space_mut(space_id).expect("space presence checked");
            if space.check_duplicate(packet_number).is_err() {
                trace!(pn = packet_number.as_u64(), "dropping duplicate packet");
                return Ok(());
            }
        }

        // a differing key phase selects the next generation's opener
        let uses_next_keys = match key_phase {
            Some(phase) if phase != key_phase_current => {
                if self.handshake_confirmed {
                    self.ensure_next_keys();
                    true
                } else {
                    // a key update before handshake confirmation is not
                    // actionable; drop the packet
                    return Ok(());
                }
            }
            _ => false,
        };

        // decrypt in place
        let pn_len = truncated_pn.len().bytesize();
        let plaintext_len = {
            let (aad, payload) = packet.split_at_mut(header_len + pn_len);

            let opener = if uses_next_keys {
                self.key_set
                    .next
                    .as_ref()
                    .map(|(_, opener)| opener)
                    .expect("next keys were just derived")
            } else {
                let space = self.space_mut(space_id).expect("space presence checked");
                space.opener.as_ref().expect("opener presence checked")
            };

            if crypto::Key::decrypt(opener, packet_number.as_u64(), aad, payload).is_err() {
                trace!(pn = packet_number.as_u64(), "dropping unauthenticated packet");
                return Ok(());
            }

            payload.len() - crypto::Key::tag_len(opener)
        };

        // a remote-initiated key update commits once a packet authenticates
        // under the next generation
        if uses_next_keys {
            self.install_next_keys(now);
        }

        // the peer's connection id is learned from the first long header
        if self.peer_connection_id_is_provisional && packet_type.is_long() {
            self.peer_connection_id = header.source_connection_id;
            self.peer_connection_id_is_provisional = false;
        }

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#12.4
        //# An endpoint MUST treat receipt of a packet containing no frames
        //# as a connection error of type PROTOCOL_VIOLATION.
        if plaintext_len == 0 {
            return Err(transport::Error::PROTOCOL_VIOLATION.with_reason("packet without frames"));
        }

        // frame processing, in wire order
        let payload_start = header_len + pn_len;
        let mut ack_eliciting = false;
        {
            let mut buffer = quill_codec::DecoderBufferMut::new(
                &mut packet[payload_start..payload_start + plaintext_len],
            );
            while !buffer.is_empty() {
                let (frame, remaining) = buffer
                    .decode::<FrameMut>()
                    .map_err(transport::Error::from)?;
                buffer = remaining;

                if !frame.is_allowed_in(packet_type) {
                    return Err(transport::Error::PROTOCOL_VIOLATION
                        .with_frame_type(VarInt::from_u8(frame.tag()))
                        .with_reason("frame is not allowed in this packet type"));
                }

                ack_eliciting |= frame.ack_elicitation().is_ack_eliciting();
                self.handle_frame(now, packet_type, frame)?;
            }
        }

        if !self.state.is_open() {
            // a CONNECTION_CLOSE frame moved the connection to draining
            return Ok(());
        }

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#17.2.2.1
        //# a server MUST discard Initial keys when it first successfully
        //# processes a Handshake packet
        if self.local_endpoint.is_server() && packet_type == PacketType::Handshake {
            self.discard_initial_space();
        }

        // record the packet and arm the ack machinery; the space may have
        // been discarded by its own frames (handshake confirmation), in
        // which case no acknowledgment is owed anymore
        let max_ack_delay =
            Duration::from_millis(self.local_parameters.max_ack_delay.as_u64());
        if let Some(space) = self.space_mut(space_id) {
            space.on_packet_received(packet_number, ack_eliciting, now, max_ack_delay)?;
        }

        self.on_valid_packet_received(now);

        Ok(())
    }

    fn on_valid_packet_received(&mut self, now: Timestamp) {
        self.ack_eliciting_sent_since_last_receive = false;
        self.arm_idle_timer(now);
    }

    fn arm_idle_timer(&mut self, now: Timestamp) {
        if let Some(timeout) = self.idle_timeout {
            self.idle_timer.set(now + timeout);
        }
    }

    fn effective_idle_timeout(&self) -> Option<Duration> {
        let local = self.local_parameters.max_idle_timeout.as_u64();
        let peer = self.peer_parameters.max_idle_timeout.as_u64();

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#10.2
        //# Each endpoint advertises a max_idle_timeout, but the effective
        //# value at an endpoint is computed as the minimum of the two
        //# advertised values.
        match (local, peer) {
            (0, 0) => None,
            (0, peer) => Some(Duration::from_millis(peer)),
            (local, 0) => Some(Duration::from_millis(local)),
            (local, peer) => Some(Duration::from_millis(local.min(peer))),
        }
    }

    fn discard_initial_space(&mut self) {
        if let Some(mut space) = self.initial_space.take() {
            debug!("discarding initial space");
            space.recovery.on_space_discarded(&mut self.congestion);
        }
    }

    fn discard_handshake_space(&mut self) {
        if let Some(mut space) = self.handshake_space.take() {
            debug!("discarding handshake space");
            space.recovery.on_space_discarded(&mut self.congestion);
        }
    }

    fn ensure_next_keys(&mut self) {
        if self.key_set.next.is_some() {
            return;
        }

        let sealer = self
            .application_space
            .sealer
            .as_ref()
            .expect("application keys exist after handshake confirmation")
            .update();
        let opener = self
            .application_space
            .opener
            .as_ref()
            .expect("application keys exist after handshake confirmation")
            .update();
        self.key_set.next = Some((sealer, opener));
    }

    /// Installs the pre-derived next generation; the old opener is kept for
    /// one PTO window of reordering
    fn install_next_keys(&mut self, now: Timestamp) {
        if let Some((sealer, opener)) = self.key_set.next.take() {
            debug!(phase = ?self.key_set.key_phase.next(), "installing updated keys");
            let old_opener = self.application_space.opener.replace(opener);
            self.application_space.sealer = Some(sealer);
            self.key_set.key_phase = self.key_set.key_phase.next();
            self.key_set.update_requested = false;

            if let Some(old) = old_opener {
                self.key_set.prev_opener = Some((old, now + self.pto_period()));
            }
        }
    }

    /// Requests a locally initiated key update; it takes effect with the
    /// next outgoing 1-RTT packet.
    ///
    //= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#6
    //# An endpoint MUST NOT initiate more than one key update at a time.
    pub fn request_key_update(&mut self) -> Result<(), transport::Error> {
        if !self.handshake_confirmed {
            return Err(transport::Error::PROTOCOL_VIOLATION
                .with_reason("key update before handshake confirmation"));
        }
        if self.key_set.next.is_some() {
            return Err(transport::Error::PROTOCOL_VIOLATION
                .with_reason("a key update is already in progress"));
        }

        self.ensure_next_keys();
        self.key_set.update_requested = true;
        Ok(())
    }

    // === frame handlers ===

    fn handle_frame(
        &mut self,
        now: Timestamp,
        packet_type: PacketType,
        frame: FrameMut,
    ) -> Result<(), transport::Error> {
        match frame {
            FrameMut::Padding(_) | FrameMut::Ping(_) => Ok(()),
            FrameMut::Ack(ack) => self.handle_ack(now, packet_type, ack),
            FrameMut::Crypto(crypto) => {
                let frame: frame::CryptoRef = crypto.into();
                let space = match self.space_mut(packet_type.space()) {
                    Some(space) => space,
                    None => return Ok(()),
                };
                space.crypto_rx.on_data(frame.offset.as_u64(), frame.data);
                self.drive_handshake()
            }
            FrameMut::Stream(stream) => {
                let frame: frame::StreamRef = stream.into();
                self.handle_stream_frame(frame)
            }
            FrameMut::ResetStream(frame) => self.handle_reset_stream(frame),
            FrameMut::StopSending(frame) => self.handle_stop_sending(frame),
            FrameMut::MaxData(frame) => {
                self.peer_max_data = self.peer_max_data.max(frame.maximum_data.as_u64());
                self.reschedule_blocked_streams();
                Ok(())
            }
            FrameMut::MaxStreamData(frame) => self.handle_max_stream_data(frame),
            FrameMut::MaxStreams(frame) => {
                self.streams
                    .on_max_streams(frame.stream_type, frame.maximum_streams.as_u64());
                Ok(())
            }
            FrameMut::DataBlocked(_)
            | FrameMut::StreamDataBlocked(_)
            | FrameMut::StreamsBlocked(_) => Ok(()),
            FrameMut::NewToken(frame) => {
                if self.local_endpoint.is_server() {
                    //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.7
                    //# Servers MUST treat receipt of a NEW_TOKEN frame as a
                    //# connection error of type PROTOCOL_VIOLATION.
                    return Err(transport::Error::PROTOCOL_VIOLATION
                        .with_frame_type(VarInt::from_u8(frame.tag()))
                        .with_reason("server received NEW_TOKEN"));
                }
                self.received_tokens.push(frame.token.to_vec());
                Ok(())
            }
            FrameMut::NewConnectionId(frame) => self.handle_new_connection_id(frame),
            FrameMut::RetireConnectionId(frame) => self.handle_retire_connection_id(frame),
            FrameMut::PathChallenge(frame) => {
                self.path_response_pending = Some(*frame.data);
                Ok(())
            }
            FrameMut::PathResponse(_) => Ok(()),
            FrameMut::ConnectionClose(frame) => {
                debug!(code = %frame.error_code, "peer closed the connection");
                let _ = self.state.on_peer_close();
                self.close_timer.set(now + self.pto_period() * 3);
                Ok(())
            }
            FrameMut::HandshakeDone(frame) => {
                if self.local_endpoint.is_server() {
                    //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.20
                    //# A server MUST treat receipt of a HANDSHAKE_DONE frame
                    //# as a connection error of type PROTOCOL_VIOLATION.
                    return Err(transport::Error::PROTOCOL_VIOLATION
                        .with_frame_type(VarInt::from_u8(frame.tag()))
                        .with_reason("server received HANDSHAKE_DONE"));
                }
                self.on_handshake_confirmed();
                Ok(())
            }
        }
    }

    fn handle_ack(
        &mut self,
        now: Timestamp,
        packet_type: PacketType,
        ack: frame::Ack,
    ) -> Result<(), transport::Error> {
        let space_id = packet_type.space();

        {
            let space = match self.space_mut(space_id) {
                Some(space) => space,
                None => return Ok(()),
            };

            if ack.largest_acknowledged() >= space.next_packet_number() {
                return Err(transport::Error::PROTOCOL_VIOLATION
                    .with_reason("acknowledgment for a packet that was never sent"));
            }
        }

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.3
        //# The ACK Delay field is the acknowledgement delay in microseconds;
        //# it is multiplied by 2 to the power of the ack_delay_exponent
        //# transport parameter sent by the sender of the ACK frame.
        let exponent = if space_id.is_application_data() && self.peer_parameters_applied {
            self.peer_parameters.ack_delay_exponent as u32
        } else {
            3
        };
        let ack_delay =
            Duration::from_micros(ack.ack_delay.as_u64().saturating_mul(1 << exponent));

        let outcome = {
            let handshake_confirmed = self.handshake_confirmed;
            let rtt = &mut self.rtt;
            let congestion = &mut self.congestion;
            let space = space_mut!(self, space_id).expect("space presence checked");
            space.recovery.on_ack_received(
                &ack.ack_ranges,
                ack_delay,
                now,
                rtt,
                congestion,
                handshake_confirmed,
            )
        };

        if !outcome.newly_acked.is_empty() {
            self.pto_backoff = 1;
            self.probe_pending = false;

            if space_id.is_handshake() {
                self.handshake_ack_received = true;
                self.check_handshake_confirmed();
            }
        }

        for packet in outcome.newly_acked {
            for restitution in packet.frames {
                self.on_frame_acked(space_id, restitution);
            }
        }
        for packet in outcome.lost {
            for restitution in packet.frames {
                self.on_frame_lost(space_id, restitution);
            }
        }

        self.arm_pto_timer(now);
        Ok(())
    }

    fn on_frame_acked(&mut self, space_id: PacketNumberSpace, restitution: Restitution) {
        match restitution {
            Restitution::StreamData {
                id,
                offset,
                len,
                is_fin,
            } => {
                if let Some(send) = self.streams.send_stream_mut(id) {
                    send.on_ack(offset, len, is_fin);
                }
                self.remove_stream_if_terminal(id);
            }
            Restitution::ResetStream { id } => {
                if let Some(send) = self.streams.send_stream_mut(id) {
                    send.on_reset_acked();
                }
                self.remove_stream_if_terminal(id);
            }
            Restitution::Ack {
                largest_acknowledged,
            } => {
                if let Some(space) = self.space_mut(space_id) {
                    space.on_ack_frame_acked(largest_acknowledged);
                }
            }
            Restitution::Crypto { .. }
            | Restitution::StopSending { .. }
            | Restitution::MaxStreamData { .. }
            | Restitution::MaxData
            | Restitution::MaxStreams { .. }
            | Restitution::NewConnectionId { .. }
            | Restitution::RetireConnectionId { .. }
            | Restitution::HandshakeDone => {}
        }
    }

    fn on_frame_lost(&mut self, space_id: PacketNumberSpace, restitution: Restitution) {
        match restitution {
            Restitution::StreamData {
                id,
                offset,
                len,
                is_fin,
            } => {
                if let Some(send) = self.streams.send_stream_mut(id) {
                    send.on_lost(offset, len, is_fin);
                    if send.is_flushable() {
                        self.streams.schedule_flush(id);
                    }
                }
            }
            Restitution::Crypto { offset, len } => {
                if let Some(space) = self.space_mut(space_id) {
                    space.crypto_tx.on_lost(offset, len);
                }
            }
            Restitution::ResetStream { id } => {
                if let Some(send) = self.streams.send_stream_mut(id) {
                    send.on_reset_lost();
                }
                self.streams.schedule_update(id);
            }
            Restitution::StopSending { id } => {
                self.streams.schedule_update(id);
            }
            Restitution::MaxStreamData { id } => {
                self.streams.schedule_update(id);
            }
            Restitution::MaxData => {
                self.max_data_pending = true;
            }
            Restitution::MaxStreams { stream_type } => {
                let index = stream_type_index(stream_type);
                if self.max_streams_pending[index].is_none() {
                    // re-announce the current limit
                    self.max_streams_pending[index] =
                        self.streams.max_streams_update(stream_type);
                }
            }
            Restitution::NewConnectionId { sequence } => {
                let still_issued = self
                    .local_connection_ids
                    .iter()
                    .any(|issued| issued.sequence == sequence && !issued.retired);
                if still_issued && !self.new_connection_ids_pending.contains(&sequence) {
                    self.new_connection_ids_pending.push(sequence);
                }
            }
            Restitution::RetireConnectionId { sequence } => {
                self.queue_retirement(sequence);
            }
            Restitution::Ack { .. } => {}
            Restitution::HandshakeDone => {
                self.handshake_done_pending = true;
            }
        }
    }

    fn handle_stream_frame(&mut self, frame: frame::StreamRef) -> Result<(), transport::Error> {
        let id = StreamId::from_varint(frame.stream_id);

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.8
        //# An endpoint MUST terminate the connection with error
        //# STREAM_STATE_ERROR if it receives a STREAM frame for a locally-
        //# initiated stream that has not yet been created, or for a send-only
        //# stream.
        if !id.is_receivable(self.local_endpoint) {
            return Err(transport::Error::STREAM_STATE_ERROR
                .with_frame_type(VarInt::from_u8(frame.tag()))
                .with_reason("stream frame on a send-only stream"));
        }

        self.streams
            .on_remote_reference(id)
            .map_err(|error| error.with_frame_type(VarInt::from_u8(frame.tag())))?;

        let recv = match self.streams.recv_stream_mut(id) {
            Some(recv) => recv,
            // the stream already ran to completion and was destroyed
            None => return Ok(()),
        };

        // connection-level flow control is charged on the growth of the
        // highest received offset
        let end = frame.offset.as_u64() + frame.data.len() as u64;
        let delta = end.saturating_sub(recv.highest_received());
        if self.total_received + delta > self.local_max_data {
            return Err(transport::Error::FLOW_CONTROL_ERROR
                .with_reason("connection data limit exceeded"));
        }

        let charged = recv.on_data(frame.offset.as_u64(), frame.data, frame.is_fin)?;
        self.total_received += charged;
        self.check_max_data_window();

        Ok(())
    }

    fn handle_reset_stream(
        &mut self,
        frame: frame::ResetStream,
    ) -> Result<(), transport::Error> {
        let id = StreamId::from_varint(frame.stream_id);

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.4
        //# An endpoint that receives a RESET_STREAM frame for a send-only
        //# stream MUST terminate the connection with error STREAM_STATE_ERROR.
        if !id.is_receivable(self.local_endpoint) {
            return Err(transport::Error::STREAM_STATE_ERROR
                .with_frame_type(VarInt::from_u8(frame.tag()))
                .with_reason("reset on a send-only stream"));
        }

        self.streams
            .on_remote_reference(id)
            .map_err(|error| error.with_frame_type(VarInt::from_u8(frame.tag())))?;

        let recv = match self.streams.recv_stream_mut(id) {
            Some(recv) => recv,
            None => return Ok(()),
        };

        let final_size = frame.final_size.as_u64();
        let delta = final_size.saturating_sub(recv.highest_received());
        if self.total_received + delta > self.local_max_data {
            return Err(transport::Error::FLOW_CONTROL_ERROR
                .with_reason("connection data limit exceeded"));
        }

        recv.on_reset(
            application::Error::new(frame.application_error_code),
            final_size,
        )?;
        self.total_received += delta;

        Ok(())
    }

    fn handle_stop_sending(
        &mut self,
        frame: frame::StopSending,
    ) -> Result<(), transport::Error> {
        let id = StreamId::from_varint(frame.stream_id);

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.5
        //# An endpoint that receives a STOP_SENDING frame for a receive-only
        //# stream MUST terminate the connection with error STREAM_STATE_ERROR.
        if !id.is_sendable(self.local_endpoint) {
            return Err(transport::Error::STREAM_STATE_ERROR
                .with_frame_type(VarInt::from_u8(frame.tag()))
                .with_reason("stop sending on a receive-only stream"));
        }

        if id.initiator() == self.local_endpoint && !self.streams.contains(id) {
            return Err(transport::Error::STREAM_STATE_ERROR
                .with_frame_type(VarInt::from_u8(frame.tag()))
                .with_reason("stop sending for an unopened local stream"));
        }

        self.streams
            .on_remote_reference(id)
            .map_err(|error| error.with_frame_type(VarInt::from_u8(frame.tag())))?;

        if let Some(send) = self.streams.send_stream_mut(id) {
            send.on_stop_sending(application::Error::new(frame.application_error_code));
            self.streams.schedule_update(id);
        }

        Ok(())
    }

    fn handle_max_stream_data(
        &mut self,
        frame: frame::MaxStreamData,
    ) -> Result<(), transport::Error> {
        let id = StreamId::from_varint(frame.stream_id);

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.10
        //# An endpoint that receives a MAX_STREAM_DATA frame for a receive-
        //# only stream MUST terminate the connection with error
        //# STREAM_STATE_ERROR.
        if !id.is_sendable(self.local_endpoint) {
            return Err(transport::Error::STREAM_STATE_ERROR
                .with_frame_type(VarInt::from_u8(frame.tag()))
                .with_reason("max stream data on a receive-only stream"));
        }

        if id.initiator() == self.local_endpoint && !self.streams.contains(id) {
            return Err(transport::Error::STREAM_STATE_ERROR
                .with_frame_type(VarInt::from_u8(frame.tag()))
                .with_reason("max stream data for an unopened local stream"));
        }

        self.streams
            .on_remote_reference(id)
            .map_err(|error| error.with_frame_type(VarInt::from_u8(frame.tag())))?;

        if let Some(send) = self.streams.send_stream_mut(id) {
            send.on_max_stream_data(frame.maximum_stream_data.as_u64());
            if send.is_flushable() {
                self.streams.schedule_flush(id);
            }
        }

        Ok(())
    }

    fn handle_new_connection_id(
        &mut self,
        frame: frame::NewConnectionId,
    ) -> Result<(), transport::Error> {
        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#5.1.2
        //# Upon receipt of an increased Retire Prior To field, the peer MUST
        //# stop using the corresponding connection IDs and retire them with
        //# RETIRE_CONNECTION_ID frames
        let retire_prior_to = frame.retire_prior_to.as_u64();
        if retire_prior_to > 0 {
            let mut index = 0;
            while index < self.peer_connection_ids.len() {
                let (sequence, ..) = self.peer_connection_ids[index];
                if sequence < retire_prior_to {
                    self.peer_connection_ids.remove(index);
                    self.queue_retirement(sequence);
                } else {
                    index += 1;
                }
            }
        }

        let limit = self.local_parameters.active_connection_id_limit.as_u64();

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#5.1.1
        //# An endpoint MAY treat receipt of connection IDs in excess of its
        //# advertised active_connection_id_limit as a connection error of
        //# type PROTOCOL_VIOLATION.
        if self.peer_connection_ids.len() as u64 >= limit {
            return Err(transport::Error::PROTOCOL_VIOLATION
                .with_frame_type(VarInt::from_u8(frame.tag()))
                .with_reason("active connection id limit exceeded"));
        }

        let id = ConnectionId::try_from_slice(frame.connection_id)
            .expect("the decoder validates the length");
        let sequence = frame.sequence_number.as_u64();

        if !self
            .peer_connection_ids
            .iter()
            .any(|(existing, ..)| *existing == sequence)
        {
            self.peer_connection_ids
                .push((sequence, id, *frame.stateless_reset_token));
        }

        Ok(())
    }

    fn queue_retirement(&mut self, sequence: u64) {
        if !self.retirements_pending.contains(&sequence) {
            self.retirements_pending.push(sequence);
        }
    }

    fn handle_retire_connection_id(
        &mut self,
        frame: frame::RetireConnectionId,
    ) -> Result<(), transport::Error> {
        let sequence = frame.sequence_number.as_u64();

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.16
        //# Receipt of a RETIRE_CONNECTION_ID frame containing a sequence
        //# number greater than any previously sent to the peer MUST be
        //# treated as a connection error of type PROTOCOL_VIOLATION.
        if sequence >= self.next_connection_id_sequence {
            return Err(transport::Error::PROTOCOL_VIOLATION
                .with_frame_type(VarInt::from_u8(frame.tag()))
                .with_reason("retirement of a connection id that was never issued"));
        }

        if let Some(issued) = self
            .local_connection_ids
            .iter_mut()
            .find(|issued| issued.sequence == sequence)
        {
            issued.retired = true;
        }

        Ok(())
    }

    fn reschedule_blocked_streams(&mut self) {
        for id in self.streams.ids() {
            if let Some(send) = self.streams.send_stream_mut(id) {
                if send.is_flushable() {
                    self.streams.schedule_flush(id);
                }
            }
        }
    }

    /// Re-advertises MAX_DATA once the peer consumed half the window
    fn check_max_data_window(&mut self) {
        let remaining = self.local_max_data - self.total_received;
        if remaining < self.local_max_data_window / 2 {
            self.local_max_data = self.total_received + self.local_max_data_window;
            self.max_data_pending = true;
        }
    }

    // === handshake driver ===

    fn drive_handshake(&mut self) -> Result<(), transport::Error> {
        // feed contiguous crypto bytes into the TLS session
        for level in [Level::Initial, Level::Handshake, Level::Application] {
            let data = match self.space_mut(level.space()) {
                Some(space) => space.crypto_rx.take_contiguous(),
                None => None,
            };
            if let Some(data) = data {
                self.tls.provide_data(level, &data).map_err(|alert| {
                    transport::Error::from(alert).with_reason("tls rejected handshake data")
                })?;
            }
        }

        let mut output = HandshakeOutput::default();
        let progress = self
            .tls
            .do_handshake(&mut output)
            .map_err(transport::Error::from)?;

        for (level, cipher_suite, read_secret, write_secret) in output.secrets {
            self.install_secrets(level, cipher_suite, &read_secret, &write_secret);
        }
        for (level, data) in output.data {
            if let Some(space) = self.space_mut(level.space()) {
                space.crypto_tx.push(&data);
            }
        }

        self.try_apply_peer_parameters()?;

        if matches!(progress, tls::Progress::Complete) && !self.handshake_complete {
            self.handshake_complete = true;
            let _ = self.state.on_handshake_complete();
            debug!("handshake complete");

            if self.local_endpoint.is_server() {
                //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.20
                //# The server uses the HANDSHAKE_DONE frame (type=0x1e) to
                //# signal confirmation of the handshake to the client.
                self.handshake_done_pending = true;
                self.check_handshake_confirmed();
            }
        }

        Ok(())
    }

    fn install_secrets(
        &mut self,
        level: Level,
        cipher_suite: CipherSuite,
        read_secret: &[u8],
        write_secret: &[u8],
    ) {
        debug!(?level, "installing secrets");
        let sealer = Seal::from_secret(cipher_suite, write_secret);
        let opener = Seal::from_secret(cipher_suite, read_secret);

        if let Some(space) = self.space_mut(level.space()) {
            space.sealer = Some(sealer);
            space.opener = Some(opener);
        }
    }

    fn try_apply_peer_parameters(&mut self) -> Result<(), transport::Error> {
        if self.peer_parameters_applied {
            return Ok(());
        }

        let encoded = match self.tls.peer_transport_parameters() {
            Some(encoded) => encoded.to_vec(),
            None => return Ok(()),
        };

        let parameters =
            TransportParameters::decode(quill_codec::DecoderBuffer::new(&encoded))?;

        if self.local_endpoint.is_server() {
            parameters.validate_as_client()?;
        }

        self.peer_max_data = parameters.initial_max_data.as_u64();
        self.rtt.on_max_ack_delay(Duration::from_millis(
            parameters.max_ack_delay.as_u64(),
        ));
        self.streams.on_peer_parameters(&parameters);
        self.peer_parameters = parameters;
        self.peer_parameters_applied = true;
        self.idle_timeout = self.effective_idle_timeout();

        Ok(())
    }

    /// The server confirms once its handshake completes and the client's
    /// handshake-space acknowledgment arrives; the client confirms on
    /// HANDSHAKE_DONE
    fn check_handshake_confirmed(&mut self) {
        if self.handshake_confirmed {
            return;
        }

        if self.local_endpoint.is_server()
            && self.handshake_complete
            && self.handshake_ack_received
        {
            self.on_handshake_confirmed();
        }
    }

    fn on_handshake_confirmed(&mut self) {
        if self.handshake_confirmed {
            return;
        }

        debug!("handshake confirmed");
        self.handshake_confirmed = true;

        //= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#4.10.2
        //# An endpoint MUST discard its handshake keys when the TLS
        //# handshake is confirmed
        self.discard_handshake_space();
    }
}

fn stream_type_index(stream_type: StreamType) -> usize {
    match stream_type {
        StreamType::Bidirectional => 0,
        StreamType::Unidirectional => 1,
    }
}

mod transmit;
mod timers;

pub use crate::stream::chunks::{Chunk, MAX_HELD_CHUNKS};
