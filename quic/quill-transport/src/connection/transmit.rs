// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The send pipeline: one call assembles one UDP datagram, coalescing
//! packets of ascending encryption levels, then seals and header-protects
//! each packet.

use super::*;
use quill_codec::{Encoder, EncoderBuffer, EncoderValue};

struct FrameSummary {
    frames: SmallVec<[Restitution; 4]>,
    ack_eliciting: bool,
    padded: bool,
}

impl Connection {
    /// Writes one UDP datagram into `buf`; returns the number of bytes to
    /// send, zero when nothing is due
    pub fn on_transmit(&mut self, now: Timestamp, buf: &mut [u8]) -> usize {
        match self.state {
            State::Closed | State::Draining => 0,
            State::Closing => self.transmit_close(now, buf),
            _ => self.transmit_open(now, buf),
        }
    }

    fn transmit_open(&mut self, now: Timestamp, buf: &mut [u8]) -> usize {
        // a locally requested key update takes effect with the next packet
        if self.key_set.update_requested {
            self.install_next_keys(now);
        }
        self.key_set.retire_prev(now);

        let mut offset = 0;

        for space_id in [
            PacketNumberSpace::Initial,
            PacketNumberSpace::Handshake,
            PacketNumberSpace::ApplicationData,
        ] {
            offset += self.transmit_space(space_id, now, buf, offset);
        }

        offset
    }

    fn max_packet_len(&self) -> usize {
        if self.peer_parameters_applied {
            (self.peer_parameters.max_packet_size.as_u64() as usize).min(MAX_PACKET_LEN)
        } else {
            MIN_INITIAL_DATAGRAM_LEN
        }
    }

    /// Builds at most one packet for `space_id` at `buf[datagram_offset..]`
    fn transmit_space(
        &mut self,
        space_id: PacketNumberSpace,
        now: Timestamp,
        buf: &mut [u8],
        datagram_offset: usize,
    ) -> usize {
        let packet_type = packet_type_for(space_id);

        let (sealer_tag_len, sample_len) = {
            let space = match self.space_mut(space_id) {
                Some(space) => space,
                None => return 0,
            };
            let sealer = match space.sealer.as_ref() {
                Some(sealer) => sealer,
                None => return 0,
            };
            (
                crypto::Key::tag_len(sealer),
                crypto::HeaderKey::sealing_sample_len(sealer),
            )
        };

        let remaining = buf.len() - datagram_offset;
        let region_len = remaining.min(self.max_packet_len());
        if region_len < 64 {
            return 0;
        }
        let region = &mut buf[datagram_offset..datagram_offset + region_len];

        // packet number encoding against the largest acknowledged
        let (packet_number, truncated_pn) = {
            let space = self.space_mut(space_id).expect("space presence checked");
            let largest_acked = space.largest_acked_for_truncation();
            let packet_number = space_id.new_packet_number(
                VarInt::new(space.next_packet_number()).expect("packet numbers fit a varint"),
            );
            let truncated = packet_number
                .truncate(largest_acked)
                .expect("the next packet number is never behind the largest acked");
            (packet_number, truncated)
        };
        let pn_len = truncated_pn.len();

        let mut encoder = EncoderBuffer::new(&mut region[..region_len - sealer_tag_len]);

        let length_position = self.write_header(packet_type, pn_len, &mut encoder);
        let header_len = match length_position {
            Some(position) => position + 2,
            None => encoder.len(),
        };
        encoder.encode(&truncated_pn);
        let payload_start = encoder.len();

        // frames
        let mut summary = FrameSummary {
            frames: SmallVec::new(),
            ack_eliciting: false,
            padded: false,
        };
        self.write_frames(space_id, packet_type, now, payload_start, &mut encoder, &mut summary);

        if encoder.len() == payload_start {
            // nothing to say at this level
            return 0;
        }

        //= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#5.4.2
        //# An endpoint MUST discard packets that are not long enough to
        //# contain a complete sample.
        let mut payload_len = encoder.len() - payload_start;
        if payload_len + pn_len.bytesize() < MIN_SAMPLE_PAYLOAD {
            let padding = MIN_SAMPLE_PAYLOAD - payload_len - pn_len.bytesize();
            encoder.encode(&frame::Padding { length: padding });
            summary.padded = true;
            payload_len = encoder.len() - payload_start;
        }

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#14
        //# A client MUST expand the payload of all UDP datagrams carrying
        //# Initial packets to at least 1200 bytes
        if self.local_endpoint.is_client() && packet_type == PacketType::Initial {
            let datagram_so_far =
                datagram_offset + payload_start + payload_len + sealer_tag_len;
            if datagram_so_far < MIN_INITIAL_DATAGRAM_LEN {
                let padding = MIN_INITIAL_DATAGRAM_LEN - datagram_so_far;
                encoder.encode(&frame::Padding { length: padding });
                summary.padded = true;
                payload_len = encoder.len() - payload_start;
            }
        }

        let packet_len = payload_start + payload_len + sealer_tag_len;

        // patch the long header length field with a two byte varint
        if let Some(position) = length_position {
            let length = pn_len.bytesize() + payload_len + sealer_tag_len;
            debug_assert!(length < (1 << 14));
            region[position] = 0x40 | (length >> 8) as u8;
            region[position + 1] = length as u8;
        }

        self.seal_packet(
            space_id,
            packet_number,
            pn_len,
            header_len,
            payload_start,
            packet_len,
            sample_len,
            region,
        );

        // commit the packet
        let ack_eliciting = summary.ack_eliciting;
        let in_flight = ack_eliciting || summary.padded;
        {
            let space = space_mut!(self, space_id).expect("space presence checked");
            let pn = space.commit_packet_number();
            debug_assert_eq!(pn, packet_number.as_u64());

            let record = SentPacket {
                time_sent: now,
                sent_bytes: packet_len,
                ack_eliciting,
                in_flight,
                frames: summary.frames,
            };
            space.recovery.on_packet_sent(pn, record, &mut self.congestion);
        }

        trace!(
            ?packet_type,
            pn = packet_number.as_u64(),
            len = packet_len,
            "packet sent"
        );

        if ack_eliciting {
            self.probe_pending = false;
            //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#10.2
            //# An endpoint also restarts its idle timer when sending an ack-
            //# eliciting packet if no other ack-eliciting packets have been
            //# sent since last receiving and processing a packet.
            if !self.ack_eliciting_sent_since_last_receive {
                self.ack_eliciting_sent_since_last_receive = true;
                self.arm_idle_timer(now);
            }
            self.arm_pto_timer(now);
        }

        //= https://tools.ietf.org/id/draft-ietf-quic-tls-27.txt#4.10.1
        //# a client MUST discard Initial keys when it first sends a
        //# Handshake packet
        if self.local_endpoint.is_client() && packet_type == PacketType::Handshake {
            self.discard_initial_space();
        }

        packet_len
    }

    fn write_header(
        &mut self,
        packet_type: PacketType,
        pn_len: PacketNumberLen,
        encoder: &mut EncoderBuffer,
    ) -> Option<usize> {
        match packet_type {
            PacketType::OneRtt => {
                encoder.encode(&packet::short_first_byte(self.key_set.key_phase, pn_len));
                encoder.encode(&self.peer_connection_id);
                None
            }
            _ => {
                encoder.encode(&packet::long_first_byte(packet_type, pn_len));
                encoder.encode(&packet::VERSION);
                encoder.encode(&(self.peer_connection_id.len() as u8));
                encoder.encode(&self.peer_connection_id);
                encoder.encode(&(self.local_connection_id.len() as u8));
                encoder.encode(&self.local_connection_id);
                if packet_type == PacketType::Initial {
                    // a token is only issued through Retry, which is not
                    // supported
                    encoder.encode(&VarInt::ZERO);
                }
                let position = encoder.len();
                // reserve a two byte length; patched once the payload is
                // known
                encoder.write_repeated(2, 0);
                Some(position)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn seal_packet(
        &mut self,
        space_id: PacketNumberSpace,
        packet_number: PacketNumber,
        pn_len: PacketNumberLen,
        header_len: usize,
        payload_start: usize,
        packet_len: usize,
        sample_len: usize,
        region: &mut [u8],
    ) {
        let space = self.space_mut(space_id).expect("space presence checked");
        let sealer = space.sealer.as_ref().expect("sealer presence checked");

        let (aad, payload) = region[..packet_len].split_at_mut(payload_start);
        crypto::Key::encrypt(sealer, packet_number.as_u64(), aad, payload)
            .expect("sealing never fails with a valid key");

        let sample_range = crypto::sample_range(packet_len, header_len, sample_len)
            .expect("padding guarantees a full sample");
        let mask =
            crypto::HeaderKey::sealing_header_protection_mask(sealer, &region[sample_range]);
        crypto::apply_header_protection(mask, &mut region[..packet_len], header_len, pn_len);
    }

    /// Writes frames by priority into the remaining packet capacity
    fn write_frames(
        &mut self,
        space_id: PacketNumberSpace,
        packet_type: PacketType,
        now: Timestamp,
        payload_start: usize,
        encoder: &mut EncoderBuffer,
        summary: &mut FrameSummary,
    ) {
        self.write_crypto_frames(space_id, encoder, summary);
        self.write_ack_frame(space_id, now, payload_start, encoder, summary);

        if packet_type == PacketType::OneRtt && self.handshake_complete {
            self.write_control_frames(encoder, summary);
            self.write_stream_update_frames(encoder, summary);
            self.write_stream_frames(encoder, summary);
            self.write_connection_id_frames(encoder, summary);
            self.write_blocked_frames(encoder, summary);
        }

        if self.probe_pending && !summary.ack_eliciting && encoder.remaining_capacity() >= 1 {
            //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#6.3
            //# When a PTO timer expires, a sender MUST send at least one ack-
            //# eliciting packet in the packet number space as a probe
            encoder.encode(&frame::Ping);
            summary.ack_eliciting = true;
        }
    }

    fn write_crypto_frames(
        &mut self,
        space_id: PacketNumberSpace,
        encoder: &mut EncoderBuffer,
        summary: &mut FrameSummary,
    ) {
        loop {
            let space = match self.space_mut(space_id) {
                Some(space) => space,
                None => return,
            };

            let capacity = encoder.remaining_capacity();
            let (offset, available) = match space.crypto_tx.next_range(usize::MAX) {
                Some(range) => range,
                None => return,
            };

            // tag byte + offset varint + a worst-case length prefix
            let overhead =
                1 + VarInt::new(offset).expect("offsets fit a varint").encoding_size() + 4;
            let max_payload = match capacity.checked_sub(overhead) {
                Some(max_payload) if max_payload > 0 => max_payload,
                _ => return,
            };

            let len = available.min(max_payload);
            let mut data = vec![0u8; len];
            space.crypto_tx.check_out(offset, len, &mut data);

            encoder.encode(&frame::Crypto {
                offset: VarInt::new(offset).expect("offsets fit a varint"),
                data: &data[..],
            });

            summary.frames.push(Restitution::Crypto { offset, len });
            summary.ack_eliciting = true;
        }
    }

    fn write_ack_frame(
        &mut self,
        space_id: PacketNumberSpace,
        now: Timestamp,
        payload_start: usize,
        encoder: &mut EncoderBuffer,
        summary: &mut FrameSummary,
    ) {
        // an ACK rides along whenever the packet carries anything else
        let something_else_pending = encoder.len() > payload_start
            || self.streams.has_flushable()
            || self.streams.has_updates()
            || self.handshake_done_pending
            || self.max_data_pending
            || !self.new_connection_ids_pending.is_empty()
            || !self.retirements_pending.is_empty()
            || self.probe_pending;

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.3
        //# ack_delay_exponent ... only applies to the ACK frames in the
        //# application packet number space
        let exponent = if space_id.is_application_data() {
            self.local_parameters.ack_delay_exponent as u32
        } else {
            3
        };

        let space = match self.space_mut(space_id) {
            Some(space) => space,
            None => return,
        };

        if space.unacked.is_empty() {
            return;
        }
        if !(space.ack_due(now) || something_else_pending) {
            return;
        }

        let delay_micros = space.largest_received_time.map_or(0, |received| {
            now.saturating_duration_since(received).as_micros() as u64
        });
        let ack_delay = VarInt::new(delay_micros >> exponent).unwrap_or(VarInt::MAX);

        if let Some(ack) = space.ack_to_send(now, ack_delay) {
            let largest = ack.largest_acknowledged();
            if encoder.remaining_capacity() >= ack.encoding_size() {
                encoder.encode(&ack);
                summary.frames.push(Restitution::Ack {
                    largest_acknowledged: largest,
                });
            }
        }
    }

    fn write_control_frames(&mut self, encoder: &mut EncoderBuffer, summary: &mut FrameSummary) {
        if self.handshake_done_pending && encoder.remaining_capacity() >= 1 {
            encoder.encode(&frame::HandshakeDone);
            self.handshake_done_pending = false;
            summary.frames.push(Restitution::HandshakeDone);
            summary.ack_eliciting = true;
        }

        if self.max_data_pending {
            let frame = frame::MaxData {
                maximum_data: VarInt::new(self.local_max_data).expect("limits fit a varint"),
            };
            if encoder.remaining_capacity() >= frame.encoding_size() {
                encoder.encode(&frame);
                self.max_data_pending = false;
                summary.frames.push(Restitution::MaxData);
                summary.ack_eliciting = true;
            }
        }

        for stream_type in [StreamType::Bidirectional, StreamType::Unidirectional] {
            let index = stream_type_index(stream_type);
            if let Some(limit) = self.max_streams_pending[index].take() {
                let frame = frame::MaxStreams {
                    stream_type,
                    maximum_streams: VarInt::new(limit).expect("limits fit a varint"),
                };
                if encoder.remaining_capacity() >= frame.encoding_size() {
                    encoder.encode(&frame);
                    summary.frames.push(Restitution::MaxStreams { stream_type });
                    summary.ack_eliciting = true;
                } else {
                    self.max_streams_pending[index] = Some(limit);
                }
            }
        }

        if let Some(data) = self.path_response_pending.take() {
            let frame = frame::PathResponse { data: &data };
            if encoder.remaining_capacity() >= frame.encoding_size() {
                encoder.encode(&frame);
                summary.ack_eliciting = true;
            } else {
                self.path_response_pending = Some(data);
            }
        }
    }

    /// NEW_CONNECTION_ID announcements and RETIRE_CONNECTION_ID answers,
    /// queued behind the other control frames
    fn write_connection_id_frames(
        &mut self,
        encoder: &mut EncoderBuffer,
        summary: &mut FrameSummary,
    ) {
        loop {
            let sequence = match self.new_connection_ids_pending.last() {
                Some(sequence) => *sequence,
                None => break,
            };

            let announced = {
                let issued = self
                    .local_connection_ids
                    .iter()
                    .find(|issued| issued.sequence == sequence && !issued.retired);

                match issued {
                    Some(issued) => {
                        let frame = frame::NewConnectionId {
                            sequence_number: VarInt::new(sequence)
                                .expect("sequences fit a varint"),
                            retire_prior_to: VarInt::ZERO,
                            connection_id: issued.id.as_bytes(),
                            stateless_reset_token: &issued.stateless_reset_token,
                        };
                        if encoder.remaining_capacity() < frame.encoding_size() {
                            return;
                        }
                        encoder.encode(&frame);
                        true
                    }
                    // retired while waiting; nothing to announce
                    None => false,
                }
            };

            self.new_connection_ids_pending.pop();
            if announced {
                summary.frames.push(Restitution::NewConnectionId { sequence });
                summary.ack_eliciting = true;
            }
        }

        while let Some(sequence) = self.retirements_pending.last().copied() {
            let frame = frame::RetireConnectionId {
                sequence_number: VarInt::new(sequence).expect("sequences fit a varint"),
            };
            if encoder.remaining_capacity() < frame.encoding_size() {
                return;
            }
            encoder.encode(&frame);
            self.retirements_pending.pop();
            summary
                .frames
                .push(Restitution::RetireConnectionId { sequence });
            summary.ack_eliciting = true;
        }
    }

    /// MAX_STREAM_DATA, STOP_SENDING, and RESET_STREAM owed per stream
    fn write_stream_update_frames(
        &mut self,
        encoder: &mut EncoderBuffer,
        summary: &mut FrameSummary,
    ) {
        let mut deferred = None;

        while let Some(id) = self.streams.next_update() {
            let mut wrote_all = true;

            let reset = self
                .streams
                .send_stream_mut(id)
                .and_then(|send| send.reset_to_send());
            if let Some((error, final_size)) = reset {
                let frame = frame::ResetStream {
                    stream_id: id.as_varint(),
                    application_error_code: error.as_varint(),
                    final_size: VarInt::new(final_size).expect("sizes fit a varint"),
                };
                if encoder.remaining_capacity() >= frame.encoding_size() {
                    encoder.encode(&frame);
                    self.streams
                        .send_stream_mut(id)
                        .expect("the stream was just observed")
                        .on_reset_sent();
                    summary.frames.push(Restitution::ResetStream { id });
                    summary.ack_eliciting = true;
                } else {
                    wrote_all = false;
                }
            }

            let recv_state = self.streams.recv_stream_mut(id).map(|recv| {
                (
                    recv.stop_sending_to_send(),
                    recv.advertised_max_stream_data(),
                    recv.state().is_terminal() || recv.state().is_reset(),
                )
            });

            if let Some((stop_sending, limit, finished)) = recv_state {
                if let Some(error) = stop_sending {
                    let frame = frame::StopSending {
                        stream_id: id.as_varint(),
                        application_error_code: error.as_varint(),
                    };
                    if encoder.remaining_capacity() >= frame.encoding_size() {
                        encoder.encode(&frame);
                        summary.frames.push(Restitution::StopSending { id });
                        summary.ack_eliciting = true;
                    } else {
                        wrote_all = false;
                    }
                } else if !finished {
                    let frame = frame::MaxStreamData {
                        stream_id: id.as_varint(),
                        maximum_stream_data: VarInt::new(limit).expect("limits fit a varint"),
                    };
                    if encoder.remaining_capacity() >= frame.encoding_size() {
                        encoder.encode(&frame);
                        summary.frames.push(Restitution::MaxStreamData { id });
                        summary.ack_eliciting = true;
                    } else {
                        wrote_all = false;
                    }
                }
            }

            if !wrote_all {
                deferred = Some(id);
                break;
            }
        }

        if let Some(id) = deferred {
            self.streams.schedule_update(id);
        }
    }

    fn write_stream_frames(&mut self, encoder: &mut EncoderBuffer, summary: &mut FrameSummary) {
        // stream data is bounded by connection flow control and the
        // congestion window; probes bypass the latter
        let mut connection_credit = self.peer_max_data.saturating_sub(self.total_sent);
        let mut congestion_credit = if self.probe_pending {
            u64::MAX
        } else {
            self.congestion.available_window()
        };

        // bound the walk so a requeueing stream cannot spin the writer
        let mut remaining_visits = 64;

        while let Some(id) = self.streams.next_flushable() {
            if remaining_visits == 0 || congestion_credit == 0 {
                self.streams.schedule_flush(id);
                break;
            }
            remaining_visits -= 1;

            // size the frame against the packet capacity before checking
            // any bytes out; the sizing payload already honors both credit
            // bounds so the checkout below can never come up short
            let sizing = match self.streams.send_stream_mut(id) {
                Some(send) => {
                    let (offset, available) = send.get_next_sendable_range();
                    let credit_bound = send
                        .unsent_offset()
                        .saturating_sub(offset)
                        .saturating_add(connection_credit)
                        .min(usize::MAX as u64) as usize;

                    let length = available
                        .min(credit_bound)
                        .min(congestion_credit.min(usize::MAX as u64) as usize);

                    let mut sizing = frame::Stream {
                        stream_id: id.as_varint(),
                        offset: VarInt::new(offset).expect("offsets fit a varint"),
                        is_last_frame: false,
                        is_fin: false,
                        data: frame::Padding { length },
                    };

                    match sizing.try_fit(encoder.remaining_capacity()) {
                        Ok(max_payload) => Some((sizing.is_last_frame, max_payload)),
                        Err(_) => None,
                    }
                }
                None => continue,
            };

            let (fills_packet, max_payload) = match sizing {
                Some(sizing) => sizing,
                None => {
                    // not even the frame header fits anymore
                    self.streams.schedule_flush(id);
                    break;
                }
            };

            let send = self
                .streams
                .send_stream_mut(id)
                .expect("the stream was just observed");
            let mut data = vec![0u8; max_payload];
            let out = match send.check_out(&mut data, connection_credit) {
                Some(out) => out,
                None => {
                    let blocked_at = if send.is_blocked() {
                        Some(send.max_stream_data())
                    } else {
                        None
                    };
                    if let Some(limit) = blocked_at {
                        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.13
                        //# A sender SHOULD send a STREAM_DATA_BLOCKED frame
                        //# (type=0x15) when it wishes to send data, but is
                        //# unable to due to stream-level flow control.
                        let frame = frame::StreamDataBlocked {
                            stream_id: id.as_varint(),
                            stream_data_limit: VarInt::new(limit)
                                .expect("limits fit a varint"),
                        };
                        if encoder.remaining_capacity() >= frame.encoding_size() {
                            encoder.encode(&frame);
                            summary.ack_eliciting = true;
                        }
                    }
                    continue;
                }
            };

            // dropping the length prefix is only sound when the payload
            // fills the capacity exactly
            let is_last_frame = fills_packet && out.len == max_payload;

            encoder.encode(&frame::Stream {
                stream_id: id.as_varint(),
                offset: VarInt::new(out.offset).expect("offsets fit a varint"),
                is_last_frame,
                is_fin: out.is_fin,
                data: &data[..out.len],
            });

            self.total_sent += out.newly_sent;
            connection_credit -= out.newly_sent;
            congestion_credit = congestion_credit.saturating_sub(out.len as u64);

            summary.frames.push(Restitution::StreamData {
                id,
                offset: out.offset,
                len: out.len,
                is_fin: out.is_fin,
            });
            summary.ack_eliciting = true;

            // keep the round-robin going if the stream still has data
            let still_flushable = self
                .streams
                .send_stream_mut(id)
                .map_or(false, |send| send.is_flushable());
            if still_flushable {
                self.streams.schedule_flush(id);
            }

            if is_last_frame {
                // the frame owns the rest of the packet
                break;
            }

            if connection_credit == 0 && still_flushable {
                //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#19.12
                //# A sender SHOULD send a DATA_BLOCKED frame (type=0x14) when
                //# it wishes to send data, but is unable to due to connection-
                //# level flow control
                self.data_blocked_pending = true;
                break;
            }
        }
    }

    fn write_blocked_frames(&mut self, encoder: &mut EncoderBuffer, summary: &mut FrameSummary) {
        if self.data_blocked_pending {
            let frame = frame::DataBlocked {
                data_limit: VarInt::new(self.peer_max_data).expect("limits fit a varint"),
            };
            if encoder.remaining_capacity() >= frame.encoding_size() {
                encoder.encode(&frame);
                self.data_blocked_pending = false;
                summary.ack_eliciting = true;
            }
        }

        for stream_type in [StreamType::Bidirectional, StreamType::Unidirectional] {
            let index = stream_type_index(stream_type);
            if self.streams_blocked_pending[index] {
                let frame = frame::StreamsBlocked {
                    stream_type,
                    stream_limit: VarInt::new(self.streams.peer_max_streams(stream_type))
                        .expect("limits fit a varint"),
                };
                if encoder.remaining_capacity() >= frame.encoding_size() {
                    encoder.encode(&frame);
                    self.streams_blocked_pending[index] = false;
                    summary.ack_eliciting = true;
                }
            }
        }
    }

    /// While closing, only CONNECTION_CLOSE frames leave the endpoint
    fn transmit_close(&mut self, _now: Timestamp, buf: &mut [u8]) -> usize {
        if !self.close_resend {
            return 0;
        }

        let close = match self.close.clone() {
            Some(close) => close,
            None => return 0,
        };

        // send at the highest level with keys so the peer can read it
        let space_id = if self.application_space.sealer.is_some() && self.handshake_complete {
            PacketNumberSpace::ApplicationData
        } else if self
            .handshake_space
            .as_ref()
            .map_or(false, |space| space.sealer.is_some())
        {
            PacketNumberSpace::Handshake
        } else if self
            .initial_space
            .as_ref()
            .map_or(false, |space| space.sealer.is_some())
        {
            PacketNumberSpace::Initial
        } else {
            return 0;
        };

        let len = self.transmit_close_packet(space_id, &close, buf);
        if len > 0 {
            self.close_resend = false;
        }
        len
    }

    fn transmit_close_packet(
        &mut self,
        space_id: PacketNumberSpace,
        close: &CloseReason,
        buf: &mut [u8],
    ) -> usize {
        let packet_type = packet_type_for(space_id);

        let (sealer_tag_len, sample_len) = {
            let space = self.space_mut(space_id).expect("space was just selected");
            let sealer = space.sealer.as_ref().expect("sealer was just selected");
            (
                crypto::Key::tag_len(sealer),
                crypto::HeaderKey::sealing_sample_len(sealer),
            )
        };

        let region_len = buf.len().min(self.max_packet_len());
        if region_len < 64 {
            return 0;
        }
        let region = &mut buf[..region_len];

        let (packet_number, truncated_pn) = {
            let space = self.space_mut(space_id).expect("space was just selected");
            let largest_acked = space.largest_acked_for_truncation();
            let packet_number = space_id.new_packet_number(
                VarInt::new(space.next_packet_number()).expect("packet numbers fit a varint"),
            );
            let truncated = packet_number
                .truncate(largest_acked)
                .expect("the next packet number is never behind the largest acked");
            (packet_number, truncated)
        };
        let pn_len = truncated_pn.len();

        let mut encoder = EncoderBuffer::new(&mut region[..region_len - sealer_tag_len]);

        let length_position = self.write_header(packet_type, pn_len, &mut encoder);
        let header_len = match length_position {
            Some(position) => position + 2,
            None => encoder.len(),
        };
        encoder.encode(&truncated_pn);
        let payload_start = encoder.len();

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#10.3
        //# An endpoint in the closing state sends a packet containing a
        //# CONNECTION_CLOSE frame in response to any incoming packet
        encoder.encode(&frame::ConnectionClose {
            error_code: close.error_code,
            frame_type: close.frame_type,
            reason: if close.reason.is_empty() {
                None
            } else {
                Some(close.reason.as_bytes())
            },
        });

        let mut payload_len = encoder.len() - payload_start;
        if payload_len + pn_len.bytesize() < MIN_SAMPLE_PAYLOAD {
            let padding = MIN_SAMPLE_PAYLOAD - payload_len - pn_len.bytesize();
            encoder.encode(&frame::Padding { length: padding });
            payload_len = encoder.len() - payload_start;
        }

        let packet_len = payload_start + payload_len + sealer_tag_len;

        if let Some(position) = length_position {
            let length = pn_len.bytesize() + payload_len + sealer_tag_len;
            region[position] = 0x40 | (length >> 8) as u8;
            region[position + 1] = length as u8;
        }

        self.seal_packet(
            space_id,
            packet_number,
            pn_len,
            header_len,
            payload_start,
            packet_len,
            sample_len,
            region,
        );

        self.space_mut(space_id)
            .expect("space was just selected")
            .commit_packet_number();

        packet_len
    }
}
