// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Connection timer handling: idle timeout, probe timeout, loss detection
//! deadlines, acknowledgment delays, and the closing/draining period.

use super::*;

impl Connection {
    /// Arms the probe timeout from the most recent ack-eliciting packet
    /// across all live spaces
    pub(super) fn arm_pto_timer(&mut self, _now: Timestamp) {
        let mut earliest: Option<Timestamp> = None;

        let spaces = [
            self.initial_space.as_ref(),
            self.handshake_space.as_ref(),
            Some(&self.application_space),
        ];

        for space in spaces.into_iter().flatten() {
            if !space.recovery.has_ack_eliciting_in_flight() {
                continue;
            }
            let base = match space.recovery.time_of_last_ack_eliciting() {
                Some(base) => base,
                None => continue,
            };

            let deadline = base + self.rtt.pto_period(self.pto_backoff, space.space());
            earliest = Some(match earliest {
                Some(current) => current.min(deadline),
                None => deadline,
            });
        }

        match earliest {
            Some(deadline) => self.pto_timer.set(deadline),
            None => self.pto_timer.cancel(),
        }
    }

    /// Drives every expired timer at `now`
    pub fn on_timeout(&mut self, now: Timestamp) {
        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#10.3
        //# Once the closing or draining period has ended, an endpoint SHOULD
        //# discard all connection state.
        if self.close_timer.poll_expiration(now) {
            let _ = self.state.on_drain_complete();
            debug!("connection closed");
            return;
        }

        //= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#10.2
        //# If the idle timeout is enabled by either peer, a connection is
        //# silently closed and its state is discarded when it remains idle
        //# for longer than the minimum of the max_idle_timeouts
        if self.idle_timer.poll_expiration(now) {
            debug!("idle timeout expired");
            self.state = State::Closed;
            return;
        }

        self.key_set.retire_prev(now);

        // per-space loss detection deadlines
        for space_id in [
            PacketNumberSpace::Initial,
            PacketNumberSpace::Handshake,
            PacketNumberSpace::ApplicationData,
        ] {
            let lost = {
                let rtt = &mut self.rtt;
                let congestion = &mut self.congestion;
                match space_mut!(self, space_id) {
                    Some(space) => space.recovery.on_loss_timeout(now, rtt, congestion),
                    None => continue,
                }
            };

            for packet in lost {
                for restitution in packet.frames {
                    self.on_frame_lost(space_id, restitution);
                }
            }
        }

        //= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#6.2
        //# When a PTO timer expires, the PTO period MUST be set to twice its
        //# current value.
        if self.pto_timer.poll_expiration(now) {
            debug!(backoff = self.pto_backoff, "probe timeout expired");
            self.pto_backoff = self.pto_backoff.saturating_mul(2);
            self.probe_pending = true;
            self.arm_pto_timer(now);
        }
    }

    /// The earliest instant at which `on_timeout` has work to do
    pub fn next_expiration(&self) -> Option<Timestamp> {
        let mut earliest: Option<Timestamp> = None;

        let mut consider = |timer: Option<Timestamp>| {
            if let Some(deadline) = timer {
                earliest = Some(match earliest {
                    Some(current) => current.min(deadline),
                    None => deadline,
                });
            }
        };

        consider(self.close_timer.next_expiration());
        consider(self.idle_timer.next_expiration());
        consider(self.pto_timer.next_expiration());

        let spaces = [
            self.initial_space.as_ref(),
            self.handshake_space.as_ref(),
            Some(&self.application_space),
        ];
        for space in spaces.into_iter().flatten() {
            consider(space.ack_timer.next_expiration());
            consider(space.recovery.loss_timer().next_expiration());
        }

        if let Some((_, retire_at)) = &self.key_set.prev_opener {
            consider(Some(*retire_at));
        }

        earliest
    }
}
