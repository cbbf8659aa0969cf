// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::state::{event, is};

//= https://tools.ietf.org/id/draft-ietf-quic-transport-27.txt#3.1
//#        o
//#        | Create Stream (Sending)
//#        | Peer Creates Bidirectional Stream
//#        v
//#    +-------+
//#    | Ready | Send RESET_STREAM
//#    |       |-----------------------.
//#    +-------+                       |
//#        |                           |
//#        | Send STREAM /             |
//#        |      STREAM_DATA_BLOCKED  |
//#        v                           |
//#    +-------+                       |
//#    | Send  | Send RESET_STREAM     |
//#    |       |---------------------->|
//#    +-------+                       |
//#        |                           |
//#        | Send STREAM + FIN         |
//#        v                           v
//#    +-------+                   +-------+
//#    | Data  | Send RESET_STREAM | Reset |
//#    | Sent  |------------------>| Sent  |
//#    +-------+                   +-------+
//#        |                           |
//#        | Recv All ACKs             | Recv ACK
//#        v                           v
//#    +-------+                   +-------+
//#    | Data  |                   | Reset |
//#    | Recvd |                   | Recvd |
//#    +-------+                   +-------+

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Sender {
    #[default]
    Ready,
    Send,
    DataSent,
    DataRecvd,
    /// An application-requested reset that has not yet been put on the wire
    ResetQueued,
    ResetSent,
    ResetRecvd,
}

impl Sender {
    is!(is_ready, Ready);
    is!(is_sending, Send);
    is!(is_data_sent, DataSent);
    is!(is_data_received, DataRecvd);
    is!(is_reset_queued, ResetQueued);
    is!(is_reset_sent, ResetSent);
    is!(is_reset_received, ResetRecvd);
    is!(is_resetting, ResetQueued | ResetSent | ResetRecvd);
    is!(is_terminal, DataRecvd | ResetRecvd);

    event! {
        on_send_stream(Ready => Send);
        // the first emission may already carry the FIN, jumping straight
        // from Ready to DataSent
        on_send_fin(Ready | Send => DataSent);
        on_recv_all_acks(DataSent => DataRecvd);

        on_queue_reset(Ready | Send | DataSent => ResetQueued);
        on_send_reset(ResetQueued => ResetSent);
        /// A lost RESET_STREAM frame goes back on the queue
        on_reset_lost(ResetSent => ResetQueued);
        on_recv_reset_ack(ResetSent => ResetRecvd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_path_test() {
        let mut state = Sender::default();
        state.on_send_stream().unwrap();
        state.on_send_fin().unwrap();
        state.on_recv_all_acks().unwrap();
        assert!(state.is_terminal());

        // no reset can happen once all data is acknowledged
        assert!(state.on_queue_reset().is_err());
    }

    #[test]
    fn reset_path_test() {
        let mut state = Sender::default();
        state.on_send_stream().unwrap();
        state.on_queue_reset().unwrap();
        state.on_send_reset().unwrap();
        state.on_reset_lost().unwrap();
        state.on_send_reset().unwrap();
        state.on_recv_reset_ack().unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn fin_from_ready_test() {
        let mut state = Sender::default();
        state.on_send_fin().unwrap();
        assert!(state.is_data_sent());
    }
}
