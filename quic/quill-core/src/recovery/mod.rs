// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

mod congestion;
mod rtt_estimator;

pub use congestion::CongestionController;
pub use rtt_estimator::{RttEstimator, DEFAULT_INITIAL_RTT, K_GRANULARITY};

use core::time::Duration;

//= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#6.1.1
//# The RECOMMENDED initial value for the packet reordering threshold
//# (kPacketThreshold) is 3, based on best practices for TCP loss
//# detection.

pub const K_PACKET_THRESHOLD: u64 = 3;

//= https://tools.ietf.org/id/draft-ietf-quic-recovery-27.txt#6.1.2
//# The RECOMMENDED time threshold (kTimeThreshold), expressed as a
//# round-trip time multiplier, is 9/8.

#[inline]
pub fn time_threshold(rtt: Duration) -> Duration {
    (rtt * 9) / 8
}
