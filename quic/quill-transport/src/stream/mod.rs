// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

pub mod chunks;
pub mod manager;
pub mod recv;
pub mod send;

pub use manager::StreamManager;
pub use recv::ReceiveStream;
pub use send::SendStream;

use core::fmt;
use quill_core::application;

/// An error surfaced to the application on a stream operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamError {
    /// The stream was reset, locally or by the peer
    StreamAborted(application::Error),
    /// The producer wrote after marking the end of the stream
    SendAfterFinish,
    /// The connection closed before the operation could complete
    ConnectionClosed,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::StreamAborted(error) => write!(f, "stream was aborted: {error}"),
            Self::SendAfterFinish => write!(f, "the stream was already finished"),
            Self::ConnectionClosed => write!(f, "the connection was closed"),
        }
    }
}

impl std::error::Error for StreamError {}
