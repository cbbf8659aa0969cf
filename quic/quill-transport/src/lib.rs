// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The per-connection state machine: streams and their flow control, packet
//! number spaces, loss recovery, the send and receive pipelines, and the
//! socket context binding connections to a UDP endpoint.
//!
//! One worker drives each connection; applications interact only through
//! per-stream producer/consumer queues and a wake signal.

pub mod connection;
pub mod endpoint;
pub mod recovery;
pub mod space;
pub mod stream;
