// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Protocol primitives shared by every layer of the quill endpoint:
//! variable-length integers, interval sets, frames, packet numbers and
//! headers, crypto key traits, transport errors and parameters, and the
//! recovery arithmetic.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod application;
pub mod connection;
pub mod crypto;
pub mod endpoint;
#[cfg(feature = "alloc")]
pub mod frame;
#[cfg(feature = "alloc")]
pub mod interval_set;
pub mod packet;
pub mod recovery;
#[macro_use]
pub mod state;
pub mod stream;
pub mod time;
pub mod transport;
pub mod varint;
