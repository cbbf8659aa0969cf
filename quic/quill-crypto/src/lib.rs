// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Packet protection backed by *ring*.
//!
//! A [`Seal`] bundles the AEAD key, IV and header protection key for one
//! direction of one encryption level, and implements the key traits from
//! `quill-core` that the connection machinery consumes.

mod cipher_suite;
mod secret;
mod seal;

pub use seal::{initial_seals, Seal};

#[cfg(test)]
mod tests;
