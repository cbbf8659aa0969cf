// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! A deterministic TLS session for exercising the connection machinery
//! without a real TLS library.
//!
//! The handshake shape mirrors TLS 1.3 closely enough to drive the
//! transport: a client flight at the Initial level, a server flight that
//! installs handshake and application secrets, and a client finished that
//! completes the exchange. Secrets are derived from fixed labels so both
//! sides agree without any actual key exchange.

use quill_core::{
    crypto::{
        tls::{Alert, CipherSuite, Context, Progress, Session},
        Level,
    },
    endpoint,
};

const CLIENT_HELLO: u8 = 0x01;
const SERVER_HELLO: u8 = 0x02;
const EXTENSIONS: u8 = 0x03;
const FINISHED: u8 = 0x04;

fn level_index(level: Level) -> usize {
    match level {
        Level::Initial => 0,
        Level::Handshake => 1,
        Level::Application => 2,
    }
}

fn secret(label: &str) -> [u8; 32] {
    let mut secret = [0x5cu8; 32];
    secret[..label.len()].copy_from_slice(label.as_bytes());
    secret
}

/// client-write/server-write secret pair for a level
fn level_secrets(level: Level) -> ([u8; 32], [u8; 32]) {
    match level {
        Level::Initial => unreachable!("initial secrets come from the salt"),
        Level::Handshake => (secret("hs client"), secret("hs server")),
        Level::Application => (secret("app client"), secret("app server")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandshakeState {
    ClientStart,
    ClientWaitServerFlight,
    ServerWaitClientHello,
    ServerWaitFinished,
    Complete,
}

/// The mock TLS session
pub struct TestSession {
    endpoint_type: endpoint::Type,
    state: HandshakeState,
    /// Encoded local transport parameters, carried in the hello/extensions
    local_parameters: Vec<u8>,
    peer_parameters: Option<Vec<u8>>,
    /// Contiguous received crypto bytes per level
    inbox: [Vec<u8>; 3],
    /// Parse cursor per level
    consumed: [usize; 3],
    /// Causes `do_handshake` to fail with a fatal alert
    pub fail_with_alert: Option<Alert>,
}

impl TestSession {
    pub fn new_client(local_parameters: Vec<u8>) -> Self {
        Self {
            endpoint_type: endpoint::Type::Client,
            state: HandshakeState::ClientStart,
            local_parameters,
            peer_parameters: None,
            inbox: Default::default(),
            consumed: [0; 3],
            fail_with_alert: None,
        }
    }

    pub fn new_server(local_parameters: Vec<u8>) -> Self {
        Self {
            endpoint_type: endpoint::Type::Server,
            state: HandshakeState::ServerWaitClientHello,
            local_parameters,
            peer_parameters: None,
            inbox: Default::default(),
            consumed: [0; 3],
            fail_with_alert: None,
        }
    }

    /// Pops one complete `tag || u16 len || body` message at `level`
    fn next_message(&mut self, level: Level) -> Option<(u8, Vec<u8>)> {
        let index = level_index(level);
        let bytes = &self.inbox[index][self.consumed[index]..];

        if bytes.len() < 3 {
            return None;
        }

        let tag = bytes[0];
        let len = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
        if bytes.len() < 3 + len {
            return None;
        }

        let body = bytes[3..3 + len].to_vec();
        self.consumed[index] += 3 + len;
        Some((tag, body))
    }

    fn emit(context: &mut dyn Context, level: Level, tag: u8, body: &[u8]) {
        let mut message = Vec::with_capacity(3 + body.len());
        message.push(tag);
        message.extend_from_slice(&(body.len() as u16).to_be_bytes());
        message.extend_from_slice(body);
        context.on_handshake_data(level, &message);
    }

    fn install(context: &mut dyn Context, local: endpoint::Type, level: Level) {
        let (client_write, server_write) = level_secrets(level);
        let (read, write) = match local {
            endpoint::Type::Client => (server_write, client_write),
            endpoint::Type::Server => (client_write, server_write),
        };
        context.on_secrets(level, CipherSuite::Aes128Gcm, &read, &write);
    }
}

impl Session for TestSession {
    fn provide_data(&mut self, level: Level, data: &[u8]) -> Result<(), Alert> {
        self.inbox[level_index(level)].extend_from_slice(data);
        Ok(())
    }

    fn do_handshake(&mut self, context: &mut dyn Context) -> Result<Progress, Alert> {
        if let Some(alert) = self.fail_with_alert {
            return Err(alert);
        }

        loop {
            match self.state {
                HandshakeState::ClientStart => {
                    let parameters = self.local_parameters.clone();
                    Self::emit(context, Level::Initial, CLIENT_HELLO, &parameters);
                    self.state = HandshakeState::ClientWaitServerFlight;
                }
                HandshakeState::ClientWaitServerFlight => {
                    if let Some((tag, _)) = self.next_message(Level::Initial) {
                        if tag != SERVER_HELLO {
                            return Err(Alert::HANDSHAKE_FAILURE);
                        }
                        Self::install(context, self.endpoint_type, Level::Handshake);
                        continue;
                    }

                    match self.next_message(Level::Handshake) {
                        Some((EXTENSIONS, body)) => {
                            self.peer_parameters = Some(body);
                        }
                        Some((FINISHED, _)) => {
                            Self::install(context, self.endpoint_type, Level::Application);
                            Self::emit(context, Level::Handshake, FINISHED, &[]);
                            context.on_flush();
                            self.state = HandshakeState::Complete;
                        }
                        Some(_) => return Err(Alert::HANDSHAKE_FAILURE),
                        None => return Ok(Progress::NeedData),
                    }
                }
                HandshakeState::ServerWaitClientHello => {
                    match self.next_message(Level::Initial) {
                        Some((CLIENT_HELLO, body)) => {
                            self.peer_parameters = Some(body);

                            Self::emit(context, Level::Initial, SERVER_HELLO, &[]);
                            Self::install(context, self.endpoint_type, Level::Handshake);

                            let parameters = self.local_parameters.clone();
                            Self::emit(context, Level::Handshake, EXTENSIONS, &parameters);
                            Self::emit(context, Level::Handshake, FINISHED, &[]);
                            Self::install(context, self.endpoint_type, Level::Application);
                            context.on_flush();

                            self.state = HandshakeState::ServerWaitFinished;
                        }
                        Some(_) => return Err(Alert::HANDSHAKE_FAILURE),
                        None => return Ok(Progress::NeedData),
                    }
                }
                HandshakeState::ServerWaitFinished => {
                    match self.next_message(Level::Handshake) {
                        Some((FINISHED, _)) => {
                            self.state = HandshakeState::Complete;
                        }
                        Some(_) => return Err(Alert::HANDSHAKE_FAILURE),
                        None => return Ok(Progress::NeedData),
                    }
                }
                HandshakeState::Complete => return Ok(Progress::Complete),
            }
        }
    }

    fn peer_transport_parameters(&self) -> Option<&[u8]> {
        self.peer_parameters.as_deref()
    }

    fn alpn(&self) -> Option<&[u8]> {
        Some(b"test")
    }

    fn cipher_suite(&self) -> CipherSuite {
        CipherSuite::Aes128Gcm
    }
}
