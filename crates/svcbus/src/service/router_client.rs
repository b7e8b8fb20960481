// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection of one process to the router.
//!
//! ```text
//!  process                                 router
//!    |--- Connect ------------------------->|
//!    |<-- ConnectAck { cookie } ------------|   (handshake, blocking)
//!    |                                      |
//!    |  send thread:    channel -> socket   |
//!    |  receive thread: socket -> handler   |
//! ```

use crate::address::{COOKIE_ROUTER, COOKIE_UNKNOWN};
use crate::config::{ConnectionSettings, CLOSE_DRAIN_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE};
use crate::error::{Error, Result};
use crate::transport::{RemoteMessage, RemoteServiceHandler, RouterMessage, Socket, SocketClient};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

enum Outgoing {
    Message(RemoteMessage),
    Exit,
}

/// Cloneable sending side of a [`RouterClient`].
#[derive(Clone)]
pub struct RouterSender {
    cookie: u64,
    sender: Sender<Outgoing>,
}

impl RouterSender {
    /// Cookie the router assigned to this process.
    pub fn cookie(&self) -> u64 {
        self.cookie
    }

    /// Queue `message` for the send thread; the source cookie is filled in.
    pub fn send_message(&self, mut message: RemoteMessage) -> Result<()> {
        message.set_source(self.cookie);
        self.sender
            .send(Outgoing::Message(message))
            .map_err(|_| Error::ConnectionClosed)
    }

    pub fn send_router_message(&self, message: &RouterMessage) -> Result<()> {
        self.send_message(message.to_message(self.cookie, COOKIE_ROUTER)?)
    }
}

impl std::fmt::Debug for RouterSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterSender").field("cookie", &self.cookie).finish()
    }
}

/// Client side of the router link.
///
/// When dropped, says goodbye to the router, closes the socket and joins
/// both connection threads.
pub struct RouterClient {
    settings: ConnectionSettings,
    socket: Socket,
    sender: RouterSender,
    closing: Arc<AtomicBool>,
    // Disconnects when the send thread exits.
    send_done: Receiver<()>,
    threads: Vec<JoinHandle<()>>,
}

impl RouterClient {
    /// Connect, run the handshake and start the connection threads.
    pub fn connect(settings: &ConnectionSettings, handler: Arc<dyn RemoteServiceHandler>) -> Result<Self> {
        Self::connect_with_limit(settings, handler, DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn connect_with_limit(
        settings: &ConnectionSettings,
        handler: Arc<dyn RemoteServiceHandler>,
        max_message_size: usize,
    ) -> Result<Self> {
        if !settings.enabled {
            return Err(Error::InvalidState(format!(
                "connection '{}' is disabled",
                settings.name
            )));
        }

        let mut client = SocketClient::new();
        client.create_socket_to(&settings.address, settings.port)?;
        let socket = client.socket();

        let cookie = handshake(&socket, max_message_size)?;
        log::info!(
            "[RouterClient] connected to {} as cookie {}",
            settings.endpoint(),
            cookie
        );

        let (tx, rx) = channel::unbounded();
        let closing = Arc::new(AtomicBool::new(false));
        let (done, send_done) = channel::bounded::<()>(0);
        let mut threads = Vec::with_capacity(2);

        let send_socket = socket.clone();
        let send_handler = handler.clone();
        threads.push(
            thread::Builder::new()
                .name(format!("{}-send", settings.name))
                .spawn(move || {
                    send_loop(rx, send_socket, send_handler);
                    drop(done);
                })?,
        );

        let recv_socket = socket.clone();
        let recv_closing = closing.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-receive", settings.name))
            .spawn(move || receive_loop(recv_socket, handler, recv_closing, max_message_size));
        match spawned {
            Ok(thread) => threads.push(thread),
            Err(e) => {
                let _ = tx.send(Outgoing::Exit);
                socket.shutdown();
                return Err(Error::Io(e));
            }
        }

        Ok(Self {
            settings: settings.clone(),
            socket,
            sender: RouterSender { cookie, sender: tx },
            closing,
            send_done,
            threads,
        })
    }

    pub fn cookie(&self) -> u64 {
        self.sender.cookie
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn sender(&self) -> RouterSender {
        self.sender.clone()
    }

    pub fn send_message(&self, message: RemoteMessage) -> Result<()> {
        self.sender.send_message(message)
    }

    /// Send `Disconnect`, close the socket and join the threads.
    pub fn disconnect(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.closing.store(true, Ordering::Release);
        if let Err(e) = self.sender.send_router_message(&RouterMessage::Disconnect) {
            log::debug!("[RouterClient] goodbye not sent: {}", e);
        }
        let _ = self.sender.sender.send(Outgoing::Exit);

        // The send thread drains the goodbye before the socket goes down,
        // unless the router stopped reading.
        if let Err(RecvTimeoutError::Timeout) = self.send_done.recv_timeout(CLOSE_DRAIN_TIMEOUT) {
            log::warn!(
                "[RouterClient] {} not draining, dropping queued messages",
                self.settings.endpoint()
            );
        }
        self.socket.shutdown();
        for thread in std::mem::take(&mut self.threads) {
            if thread.join().is_err() {
                log::error!("[RouterClient] connection thread panicked");
            }
        }
        log::info!("[RouterClient] disconnected from {}", self.settings.endpoint());
    }
}

impl Drop for RouterClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn handshake(socket: &Socket, max_message_size: usize) -> Result<u64> {
    RouterMessage::Connect
        .to_message(COOKIE_UNKNOWN, COOKIE_ROUTER)?
        .send_message(socket)?;
    let reply = RemoteMessage::receive_message(socket, max_message_size)?;
    match RouterMessage::from_message(&reply) {
        Ok(RouterMessage::ConnectAck { cookie }) if cookie != COOKIE_UNKNOWN => Ok(cookie),
        Ok(other) => Err(Error::Handshake(format!("unexpected reply {:?}", other))),
        Err(e) => Err(Error::Handshake(e.to_string())),
    }
}

fn send_loop(receiver: Receiver<Outgoing>, socket: Socket, handler: Arc<dyn RemoteServiceHandler>) {
    while let Ok(Outgoing::Message(message)) = receiver.recv() {
        if let Err(e) = message.send_message(&socket) {
            log::warn!("[RouterClient] send of {:#010x} failed: {}", message.message_id(), e);
            handler.failed_send_message(&message, &socket);
            break;
        }
    }
    log::debug!("[RouterClient] send thread exiting");
}

fn receive_loop(
    socket: Socket,
    handler: Arc<dyn RemoteServiceHandler>,
    closing: Arc<AtomicBool>,
    max_message_size: usize,
) {
    let peer = socket.peer_address();
    loop {
        match RemoteMessage::receive_message(&socket, max_message_size) {
            Ok(message) => match &peer {
                Some(addr) => handler.process_received_message(message, addr, &socket),
                None => handler.failed_process_message(&message),
            },
            Err(Error::ChecksumMismatch { expected, actual }) => {
                log::warn!(
                    "[RouterClient] dropping corrupted message ({:#010x} != {:#010x})",
                    expected,
                    actual
                );
            }
            Err(e) => {
                if !closing.load(Ordering::Acquire) {
                    log::warn!("[RouterClient] connection lost: {}", e);
                    handler.failed_receive_message(&socket);
                }
                break;
            }
        }
    }
    log::debug!("[RouterClient] receive thread exiting");
}
