// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One accepted process connection.
//!
//! Each connection runs a blocking receive thread feeding the registry
//! thread and a send thread draining an outgoing queue, so a slow peer
//! never stalls the registry.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use svcbus::config::CLOSE_DRAIN_TIMEOUT;
use svcbus::transport::{RemoteMessage, RemoteServiceHandler, Socket, SocketAddress};

use crate::server::RouterCommand;

enum Outgoing {
    Message(RemoteMessage),
    Exit,
}

/// Connection callbacks, tagged with the connection cookie.
pub(crate) struct ConnectionLink {
    cookie: u64,
    commands: Sender<RouterCommand>,
    closing: AtomicBool,
}

impl ConnectionLink {
    fn report(&self, command: RouterCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!(cookie = self.cookie, "registry thread gone, event dropped");
        }
    }
}

impl RemoteServiceHandler for ConnectionLink {
    fn failed_send_message(&self, message: &RemoteMessage, target: &Socket) {
        tracing::warn!(
            cookie = self.cookie,
            "message {:#010x} not sent to {:?}",
            message.message_id(),
            target.peer_address()
        );
        if !self.closing.load(Ordering::Acquire) {
            self.report(RouterCommand::Lost(self.cookie));
        }
    }

    fn failed_receive_message(&self, _source: &Socket) {
        if !self.closing.load(Ordering::Acquire) {
            self.report(RouterCommand::Lost(self.cookie));
        }
    }

    fn failed_process_message(&self, message: &RemoteMessage) {
        tracing::warn!(
            "message {:#010x} from cookie {} to cookie {} undeliverable",
            message.message_id(),
            message.source(),
            message.target()
        );
    }

    fn process_received_message(&self, message: RemoteMessage, addr: &SocketAddress, _source: &Socket) {
        tracing::trace!(cookie = self.cookie, %addr, "received {:?}", message);
        self.report(RouterCommand::Received {
            cookie: self.cookie,
            message,
        });
    }
}

/// Router side of a connected process.
///
/// When dropped, closes the socket and joins both threads.
pub(crate) struct Connection {
    cookie: u64,
    peer: SocketAddress,
    socket: Socket,
    link: Arc<ConnectionLink>,
    outgoing: Sender<Outgoing>,
    // Disconnects when the send thread exits.
    send_done: Receiver<()>,
    threads: Vec<JoinHandle<()>>,
}

impl Connection {
    /// Start the send and receive threads of an accepted socket.
    pub(crate) fn start(
        cookie: u64,
        socket: Socket,
        peer: SocketAddress,
        commands: Sender<RouterCommand>,
        max_message_size: usize,
    ) -> std::io::Result<Self> {
        let link = Arc::new(ConnectionLink {
            cookie,
            commands,
            closing: AtomicBool::new(false),
        });
        let (outgoing, queue) = channel::unbounded();
        let (done, send_done) = channel::bounded::<()>(0);
        let mut connection = Self {
            cookie,
            peer,
            socket,
            link,
            outgoing,
            send_done,
            threads: Vec::with_capacity(2),
        };

        let send_socket = connection.socket.clone();
        let send_link = connection.link.clone();
        connection.threads.push(
            thread::Builder::new()
                .name(format!("svcbus-send-{}", cookie))
                .spawn(move || {
                    send_loop(queue, send_socket, send_link);
                    drop(done);
                })?,
        );

        let recv_socket = connection.socket.clone();
        let recv_link = connection.link.clone();
        connection.threads.push(
            thread::Builder::new()
                .name(format!("svcbus-recv-{}", cookie))
                .spawn(move || receive_loop(recv_socket, recv_link, max_message_size))?,
        );

        tracing::info!(cookie, peer = %connection.peer, "connection started");
        Ok(connection)
    }

    pub(crate) fn cookie(&self) -> u64 {
        self.cookie
    }

    pub(crate) fn peer(&self) -> &SocketAddress {
        &self.peer
    }

    pub(crate) fn link(&self) -> &ConnectionLink {
        &self.link
    }

    /// Queue `message` for the send thread.
    pub(crate) fn send(&self, message: RemoteMessage) -> bool {
        self.outgoing.send(Outgoing::Message(message)).is_ok()
    }

    /// Flush queued messages, close the socket and join the threads.
    ///
    /// A peer that does not read within the drain timeout loses whatever
    /// is still queued.
    pub(crate) fn close(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.link.closing.store(true, Ordering::Release);
        let _ = self.outgoing.send(Outgoing::Exit);

        if let Err(RecvTimeoutError::Timeout) = self.send_done.recv_timeout(CLOSE_DRAIN_TIMEOUT) {
            tracing::warn!(
                cookie = self.cookie,
                peer = %self.peer,
                "peer not reading, dropping {} queued messages",
                self.outgoing.len()
            );
        }
        self.socket.shutdown();
        for thread in std::mem::take(&mut self.threads) {
            if thread.join().is_err() {
                tracing::error!(cookie = self.cookie, "connection thread panicked");
            }
        }
        tracing::info!(cookie = self.cookie, peer = %self.peer, "connection closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn send_loop(queue: Receiver<Outgoing>, socket: Socket, link: Arc<ConnectionLink>) {
    while let Ok(Outgoing::Message(message)) = queue.recv() {
        if let Err(e) = message.send_message(&socket) {
            tracing::debug!(cookie = link.cookie, "send failed: {}", e);
            link.failed_send_message(&message, &socket);
            break;
        }
    }
}

fn receive_loop(socket: Socket, link: Arc<ConnectionLink>, max_message_size: usize) {
    let Some(peer) = socket.peer_address() else {
        link.failed_receive_message(&socket);
        return;
    };
    loop {
        match RemoteMessage::receive_message(&socket, max_message_size) {
            Ok(message) => link.process_received_message(message, &peer, &socket),
            Err(svcbus::Error::ChecksumMismatch { expected, actual }) => {
                tracing::warn!(
                    cookie = link.cookie,
                    "dropping corrupted message ({:#010x} != {:#010x})",
                    expected,
                    actual
                );
            }
            Err(e) => {
                if !link.closing.load(Ordering::Acquire) {
                    tracing::info!(cookie = link.cookie, "connection lost: {}", e);
                }
                link.failed_receive_message(&socket);
                break;
            }
        }
    }
}
