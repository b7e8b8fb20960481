// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Routing server.
//!
//! ```text
//!  accept thread ---- Accepted ----+
//!                                  v
//!  receive threads -- Received --> registry thread --> send threads
//!                  -- Lost ----->  (ServiceRegistry, connections)
//! ```
//!
//! The registry thread is the only owner of the network-wide
//! [`ServiceRegistry`] and of the connection table; every other thread
//! talks to it through [`RouterCommand`]s.

use crate::config::{ConfigError, RouterConfig};
use crate::connection::Connection;
use crossbeam::channel::{self, Receiver, Sender};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use svcbus::address::{Channel, COOKIE_FIRST_REMOTE, COOKIE_ROUTER};
use svcbus::interface::ResultType;
use svcbus::registry::{ConnectionChange, ServiceConnection, ServiceRegistry};
use svcbus::transport::{
    is_router_message, RemoteMessage, RemoteServiceHandler, RouterMessage, Socket,
    SocketAddress, SocketClient, SocketServer,
};
use svcbus::{ProxyAddress, StubAddress};
use thiserror::Error;

const STATS_TIMEOUT: Duration = Duration::from_secs(5);

/// Router errors.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] svcbus::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Router not running")]
    NotRunning,

    #[error("Router already running")]
    AlreadyRunning,
}

/// Work items of the registry thread.
pub(crate) enum RouterCommand {
    Accepted { socket: Socket, peer: SocketAddress },
    Received { cookie: u64, message: RemoteMessage },
    Lost(u64),
    Stats(Sender<RouterStats>),
    Exit,
}

/// Snapshot of the router counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Processes currently connected.
    pub connections: usize,
    /// Connections refused because of `max_connections`.
    pub refused: u64,
    /// Services known to the registry.
    pub services: usize,
    /// Connected stubs.
    pub stubs: usize,
    /// Registered proxies.
    pub proxies: usize,
    /// Application messages forwarded to their target.
    pub forwarded: u64,
    /// Application messages answered with `Undelivered`.
    pub undelivered: u64,
}

/// State owned by the registry thread.
struct RouterState {
    registry: ServiceRegistry,
    connections: HashMap<u64, Connection>,
    commands: Sender<RouterCommand>,
    next_cookie: u64,
    max_connections: usize,
    max_message_size: usize,
    refused: u64,
    forwarded: u64,
    undelivered: u64,
}

impl RouterState {
    fn new(config: &RouterConfig, commands: Sender<RouterCommand>) -> Self {
        Self {
            registry: ServiceRegistry::new(),
            connections: HashMap::new(),
            commands,
            next_cookie: COOKIE_FIRST_REMOTE,
            max_connections: config.router.max_connections,
            max_message_size: config.router.max_message_size,
            refused: 0,
            forwarded: 0,
            undelivered: 0,
        }
    }

    fn accepted(&mut self, socket: Socket, peer: SocketAddress) {
        if self.connections.len() >= self.max_connections {
            self.refused += 1;
            tracing::warn!(%peer, "connection refused, {} connections open", self.connections.len());
            socket.shutdown();
            return;
        }

        let cookie = self.next_cookie;
        self.next_cookie += 1;
        match Connection::start(
            cookie,
            socket,
            peer,
            self.commands.clone(),
            self.max_message_size,
        ) {
            Ok(connection) => {
                self.connections.insert(cookie, connection);
            }
            Err(e) => tracing::error!(cookie, "cannot start connection threads: {}", e),
        }
    }

    fn send_to(&self, cookie: u64, message: RemoteMessage) -> bool {
        match self.connections.get(&cookie) {
            Some(connection) => connection.send(message),
            None => false,
        }
    }

    fn send_router_message(&self, cookie: u64, message: &RouterMessage) {
        match message.to_message(COOKIE_ROUTER, cookie) {
            Ok(encoded) => {
                if !self.send_to(cookie, encoded) {
                    tracing::debug!(cookie, "{:?} not sent, connection gone", message.message_id());
                }
            }
            Err(e) => tracing::error!(cookie, "cannot encode router message: {}", e),
        }
    }

    /// Tell both ends of a binding, once per process.
    fn notify(&self, change: ConnectionChange, skip: Option<u64>) {
        let cookies: BTreeSet<u64> = [change.stub.cookie(), change.proxy.cookie()]
            .into_iter()
            .filter(|c| Some(*c) != skip)
            .collect();
        let message = RouterMessage::ServiceConnection(change);
        for cookie in cookies {
            self.send_router_message(cookie, &message);
        }
    }

    fn received(&mut self, cookie: u64, mut message: RemoteMessage) {
        if !self.connections.contains_key(&cookie) {
            tracing::debug!(cookie, "message from closed connection dropped");
            return;
        }
        message.set_source(cookie);

        if is_router_message(message.message_id()) {
            match RouterMessage::from_message(&message) {
                Ok(request) => self.router_message(cookie, request),
                Err(e) => tracing::warn!(cookie, "bad router message: {}", e),
            }
            return;
        }
        self.forward(cookie, message);
    }

    fn router_message(&mut self, cookie: u64, request: RouterMessage) {
        match request {
            RouterMessage::Connect => {
                self.send_router_message(cookie, &RouterMessage::ConnectAck { cookie });
            }
            RouterMessage::Disconnect => {
                tracing::info!(cookie, "process said goodbye");
                self.lost(cookie);
            }
            RouterMessage::RegisterStub(stub) => self.register_stub(stamp_stub(stub, cookie)),
            RouterMessage::UnregisterStub(stub) => self.unregister_stub(stamp_stub(stub, cookie)),
            RouterMessage::RegisterProxy(proxy) => self.register_proxy(stamp_proxy(proxy, cookie)),
            RouterMessage::UnregisterProxy(proxy) => {
                self.unregister_proxy(stamp_proxy(proxy, cookie))
            }
            other @ (RouterMessage::ConnectAck { .. } | RouterMessage::ServiceConnection(_)) => {
                tracing::warn!(cookie, "unexpected router message {:?}", other);
            }
        }
    }

    fn register_stub(&mut self, stub: StubAddress) {
        let (registered, proxies) = self.registry.register_service_stub(&stub);
        if registered.address() != &stub {
            tracing::warn!("{} not registered, provided by cookie {}", stub, registered.address().cookie());
            return;
        }
        tracing::info!(cookie = stub.cookie(), "stub {} registered", stub.service_address());
        for proxy in proxies {
            self.notify(
                ConnectionChange::new(stub.clone(), proxy.address().clone(), ServiceConnection::Connected),
                None,
            );
        }
    }

    fn unregister_stub(&mut self, stub: StubAddress) {
        let Some((_, proxies)) = self.registry.unregister_service_stub(&stub) else {
            return;
        };
        tracing::info!(cookie = stub.cookie(), "stub {} unregistered", stub.service_address());
        for proxy in proxies {
            self.notify(
                ConnectionChange::new(stub.clone(), proxy.address().clone(), ServiceConnection::Pending),
                Some(stub.cookie()),
            );
        }
    }

    fn register_proxy(&mut self, proxy: ProxyAddress) {
        let (stub, registered) = self.registry.register_service_proxy(&proxy);
        tracing::debug!(cookie = proxy.cookie(), "proxy {} registered", proxy.service_address());
        if registered.is_connected() {
            self.notify(
                ConnectionChange::new(stub.address().clone(), proxy, ServiceConnection::Connected),
                None,
            );
        }
    }

    fn unregister_proxy(&mut self, proxy: ProxyAddress) {
        let Some((stub, _)) = self.registry.unregister_service_proxy(&proxy) else {
            return;
        };
        tracing::debug!(cookie = proxy.cookie(), "proxy {} unregistered", proxy.service_address());
        if stub.is_connected() {
            let skip = Some(proxy.cookie());
            self.notify(
                ConnectionChange::new(stub.address().clone(), proxy, ServiceConnection::Disconnected),
                skip,
            );
        }
    }

    fn forward(&mut self, cookie: u64, message: RemoteMessage) {
        let target = message.target();
        if target != COOKIE_ROUTER && self.connections.contains_key(&target) {
            self.forwarded += 1;
            self.send_to(target, message);
            return;
        }

        self.undelivered += 1;
        if let Some(connection) = self.connections.get(&cookie) {
            connection.link().failed_process_message(&message);
            connection.send(message.reply(ResultType::Undelivered));
        }
    }

    fn lost(&mut self, cookie: u64) {
        let Some(mut connection) = self.connections.remove(&cookie) else {
            return;
        };
        connection.close();

        let changes = self.registry.disconnect_cookie(cookie);
        tracing::info!(
            cookie,
            peer = %connection.peer(),
            "connection removed, {} bindings changed",
            changes.len()
        );
        for change in changes {
            self.notify(change, Some(cookie));
        }
    }

    fn stats(&self) -> RouterStats {
        let (stubs, proxies) = self.registry.get_service_list(svcbus::address::COOKIE_UNKNOWN);
        RouterStats {
            connections: self.connections.len(),
            refused: self.refused,
            services: self.registry.len(),
            stubs: stubs.len(),
            proxies: proxies.len(),
            forwarded: self.forwarded,
            undelivered: self.undelivered,
        }
    }

    fn shutdown(&mut self) {
        for (_, mut connection) in self.connections.drain() {
            tracing::debug!(cookie = connection.cookie(), "closing connection");
            connection.close();
        }
        self.registry.clear();
    }
}

/// Endpoints announced by `cookie` always carry that cookie.
fn stamp_stub(mut stub: StubAddress, cookie: u64) -> StubAddress {
    stub.set_channel(stamp_channel(stub.channel(), cookie));
    stub
}

fn stamp_proxy(mut proxy: ProxyAddress, cookie: u64) -> ProxyAddress {
    proxy.set_channel(stamp_channel(proxy.channel(), cookie));
    proxy
}

fn stamp_channel(mut channel: Channel, cookie: u64) -> Channel {
    if channel.cookie() != cookie {
        tracing::debug!("channel cookie {} rewritten to {}", channel.cookie(), cookie);
        channel.set_cookie(cookie);
    }
    channel
}

fn registry_loop(mut state: RouterState, commands: Receiver<RouterCommand>) {
    tracing::debug!("registry thread started");
    while let Ok(command) = commands.recv() {
        match command {
            RouterCommand::Accepted { socket, peer } => state.accepted(socket, peer),
            RouterCommand::Received { cookie, message } => state.received(cookie, message),
            RouterCommand::Lost(cookie) => state.lost(cookie),
            RouterCommand::Stats(reply) => {
                let _ = reply.send(state.stats());
            }
            RouterCommand::Exit => break,
        }
    }
    state.shutdown();
    tracing::debug!("registry thread stopped");
}

fn accept_loop(server: SocketServer, commands: Sender<RouterCommand>, running: Arc<AtomicBool>) {
    tracing::debug!("accept thread started");
    while running.load(Ordering::Acquire) {
        match server.accept_connection() {
            Ok((socket, peer)) => {
                if !running.load(Ordering::Acquire) {
                    socket.shutdown();
                    break;
                }
                if commands.send(RouterCommand::Accepted { socket, peer }).is_err() {
                    break;
                }
            }
            Err(e) => {
                if !running.load(Ordering::Acquire) {
                    break;
                }
                tracing::warn!("accept failed: {}", e);
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
    tracing::debug!("accept thread stopped");
}

/// Cloneable access to a running router.
#[derive(Clone)]
pub struct RouterHandle {
    commands: Sender<RouterCommand>,
    running: Arc<AtomicBool>,
}

impl RouterHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Counters of the registry thread.
    pub fn stats(&self) -> Result<RouterStats, RouterError> {
        let (tx, rx) = channel::bounded(1);
        self.commands
            .send(RouterCommand::Stats(tx))
            .map_err(|_| RouterError::NotRunning)?;
        rx.recv_timeout(STATS_TIMEOUT)
            .map_err(|_| RouterError::NotRunning)
    }
}

/// The routing server.
///
/// When dropped, stops accepting, closes every connection and joins its
/// threads.
pub struct RouterServer {
    config: RouterConfig,
    server: Option<SocketServer>,
    listener: Socket,
    local: SocketAddress,
    commands: Sender<RouterCommand>,
    receiver: Option<Receiver<RouterCommand>>,
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl RouterServer {
    /// Validate `config` and bind the listening socket.
    pub fn bind(config: RouterConfig) -> Result<Self, RouterError> {
        config.validate()?;
        let tcpip = config.tcpip();
        let mut server = SocketServer::new();
        server.set_address(&tcpip.address, tcpip.port)?;
        server.create_socket()?;
        let local = server.local_address().ok_or_else(|| {
            RouterError::Transport(svcbus::Error::InvalidState(
                "listening socket has no address".to_string(),
            ))
        })?;
        let (commands, receiver) = channel::unbounded();

        tracing::info!(name = %config.router.name, %local, "router bound");
        Ok(Self {
            config,
            listener: server.socket(),
            server: Some(server),
            local,
            commands,
            receiver: Some(receiver),
            running: Arc::new(AtomicBool::new(false)),
            threads: Vec::with_capacity(2),
        })
    }

    /// Actual listening address (useful with port 0).
    pub fn local_address(&self) -> &SocketAddress {
        &self.local
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Start the registry and accept threads.
    pub fn start(&mut self) -> Result<RouterHandle, RouterError> {
        let (Some(server), Some(receiver)) = (self.server.take(), self.receiver.take()) else {
            return Err(RouterError::AlreadyRunning);
        };
        self.running.store(true, Ordering::Release);

        let state = RouterState::new(&self.config, self.commands.clone());
        self.threads.push(
            thread::Builder::new()
                .name("svcbus-router-registry".to_string())
                .spawn(move || registry_loop(state, receiver))?,
        );

        let commands = self.commands.clone();
        let running = self.running.clone();
        let spawned = thread::Builder::new()
            .name("svcbus-router-accept".to_string())
            .spawn(move || accept_loop(server, commands, running));
        match spawned {
            Ok(thread) => self.threads.push(thread),
            Err(e) => {
                self.stop();
                return Err(RouterError::Io(e));
            }
        }

        tracing::info!(name = %self.config.router.name, local = %self.local, "router started");
        Ok(self.handle())
    }

    pub fn handle(&self) -> RouterHandle {
        RouterHandle {
            commands: self.commands.clone(),
            running: self.running.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop accepting, close every connection and join the threads.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.listener.shutdown();
        wake_listener(&self.local);
        let _ = self.commands.send(RouterCommand::Exit);

        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                tracing::error!("router thread panicked");
            }
        }
        self.listener.close_socket();
    }
}

impl Drop for RouterServer {
    fn drop(&mut self) {
        if !self.threads.is_empty() {
            self.stop();
        }
    }
}

// Platforms where shutdown() does not interrupt accept() need a connection.
fn wake_listener(local: &SocketAddress) {
    let mut client = SocketClient::new();
    if client.create_socket_to(local.host(), local.port()).is_ok() {
        client.close_socket();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use svcbus::address::ServiceAddress;
    use svcbus::config::{ConnectionSettings, CLOSE_DRAIN_TIMEOUT};
    use svcbus::ser::OutStream;
    use svcbus::{ServiceType, Version};

    fn start_router(max_connections: usize) -> (RouterServer, RouterHandle) {
        let mut config = RouterConfig::listen("127.0.0.1", 0);
        config.router.max_connections = max_connections;
        let mut server = RouterServer::bind(config).expect("bind");
        let handle = server.start().expect("start");
        (server, handle)
    }

    fn connect(server: &RouterServer) -> Socket {
        let mut client = SocketClient::new();
        client
            .create_socket_to("127.0.0.1", server.local_address().port())
            .expect("connect");
        client.socket()
    }

    fn handshake(socket: &Socket) -> u64 {
        RouterMessage::Connect
            .to_message(0, COOKIE_ROUTER)
            .expect("encode")
            .send_message(socket)
            .expect("send");
        let reply = RemoteMessage::receive_message(socket, 1 << 20).expect("reply");
        match RouterMessage::from_message(&reply).expect("decode") {
            RouterMessage::ConnectAck { cookie } => cookie,
            other => panic!("unexpected {:?}", other),
        }
    }

    fn wait_for(handle: &RouterHandle, check: impl Fn(&RouterStats) -> bool) -> RouterStats {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            let stats = handle.stats().expect("stats");
            if check(&stats) || std::time::Instant::now() > deadline {
                return stats;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn calc() -> ServiceAddress {
        ServiceAddress::with("Calc", Version::new(1, 0, 0), ServiceType::Public, "calc")
    }

    #[test]
    fn test_handshake_assigns_increasing_cookies() {
        let (_server, _handle) = start_router(8);
        let first = connect(&_server);
        let second = connect(&_server);
        let a = handshake(&first);
        let b = handshake(&second);
        assert!(a >= COOKIE_FIRST_REMOTE);
        assert!(b >= COOKIE_FIRST_REMOTE);
        assert_ne!(a, b);
    }

    #[test]
    fn test_binding_notifies_both_processes() {
        let (server, handle) = start_router(8);
        let provider = connect(&server);
        let consumer = connect(&server);
        let provider_cookie = handshake(&provider);
        let consumer_cookie = handshake(&consumer);

        let stub = StubAddress::local(calc(), "server");
        RouterMessage::RegisterStub(stub)
            .to_message(provider_cookie, COOKIE_ROUTER)
            .expect("encode")
            .send_message(&provider)
            .expect("send");
        let proxy = ProxyAddress::local(calc(), "client");
        RouterMessage::RegisterProxy(proxy)
            .to_message(consumer_cookie, COOKIE_ROUTER)
            .expect("encode")
            .send_message(&consumer)
            .expect("send");

        for (socket, _) in [(&provider, provider_cookie), (&consumer, consumer_cookie)] {
            let message = RemoteMessage::receive_message(socket, 1 << 20).expect("notification");
            match RouterMessage::from_message(&message).expect("decode") {
                RouterMessage::ServiceConnection(change) => {
                    assert_eq!(change.status, ServiceConnection::Connected);
                    assert_eq!(change.stub.cookie(), provider_cookie);
                    assert_eq!(change.proxy.cookie(), consumer_cookie);
                }
                other => panic!("unexpected {:?}", other),
            }
        }

        let stats = wait_for(&handle, |s| s.stubs == 1 && s.proxies == 1);
        assert_eq!(stats.connections, 2);
        assert_eq!(stats.services, 1);
    }

    #[test]
    fn test_unknown_target_is_answered_undelivered() {
        let (server, handle) = start_router(8);
        let socket = connect(&server);
        let cookie = handshake(&socket);

        let mut message = RemoteMessage::new(0x0001_0001, cookie, 9999);
        message.set_sequence(42);
        message.send_message(&socket).expect("send");

        let reply = RemoteMessage::receive_message(&socket, 1 << 20).expect("reply");
        assert_eq!(reply.result(), ResultType::Undelivered);
        assert_eq!(reply.sequence(), 42);
        assert_eq!(reply.target(), cookie);
        assert_eq!(wait_for(&handle, |s| s.undelivered == 1).undelivered, 1);
    }

    #[test]
    fn test_lost_provider_sets_proxies_pending() {
        let (server, handle) = start_router(8);
        let provider = connect(&server);
        let consumer = connect(&server);
        let provider_cookie = handshake(&provider);
        let consumer_cookie = handshake(&consumer);

        RouterMessage::RegisterProxy(ProxyAddress::local(calc(), "client"))
            .to_message(consumer_cookie, COOKIE_ROUTER)
            .expect("encode")
            .send_message(&consumer)
            .expect("send");
        RouterMessage::RegisterStub(StubAddress::local(calc(), "server"))
            .to_message(provider_cookie, COOKIE_ROUTER)
            .expect("encode")
            .send_message(&provider)
            .expect("send");
        let connected = RemoteMessage::receive_message(&consumer, 1 << 20).expect("connected");
        assert!(matches!(
            RouterMessage::from_message(&connected),
            Ok(RouterMessage::ServiceConnection(ref c)) if c.status == ServiceConnection::Connected
        ));

        provider.shutdown();
        let pending = RemoteMessage::receive_message(&consumer, 1 << 20).expect("pending");
        match RouterMessage::from_message(&pending).expect("decode") {
            RouterMessage::ServiceConnection(change) => {
                assert_eq!(change.status, ServiceConnection::Pending);
                assert_eq!(change.stub.cookie(), provider_cookie);
            }
            other => panic!("unexpected {:?}", other),
        }
        let stats = wait_for(&handle, |s| s.connections == 1);
        assert_eq!(stats.stubs, 0);
        assert_eq!(stats.proxies, 1);
    }

    #[test]
    fn test_connection_limit() {
        let (server, handle) = start_router(1);
        let first = connect(&server);
        handshake(&first);
        let _second = connect(&server);
        let stats = wait_for(&handle, |s| s.refused == 1);
        assert_eq!(stats.refused, 1);
        assert_eq!(stats.connections, 1);
    }

    #[test]
    fn test_disabled_connection_is_rejected() {
        let mut config = RouterConfig::default();
        config.connection.tcpip = ConnectionSettings {
            enabled: false,
            ..ConnectionSettings::tcpip("127.0.0.1", 0)
        };
        assert!(matches!(RouterServer::bind(config), Err(RouterError::Config(_))));
    }

    #[test]
    fn test_stop_and_restart_rejected() {
        let (mut server, handle) = start_router(4);
        assert!(handle.is_running());
        assert!(matches!(server.start(), Err(RouterError::AlreadyRunning)));
        server.stop();
        assert!(!handle.is_running());
        assert!(handle.stats().is_err());
    }

    #[test]
    fn test_stop_returns_while_peer_never_reads() {
        let (mut server, handle) = start_router(8);
        let stalled = connect(&server);
        let stalled_cookie = handshake(&stalled);
        let sender = connect(&server);
        let sender_cookie = handshake(&sender);

        // Far more than the socket buffers of the silent peer can hold.
        let mut message = RemoteMessage::new(0x0001_0001, sender_cookie, stalled_cookie);
        message.writer().put(&vec![0xA5; 256 * 1024]).expect("payload");
        for _ in 0..128 {
            message.send_message(&sender).expect("send");
        }
        assert_eq!(wait_for(&handle, |s| s.forwarded == 128).forwarded, 128);

        let (done_tx, done_rx) = channel::bounded(1);
        let stopper = thread::spawn(move || {
            server.stop();
            let _ = done_tx.send(());
        });
        assert!(
            done_rx
                .recv_timeout(CLOSE_DRAIN_TIMEOUT + Duration::from_secs(10))
                .is_ok(),
            "stop() blocked behind a peer that never reads"
        );
        stopper.join().expect("stopper");
        assert!(!handle.is_running());
        drop(stalled);
    }
}
