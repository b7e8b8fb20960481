// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Blocking TCP sockets.
//!
//! [`Socket`] is a shared handle: clones refer to the same descriptor, which
//! is closed when the last owner releases it. Send and receive block until
//! every requested byte is transferred (no timeout at this layer), so they
//! run on dedicated connection threads.

use crate::config::LISTEN_BACKLOG;
use crate::error::{Error, Result};
use socket2::{Domain, Protocol, Type};
use std::fmt;
use std::io::{Read, Write};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, ToSocketAddrs};
use std::sync::Arc;

/// Resolved host and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketAddress {
    host: String,
    addr: SocketAddr,
}

impl SocketAddress {
    /// Resolve `host:port`, preferring IPv4 results.
    ///
    /// An empty host resolves to the wildcard address when `is_server` is
    /// set and to loopback otherwise.
    pub fn resolve(host: &str, port: u16, is_server: bool) -> Result<Self> {
        if host.is_empty() {
            let ip = if is_server {
                Ipv4Addr::UNSPECIFIED
            } else {
                Ipv4Addr::LOCALHOST
            };
            return Ok(Self::from_socket_addr(SocketAddr::new(IpAddr::V4(ip), port)));
        }

        let candidates: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::AddressResolution(format!("{}:{} ({})", host, port, e)))?
            .collect();
        let addr = candidates
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| candidates.first())
            .copied()
            .ok_or_else(|| Error::AddressResolution(format!("{}:{}", host, port)))?;
        Ok(Self {
            host: host.to_string(),
            addr,
        })
    }

    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            addr,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

/// Shared handle to a connected or listening socket.
#[derive(Clone)]
pub struct Socket {
    inner: Option<Arc<socket2::Socket>>,
}

impl Socket {
    pub(crate) fn from_raw(socket: socket2::Socket) -> Self {
        Self {
            inner: Some(Arc::new(socket)),
        }
    }

    /// A socket with no descriptor.
    pub const fn invalid() -> Self {
        Self { inner: None }
    }

    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Number of owners sharing the descriptor.
    pub fn owners(&self) -> usize {
        self.inner.as_ref().map_or(0, Arc::strong_count)
    }

    fn raw(&self) -> Result<&socket2::Socket> {
        self.inner.as_deref().ok_or(Error::ConnectionClosed)
    }

    /// Send all of `data`, returning the byte count.
    pub fn send_data(&self, data: &[u8]) -> Result<usize> {
        let mut socket = self.raw()?;
        socket.write_all(data)?;
        Ok(data.len())
    }

    /// Fill all of `buf`, returning the byte count.
    ///
    /// A peer closing mid-read yields [`Error::ConnectionClosed`].
    pub fn receive_data(&self, buf: &mut [u8]) -> Result<usize> {
        let mut socket = self.raw()?;
        socket.read_exact(buf)?;
        Ok(buf.len())
    }

    /// Stop traffic in both directions for every owner, which unblocks
    /// threads waiting in [`Socket::receive_data`].
    pub fn shutdown(&self) {
        if let Some(socket) = &self.inner {
            if let Err(e) = socket.shutdown(Shutdown::Both) {
                log::debug!("[Socket] shutdown failed: {}", e);
            }
        }
    }

    /// Release this owner's reference; the last owner closes the descriptor.
    pub fn close_socket(&mut self) {
        self.inner = None;
    }

    pub fn local_address(&self) -> Option<SocketAddress> {
        let addr = self.inner.as_ref()?.local_addr().ok()?.as_socket()?;
        Some(SocketAddress::from_socket_addr(addr))
    }

    pub fn peer_address(&self) -> Option<SocketAddress> {
        let addr = self.inner.as_ref()?.peer_addr().ok()?.as_socket()?;
        Some(SocketAddress::from_socket_addr(addr))
    }
}

impl Default for Socket {
    fn default() -> Self {
        Self::invalid()
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("valid", &self.is_valid())
            .field("owners", &self.owners())
            .field("peer", &self.peer_address())
            .finish()
    }
}

fn new_stream_socket(addr: &SocketAddr) -> Result<socket2::Socket> {
    let socket = socket2::Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))?;
    Ok(socket)
}

/// Client side of a TCP connection.
#[derive(Debug, Default)]
pub struct SocketClient {
    address: Option<SocketAddress>,
    socket: Socket,
}

impl SocketClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve and store the address used by [`SocketClient::create_socket`].
    pub fn set_address(&mut self, host: &str, port: u16, is_server: bool) -> Result<()> {
        self.address = Some(SocketAddress::resolve(host, port, is_server)?);
        Ok(())
    }

    pub fn address(&self) -> Option<&SocketAddress> {
        self.address.as_ref()
    }

    /// Connect to `host:port`.
    pub fn create_socket_to(&mut self, host: &str, port: u16) -> Result<()> {
        self.set_address(host, port, false)?;
        self.create_socket()
    }

    /// Connect to the stored address.
    pub fn create_socket(&mut self) -> Result<()> {
        let address = self
            .address
            .clone()
            .ok_or_else(|| Error::InvalidState("socket address not set".to_string()))?;
        self.close_socket();

        let socket = new_stream_socket(&address.socket_addr())?;
        socket.set_nodelay(true)?;
        socket.connect(&address.socket_addr().into())?;
        log::debug!("[SocketClient] connected to {}", address);
        self.socket = Socket::from_raw(socket);
        Ok(())
    }

    pub fn close_socket(&mut self) {
        if self.socket.is_valid() {
            self.socket.shutdown();
            self.socket.close_socket();
        }
    }

    pub fn is_valid(&self) -> bool {
        self.socket.is_valid()
    }

    /// Shared handle to the connected socket.
    pub fn socket(&self) -> Socket {
        self.socket.clone()
    }

    pub fn send_data(&self, data: &[u8]) -> Result<usize> {
        self.socket.send_data(data)
    }

    pub fn receive_data(&self, buf: &mut [u8]) -> Result<usize> {
        self.socket.receive_data(buf)
    }
}

/// Listening side of TCP connections.
#[derive(Debug, Default)]
pub struct SocketServer {
    address: Option<SocketAddress>,
    socket: Socket,
}

impl SocketServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_address(&mut self, host: &str, port: u16) -> Result<()> {
        self.address = Some(SocketAddress::resolve(host, port, true)?);
        Ok(())
    }

    /// Bind and listen on the stored address.
    pub fn create_socket(&mut self) -> Result<()> {
        let address = self
            .address
            .clone()
            .ok_or_else(|| Error::InvalidState("socket address not set".to_string()))?;
        self.close_socket();

        let socket = new_stream_socket(&address.socket_addr())?;
        socket.set_reuse_address(true)?;
        socket.bind(&address.socket_addr().into())?;
        socket.listen(LISTEN_BACKLOG)?;
        self.socket = Socket::from_raw(socket);
        log::info!("[SocketServer] listening on {:?}", self.local_address());
        Ok(())
    }

    /// Actual bound address (useful with port 0).
    pub fn local_address(&self) -> Option<SocketAddress> {
        self.socket.local_address()
    }

    pub fn is_valid(&self) -> bool {
        self.socket.is_valid()
    }

    /// Block until a client connects.
    pub fn accept_connection(&self) -> Result<(Socket, SocketAddress)> {
        let listener = self.socket.raw()?;
        let (socket, addr) = listener.accept()?;
        socket.set_nodelay(true)?;
        let peer = addr
            .as_socket()
            .map(SocketAddress::from_socket_addr)
            .ok_or_else(|| Error::InvalidState("non-IP peer address".to_string()))?;
        log::debug!("[SocketServer] accepted {}", peer);
        Ok((Socket::from_raw(socket), peer))
    }

    /// Shared handle to the listening socket.
    pub fn socket(&self) -> Socket {
        self.socket.clone()
    }

    pub fn close_socket(&mut self) {
        if self.socket.is_valid() {
            self.socket.shutdown();
            self.socket.close_socket();
        }
    }
}
