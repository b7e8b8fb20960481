// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! svcbus global configuration - single source of truth.
//!
//! Compile-time limits and defaults used by the buffer, transport and
//! service layers live here. **Never hardcode them elsewhere.**
//!
//! Connection settings (`enabled`, `name`, `address`, `port`) are parsed by
//! the hosting binary (see `svcbus-router`) and handed to the library as the
//! plain [`ConnectionSettings`] value; the library never reads files itself.

use std::time::Duration;

// =======================================================================
// Byte buffers
// =======================================================================

/// Hard ceiling for a single byte buffer (64 MiB).
///
/// `ByteBuffer::reserve` clamps every request to this value.
pub const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Allocation granularity of byte buffers.
///
/// Capacities are rounded up to a multiple of this value so that repeated
/// small appends amortize reallocation.
pub const BLOCK_SIZE: usize = 512;

// =======================================================================
// Transport
// =======================================================================

/// Default TCP port of the router process.
pub const DEFAULT_ROUTER_PORT: u16 = 8181;

/// Default router host.
pub const DEFAULT_ROUTER_ADDRESS: &str = "127.0.0.1";

/// Default maximum size of one remote message payload (16 MiB).
///
/// Anti-OOM protection for the receive path; must stay below
/// [`MAX_BUFFER_SIZE`].
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Listen backlog used by socket servers.
pub const LISTEN_BACKLOG: i32 = 128;

/// How long a closing connection may spend flushing queued messages.
///
/// A peer that stopped reading keeps the send thread blocked; past this
/// deadline the socket is shut down under it and the rest is discarded.
pub const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// =======================================================================
// Thread names
// =======================================================================

/// Name of the service manager dispatcher thread.
pub const SERVICE_MANAGER_THREAD: &str = "svcbus-service-manager";

/// Name of the timer manager thread.
pub const TIMER_MANAGER_THREAD: &str = "svcbus-timer-manager";

/// Connection type key for plain TCP/IP links.
pub const CONNECTION_TCPIP: &str = "tcpip";

/// Settings of one connection type as found in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionSettings {
    /// Whether this connection type is used at all.
    #[cfg_attr(feature = "serde", serde(default = "default_enabled"))]
    pub enabled: bool,

    /// Human readable connection name (used in logs and thread names).
    #[cfg_attr(feature = "serde", serde(default = "default_name"))]
    pub name: String,

    /// Host name or IP address.
    #[cfg_attr(feature = "serde", serde(default = "default_address"))]
    pub address: String,

    /// TCP port.
    #[cfg_attr(feature = "serde", serde(default = "default_port"))]
    pub port: u16,
}

#[cfg(feature = "serde")]
fn default_enabled() -> bool {
    true
}

#[cfg(feature = "serde")]
fn default_name() -> String {
    CONNECTION_TCPIP.to_string()
}

#[cfg(feature = "serde")]
fn default_address() -> String {
    DEFAULT_ROUTER_ADDRESS.to_string()
}

#[cfg(feature = "serde")]
fn default_port() -> u16 {
    DEFAULT_ROUTER_PORT
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            name: CONNECTION_TCPIP.to_string(),
            address: DEFAULT_ROUTER_ADDRESS.to_string(),
            port: DEFAULT_ROUTER_PORT,
        }
    }
}

impl ConnectionSettings {
    /// Settings for a TCP/IP connection to `address:port`.
    pub fn tcpip(address: &str, port: u16) -> Self {
        Self {
            address: address.to_string(),
            port,
            ..Default::default()
        }
    }

    /// `address:port` string suitable for logs.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_are_consistent() {
        assert!(DEFAULT_MAX_MESSAGE_SIZE < MAX_BUFFER_SIZE);
        assert_eq!(MAX_BUFFER_SIZE % BLOCK_SIZE, 0);
    }

    #[test]
    fn test_default_settings() {
        let settings = ConnectionSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.port, DEFAULT_ROUTER_PORT);
        assert_eq!(settings.endpoint(), "127.0.0.1:8181");
    }
}
