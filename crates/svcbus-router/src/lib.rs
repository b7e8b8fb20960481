// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! svcbus Routing Service
//!
//! Central process of a svcbus network. Every process connects once,
//! receives a cookie and announces its public stubs and proxies; the
//! router binds them, notifies both sides and forwards requests, responses
//! and broadcasts between processes.
//!
//! # Quick Start
//!
//! ```bash
//! # Listen on the default port (8181)
//! svcbus-router
//!
//! # Custom address and port
//! svcbus-router --address 0.0.0.0 --port 9000
//!
//! # Using config file
//! svcbus-router --config router.toml
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! [router]
//! name = "my-router"
//! max_connections = 64
//!
//! [connection.tcpip]
//! address = "0.0.0.0"
//! port = 8181
//! ```

pub mod config;
mod connection;
pub mod server;

pub use config::{ConfigError, RouterConfig, RouterSettings};
pub use server::{RouterError, RouterHandle, RouterServer, RouterStats};
