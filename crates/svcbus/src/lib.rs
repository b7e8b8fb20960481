// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # svcbus - event-driven service bus
//!
//! Components inside a process, across processes and across machines
//! exchange requests, responses, broadcasts and attribute updates through
//! one addressing and routing model. Providers are *stubs*, consumers are
//! *proxies*; both live on a thread that runs an event dispatcher.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use svcbus::{
//!     DispatcherThread, ProxyAddress, ServiceAddress, ServiceManager, ServiceType,
//!     StubAddress, Version,
//! };
//!
//! fn main() -> svcbus::Result<()> {
//!     let manager = ServiceManager::start()?;
//!     let _server = DispatcherThread::start("server")?;
//!     let _client = DispatcherThread::start("client")?;
//!
//!     let calc = ServiceAddress::with("Calc", Version::new(1, 0, 0), ServiceType::Local, "calc");
//!     manager.handle().register_stub(StubAddress::local(calc.clone(), "server"))?;
//!     manager.handle().register_proxy(ProxyAddress::local(calc, "client"))?;
//!     // Both threads now receive Event::ServiceConnection(Connected).
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |   application threads: stubs / proxies / timers (EventConsumer)     |
//! +---------------------------------------------------------------------+
//! |   event: EventDispatcher per thread, DispatcherThread directory     |
//! +---------------------------------------------------------------------+
//! |   service: ServiceManager (ServiceRegistry owner) + RouterClient    |
//! +---------------------------------------------------------------------+
//! |   transport: RemoteMessage framing, RouterMessage, TCP sockets      |
//! +---------------------------------------------------------------------+
//! |   buffer / ser: COW ByteBuffer, cursors, little-endian streams      |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ByteBuffer`] | Reference-counted copy-on-write byte storage |
//! | [`ServiceAddress`] | `role.name.version.type` address with magic number |
//! | [`ServiceRegistry`] | Which proxies are bound to which stub |
//! | [`EventDispatcher`] | Thread-owned queue and consumer table |
//! | [`ServiceManager`] | Process registry thread and router link |

/// Byte buffer, cursors and buffer/ring/file streams.
pub mod buffer;
/// Global configuration (limits, defaults, connection settings).
pub mod config;
/// Event types, dispatcher and dispatcher threads.
pub mod event;
/// Identifiers and runtime class ids.
pub mod ident;
/// Interface metadata: message ids, result codes, data states.
pub mod interface;
/// Service registry (stubs, proxies, bindings).
pub mod registry;
/// Little-endian stream traits.
pub mod ser;
/// Service manager and router client.
pub mod service;
/// Timers delivered through dispatchers.
pub mod timer;
/// Sockets, wire messages and the router protocol.
pub mod transport;

/// Service, stub, proxy and channel addressing.
pub mod address;
mod error;

pub use address::{
    Channel, ProxyAddress, ServiceAddress, ServiceItem, ServiceType, StubAddress, Version,
    INVALID_CHANNEL,
};
pub use buffer::{BufferKind, BufferStream, ByteBuffer, CursorPosition, SeekOrigin};
pub use error::{Error, Result};
pub use event::{
    DispatcherHandle, DispatcherThread, Event, EventClass, EventConsumer, EventDispatcher,
    RequestEvent, ResponseEvent,
};
pub use ident::{Identifier, RuntimeClassId};
pub use interface::ResultType;
pub use registry::{ConnectionChange, ServiceConnection, ServiceRegistry};
pub use ser::{InStream, OutStream, Streamable};
pub use service::{ProxyBinding, ServiceManager, ServiceManagerHandle};
pub use timer::{Timer, TimerConsumer, TimerManager};

/// svcbus version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
