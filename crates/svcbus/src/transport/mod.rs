// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Socket transport, wire messages and the router protocol.

mod handler;
pub mod message;
pub mod protocol;
mod socket;

pub use handler::RemoteServiceHandler;
pub use message::{RemoteHeader, RemoteMessage, REMOTE_HEADER_SIZE};
pub use protocol::{is_router_message, RouterMessage, NOTIFICATION_MESSAGE_ID};
pub use socket::{Socket, SocketAddress, SocketClient, SocketServer};
