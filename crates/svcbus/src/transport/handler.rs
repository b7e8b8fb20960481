// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::message::RemoteMessage;
use super::socket::{Socket, SocketAddress};

/// Callbacks of the connection threads.
///
/// Called from the blocking send and receive threads, never from a
/// dispatcher thread, so implementations post events instead of touching
/// thread-owned state.
pub trait RemoteServiceHandler: Send + Sync {
    /// `message` could not be written to `target`.
    fn failed_send_message(&self, message: &RemoteMessage, target: &Socket);

    /// Reading from `source` failed; the connection is gone.
    fn failed_receive_message(&self, source: &Socket);

    /// `message` arrived but could not be delivered or decoded.
    fn failed_process_message(&self, message: &RemoteMessage);

    /// A complete message arrived from `addr`.
    fn process_received_message(&self, message: RemoteMessage, addr: &SocketAddress, source: &Socket);
}
