// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Public error type of the svcbus library.
//!
//! Lower layers (buffer, cursor, addresses) report failure through sentinels
//! and invalid singletons; this enum covers the operations that have a real
//! failure path (streams, transport, dispatch).

use crate::ser::StreamError;

/// Errors returned by svcbus operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Addressing / state errors
    // ========================================================================
    /// Address or path could not be parsed or is not valid for the operation.
    InvalidAddress(String),
    /// Invalid state for the requested operation.
    InvalidState(String),
    /// A remote event was built from an internal (in-process) data stream.
    NotExternalStream,

    // ========================================================================
    // Serialization errors
    // ========================================================================
    /// Stream encoding/decoding failed.
    Stream(StreamError),
    /// Remote message checksum does not match its payload.
    ChecksumMismatch { expected: u32, actual: u32 },
    /// Remote message exceeds the configured size limit.
    MessageTooLarge { size: usize, max: usize },
    /// Message id is not part of the router protocol.
    UnknownMessage(u32),

    // ========================================================================
    // Dispatch errors
    // ========================================================================
    /// No dispatcher thread with this name is running.
    DispatcherNotFound(String),
    /// The dispatcher does not accept events anymore.
    DispatcherStopped(String),

    // ========================================================================
    // Transport errors
    // ========================================================================
    /// I/O error with underlying cause.
    Io(std::io::Error),
    /// Peer closed the connection.
    ConnectionClosed,
    /// Host name could not be resolved.
    AddressResolution(String),
    /// Router handshake failed.
    Handshake(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::NotExternalStream => write!(f, "Remote event requires an external data stream"),
            Error::Stream(e) => write!(f, "Stream error: {}", e),
            Error::ChecksumMismatch { expected, actual } => write!(
                f,
                "Checksum mismatch: expected {:#010x}, got {:#010x}",
                expected, actual
            ),
            Error::MessageTooLarge { size, max } => {
                write!(f, "Message too large: {} > {}", size, max)
            }
            Error::UnknownMessage(id) => write!(f, "Unknown message id {:#010x}", id),
            Error::DispatcherNotFound(name) => write!(f, "Dispatcher not found: {}", name),
            Error::DispatcherStopped(name) => write!(f, "Dispatcher stopped: {}", name),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::ConnectionClosed => write!(f, "Connection closed"),
            Error::AddressResolution(host) => write!(f, "Cannot resolve address: {}", host),
            Error::Handshake(msg) => write!(f, "Router handshake failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Stream(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::ConnectionClosed
        } else {
            Error::Io(e)
        }
    }
}

impl From<StreamError> for Error {
    fn from(e: StreamError) -> Self {
        Error::Stream(e)
    }
}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = core::result::Result<T, Error>;
