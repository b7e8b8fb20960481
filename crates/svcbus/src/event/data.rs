// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use crate::buffer::{BufferKind, BufferStream, ByteBuffer, CursorPosition};

/// Payload of request, response and notification events.
///
/// `Internal` streams stay inside the process; `External` streams use a
/// `Remote` buffer and may be put on the wire. Both share their buffer on
/// clone, so fanning an event out to several consumers does not copy.
#[derive(Debug, Clone)]
pub enum EventDataStream {
    Internal(BufferStream),
    External(BufferStream),
}

impl EventDataStream {
    pub fn internal() -> Self {
        EventDataStream::Internal(BufferStream::new(BufferKind::Shared))
    }

    pub fn external() -> Self {
        EventDataStream::External(BufferStream::new(BufferKind::Remote))
    }

    /// Wrap received bytes as an external stream.
    pub fn external_from(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::external();
        }
        EventDataStream::External(BufferStream::from_buffer(ByteBuffer::from_slice(
            BufferKind::Remote,
            bytes,
        )))
    }

    pub fn is_external(&self) -> bool {
        matches!(self, EventDataStream::External(_))
    }

    fn stream(&self) -> &BufferStream {
        match self {
            EventDataStream::Internal(s) | EventDataStream::External(s) => s,
        }
    }

    /// Writer positioned at the end of the data.
    pub fn writer(&mut self) -> &mut BufferStream {
        let stream = match self {
            EventDataStream::Internal(s) | EventDataStream::External(s) => s,
        };
        stream.move_to_end();
        stream
    }

    /// Independent reader from the first byte.
    pub fn reader(&self) -> BufferStream {
        BufferStream::from_buffer(self.stream().buffer().clone())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.stream().as_bytes()
    }

    pub fn len(&self) -> usize {
        self.stream().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stream().is_empty()
    }
}

impl Default for EventDataStream {
    fn default() -> Self {
        Self::internal()
    }
}
