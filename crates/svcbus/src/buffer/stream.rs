// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Byte buffer with one read/write cursor.

use super::cursor::{resolve_offset, CursorPosition, SeekOrigin, INVALID_CURSOR_POSITION};
use super::{BufferKind, ByteBuffer};
use crate::ser::{InStream, OutStream};

/// Stream over a [`ByteBuffer`], bounded to the used region.
///
/// Writes at the cursor overwrite existing bytes and append past the end.
/// Cloning shares the buffer (copy-on-write) and copies the cursor.
#[derive(Debug, Clone, Default)]
pub struct BufferStream {
    buffer: ByteBuffer,
    position: usize,
}

impl BufferStream {
    pub fn new(kind: BufferKind) -> Self {
        Self {
            buffer: ByteBuffer::new(kind),
            position: 0,
        }
    }

    /// Stream reading `buffer` from its beginning.
    pub fn from_buffer(buffer: ByteBuffer) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn with_capacity(kind: BufferKind, size: usize) -> Self {
        Self::from_buffer(ByteBuffer::with_capacity(kind, size))
    }

    pub fn buffer(&self) -> &ByteBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut ByteBuffer {
        &mut self.buffer
    }

    pub fn into_buffer(self) -> ByteBuffer {
        self.buffer
    }

    /// Used bytes of the underlying buffer.
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.payload()
    }

    /// Used size of the underlying buffer.
    pub fn len(&self) -> usize {
        self.buffer.used_size()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop the content and rewind.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.position = 0;
    }
}

impl CursorPosition for BufferStream {
    fn position(&self) -> u64 {
        self.position as u64
    }

    fn set_position(&mut self, offset: i64, origin: SeekOrigin) -> u64 {
        let anchor = match origin {
            SeekOrigin::Begin => 0,
            SeekOrigin::Current => self.position as u64,
            SeekOrigin::End => self.len() as u64,
        };
        match resolve_offset(anchor, offset) {
            Some(pos) if pos <= self.len() as u64 => {
                self.position = pos as usize;
                pos
            }
            _ => INVALID_CURSOR_POSITION,
        }
    }
}

impl OutStream for BufferStream {
    fn write_bytes(&mut self, data: &[u8]) -> usize {
        let written = self.buffer.write_at(self.position, data);
        self.position += written;
        written
    }
}

impl InStream for BufferStream {
    fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
        let read = self.buffer.read_at(self.position, buf);
        self.position += read;
        read
    }

    fn bytes_available(&self) -> usize {
        self.len().saturating_sub(self.position)
    }
}
