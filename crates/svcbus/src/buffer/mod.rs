// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reference-counted byte buffers with copy-on-write sharing.
//!
//! A [`ByteBuffer`] is either *invalid* (no storage, the "no data" value that
//! is never freed) or owns a block made of a header (`used`, `length`, `kind`)
//! and an aligned payload region. Storage is shared through an atomic
//! reference count:
//!
//! - cloning a sharable buffer shares the block (refcount + 1),
//! - [`ByteBuffer::reserve`] never touches a shared block,
//! - writers detach a private copy before mutating shared bytes.
//!
//! ```text
//! +-------------------------------+------------------------------------+
//! | header (used, length, kind)   | payload [0 .. used) | free space   |
//! +-------------------------------+------------------------------------+
//! ```
//!
//! Failures never panic: an allocation failure leaves the buffer invalid and
//! writes report 0 bytes.

pub mod cursor;
pub mod file;
pub mod ring;
pub mod stream;

pub use cursor::{CursorPosition, SeekOrigin, INVALID_CURSOR_POSITION};
pub use file::FileStream;
pub use ring::RingStream;
pub use stream::BufferStream;

use crate::config::{BLOCK_SIZE, MAX_BUFFER_SIZE};
use std::fmt;
use std::sync::Arc;

/// Kind of storage, decides whether copies may share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferKind {
    /// Not yet typed (invalid buffers).
    #[default]
    Unknown,
    /// Strictly owned raw buffer; copies are deep.
    Internal,
    /// Sharable in-process buffer.
    Shared,
    /// Sharable wire-message buffer.
    Remote,
}

impl BufferKind {
    /// True for kinds whose copies share storage.
    pub fn can_share(self) -> bool {
        matches!(self, BufferKind::Shared | BufferKind::Remote)
    }
}

/// Snapshot of a buffer header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferHeader {
    pub used_size: usize,
    pub total_length: usize,
    pub kind: BufferKind,
}

/// Round `size` up to the allocation granularity.
#[inline]
pub fn aligned_size(size: usize) -> usize {
    size.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

struct BufferBlock {
    used: usize,
    data: Box<[u8]>,
}

impl BufferBlock {
    fn copy_of(other: &BufferBlock) -> Self {
        Self {
            used: other.used,
            data: other.data.clone(),
        }
    }
}

/// Resizable binary storage with a shared, copy-on-write block.
pub struct ByteBuffer {
    block: Option<Arc<BufferBlock>>,
    kind: BufferKind,
}

impl ByteBuffer {
    /// The invalid buffer: no storage, nothing to free.
    pub const fn invalid() -> Self {
        Self {
            block: None,
            kind: BufferKind::Unknown,
        }
    }

    /// Empty (invalid) buffer that allocates as `kind` once reserved.
    pub const fn new(kind: BufferKind) -> Self {
        Self { block: None, kind }
    }

    /// Buffer pre-sized for `size` bytes of data.
    pub fn with_capacity(kind: BufferKind, size: usize) -> Self {
        let mut buffer = Self::new(kind);
        buffer.reserve(size, false);
        buffer
    }

    /// Buffer holding a copy of `data`.
    pub fn from_slice(kind: BufferKind, data: &[u8]) -> Self {
        let mut buffer = Self::new(kind);
        buffer.write_at(0, data);
        buffer
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.block.is_some()
    }

    #[inline]
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// True iff more than one owner references the storage.
    #[inline]
    pub fn is_shared(&self) -> bool {
        self.block
            .as_ref()
            .is_some_and(|block| Arc::strong_count(block) > 1)
    }

    #[inline]
    pub fn can_share(&self) -> bool {
        self.kind.can_share()
    }

    /// Bytes of valid data.
    #[inline]
    pub fn used_size(&self) -> usize {
        self.block.as_ref().map_or(0, |block| block.used)
    }

    /// Allocated payload length.
    #[inline]
    pub fn length(&self) -> usize {
        self.block.as_ref().map_or(0, |block| block.data.len())
    }

    /// Writable bytes left before the buffer has to grow.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.length() - self.used_size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.used_size() == 0
    }

    pub fn header(&self) -> BufferHeader {
        BufferHeader {
            used_size: self.used_size(),
            total_length: self.length(),
            kind: self.kind,
        }
    }

    /// Ensure room for at least `size` bytes of used data.
    ///
    /// Returns the remaining writable capacity. `size == 0` releases the
    /// buffer; sizes above [`MAX_BUFFER_SIZE`] are clamped. A shared buffer
    /// is left untouched because other owners see the same bytes.
    pub fn reserve(&mut self, size: usize, copy: bool) -> usize {
        if size == 0 {
            self.invalidate();
            return 0;
        }

        let size = size.min(MAX_BUFFER_SIZE);
        if self.is_shared() {
            log::debug!(
                "[ByteBuffer::reserve] buffer is shared, keeping {} bytes",
                self.length()
            );
            return self.remaining();
        }

        if let Some(block) = self.block.as_mut().and_then(Arc::get_mut) {
            if block.data.len() >= size {
                if !copy {
                    block.used = 0;
                }
                return block.data.len() - block.used;
            }
        }

        let capacity = aligned_size(size).min(MAX_BUFFER_SIZE);
        let mut data: Vec<u8> = Vec::new();
        if data.try_reserve_exact(capacity).is_err() {
            log::warn!(
                "[ByteBuffer::reserve] allocation of {} bytes failed",
                capacity
            );
            self.invalidate();
            return 0;
        }
        data.resize(capacity, 0);

        let used = match (&self.block, copy) {
            (Some(old), true) => {
                let count = old.used.min(capacity);
                data[..count].copy_from_slice(&old.data[..count]);
                count
            }
            _ => 0,
        };

        self.block = Some(Arc::new(BufferBlock {
            used,
            data: data.into_boxed_slice(),
        }));
        capacity - used
    }

    /// Drop this owner's reference; the last owner frees the storage.
    pub fn invalidate(&mut self) {
        self.block = None;
    }

    /// Detach a private copy if the storage is shared.
    ///
    /// Returns false for the invalid buffer.
    pub fn make_unique(&mut self) -> bool {
        match self.block.as_mut() {
            None => false,
            Some(block) => {
                if Arc::get_mut(block).is_none() {
                    *block = Arc::new(BufferBlock::copy_of(block));
                }
                true
            }
        }
    }

    /// Used bytes (empty for the invalid buffer).
    pub fn payload(&self) -> &[u8] {
        match &self.block {
            Some(block) => &block.data[..block.used],
            None => &[],
        }
    }

    /// Mutable used bytes; detaches shared storage first.
    pub fn payload_mut(&mut self) -> Option<&mut [u8]> {
        if !self.make_unique() {
            return None;
        }
        self.block
            .as_mut()
            .and_then(Arc::get_mut)
            .map(|block| &mut block.data[..block.used])
    }

    /// Write `data` at `pos`, growing the buffer as needed.
    ///
    /// `pos` may not skip past the used region. Returns the number of bytes
    /// written, 0 when the buffer cannot hold them.
    pub fn write_at(&mut self, pos: usize, data: &[u8]) -> usize {
        if data.is_empty() || pos > self.used_size() {
            return 0;
        }
        let Some(needed) = pos.checked_add(data.len()) else {
            return 0;
        };
        if needed > MAX_BUFFER_SIZE {
            log::debug!(
                "[ByteBuffer::write_at] {} bytes exceed the {} byte ceiling",
                needed,
                MAX_BUFFER_SIZE
            );
            return 0;
        }

        self.make_unique();
        if needed > self.length() {
            let grown = needed.max(self.length() + self.length() / 2);
            self.reserve(grown, true);
            if needed > self.length() {
                return 0;
            }
        }

        match self.block.as_mut().and_then(Arc::get_mut) {
            Some(block) => {
                block.data[pos..needed].copy_from_slice(data);
                block.used = block.used.max(needed);
                data.len()
            }
            None => 0,
        }
    }

    /// Copy used bytes starting at `pos` into `buf`.
    pub fn read_at(&self, pos: usize, buf: &mut [u8]) -> usize {
        let payload = self.payload();
        if pos >= payload.len() {
            return 0;
        }
        let count = buf.len().min(payload.len() - pos);
        buf[..count].copy_from_slice(&payload[pos..pos + count]);
        count
    }

    /// Set the used size directly (must not exceed the allocated length).
    pub fn set_used_size(&mut self, used: usize) -> bool {
        if used > self.length() || !self.make_unique() {
            return false;
        }
        match self.block.as_mut().and_then(Arc::get_mut) {
            Some(block) => {
                block.used = used;
                true
            }
            None => false,
        }
    }

    /// Forget the data but keep the allocation when it is not shared.
    pub fn clear(&mut self) {
        if self.is_shared() {
            self.invalidate();
        } else if let Some(block) = self.block.as_mut().and_then(Arc::get_mut) {
            block.used = 0;
        }
    }
}

impl Clone for ByteBuffer {
    fn clone(&self) -> Self {
        let block = match &self.block {
            Some(block) if self.can_share() => Some(Arc::clone(block)),
            Some(block) => Some(Arc::new(BufferBlock::copy_of(block))),
            None => None,
        };
        Self {
            block,
            kind: self.kind,
        }
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new(BufferKind::Shared)
    }
}

impl PartialEq for ByteBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.payload() == other.payload()
    }
}

impl Eq for ByteBuffer {}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("kind", &self.kind)
            .field("valid", &self.is_valid())
            .field("used", &self.used_size())
            .field("length", &self.length())
            .field("shared", &self.is_shared())
            .finish()
    }
}
