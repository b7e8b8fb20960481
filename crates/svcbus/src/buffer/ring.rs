// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-capacity ring stream.
//!
//! Writes append at the tail and overwrite the oldest bytes once the ring is
//! full. Reads start at the cursor, which is relative to the oldest stored
//! byte and wraps modulo the stored length.

use super::cursor::{CursorPosition, SeekOrigin, INVALID_CURSOR_POSITION};
use crate::ser::{InStream, OutStream};

#[derive(Debug, Clone)]
pub struct RingStream {
    data: Box<[u8]>,
    /// Index of the oldest stored byte.
    head: usize,
    /// Number of stored bytes.
    len: usize,
    /// Read cursor, relative to `head`.
    cursor: usize,
}

impl RingStream {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Drop the bytes before the cursor.
    pub fn consume(&mut self) {
        if self.capacity() == 0 {
            return;
        }
        self.head = (self.head + self.cursor) % self.capacity();
        self.len -= self.cursor;
        self.cursor = 0;
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
        self.cursor = 0;
    }

    /// Copy of the stored bytes, oldest first.
    pub fn to_vec(&self) -> Vec<u8> {
        (0..self.len).map(|i| self.byte_at(i)).collect()
    }

    #[inline]
    fn byte_at(&self, offset: usize) -> u8 {
        self.data[(self.head + offset) % self.capacity()]
    }
}

impl CursorPosition for RingStream {
    fn position(&self) -> u64 {
        self.cursor as u64
    }

    fn set_position(&mut self, offset: i64, origin: SeekOrigin) -> u64 {
        let len = self.len as i128;
        let anchor = match origin {
            SeekOrigin::Begin => 0,
            SeekOrigin::Current => self.cursor as i128,
            SeekOrigin::End => len,
        };
        let target = anchor + i128::from(offset);
        let pos = if (0..=len).contains(&target) {
            target
        } else if len == 0 {
            return INVALID_CURSOR_POSITION;
        } else {
            target.rem_euclid(len)
        };
        self.cursor = pos as usize;
        pos as u64
    }
}

impl OutStream for RingStream {
    fn write_bytes(&mut self, data: &[u8]) -> usize {
        let capacity = self.capacity();
        if capacity == 0 {
            return 0;
        }
        // Only the newest `capacity` bytes can survive.
        let kept = &data[data.len().saturating_sub(capacity)..];
        for &byte in kept {
            if self.len == capacity {
                self.head = (self.head + 1) % capacity;
                self.cursor = self.cursor.saturating_sub(1);
            } else {
                self.len += 1;
            }
            let tail = (self.head + self.len - 1) % capacity;
            self.data[tail] = byte;
        }
        if kept.len() < data.len() {
            self.cursor = 0;
        }
        data.len()
    }
}

impl InStream for RingStream {
    fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
        let count = buf.len().min(self.bytes_available());
        for (i, slot) in buf.iter_mut().take(count).enumerate() {
            *slot = self.byte_at(self.cursor + i);
        }
        self.cursor += count;
        count
    }

    fn bytes_available(&self) -> usize {
        self.len - self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrites_oldest_when_full() {
        let mut ring = RingStream::new(4);
        ring.put(b"abc").expect("write");
        ring.put(b"de").expect("write");
        assert!(ring.is_full());
        assert_eq!(ring.to_vec(), b"bcde");

        ring.put(b"0123456").expect("write");
        assert_eq!(ring.to_vec(), b"3456");
    }

    #[test]
    fn test_read_and_consume() {
        let mut ring = RingStream::new(8);
        ring.write_u16(0x0102).expect("write");
        ring.write_u16(0x0304).expect("write");
        assert_eq!(ring.read_u16().expect("read"), 0x0102);
        ring.consume();
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.position(), 0);
        assert_eq!(ring.read_u16().expect("read"), 0x0304);
    }

    #[test]
    fn test_cursor_wraps() {
        let mut ring = RingStream::new(8);
        ring.put(b"abcd").expect("write");
        assert_eq!(ring.set_position(6, SeekOrigin::Begin), 2);
        assert_eq!(ring.set_position(-1, SeekOrigin::Begin), 3);
        assert!(ring.move_to_end());
        assert_eq!(ring.position(), 4);
        assert_eq!(ring.bytes_available(), 0);
    }

    #[test]
    fn test_empty_ring_rejects_offsets() {
        let mut ring = RingStream::new(4);
        assert!(ring.move_to_begin());
        assert_eq!(
            ring.set_position(1, SeekOrigin::Begin),
            INVALID_CURSOR_POSITION
        );
    }

    #[test]
    fn test_zero_capacity() {
        let mut ring = RingStream::new(0);
        assert_eq!(ring.write_bytes(b"x"), 0);
        assert!(ring.is_empty());
    }
}
