// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed stream I/O on top of byte storage.
//!
//! [`OutStream`] and [`InStream`] only require raw byte transfer from the
//! implementer; typed primitives, strings and nested [`Streamable`] objects are
//! provided as default methods. Every integer is little-endian, strings are a
//! `u32` byte length followed by UTF-8 bytes.

use std::fmt;

/// Stream error used by the serialization layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The stream accepted fewer bytes than requested.
    WriteFailed { requested: usize, written: usize },
    /// The stream holds fewer bytes than requested.
    ReadFailed { requested: usize, available: usize },
    /// Bytes were read but do not form a valid value.
    InvalidData { reason: String },
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::WriteFailed { requested, written } => {
                write!(f, "write failed: {} of {} bytes written", written, requested)
            }
            StreamError::ReadFailed {
                requested,
                available,
            } => write!(
                f,
                "read failed: {} bytes requested, {} available",
                requested, available
            ),
            StreamError::InvalidData { reason } => write!(f, "invalid data: {}", reason),
        }
    }
}

impl std::error::Error for StreamError {}

pub type StreamResult<T> = core::result::Result<T, StreamError>;

/// Generate little-endian write methods (default trait methods).
macro_rules! impl_write_le {
    ($name:ident, $type:ty) => {
        fn $name(&mut self, value: $type) -> StreamResult<()> {
            self.put(&value.to_le_bytes())
        }
    };
}

/// Generate little-endian read methods (default trait methods).
macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        fn $name(&mut self) -> StreamResult<$type> {
            let mut bytes = [0u8; $size];
            self.take(&mut bytes)?;
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// Writable byte stream.
pub trait OutStream {
    /// Write `data`, returning the number of bytes accepted (0 on failure).
    fn write_bytes(&mut self, data: &[u8]) -> usize;

    /// Write all of `data` or fail.
    fn put(&mut self, data: &[u8]) -> StreamResult<()> {
        let written = self.write_bytes(data);
        if written == data.len() {
            Ok(())
        } else {
            Err(StreamError::WriteFailed {
                requested: data.len(),
                written,
            })
        }
    }

    impl_write_le!(write_u8, u8);
    impl_write_le!(write_u16, u16);
    impl_write_le!(write_u32, u32);
    impl_write_le!(write_u64, u64);
    impl_write_le!(write_i32, i32);
    impl_write_le!(write_i64, i64);

    fn write_bool(&mut self, value: bool) -> StreamResult<()> {
        self.write_u8(u8::from(value))
    }

    fn write_string(&mut self, value: &str) -> StreamResult<()> {
        let len = u32::try_from(value.len()).map_err(|_| StreamError::InvalidData {
            reason: format!("string of {} bytes is too long", value.len()),
        })?;
        self.write_u32(len)?;
        self.put(value.as_bytes())
    }

    /// Write a nested streamable object.
    fn write_object<T: Streamable>(&mut self, value: &T) -> StreamResult<()>
    where
        Self: Sized,
    {
        value.write_to(self)
    }
}

/// Readable byte stream.
pub trait InStream {
    /// Read into `buf`, returning the number of bytes copied.
    fn read_bytes(&mut self, buf: &mut [u8]) -> usize;

    /// Bytes that can still be read.
    fn bytes_available(&self) -> usize;

    /// Fill all of `buf` or fail without consuming anything.
    fn take(&mut self, buf: &mut [u8]) -> StreamResult<()> {
        let available = self.bytes_available();
        if available < buf.len() {
            return Err(StreamError::ReadFailed {
                requested: buf.len(),
                available,
            });
        }
        let read = self.read_bytes(buf);
        if read == buf.len() {
            Ok(())
        } else {
            Err(StreamError::ReadFailed {
                requested: buf.len(),
                available: read,
            })
        }
    }

    impl_read_le!(read_u8, u8, 1);
    impl_read_le!(read_u16, u16, 2);
    impl_read_le!(read_u32, u32, 4);
    impl_read_le!(read_u64, u64, 8);
    impl_read_le!(read_i32, i32, 4);
    impl_read_le!(read_i64, i64, 8);

    fn read_bool(&mut self) -> StreamResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(StreamError::InvalidData {
                reason: format!("bool byte {:#04x}", other),
            }),
        }
    }

    fn read_string(&mut self) -> StreamResult<String> {
        let len = self.read_u32()? as usize;
        let available = self.bytes_available();
        if len > available {
            return Err(StreamError::ReadFailed {
                requested: len,
                available,
            });
        }
        let mut bytes = vec![0u8; len];
        self.take(&mut bytes)?;
        String::from_utf8(bytes).map_err(|e| StreamError::InvalidData {
            reason: e.to_string(),
        })
    }

    /// Read a nested streamable object.
    fn read_object<T: Streamable>(&mut self) -> StreamResult<T>
    where
        Self: Sized,
    {
        T::read_from(self)
    }
}

/// Values that know their own wire representation.
pub trait Streamable: Sized {
    fn write_to<S: OutStream>(&self, out: &mut S) -> StreamResult<()>;
    fn read_from<S: InStream>(input: &mut S) -> StreamResult<Self>;
}

macro_rules! impl_streamable_primitive {
    ($type:ty, $write:ident, $read:ident) => {
        impl Streamable for $type {
            fn write_to<S: OutStream>(&self, out: &mut S) -> StreamResult<()> {
                out.$write(*self)
            }

            fn read_from<S: InStream>(input: &mut S) -> StreamResult<Self> {
                input.$read()
            }
        }
    };
}

impl_streamable_primitive!(u8, write_u8, read_u8);
impl_streamable_primitive!(u16, write_u16, read_u16);
impl_streamable_primitive!(u32, write_u32, read_u32);
impl_streamable_primitive!(u64, write_u64, read_u64);
impl_streamable_primitive!(i32, write_i32, read_i32);
impl_streamable_primitive!(i64, write_i64, read_i64);
impl_streamable_primitive!(bool, write_bool, read_bool);

impl Streamable for String {
    fn write_to<S: OutStream>(&self, out: &mut S) -> StreamResult<()> {
        out.write_string(self)
    }

    fn read_from<S: InStream>(input: &mut S) -> StreamResult<Self> {
        input.read_string()
    }
}

impl<T: Streamable> Streamable for Vec<T> {
    fn write_to<S: OutStream>(&self, out: &mut S) -> StreamResult<()> {
        let len = u32::try_from(self.len()).map_err(|_| StreamError::InvalidData {
            reason: format!("sequence of {} elements is too long", self.len()),
        })?;
        out.write_u32(len)?;
        for item in self {
            item.write_to(out)?;
        }
        Ok(())
    }

    fn read_from<S: InStream>(input: &mut S) -> StreamResult<Self> {
        let len = input.read_u32()? as usize;
        // Every element takes at least one byte: bound the allocation.
        let mut items = Vec::with_capacity(len.min(input.bytes_available()));
        for _ in 0..len {
            items.push(T::read_from(input)?);
        }
        Ok(items)
    }
}

/// Minimal slice-backed input stream, used to decode borrowed payloads.
pub struct SliceStream<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> SliceStream<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Unread tail of the slice.
    pub fn rest(&self) -> &'a [u8] {
        &self.buffer[self.offset..]
    }
}

impl InStream for SliceStream<'_> {
    fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
        let count = buf.len().min(self.bytes_available());
        buf[..count].copy_from_slice(&self.buffer[self.offset..self.offset + count]);
        self.offset += count;
        count
    }

    fn bytes_available(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }
}

impl OutStream for Vec<u8> {
    fn write_bytes(&mut self, data: &[u8]) -> usize {
        self.extend_from_slice(data);
        data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_are_little_endian() {
        let mut out = Vec::new();
        out.write_u32(0x1234_5678).expect("write u32");
        out.write_u16(0xABCD).expect("write u16");
        assert_eq!(out, [0x78, 0x56, 0x34, 0x12, 0xCD, 0xAB]);
    }

    #[test]
    fn test_string_layout() {
        let mut out = Vec::new();
        out.write_string("Calc").expect("write string");
        assert_eq!(&out[..4], &4u32.to_le_bytes());
        assert_eq!(&out[4..], b"Calc");

        let mut input = SliceStream::new(&out);
        assert_eq!(input.read_string().expect("read string"), "Calc");
        assert_eq!(input.bytes_available(), 0);
    }

    #[test]
    fn test_truncated_read_consumes_nothing() {
        let data = [1u8, 2, 3];
        let mut input = SliceStream::new(&data);
        let err = input.read_u32().expect_err("3 bytes cannot hold a u32");
        assert_eq!(
            err,
            StreamError::ReadFailed {
                requested: 4,
                available: 3
            }
        );
        assert_eq!(input.offset(), 0);
    }

    #[test]
    fn test_string_length_beyond_stream_is_rejected() {
        let mut out = Vec::new();
        out.write_u32(1_000_000).expect("write len");
        out.put(b"abc").expect("write body");
        let mut input = SliceStream::new(&out);
        assert!(matches!(
            input.read_string(),
            Err(StreamError::ReadFailed { .. })
        ));
    }

    #[test]
    fn test_invalid_bool() {
        let data = [7u8];
        let mut input = SliceStream::new(&data);
        assert!(matches!(
            input.read_bool(),
            Err(StreamError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_vec_of_strings() {
        let names = vec!["a".to_string(), "bc".to_string()];
        let mut out = Vec::new();
        out.write_object(&names).expect("write vec");
        let mut input = SliceStream::new(&out);
        let back: Vec<String> = input.read_object().expect("read vec");
        assert_eq!(back, names);
    }
}
