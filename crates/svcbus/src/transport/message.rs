// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Framed wire messages.
//!
//! ```text
//! +--------+------------+--------+--------+----------+--------+----------+---------+
//! | length | message_id | target | source | sequence | result | checksum | payload |
//! |  u32   |    u32     |  u64   |  u64   |   u64    |  u32   |   u32    | length  |
//! +--------+------------+--------+--------+----------+--------+----------+---------+
//! ```
//!
//! All header fields are little-endian; `length` counts the payload only and
//! `checksum` is the CRC-32 of the payload. `target` and `source` are
//! connection cookies.

use super::socket::Socket;
use crate::buffer::{BufferKind, BufferStream, ByteBuffer, CursorPosition};
use crate::error::{Error, Result};
use crate::interface::ResultType;
use crate::ser::{InStream, OutStream, SliceStream};
use std::fmt;

/// Size of the fixed message header.
pub const REMOTE_HEADER_SIZE: usize = 40;

/// Decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteHeader {
    pub length: u32,
    pub message_id: u32,
    pub target: u64,
    pub source: u64,
    pub sequence: u64,
    pub result: u32,
    pub checksum: u32,
}

impl RemoteHeader {
    pub fn encode(&self) -> [u8; REMOTE_HEADER_SIZE] {
        let mut header = [0u8; REMOTE_HEADER_SIZE];
        let mut offset = 0;
        let mut put = |field: &[u8]| {
            header[offset..offset + field.len()].copy_from_slice(field);
            offset += field.len();
        };
        put(&self.length.to_le_bytes());
        put(&self.message_id.to_le_bytes());
        put(&self.target.to_le_bytes());
        put(&self.source.to_le_bytes());
        put(&self.sequence.to_le_bytes());
        put(&self.result.to_le_bytes());
        put(&self.checksum.to_le_bytes());
        header
    }

    pub fn decode(bytes: &[u8; REMOTE_HEADER_SIZE]) -> Result<Self> {
        let mut input = SliceStream::new(bytes);
        Ok(Self {
            length: input.read_u32()?,
            message_id: input.read_u32()?,
            target: input.read_u64()?,
            source: input.read_u64()?,
            sequence: input.read_u64()?,
            result: input.read_u32()?,
            checksum: input.read_u32()?,
        })
    }
}

/// Message exchanged between processes and the router.
///
/// The payload lives in a `Remote` byte buffer, so clones share it.
#[derive(Clone)]
pub struct RemoteMessage {
    message_id: u32,
    target: u64,
    source: u64,
    sequence: u64,
    result: ResultType,
    payload: BufferStream,
}

impl RemoteMessage {
    pub fn new(message_id: u32, source: u64, target: u64) -> Self {
        Self {
            message_id,
            target,
            source,
            sequence: 0,
            result: ResultType::Ok,
            payload: BufferStream::new(BufferKind::Remote),
        }
    }

    #[inline]
    pub fn message_id(&self) -> u32 {
        self.message_id
    }

    #[inline]
    pub fn target(&self) -> u64 {
        self.target
    }

    #[inline]
    pub fn source(&self) -> u64 {
        self.source
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[inline]
    pub fn result(&self) -> ResultType {
        self.result
    }

    pub fn set_target(&mut self, target: u64) {
        self.target = target;
    }

    pub fn set_source(&mut self, source: u64) {
        self.source = source;
    }

    pub fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    pub fn set_result(&mut self, result: ResultType) {
        self.result = result;
    }

    /// Payload writer; appends at the end.
    pub fn writer(&mut self) -> &mut BufferStream {
        self.payload.move_to_end();
        &mut self.payload
    }

    /// Independent payload reader starting at offset 0.
    pub fn reader(&self) -> BufferStream {
        BufferStream::from_buffer(self.payload.buffer().clone())
    }

    pub fn payload(&self) -> &[u8] {
        self.payload.as_bytes()
    }

    pub fn checksum(&self) -> u32 {
        crc32fast::hash(self.payload())
    }

    /// Reply skeleton: same id and sequence, source and target swapped.
    pub fn reply(&self, result: ResultType) -> Self {
        let mut reply = Self::new(self.message_id, self.target, self.source);
        reply.sequence = self.sequence;
        reply.result = result;
        reply
    }

    pub fn header(&self) -> Result<RemoteHeader> {
        let length = u32::try_from(self.payload().len()).map_err(|_| Error::MessageTooLarge {
            size: self.payload().len(),
            max: u32::MAX as usize,
        })?;
        Ok(RemoteHeader {
            length,
            message_id: self.message_id,
            target: self.target,
            source: self.source,
            sequence: self.sequence,
            result: self.result.as_u32(),
            checksum: self.checksum(),
        })
    }

    /// Header followed by payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let header = self.header()?;
        let mut out = Vec::with_capacity(REMOTE_HEADER_SIZE + self.payload().len());
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(self.payload());
        Ok(out)
    }

    /// Decode one complete frame.
    pub fn decode(bytes: &[u8], max_size: usize) -> Result<Self> {
        let header_bytes: &[u8; REMOTE_HEADER_SIZE] = bytes
            .get(..REMOTE_HEADER_SIZE)
            .and_then(|h| h.try_into().ok())
            .ok_or(Error::Stream(crate::ser::StreamError::ReadFailed {
                requested: REMOTE_HEADER_SIZE,
                available: bytes.len(),
            }))?;
        let header = RemoteHeader::decode(header_bytes)?;
        let body = &bytes[REMOTE_HEADER_SIZE..];
        if body.len() != header.length as usize {
            return Err(Error::Stream(crate::ser::StreamError::ReadFailed {
                requested: header.length as usize,
                available: body.len(),
            }));
        }
        Self::from_parts(header, body, max_size)
    }

    fn from_parts(header: RemoteHeader, body: &[u8], max_size: usize) -> Result<Self> {
        if body.len() > max_size {
            return Err(Error::MessageTooLarge {
                size: body.len(),
                max: max_size,
            });
        }
        let actual = crc32fast::hash(body);
        if actual != header.checksum {
            return Err(Error::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }
        let mut message = Self::new(header.message_id, header.source, header.target);
        message.sequence = header.sequence;
        message.result = ResultType::from_u32(header.result);
        if !body.is_empty() {
            message.payload = BufferStream::from_buffer(ByteBuffer::from_slice(BufferKind::Remote, body));
        }
        Ok(message)
    }

    /// Write the whole frame to `socket`.
    pub fn send_message(&self, socket: &Socket) -> Result<usize> {
        socket.send_data(&self.encode()?)
    }

    /// Read one frame from `socket`, rejecting payloads above `max_size`.
    pub fn receive_message(socket: &Socket, max_size: usize) -> Result<Self> {
        let mut header_bytes = [0u8; REMOTE_HEADER_SIZE];
        socket.receive_data(&mut header_bytes)?;
        let header = RemoteHeader::decode(&header_bytes)?;
        let length = header.length as usize;
        if length > max_size {
            return Err(Error::MessageTooLarge {
                size: length,
                max: max_size,
            });
        }
        let mut body = vec![0u8; length];
        if length > 0 {
            socket.receive_data(&mut body)?;
        }
        Self::from_parts(header, &body, max_size)
    }
}

impl fmt::Debug for RemoteMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteMessage")
            .field("message_id", &format_args!("{:#010x}", self.message_id))
            .field("source", &self.source)
            .field("target", &self.target)
            .field("sequence", &self.sequence)
            .field("result", &self.result)
            .field("length", &self.payload().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_MESSAGE_SIZE;

    fn sample() -> RemoteMessage {
        let mut message = RemoteMessage::new(0x0001_0002, 256, 257);
        message.set_sequence(9);
        message.writer().write_string("payload").expect("write");
        message
    }

    #[test]
    fn test_header_layout() {
        let bytes = sample().encode().expect("encode");
        assert_eq!(bytes.len(), REMOTE_HEADER_SIZE + 11);
        assert_eq!(&bytes[0..4], &11u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &0x0001_0002u32.to_le_bytes());
        assert_eq!(&bytes[8..16], &257u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &256u64.to_le_bytes());
        assert_eq!(&bytes[24..32], &9u64.to_le_bytes());
    }

    #[test]
    fn test_header_tail_carries_result_and_checksum() {
        let message = sample().reply(ResultType::Undelivered);
        let header = message.header().expect("header");
        let bytes = header.encode();
        assert_eq!(&bytes[32..36], &ResultType::Undelivered.as_u32().to_le_bytes());
        assert_eq!(&bytes[36..40], &crc32fast::hash(&[]).to_le_bytes());
        assert_eq!(RemoteHeader::decode(&bytes).expect("decode"), header);
    }

    #[test]
    fn test_decode_and_read_payload() {
        let bytes = sample().encode().expect("encode");
        let message = RemoteMessage::decode(&bytes, DEFAULT_MAX_MESSAGE_SIZE).expect("decode");
        assert_eq!(message.source(), 256);
        assert_eq!(message.target(), 257);
        assert_eq!(message.sequence(), 9);
        assert_eq!(message.reader().read_string().expect("read"), "payload");
    }

    #[test]
    fn test_corrupted_payload_is_rejected() {
        let mut bytes = sample().encode().expect("encode");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            RemoteMessage::decode(&bytes, DEFAULT_MAX_MESSAGE_SIZE),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_size_limit() {
        let bytes = sample().encode().expect("encode");
        assert!(matches!(
            RemoteMessage::decode(&bytes, 4),
            Err(Error::MessageTooLarge { size: 11, max: 4 })
        ));
    }

    #[test]
    fn test_reply_swaps_endpoints() {
        let reply = sample().reply(ResultType::Undelivered);
        assert_eq!(reply.source(), 257);
        assert_eq!(reply.target(), 256);
        assert_eq!(reply.sequence(), 9);
        assert_eq!(reply.result(), ResultType::Undelivered);
        assert!(reply.payload().is_empty());
    }

    #[test]
    fn test_reader_does_not_move_writer() {
        let mut message = sample();
        let _ = message.reader().read_string().expect("read");
        message.writer().write_u8(1).expect("append");
        assert_eq!(message.payload().len(), 12);
    }
}
