// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport channel identity.

use crate::ser::{InStream, OutStream, StreamResult, Streamable};
use std::fmt;

/// Cookie of a channel that is not connected.
pub const COOKIE_UNKNOWN: u64 = 0;
/// Cookie of in-process delivery.
pub const COOKIE_LOCAL: u64 = 1;
/// Cookie of the router itself.
pub const COOKIE_ROUTER: u64 = 2;
/// First cookie the router hands out to a connected process.
pub const COOKIE_FIRST_REMOTE: u64 = 256;

/// The invalid channel.
pub const INVALID_CHANNEL: Channel = Channel::new(COOKIE_UNKNOWN, COOKIE_UNKNOWN, COOKIE_UNKNOWN);

/// `(source, target, cookie)` triple naming the transport path of an event.
///
/// `cookie` is the router-assigned session that carries the traffic;
/// `source` and `target` may still be unknown during the connect handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Channel {
    source: u64,
    target: u64,
    cookie: u64,
}

impl Channel {
    pub const fn new(source: u64, target: u64, cookie: u64) -> Self {
        Self {
            source,
            target,
            cookie,
        }
    }

    /// Channel of an in-process endpoint.
    pub const fn local() -> Self {
        Self::new(COOKIE_LOCAL, COOKIE_LOCAL, COOKIE_LOCAL)
    }

    #[inline]
    pub fn source(&self) -> u64 {
        self.source
    }

    #[inline]
    pub fn target(&self) -> u64 {
        self.target
    }

    #[inline]
    pub fn cookie(&self) -> u64 {
        self.cookie
    }

    pub fn set_source(&mut self, source: u64) {
        self.source = source;
    }

    pub fn set_target(&mut self, target: u64) {
        self.target = target;
    }

    pub fn set_cookie(&mut self, cookie: u64) {
        self.cookie = cookie;
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.cookie != COOKIE_UNKNOWN
    }

    /// True for channels that never leave the process.
    #[inline]
    pub fn is_local(&self) -> bool {
        self.cookie == COOKIE_LOCAL
    }

    /// Reset all three fields at once.
    pub fn invalidate(&mut self) {
        *self = INVALID_CHANNEL;
    }

    /// `source.target.cookie`
    pub fn to_path(&self) -> String {
        format!("{}.{}.{}", self.source, self.target, self.cookie)
    }

    /// Parse a `source.target.cookie` path; malformed input yields
    /// [`INVALID_CHANNEL`].
    pub fn from_path(path: &str) -> Self {
        let mut parts = path.split('.').map(str::parse::<u64>);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(source)), Some(Ok(target)), Some(Ok(cookie)), None) => {
                Self::new(source, target, cookie)
            }
            _ => INVALID_CHANNEL,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}

impl Streamable for Channel {
    fn write_to<S: OutStream>(&self, out: &mut S) -> StreamResult<()> {
        out.write_u64(self.source)?;
        out.write_u64(self.target)?;
        out.write_u64(self.cookie)
    }

    fn read_from<S: InStream>(input: &mut S) -> StreamResult<Self> {
        let source = input.read_u64()?;
        let target = input.read_u64()?;
        let cookie = input.read_u64()?;
        Ok(Self::new(source, target, cookie))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::SliceStream;

    #[test]
    fn test_validity() {
        let mut channel = Channel::new(COOKIE_UNKNOWN, COOKIE_UNKNOWN, 300);
        assert!(channel.is_valid());
        channel.invalidate();
        assert!(!channel.is_valid());
        assert_eq!(channel, INVALID_CHANNEL);
        assert!(!Channel::default().is_valid());
    }

    #[test]
    fn test_path() {
        let channel = Channel::new(256, 257, 256);
        assert_eq!(channel.to_path(), "256.257.256");
        assert_eq!(Channel::from_path("256.257.256"), channel);
        assert_eq!(Channel::from_path("1.2"), INVALID_CHANNEL);
        assert_eq!(Channel::from_path("1.2.3.4"), INVALID_CHANNEL);
        assert_eq!(Channel::from_path("a.b.c"), INVALID_CHANNEL);
    }

    #[test]
    fn test_stream_layout() {
        let mut out = Vec::new();
        out.write_object(&Channel::new(1, 2, 3)).expect("write");
        assert_eq!(out.len(), 24);
        assert_eq!(&out[16..], &3u64.to_le_bytes());

        let back: Channel = SliceStream::new(&out).read_object().expect("read");
        assert_eq!(back, Channel::new(1, 2, 3));
    }
}
