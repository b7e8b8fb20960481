// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Seekable position shared by buffer, ring and file streams.

/// Sentinel returned when a position cannot be computed or set.
pub const INVALID_CURSOR_POSITION: u64 = u64::MAX;

/// Anchor of a relative seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Begin,
    Current,
    End,
}

/// Position of a stream cursor, always an offset from the start.
///
/// Every implementer enforces its own bounds policy: buffer streams stay
/// inside the used region, ring streams wrap, file streams may extend past
/// the end of the file.
pub trait CursorPosition {
    /// Current offset, or [`INVALID_CURSOR_POSITION`].
    fn position(&self) -> u64;

    /// Move `offset` bytes from `origin` (negative moves backward).
    ///
    /// Returns the new position or [`INVALID_CURSOR_POSITION`]; the cursor is
    /// left untouched on failure.
    fn set_position(&mut self, offset: i64, origin: SeekOrigin) -> u64;

    fn move_to_begin(&mut self) -> bool {
        self.set_position(0, SeekOrigin::Begin) != INVALID_CURSOR_POSITION
    }

    fn move_to_end(&mut self) -> bool {
        self.set_position(0, SeekOrigin::End) != INVALID_CURSOR_POSITION
    }
}

/// Resolve `offset` against an anchor, `None` on under/overflow.
pub(crate) fn resolve_offset(anchor: u64, offset: i64) -> Option<u64> {
    anchor
        .checked_add_signed(offset)
        .filter(|pos| *pos != INVALID_CURSOR_POSITION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_offset() {
        assert_eq!(resolve_offset(10, -4), Some(6));
        assert_eq!(resolve_offset(10, 5), Some(15));
        assert_eq!(resolve_offset(3, -4), None);
        assert_eq!(resolve_offset(u64::MAX - 1, 1), None);
    }
}
