// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Symbolic identifiers and runtime class tags.

use crate::ser::{InStream, OutStream, StreamResult, Streamable};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Immutable `(value, name)` pair used in lookup tables.
///
/// `==` on two identifiers compares both fields; `== u32` and `== &str`
/// compare one field only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    value: u32,
    name: Cow<'static, str>,
}

/// The one invalid identifier.
pub const BAD_IDENTIFIER: Identifier = Identifier::new_static(u32::MAX, "_BAD_IDENTIFIER");

impl Identifier {
    /// Identifier usable in `const` tables.
    pub const fn new_static(value: u32, name: &'static str) -> Self {
        Self {
            value,
            name: Cow::Borrowed(name),
        }
    }

    pub fn new(value: u32, name: impl Into<String>) -> Self {
        Self {
            value,
            name: Cow::Owned(name.into()),
        }
    }

    #[inline]
    pub fn value(&self) -> u32 {
        self.value
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_valid(&self) -> bool {
        *self != BAD_IDENTIFIER
    }
}

impl Default for Identifier {
    fn default() -> Self {
        BAD_IDENTIFIER
    }
}

impl PartialEq<u32> for Identifier {
    fn eq(&self, other: &u32) -> bool {
        self.value == *other
    }
}

impl PartialEq<&str> for Identifier {
    fn eq(&self, other: &&str) -> bool {
        self.name == *other
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.value)
    }
}

impl Streamable for Identifier {
    fn write_to<S: OutStream>(&self, out: &mut S) -> StreamResult<()> {
        out.write_u32(self.value)?;
        out.write_string(&self.name)
    }

    fn read_from<S: InStream>(input: &mut S) -> StreamResult<Self> {
        let value = input.read_u32()?;
        let name = input.read_string()?;
        Ok(Self::new(value, name))
    }
}

/// Name of the entry matching `value`, else of the default entry.
///
/// An out-of-range `default_index` yields the empty string.
pub fn conv_to_string(value: u32, table: &[Identifier], default_index: usize) -> &str {
    table
        .iter()
        .find(|id| **id == value)
        .or_else(|| table.get(default_index))
        .map_or("", Identifier::name)
}

/// Value of the entry matching `name`, else of the default entry.
///
/// An out-of-range `default_index` yields the bad identifier value.
pub fn conv_from_string(name: &str, table: &[Identifier], default_index: usize) -> u32 {
    table
        .iter()
        .find(|id| **id == name)
        .or_else(|| table.get(default_index))
        .map_or(BAD_IDENTIFIER.value, Identifier::value)
}

const BAD_CLASS_NAME: &str = "_BAD_RUNTIME_CLASS_ID";

/// Runtime type tag of a class, compared by name.
#[derive(Debug, Clone)]
pub struct RuntimeClassId {
    name: Cow<'static, str>,
}

impl RuntimeClassId {
    pub const fn from_static(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
        }
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
        }
    }

    /// The reserved invalid class id.
    pub(crate) const fn bad() -> Self {
        Self::from_static(BAD_CLASS_NAME)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && self.name != BAD_CLASS_NAME
    }

    /// CRC-32 of the class name, the dispatch table key.
    pub fn magic(&self) -> u32 {
        crc32fast::hash(self.name.as_bytes())
    }
}

impl Default for RuntimeClassId {
    fn default() -> Self {
        Self::bad()
    }
}

impl PartialEq for RuntimeClassId {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for RuntimeClassId {}

impl PartialEq<&str> for RuntimeClassId {
    fn eq(&self, other: &&str) -> bool {
        self.name == *other
    }
}

impl Hash for RuntimeClassId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.magic());
    }
}

impl From<&RuntimeClassId> for u32 {
    fn from(id: &RuntimeClassId) -> Self {
        id.magic()
    }
}

impl fmt::Display for RuntimeClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::SliceStream;

    const TABLE: [Identifier; 3] = [
        Identifier::new_static(0, "Unknown"),
        Identifier::new_static(1, "Red"),
        Identifier::new_static(2, "Green"),
    ];

    #[test]
    fn test_equality_asymmetry() {
        let id = Identifier::new(5, "X");
        assert!(id == 5);
        assert!(id == "X");
        assert_ne!(id, Identifier::new(5, "Y"));
        assert_eq!(id, Identifier::new(5, "X"));
    }

    #[test]
    fn test_bad_identifier() {
        assert!(!BAD_IDENTIFIER.is_valid());
        assert!(!Identifier::default().is_valid());
        assert!(Identifier::new(u32::MAX, "other").is_valid());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(conv_to_string(2, &TABLE, 0), "Green");
        assert_eq!(conv_to_string(9, &TABLE, 0), "Unknown");
        assert_eq!(conv_to_string(9, &TABLE, 7), "");
        assert_eq!(conv_from_string("Red", &TABLE, 0), 1);
        assert_eq!(conv_from_string("Blue", &TABLE, 0), 0);
        assert_eq!(conv_from_string("Blue", &TABLE, 7), u32::MAX);
    }

    #[test]
    fn test_stream_order() {
        let mut out = Vec::new();
        out.write_object(&Identifier::new(7, "Seven")).expect("write");
        assert_eq!(&out[..4], &7u32.to_le_bytes());

        let mut input = SliceStream::new(&out);
        let back: Identifier = input.read_object().expect("read");
        assert_eq!(back, Identifier::new(7, "Seven"));
    }

    #[test]
    fn test_runtime_class_id() {
        let a = RuntimeClassId::from_static("RequestEvent");
        let b = RuntimeClassId::new("RequestEvent");
        assert_eq!(a, b);
        assert_eq!(a.magic(), b.magic());
        assert!(a.is_valid());
        assert!(!RuntimeClassId::bad().is_valid());
        assert!(!RuntimeClassId::new("").is_valid());
        assert_ne!(a.magic(), RuntimeClassId::new("ResponseEvent").magic());
    }
}
