// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Interface metadata: message id ranges, result codes and data states.
//!
//! Message ids are partitioned by kind:
//!
//! | range                        | kind       |
//! |------------------------------|------------|
//! | `0x0001_0000..0x0002_0000`   | requests   |
//! | `0x0002_0000..0x0004_0000`   | responses and broadcasts |
//! | `0x0004_0000..0x7F00_0000`   | attributes |
//! | `0x7F00_0000..`              | system (router protocol) |

mod data;
mod params;
mod proxy_data;

pub use data::{empty_interface, InterfaceData};
pub use params::ParameterArray;
pub use proxy_data::ProxyData;

use crate::ident::{conv_from_string, conv_to_string, Identifier};

pub const REQUEST_ID_FIRST: u32 = 0x0001_0000;
pub const RESPONSE_ID_FIRST: u32 = 0x0002_0000;
pub const ATTRIBUTE_ID_FIRST: u32 = 0x0004_0000;
pub const SYSTEM_ID_FIRST: u32 = 0x7F00_0000;

/// Kind of a message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Unknown,
    Request,
    Response,
    Attribute,
    System,
}

impl MessageKind {
    pub fn of(message_id: u32) -> Self {
        match message_id {
            id if id >= SYSTEM_ID_FIRST => MessageKind::System,
            id if id >= ATTRIBUTE_ID_FIRST => MessageKind::Attribute,
            id if id >= RESPONSE_ID_FIRST => MessageKind::Response,
            id if id >= REQUEST_ID_FIRST => MessageKind::Request,
            _ => MessageKind::Unknown,
        }
    }
}

/// Outcome carried by responses and remote messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum ResultType {
    #[default]
    Ok = 0,
    Invalid = 1,
    Error = 2,
    Busy = 3,
    Canceled = 4,
    Unavailable = 5,
    DataOk = 6,
    DataInvalid = 7,
    Undelivered = 8,
}

static RESULT_TYPE_NAMES: [Identifier; 9] = [
    Identifier::new_static(ResultType::Ok as u32, "Ok"),
    Identifier::new_static(ResultType::Invalid as u32, "Invalid"),
    Identifier::new_static(ResultType::Error as u32, "Error"),
    Identifier::new_static(ResultType::Busy as u32, "Busy"),
    Identifier::new_static(ResultType::Canceled as u32, "Canceled"),
    Identifier::new_static(ResultType::Unavailable as u32, "Unavailable"),
    Identifier::new_static(ResultType::DataOk as u32, "DataOk"),
    Identifier::new_static(ResultType::DataInvalid as u32, "DataInvalid"),
    Identifier::new_static(ResultType::Undelivered as u32, "Undelivered"),
];

const RESULT_TYPE_DEFAULT: usize = ResultType::Invalid as usize;

impl ResultType {
    pub const ALL: [ResultType; 9] = [
        ResultType::Ok,
        ResultType::Invalid,
        ResultType::Error,
        ResultType::Busy,
        ResultType::Canceled,
        ResultType::Unavailable,
        ResultType::DataOk,
        ResultType::DataInvalid,
        ResultType::Undelivered,
    ];

    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Unknown values map to `Invalid`.
    pub fn from_u32(value: u32) -> Self {
        Self::ALL
            .into_iter()
            .find(|r| r.as_u32() == value)
            .unwrap_or(ResultType::Invalid)
    }

    pub fn as_str(self) -> &'static str {
        conv_to_string(self.as_u32(), &RESULT_TYPE_NAMES, RESULT_TYPE_DEFAULT)
    }

    /// Unknown names map to `Invalid`.
    pub fn parse(name: &str) -> Self {
        Self::from_u32(conv_from_string(
            name,
            &RESULT_TYPE_NAMES,
            RESULT_TYPE_DEFAULT,
        ))
    }

    pub fn is_success(self) -> bool {
        matches!(self, ResultType::Ok | ResultType::DataOk)
    }
}

impl std::fmt::Display for ResultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validity of one attribute or response parameter held by a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataState {
    /// No value received yet, or the provider is gone.
    #[default]
    Unavailable,
    Valid,
    Invalid,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kinds() {
        assert_eq!(MessageKind::of(0), MessageKind::Unknown);
        assert_eq!(MessageKind::of(REQUEST_ID_FIRST + 3), MessageKind::Request);
        assert_eq!(MessageKind::of(RESPONSE_ID_FIRST), MessageKind::Response);
        assert_eq!(MessageKind::of(ATTRIBUTE_ID_FIRST + 1), MessageKind::Attribute);
        assert_eq!(MessageKind::of(SYSTEM_ID_FIRST + 2), MessageKind::System);
    }

    #[test]
    fn test_result_type_names() {
        for result in ResultType::ALL {
            assert_eq!(ResultType::parse(result.as_str()), result);
            assert_eq!(ResultType::from_u32(result.as_u32()), result);
        }
        assert_eq!(ResultType::Undelivered.to_string(), "Undelivered");
        assert_eq!(ResultType::from_u32(99), ResultType::Invalid);
        assert_eq!(ResultType::parse("Nope"), ResultType::Invalid);
    }
}
