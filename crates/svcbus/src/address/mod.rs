// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service addressing.
//!
//! A [`ServiceItem`] names *what* is offered (name, version, scope). A
//! [`ServiceAddress`] adds the role name of the component instance offering
//! it. [`StubAddress`] and [`ProxyAddress`] embed a service address together
//! with the owning thread and the [`Channel`] the endpoint is reachable
//! through.
//!
//! Text form: `role.name.major.minor.patch.type`, e.g.
//! `calculator.Calc.1.0.0.public`.

pub mod channel;
mod endpoint;

pub use channel::{
    Channel, COOKIE_FIRST_REMOTE, COOKIE_LOCAL, COOKIE_ROUTER, COOKIE_UNKNOWN, INVALID_CHANNEL,
};
pub use endpoint::{ProxyAddress, StubAddress};

use crate::ser::{InStream, OutStream, StreamError, StreamResult, Streamable};
use std::fmt;
use std::hash::{Hash, Hasher};

const PATH_SEPARATOR: char = '.';

/// Magic number of every invalid address.
const INVALID_MAGIC: u32 = 0;

/// Interface version `major.minor.patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Same major version and at least the requested minor version.
    pub fn is_compatible(&self, requested: &Version) -> bool {
        self.major == requested.major && self.minor >= requested.minor
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Visibility scope of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ServiceType {
    #[default]
    Unknown,
    /// Visible inside the process only.
    Local,
    /// Visible to every process connected to the router.
    Public,
}

impl ServiceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceType::Unknown => "unknown",
            ServiceType::Local => "local",
            ServiceType::Public => "public",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(ServiceType::Local),
            "public" => Some(ServiceType::Public),
            _ => None,
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            ServiceType::Unknown => 0,
            ServiceType::Local => 1,
            ServiceType::Public => 2,
        }
    }

    fn from_wire(value: u8) -> StreamResult<Self> {
        match value {
            0 => Ok(ServiceType::Unknown),
            1 => Ok(ServiceType::Local),
            2 => Ok(ServiceType::Public),
            other => Err(StreamError::InvalidData {
                reason: format!("service type {}", other),
            }),
        }
    }
}

/// Identity of an offered service, independent of who offers it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceItem {
    pub name: String,
    pub version: Version,
    pub service_type: ServiceType,
}

impl ServiceItem {
    pub fn new(name: impl Into<String>, version: Version, service_type: ServiceType) -> Self {
        Self {
            name: name.into(),
            version,
            service_type,
        }
    }

    pub fn is_valid(&self) -> bool {
        is_valid_segment(&self.name) && self.service_type != ServiceType::Unknown
    }

    pub fn is_public(&self) -> bool {
        self.service_type == ServiceType::Public
    }
}

impl Streamable for ServiceItem {
    fn write_to<S: OutStream>(&self, out: &mut S) -> StreamResult<()> {
        out.write_string(&self.name)?;
        out.write_u32(self.version.major)?;
        out.write_u32(self.version.minor)?;
        out.write_u32(self.version.patch)?;
        out.write_u8(self.service_type.to_wire())
    }

    fn read_from<S: InStream>(input: &mut S) -> StreamResult<Self> {
        let name = input.read_string()?;
        let version = Version::new(input.read_u32()?, input.read_u32()?, input.read_u32()?);
        let service_type = ServiceType::from_wire(input.read_u8()?)?;
        Ok(Self::new(name, version, service_type))
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains(PATH_SEPARATOR)
}

/// Service item plus the role name of the component instance.
///
/// Equality is structural; the hash is the derived magic number (CRC-32 of
/// the path, 0 for invalid addresses), which is recomputed by every
/// constructor, by [`ServiceAddress::set_role_name`] and after decoding. It
/// is never serialized.
#[derive(Debug, Clone)]
pub struct ServiceAddress {
    item: ServiceItem,
    role_name: String,
    magic: u32,
}

impl ServiceAddress {
    pub fn new(item: ServiceItem, role_name: impl Into<String>) -> Self {
        let mut address = Self {
            item,
            role_name: role_name.into(),
            magic: 0,
        };
        address.magic = address.compute_magic();
        address
    }

    /// Shorthand for `ServiceAddress::new(ServiceItem::new(..), role)`.
    pub fn with(
        name: impl Into<String>,
        version: Version,
        service_type: ServiceType,
        role_name: impl Into<String>,
    ) -> Self {
        Self::new(ServiceItem::new(name, version, service_type), role_name)
    }

    /// The invalid address.
    pub const fn invalid() -> Self {
        Self {
            item: ServiceItem {
                name: String::new(),
                version: Version::new(0, 0, 0),
                service_type: ServiceType::Unknown,
            },
            role_name: String::new(),
            magic: INVALID_MAGIC,
        }
    }

    #[inline]
    pub fn item(&self) -> &ServiceItem {
        &self.item
    }

    #[inline]
    pub fn service_name(&self) -> &str {
        &self.item.name
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.item.version
    }

    #[inline]
    pub fn service_type(&self) -> ServiceType {
        self.item.service_type
    }

    #[inline]
    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    #[inline]
    pub fn magic(&self) -> u32 {
        self.magic
    }

    pub fn is_public(&self) -> bool {
        self.item.is_public()
    }

    pub fn set_role_name(&mut self, role_name: impl Into<String>) {
        self.role_name = role_name.into();
        self.magic = self.compute_magic();
    }

    pub fn is_valid(&self) -> bool {
        self.item.is_valid() && is_valid_segment(&self.role_name)
    }

    /// `role.name.major.minor.patch.type`
    pub fn convert_address_to_path(&self) -> String {
        format!(
            "{role}{sep}{name}{sep}{version}{sep}{ty}",
            role = self.role_name,
            name = self.item.name,
            version = self.item.version,
            ty = self.item.service_type.as_str(),
            sep = PATH_SEPARATOR,
        )
    }

    /// Parse a path produced by [`ServiceAddress::convert_address_to_path`].
    ///
    /// Malformed paths yield [`ServiceAddress::invalid`].
    pub fn convert_path_to_address(path: &str) -> Self {
        Self::parse_path(path).unwrap_or_else(|| {
            log::debug!("[ServiceAddress] malformed path '{}'", path);
            Self::invalid()
        })
    }

    fn parse_path(path: &str) -> Option<Self> {
        let parts: Vec<&str> = path.split(PATH_SEPARATOR).collect();
        let [role, name, major, minor, patch, ty] = parts.as_slice() else {
            return None;
        };
        let version = Version::new(major.parse().ok()?, minor.parse().ok()?, patch.parse().ok()?);
        let service_type = ServiceType::parse(ty)?;
        let address = Self::with(*name, version, service_type, *role);
        address.is_valid().then_some(address)
    }

    fn compute_magic(&self) -> u32 {
        if self.is_valid() {
            crc32fast::hash(self.convert_address_to_path().as_bytes())
        } else {
            INVALID_MAGIC
        }
    }
}

impl Default for ServiceAddress {
    fn default() -> Self {
        Self::invalid()
    }
}

impl PartialEq for ServiceAddress {
    fn eq(&self, other: &Self) -> bool {
        self.magic == other.magic && self.item == other.item && self.role_name == other.role_name
    }
}

impl Eq for ServiceAddress {}

impl Hash for ServiceAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.magic);
    }
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.convert_address_to_path())
    }
}

impl Streamable for ServiceAddress {
    fn write_to<S: OutStream>(&self, out: &mut S) -> StreamResult<()> {
        self.item.write_to(out)?;
        out.write_string(&self.role_name)
    }

    fn read_from<S: InStream>(input: &mut S) -> StreamResult<Self> {
        let item = ServiceItem::read_from(input)?;
        let role_name = input.read_string()?;
        Ok(Self::new(item, role_name))
    }
}
