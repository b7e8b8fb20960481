// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry record of a service provider.

use super::ServiceConnection;
use crate::address::{ProxyAddress, ServiceAddress, StubAddress};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Stub address plus its connection status.
///
/// Equality and hash use the service address only: the status is mutable
/// metadata, the address is the key.
#[derive(Debug, Clone)]
pub struct ServiceStub {
    address: StubAddress,
    status: ServiceConnection,
}

/// Returned by lookups that find nothing.
pub static INVALID_STUB_SERVICE: ServiceStub = ServiceStub::invalid();

impl ServiceStub {
    pub fn new(address: StubAddress, status: ServiceConnection) -> Self {
        Self { address, status }
    }

    pub const fn invalid() -> Self {
        Self {
            address: StubAddress::invalid(),
            status: ServiceConnection::Unknown,
        }
    }

    /// Placeholder created when a proxy asks for a service nobody provides yet.
    pub(crate) fn pending_for(proxy: &ProxyAddress) -> Self {
        Self::new(
            Self::placeholder_address(proxy.service_address()),
            ServiceConnection::Pending,
        )
    }

    #[inline]
    pub fn address(&self) -> &StubAddress {
        &self.address
    }

    #[inline]
    pub fn service_address(&self) -> &ServiceAddress {
        self.address.service_address()
    }

    #[inline]
    pub fn status(&self) -> ServiceConnection {
        self.status
    }

    pub fn is_valid(&self) -> bool {
        self.address.is_valid()
    }

    pub fn is_connected(&self) -> bool {
        self.status == ServiceConnection::Connected
    }

    pub fn is_waiting(&self) -> bool {
        self.status == ServiceConnection::Pending
    }

    pub(crate) fn connect(&mut self, address: StubAddress) {
        self.address = address;
        self.status = ServiceConnection::Connected;
    }

    /// Back to "waiting for a provider": the channel and thread are
    /// forgotten, the service address stays.
    pub(crate) fn disconnect(&mut self) {
        self.address = Self::placeholder_address(self.address.service_address());
        self.status = ServiceConnection::Pending;
    }

    fn placeholder_address(address: &ServiceAddress) -> StubAddress {
        StubAddress::new(address.clone(), String::new(), crate::address::INVALID_CHANNEL)
    }
}

impl Default for ServiceStub {
    fn default() -> Self {
        Self::invalid()
    }
}

impl PartialEq for ServiceStub {
    fn eq(&self, other: &Self) -> bool {
        self.service_address() == other.service_address()
    }
}

impl Eq for ServiceStub {}

impl Hash for ServiceStub {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.service_address().hash(state);
    }
}

impl fmt::Display for ServiceStub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.address, self.status)
    }
}
