// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Proxies bound to one stub.

use super::{ServiceConnection, ServiceStub};
use crate::address::ProxyAddress;
use std::fmt;

/// Proxy address plus its connection status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceProxy {
    address: ProxyAddress,
    status: ServiceConnection,
}

impl ServiceProxy {
    pub fn new(address: ProxyAddress, status: ServiceConnection) -> Self {
        Self { address, status }
    }

    #[inline]
    pub fn address(&self) -> &ProxyAddress {
        &self.address
    }

    #[inline]
    pub fn status(&self) -> ServiceConnection {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ServiceConnection::Connected
    }

    pub fn is_waiting(&self) -> bool {
        self.status == ServiceConnection::Pending
    }
}

impl fmt::Display for ServiceProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.address, self.status)
    }
}

/// Ordered proxies of one stub, registration order preserved.
#[derive(Debug, Clone, Default)]
pub struct ListServiceProxies {
    proxies: Vec<ServiceProxy>,
}

impl ListServiceProxies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceProxy> {
        self.proxies.iter()
    }

    pub fn find(&self, address: &ProxyAddress) -> Option<&ServiceProxy> {
        self.proxies.iter().find(|p| p.address == *address)
    }

    /// Add `address`, or refresh the existing entry for the same proxy.
    ///
    /// The proxy is Connected iff `stub` is.
    pub fn register_proxy(&mut self, address: &ProxyAddress, stub: &ServiceStub) -> ServiceProxy {
        let status = if stub.is_connected() {
            ServiceConnection::Connected
        } else {
            ServiceConnection::Pending
        };

        match self.proxies.iter_mut().find(|p| p.address == *address) {
            Some(existing) => {
                existing.address = address.clone();
                existing.status = status;
                existing.clone()
            }
            None => {
                let proxy = ServiceProxy::new(address.clone(), status);
                self.proxies.push(proxy.clone());
                proxy
            }
        }
    }

    /// Remove `address`, returning the removed entry.
    pub fn unregister_proxy(&mut self, address: &ProxyAddress) -> Option<ServiceProxy> {
        let index = self.proxies.iter().position(|p| p.address == *address)?;
        Some(self.proxies.remove(index))
    }

    /// Every waiting proxy becomes Connected; returns the changed ones.
    pub fn stub_available(&mut self) -> Vec<ServiceProxy> {
        self.transition(ServiceConnection::Connected)
    }

    /// Every connected proxy goes back to Pending; returns the changed ones.
    pub fn stub_unavailable(&mut self) -> Vec<ServiceProxy> {
        self.transition(ServiceConnection::Pending)
    }

    /// Remove every proxy reached through `cookie`.
    pub fn remove_cookie(&mut self, cookie: u64) -> Vec<ServiceProxy> {
        let (removed, kept): (Vec<_>, Vec<_>) = self
            .proxies
            .drain(..)
            .partition(|p| p.address.cookie() == cookie);
        self.proxies = kept;
        removed
    }

    fn transition(&mut self, status: ServiceConnection) -> Vec<ServiceProxy> {
        self.proxies
            .iter_mut()
            .filter(|p| p.status != status)
            .map(|p| {
                p.status = status;
                p.clone()
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a ListServiceProxies {
    type Item = &'a ServiceProxy;
    type IntoIter = std::slice::Iter<'a, ServiceProxy>;

    fn into_iter(self) -> Self::IntoIter {
        self.proxies.iter()
    }
}
