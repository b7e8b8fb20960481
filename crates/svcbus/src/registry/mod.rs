// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service registry: which proxies are bound to which stub.
//!
//! One entry per service address. An entry exists iff its stub is registered
//! or at least one proxy waits for it; consumers may register before the
//! provider starts and simply stay Pending. There is no timeout here.
//!
//! | call                      | effect                                             |
//! |---------------------------|----------------------------------------------------|
//! | `register_service_proxy`  | add/merge proxy, Connected iff the stub is         |
//! | `unregister_service_proxy`| remove proxy, drop entry if empty and stub absent  |
//! | `register_service_stub`   | stub Connected, waiting proxies -> Connected       |
//! | `unregister_service_stub` | stub Pending, proxies -> Pending, drop entry if empty |
//!
//! The registry is single-owner: the service manager thread in a process,
//! the registry thread in the router. Other threads post events instead of
//! calling it.

mod proxy;
mod stub;

pub use proxy::{ListServiceProxies, ServiceProxy};
pub use stub::{ServiceStub, INVALID_STUB_SERVICE};

use crate::address::{ProxyAddress, ServiceAddress, StubAddress, COOKIE_LOCAL, COOKIE_UNKNOWN};
use std::collections::HashMap;

/// Connection status of a stub or proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServiceConnection {
    #[default]
    Unknown,
    /// Waiting for the other side.
    Pending,
    /// Bound and usable.
    Connected,
    /// The other side left for good (notification only, never stored).
    Disconnected,
}

impl ServiceConnection {
    pub fn to_wire(self) -> u8 {
        match self {
            ServiceConnection::Unknown => 0,
            ServiceConnection::Pending => 1,
            ServiceConnection::Connected => 2,
            ServiceConnection::Disconnected => 3,
        }
    }

    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(ServiceConnection::Unknown),
            1 => Some(ServiceConnection::Pending),
            2 => Some(ServiceConnection::Connected),
            3 => Some(ServiceConnection::Disconnected),
            _ => None,
        }
    }
}

/// One stub/proxy binding whose status changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionChange {
    pub stub: StubAddress,
    pub proxy: ProxyAddress,
    pub status: ServiceConnection,
}

impl ConnectionChange {
    pub fn new(stub: StubAddress, proxy: ProxyAddress, status: ServiceConnection) -> Self {
        Self {
            stub,
            proxy,
            status,
        }
    }
}

#[derive(Debug, Clone)]
struct ServiceEntry {
    stub: ServiceStub,
    proxies: ListServiceProxies,
}

/// Directory keyed by the stub's service address (the [`ServiceStub`] hash).
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    entries: HashMap<ServiceAddress, ServiceEntry>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of services known (registered or awaited).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ServiceStub, &ListServiceProxies)> {
        self.entries.values().map(|e| (&e.stub, &e.proxies))
    }

    /// Register a consumer; creates a Pending entry if nobody offers the
    /// service yet. Returns the stub and the registered proxy.
    pub fn register_service_proxy(&mut self, proxy: &ProxyAddress) -> (ServiceStub, ServiceProxy) {
        if !proxy.is_valid() {
            log::debug!("[ServiceRegistry] rejecting invalid {}", proxy);
            return (
                ServiceStub::invalid(),
                ServiceProxy::new(proxy.clone(), ServiceConnection::Unknown),
            );
        }

        let entry = self
            .entries
            .entry(proxy.service_address().clone())
            .or_insert_with(|| ServiceEntry {
                stub: ServiceStub::pending_for(proxy),
                proxies: ListServiceProxies::new(),
            });
        let registered = entry.proxies.register_proxy(proxy, &entry.stub);
        log::debug!(
            "[ServiceRegistry] {} registered, {} proxies for {}",
            registered,
            entry.proxies.len(),
            proxy.service_address()
        );
        (entry.stub.clone(), registered)
    }

    /// Remove a consumer. Returns the stub and the removed proxy, `None` if
    /// the proxy was unknown. The entry goes away once it has neither a stub
    /// nor proxies.
    pub fn unregister_service_proxy(
        &mut self,
        proxy: &ProxyAddress,
    ) -> Option<(ServiceStub, ServiceProxy)> {
        let key = proxy.service_address();
        let entry = self.entries.get_mut(key)?;
        let removed = entry.proxies.unregister_proxy(proxy)?;
        let stub = entry.stub.clone();
        if entry.proxies.is_empty() && !entry.stub.is_connected() {
            self.entries.remove(key);
            log::debug!("[ServiceRegistry] entry {} removed", key);
        }
        Some((stub, removed))
    }

    /// Register a provider. Every waiting proxy becomes Connected and is
    /// returned for notification.
    ///
    /// If another provider already offers this address nothing changes and
    /// that provider's stub is returned with no proxies.
    pub fn register_service_stub(&mut self, stub: &StubAddress) -> (ServiceStub, Vec<ServiceProxy>) {
        if !stub.is_valid() {
            log::debug!("[ServiceRegistry] rejecting invalid {}", stub);
            return (ServiceStub::invalid(), Vec::new());
        }

        let entry = self
            .entries
            .entry(stub.service_address().clone())
            .or_insert_with(|| ServiceEntry {
                stub: ServiceStub::new(stub.clone(), ServiceConnection::Pending),
                proxies: ListServiceProxies::new(),
            });

        if entry.stub.is_connected() && entry.stub.address() != stub {
            log::warn!(
                "[ServiceRegistry] {} already provided by {}",
                stub.service_address(),
                entry.stub.address()
            );
            return (entry.stub.clone(), Vec::new());
        }

        entry.stub.connect(stub.clone());
        let proxies = entry.proxies.stub_available();
        log::debug!(
            "[ServiceRegistry] stub {} connected, {} proxies notified",
            stub.service_address(),
            proxies.len()
        );
        (entry.stub.clone(), proxies)
    }

    /// Remove a provider. Its proxies go back to Pending and are returned
    /// for notification together with the departed stub.
    pub fn unregister_service_stub(
        &mut self,
        stub: &StubAddress,
    ) -> Option<(ServiceStub, Vec<ServiceProxy>)> {
        let key = stub.service_address();
        let entry = self.entries.get_mut(key)?;
        if !entry.stub.is_connected() || entry.stub.address() != stub {
            log::debug!("[ServiceRegistry] {} is not the registered provider", stub);
            return None;
        }

        let departed = ServiceStub::new(entry.stub.address().clone(), ServiceConnection::Pending);
        entry.stub.disconnect();
        let proxies = entry.proxies.stub_unavailable();
        log::debug!(
            "[ServiceRegistry] stub {} disconnected, {} proxies notified",
            key,
            proxies.len()
        );
        if entry.proxies.is_empty() {
            self.entries.remove(key);
            log::debug!("[ServiceRegistry] entry {} removed", key);
        }
        Some((departed, proxies))
    }

    /// Stub record of `address`, or [`INVALID_STUB_SERVICE`].
    pub fn get_stub_service(&self, address: &ServiceAddress) -> &ServiceStub {
        self.entries
            .get(address)
            .map_or(&INVALID_STUB_SERVICE, |e| &e.stub)
    }

    pub fn get_service_proxies(&self, address: &ServiceAddress) -> Option<&ListServiceProxies> {
        self.entries.get(address).map(|e| &e.proxies)
    }

    pub fn find_proxy(&self, proxy: &ProxyAddress) -> Option<&ServiceProxy> {
        self.entries
            .get(proxy.service_address())
            .and_then(|e| e.proxies.find(proxy))
    }

    /// True iff `stub` is the connected provider of its service.
    pub fn is_service_registered(&self, stub: &StubAddress) -> bool {
        self.entries
            .get(stub.service_address())
            .is_some_and(|e| e.stub.is_connected() && e.stub.address() == stub)
    }

    /// Connected stubs and registered proxies reached through `cookie`
    /// ([`COOKIE_UNKNOWN`] matches every cookie).
    pub fn get_service_list(&self, cookie: u64) -> (Vec<StubAddress>, Vec<ProxyAddress>) {
        let matches = |c: u64| cookie == COOKIE_UNKNOWN || c == cookie;
        self.collect(|stub| matches(stub.cookie()), |proxy| matches(proxy.cookie()))
    }

    /// Connected stubs and registered proxies living in other processes
    /// than the one behind `cookie`.
    pub fn get_remote_service_list(&self, cookie: u64) -> (Vec<StubAddress>, Vec<ProxyAddress>) {
        let remote = |c: u64| c != cookie && c != COOKIE_LOCAL && c != COOKIE_UNKNOWN;
        self.collect(|stub| remote(stub.cookie()), |proxy| remote(proxy.cookie()))
    }

    fn collect(
        &self,
        stub_filter: impl Fn(&StubAddress) -> bool,
        proxy_filter: impl Fn(&ProxyAddress) -> bool,
    ) -> (Vec<StubAddress>, Vec<ProxyAddress>) {
        let mut stubs = Vec::new();
        let mut proxies = Vec::new();
        for entry in self.entries.values() {
            if entry.stub.is_connected() && stub_filter(entry.stub.address()) {
                stubs.push(entry.stub.address().clone());
            }
            proxies.extend(
                entry
                    .proxies
                    .iter()
                    .map(ServiceProxy::address)
                    .filter(|p| proxy_filter(p))
                    .cloned(),
            );
        }
        (stubs, proxies)
    }

    /// Drop every stub and proxy reached through a lost connection.
    ///
    /// Returns the changes the surviving endpoints must hear about: proxies
    /// of a lost stub go Pending, stubs of a lost proxy see it Disconnected.
    pub fn disconnect_cookie(&mut self, cookie: u64) -> Vec<ConnectionChange> {
        let mut changes = Vec::new();

        for entry in self.entries.values_mut() {
            let removed = entry.proxies.remove_cookie(cookie);

            if entry.stub.is_connected() && entry.stub.address().cookie() == cookie {
                let lost = entry.stub.address().clone();
                entry.stub.disconnect();
                changes.extend(
                    entry
                        .proxies
                        .stub_unavailable()
                        .into_iter()
                        .map(|p| {
                            ConnectionChange::new(
                                lost.clone(),
                                p.address().clone(),
                                ServiceConnection::Pending,
                            )
                        }),
                );
            } else if entry.stub.is_connected() {
                let stub = entry.stub.address().clone();
                changes.extend(removed.into_iter().map(|p| {
                    ConnectionChange::new(
                        stub.clone(),
                        p.address().clone(),
                        ServiceConnection::Disconnected,
                    )
                }));
            }
        }

        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.stub.is_connected() || !e.proxies.is_empty());
        log::info!(
            "[ServiceRegistry] cookie {} disconnected: {} entries removed, {} changes",
            cookie,
            before - self.entries.len(),
            changes.len()
        );
        changes
    }
}
