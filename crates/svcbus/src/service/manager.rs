// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide service manager.
//!
//! The manager runs on its own dispatcher thread and is the only owner of
//! the process [`ServiceRegistry`]. Application threads talk to it through a
//! [`ServiceManagerHandle`], which posts commands, and receive
//! `Event::ServiceConnection` notifications on their own dispatcher.
//!
//! Public services are also announced to the router. Bindings between this
//! process and others are learned from router notifications and reported
//! `Disconnected` if the router link goes away.

use super::router_client::{RouterClient, RouterSender};
use crate::address::{Channel, ProxyAddress, StubAddress, COOKIE_LOCAL, COOKIE_UNKNOWN};
use crate::config::{ConnectionSettings, SERVICE_MANAGER_THREAD};
use crate::error::{Error, Result};
use crate::event::{
    post_event, DispatcherThread, Event, EventClass, EventConsumer, NotificationEvent, RequestEvent,
    ResponseEvent,
};
use crate::ident::RuntimeClassId;
use crate::interface::{MessageKind, ResultType};
use crate::registry::{ConnectionChange, ServiceConnection, ServiceRegistry};
use crate::transport::{
    is_router_message, RemoteMessage, RemoteServiceHandler, RouterMessage, Socket, SocketAddress,
    NOTIFICATION_MESSAGE_ID,
};
use crossbeam::channel::{self, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;

const SERVICE_MANAGER_EVENT: RuntimeClassId = RuntimeClassId::from_static("ServiceManagerEvent");

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

type ServiceList = (Vec<StubAddress>, Vec<ProxyAddress>);

enum ManagerCommand {
    RegisterStub(StubAddress),
    UnregisterStub(StubAddress),
    RegisterProxy(ProxyAddress),
    UnregisterProxy(ProxyAddress),
    RouterConnected(RouterSender),
    RouterMessage(RemoteMessage),
    RouterLost,
    ServiceList(Sender<ServiceList>),
}

/// Cloneable access to the service manager from any thread.
#[derive(Clone)]
pub struct ServiceManagerHandle {
    name: Arc<str>,
    link: Arc<RwLock<Option<RouterSender>>>,
}

impl ServiceManagerHandle {
    /// Name of the manager's dispatcher thread.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cookie of this process at the router, [`COOKIE_UNKNOWN`] when not
    /// connected.
    pub fn cookie(&self) -> u64 {
        self.link.read().as_ref().map_or(COOKIE_UNKNOWN, RouterSender::cookie)
    }

    pub fn is_router_connected(&self) -> bool {
        self.link.read().is_some()
    }

    pub fn register_stub(&self, stub: StubAddress) -> Result<()> {
        self.post(ManagerCommand::RegisterStub(stub))
    }

    pub fn unregister_stub(&self, stub: StubAddress) -> Result<()> {
        self.post(ManagerCommand::UnregisterStub(stub))
    }

    pub fn register_proxy(&self, proxy: ProxyAddress) -> Result<()> {
        self.post(ManagerCommand::RegisterProxy(proxy))
    }

    pub fn unregister_proxy(&self, proxy: ProxyAddress) -> Result<()> {
        self.post(ManagerCommand::UnregisterProxy(proxy))
    }

    /// Stubs and proxies currently known to the manager.
    ///
    /// Commands posted earlier from the same thread are applied first.
    pub fn service_list(&self) -> Result<ServiceList> {
        let (tx, rx) = channel::bounded(1);
        self.post(ManagerCommand::ServiceList(tx))?;
        rx.recv_timeout(QUERY_TIMEOUT)
            .map_err(|_| Error::DispatcherStopped(self.name.to_string()))
    }

    /// Deliver a request, response or notification to its target.
    ///
    /// Targets in this process are posted to their thread; others are
    /// encoded and sent through the router.
    pub fn send_event(&self, event: Event) -> Result<()> {
        let (thread, channel) = event
            .target()
            .map(|(thread, channel)| (thread.to_string(), channel))
            .ok_or_else(|| Error::InvalidState("event has no stub or proxy target".to_string()))?;

        let own = self.cookie();
        if channel.cookie() == COOKIE_LOCAL || (own != COOKIE_UNKNOWN && channel.cookie() == own) {
            return post_event(&thread, event).map_err(|_| Error::DispatcherNotFound(thread));
        }
        if !channel.is_valid() {
            return Err(Error::InvalidAddress(format!("no channel to '{}'", thread)));
        }

        let link = self.link.read();
        let sender = link
            .as_ref()
            .ok_or_else(|| Error::InvalidState("router not connected".to_string()))?;
        let message = match &event {
            Event::Request(e) => e.to_remote_message(sender.cookie())?,
            Event::Response(e) => e.to_remote_message(sender.cookie())?,
            Event::Notification(e) => e.to_remote_message(sender.cookie())?,
            _ => return Err(Error::InvalidState("event cannot leave the process".to_string())),
        };
        sender.send_message(message)
    }

    fn post(&self, command: ManagerCommand) -> Result<()> {
        post_event(&self.name, Event::custom(SERVICE_MANAGER_EVENT, command))
            .map_err(|_| Error::DispatcherStopped(self.name.to_string()))
    }
}

impl std::fmt::Debug for ServiceManagerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceManagerHandle")
            .field("name", &self.name)
            .field("cookie", &self.cookie())
            .finish()
    }
}

fn published(channel: Channel, cookie: u64) -> Channel {
    let mut channel = channel;
    channel.set_cookie(cookie);
    channel
}

fn notify(thread: &str, change: &ConnectionChange) {
    if post_event(thread, Event::ServiceConnection(change.clone())).is_err() {
        log::debug!(
            "[ServiceManager] thread '{}' gone, {} {:?} not delivered",
            thread,
            change.stub.service_address(),
            change.status
        );
    }
}

fn same_binding(a: &ConnectionChange, b: &ConnectionChange) -> bool {
    a.stub == b.stub && a.proxy == b.proxy
}

#[derive(Default)]
struct ManagerState {
    registry: ServiceRegistry,
    router: Option<RouterSender>,
    remote_bindings: Vec<ConnectionChange>,
}

impl ManagerState {
    fn own_cookie(&self) -> u64 {
        self.router.as_ref().map_or(COOKIE_UNKNOWN, RouterSender::cookie)
    }

    fn forward(&self, message: RouterMessage) {
        if let Some(router) = &self.router {
            if let Err(e) = router.send_router_message(&message) {
                log::warn!("[ServiceManager] router update failed: {}", e);
            }
        }
    }

    fn exported_stub(&self, stub: &StubAddress) -> StubAddress {
        let mut stub = stub.clone();
        stub.set_channel(published(stub.channel(), self.own_cookie()));
        stub
    }

    fn exported_proxy(&self, proxy: &ProxyAddress) -> ProxyAddress {
        let mut proxy = proxy.clone();
        proxy.set_channel(published(proxy.channel(), self.own_cookie()));
        proxy
    }

    fn register_stub(&mut self, stub: &StubAddress) {
        let (registered, proxies) = self.registry.register_service_stub(stub);
        if registered.address() != stub {
            log::warn!("[ServiceManager] {} not registered", stub);
            return;
        }
        for proxy in proxies {
            let change = ConnectionChange::new(stub.clone(), proxy.address().clone(), ServiceConnection::Connected);
            notify(stub.thread(), &change);
            notify(proxy.address().thread(), &change);
        }
        if stub.service_address().is_public() {
            self.forward(RouterMessage::RegisterStub(self.exported_stub(stub)));
        }
    }

    fn unregister_stub(&mut self, stub: &StubAddress) {
        if let Some((_, proxies)) = self.registry.unregister_service_stub(stub) {
            for proxy in proxies {
                let change = ConnectionChange::new(stub.clone(), proxy.address().clone(), ServiceConnection::Pending);
                notify(proxy.address().thread(), &change);
            }
        }
        if stub.service_address().is_public() {
            self.forward(RouterMessage::UnregisterStub(self.exported_stub(stub)));
        }
    }

    fn register_proxy(&mut self, proxy: &ProxyAddress) {
        if !proxy.is_valid() {
            log::warn!("[ServiceManager] {} not registered", proxy);
            return;
        }
        let (stub, registered) = self.registry.register_service_proxy(proxy);
        if registered.is_connected() {
            let change = ConnectionChange::new(stub.address().clone(), proxy.clone(), ServiceConnection::Connected);
            notify(stub.address().thread(), &change);
            notify(proxy.thread(), &change);
        }
        if proxy.service_address().is_public() {
            self.forward(RouterMessage::RegisterProxy(self.exported_proxy(proxy)));
        }
    }

    fn unregister_proxy(&mut self, proxy: &ProxyAddress) {
        if let Some((stub, _)) = self.registry.unregister_service_proxy(proxy) {
            if stub.is_connected() {
                let change =
                    ConnectionChange::new(stub.address().clone(), proxy.clone(), ServiceConnection::Disconnected);
                notify(stub.address().thread(), &change);
            }
        }
        if proxy.service_address().is_public() {
            self.forward(RouterMessage::UnregisterProxy(self.exported_proxy(proxy)));
        }
    }

    fn router_connected(&mut self, router: RouterSender) {
        self.router = Some(router);
        let (stubs, proxies) = self.registry.get_service_list(COOKIE_LOCAL);
        for stub in stubs.iter().filter(|s| s.service_address().is_public()) {
            self.forward(RouterMessage::RegisterStub(self.exported_stub(stub)));
        }
        for proxy in proxies.iter().filter(|p| p.service_address().is_public()) {
            self.forward(RouterMessage::RegisterProxy(self.exported_proxy(proxy)));
        }
        log::info!(
            "[ServiceManager] router link up as cookie {}, {} stubs and {} proxies announced",
            self.own_cookie(),
            stubs.len(),
            proxies.len()
        );
    }

    fn router_message(&mut self, message: &RemoteMessage) {
        match RouterMessage::from_message(message) {
            Ok(RouterMessage::ServiceConnection(change)) => self.remote_change(change),
            Ok(other) => log::debug!("[ServiceManager] ignoring router message {:?}", other),
            Err(e) => log::warn!("[ServiceManager] bad router message: {}", e),
        }
    }

    fn remote_change(&mut self, change: ConnectionChange) {
        let own = self.own_cookie();
        let stub_here = change.stub.cookie() == own;
        let proxy_here = change.proxy.cookie() == own;
        if stub_here && proxy_here {
            // Both ends live here; the local registry already reported it.
            return;
        }
        if !stub_here && !proxy_here {
            log::warn!("[ServiceManager] change for cookies {} / {} is not ours", change.stub.cookie(), change.proxy.cookie());
            return;
        }

        self.remote_bindings.retain(|b| !same_binding(b, &change));
        if change.status == ServiceConnection::Connected {
            self.remote_bindings.push(change.clone());
        }
        if stub_here {
            notify(change.stub.thread(), &change);
        }
        if proxy_here {
            notify(change.proxy.thread(), &change);
        }
    }

    fn router_lost(&mut self) {
        let own = self.own_cookie();
        self.router = None;
        let bindings = std::mem::take(&mut self.remote_bindings);
        log::warn!(
            "[ServiceManager] router link down, {} remote bindings disconnected",
            bindings.len()
        );
        for binding in bindings {
            let change = ConnectionChange::new(binding.stub, binding.proxy, ServiceConnection::Disconnected);
            if change.stub.cookie() == own {
                notify(change.stub.thread(), &change);
            }
            if change.proxy.cookie() == own {
                notify(change.proxy.thread(), &change);
            }
        }
    }
}

/// Consumer of manager commands on the manager thread.
struct ManagerConsumer {
    link: Arc<RwLock<Option<RouterSender>>>,
    state: Mutex<ManagerState>,
}

impl EventConsumer for ManagerConsumer {
    fn process_event(&self, event: &Event) -> bool {
        let Event::Custom(custom) = event else {
            return false;
        };
        let Some(command) = custom.data::<ManagerCommand>() else {
            return false;
        };

        let mut state = self.state.lock();
        match command {
            ManagerCommand::RegisterStub(stub) => state.register_stub(stub),
            ManagerCommand::UnregisterStub(stub) => state.unregister_stub(stub),
            ManagerCommand::RegisterProxy(proxy) => state.register_proxy(proxy),
            ManagerCommand::UnregisterProxy(proxy) => state.unregister_proxy(proxy),
            ManagerCommand::RouterConnected(router) => {
                state.router_connected(router.clone());
                *self.link.write() = Some(router.clone());
            }
            ManagerCommand::RouterMessage(message) => state.router_message(message),
            ManagerCommand::RouterLost => {
                *self.link.write() = None;
                state.router_lost();
            }
            ManagerCommand::ServiceList(reply) => {
                let _ = reply.send(state.registry.get_service_list(COOKIE_UNKNOWN));
            }
        }
        true
    }
}

/// Router callbacks: system messages go to the manager thread, application
/// messages straight to their target thread.
struct ManagerLink {
    manager: ServiceManagerHandle,
}

fn decode_remote_event(message: &RemoteMessage) -> Result<Event> {
    if message.message_id() == NOTIFICATION_MESSAGE_ID {
        return Ok(Event::Notification(NotificationEvent::from_remote_message(message)?));
    }
    match MessageKind::of(message.message_id()) {
        MessageKind::Request => Ok(Event::Request(RequestEvent::from_remote_message(message)?)),
        MessageKind::Response | MessageKind::Attribute => {
            Ok(Event::Response(ResponseEvent::from_remote_message(message)?))
        }
        MessageKind::System | MessageKind::Unknown => Err(Error::UnknownMessage(message.message_id())),
    }
}

impl RemoteServiceHandler for ManagerLink {
    fn failed_send_message(&self, message: &RemoteMessage, _target: &Socket) {
        log::warn!(
            "[ServiceManager] message {:#010x} to cookie {} not sent",
            message.message_id(),
            message.target()
        );
    }

    fn failed_receive_message(&self, _source: &Socket) {
        if let Err(e) = self.manager.post(ManagerCommand::RouterLost) {
            log::debug!("[ServiceManager] router loss not reported: {}", e);
        }
    }

    fn failed_process_message(&self, message: &RemoteMessage) {
        log::warn!(
            "[ServiceManager] message {:#010x} from cookie {} to cookie {} dropped ({})",
            message.message_id(),
            message.source(),
            message.target(),
            message.result()
        );
    }

    fn process_received_message(&self, message: RemoteMessage, addr: &SocketAddress, _source: &Socket) {
        if message.result() == ResultType::Undelivered {
            self.failed_process_message(&message);
            return;
        }
        if is_router_message(message.message_id()) {
            if let Err(e) = self.manager.post(ManagerCommand::RouterMessage(message)) {
                log::debug!("[ServiceManager] router message from {} dropped: {}", addr, e);
            }
            return;
        }

        let event = match decode_remote_event(&message) {
            Ok(event) => event,
            Err(e) => {
                log::warn!("[ServiceManager] cannot decode message from {}: {}", addr, e);
                self.failed_process_message(&message);
                return;
            }
        };
        let thread = event.target().map(|(thread, _)| thread.to_string()).unwrap_or_default();
        if post_event(&thread, event).is_err() {
            self.failed_process_message(&message);
        }
    }
}

/// The service manager thread of this process.
///
/// When dropped, disconnects from the router and stops the thread.
pub struct ServiceManager {
    thread: DispatcherThread,
    handle: ServiceManagerHandle,
    router: Mutex<Option<RouterClient>>,
}

impl ServiceManager {
    pub fn start() -> Result<Self> {
        Self::start_named(SERVICE_MANAGER_THREAD)
    }

    /// Start a manager whose dispatcher thread is called `name`.
    pub fn start_named(name: &str) -> Result<Self> {
        let thread = DispatcherThread::start(name)?;
        let link = Arc::new(RwLock::new(None));
        let handle = ServiceManagerHandle {
            name: Arc::from(name),
            link: link.clone(),
        };
        let consumer = Arc::new(ManagerConsumer {
            link,
            state: Mutex::new(ManagerState::default()),
        });
        thread
            .handle()
            .register_event_consumer(EventClass::custom(&SERVICE_MANAGER_EVENT), consumer);
        log::info!("[ServiceManager] '{}' started", name);
        Ok(Self {
            thread,
            handle,
            router: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn handle(&self) -> ServiceManagerHandle {
        self.handle.clone()
    }

    /// Connect to the router and announce the public services; returns the
    /// cookie assigned to this process.
    pub fn connect_router(&self, settings: &ConnectionSettings) -> Result<u64> {
        let link = Arc::new(ManagerLink {
            manager: self.handle.clone(),
        });
        let client = RouterClient::connect(settings, link)?;
        let cookie = client.cookie();
        self.handle.post(ManagerCommand::RouterConnected(client.sender()))?;
        if let Some(mut previous) = self.router.lock().replace(client) {
            previous.disconnect();
        }
        Ok(cookie)
    }

    /// Leave the router; remote bindings are reported disconnected.
    pub fn disconnect_router(&self) {
        let client = self.router.lock().take();
        if let Some(mut client) = client {
            client.disconnect();
            if let Err(e) = self.handle.post(ManagerCommand::RouterLost) {
                log::debug!("[ServiceManager] router loss not reported: {}", e);
            }
        }
    }

    pub fn stop(&mut self) {
        self.disconnect_router();
        self.thread.stop();
    }
}

impl Drop for ServiceManager {
    fn drop(&mut self) {
        self.stop();
    }
}
