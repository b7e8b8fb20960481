// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Events and thread-owned dispatch.
//!
//! Every thread that owns stubs, proxies or timers runs one
//! [`EventDispatcher`]. Other threads never call into its consumers; they
//! post an [`Event`] to the dispatcher's queue and the owner thread delivers
//! it to the consumers registered for the event's [`EventClass`].
//!
//! ```text
//! post_event("worker", ev) -> queue (FIFO) -> prepare_dispatch_event
//!                                          -> dispatch_event (consumers)
//!                                          -> post_dispatch_event (drop)
//! ```

mod data;
mod dispatcher;
mod service;
mod thread;

pub use data::EventDataStream;
pub use dispatcher::{
    current_dispatcher, DispatchHooks, DispatcherHandle, EventConsumer, EventDispatcher, NoHooks,
};
pub use service::{NotificationEvent, RequestEvent, ResponseEvent};
pub use thread::{find_dispatcher, post_event, DispatcherThread};

use crate::address::Channel;
use crate::ident::RuntimeClassId;
use crate::registry::ConnectionChange;
use crate::timer::TimerEvent;
use std::any::Any;
use std::fmt;

/// Dispatch key of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    Request,
    Response,
    Notification,
    ServiceConnection,
    Timer,
    /// Application event, keyed by its [`RuntimeClassId::magic`].
    Custom(u32),
}

impl EventClass {
    pub fn custom(class: &RuntimeClassId) -> Self {
        EventClass::Custom(class.magic())
    }
}

/// Application-defined event payload tagged with its class.
pub struct CustomEvent {
    class: RuntimeClassId,
    data: Box<dyn Any + Send>,
}

impl CustomEvent {
    pub fn new<T: Any + Send>(class: RuntimeClassId, data: T) -> Self {
        Self {
            class,
            data: Box::new(data),
        }
    }

    pub fn class(&self) -> &RuntimeClassId {
        &self.class
    }

    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref()
    }
}

impl fmt::Debug for CustomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomEvent")
            .field("class", &self.class.name())
            .finish_non_exhaustive()
    }
}

/// Everything a dispatcher can deliver.
#[derive(Debug)]
pub enum Event {
    Request(RequestEvent),
    Response(ResponseEvent),
    Notification(NotificationEvent),
    ServiceConnection(ConnectionChange),
    Timer(TimerEvent),
    Custom(CustomEvent),
}

impl Event {
    pub fn class(&self) -> EventClass {
        match self {
            Event::Request(_) => EventClass::Request,
            Event::Response(_) => EventClass::Response,
            Event::Notification(_) => EventClass::Notification,
            Event::ServiceConnection(_) => EventClass::ServiceConnection,
            Event::Timer(_) => EventClass::Timer,
            Event::Custom(custom) => EventClass::custom(custom.class()),
        }
    }

    /// Thread name and channel of the endpoint an event is addressed to.
    ///
    /// `None` for events that are not addressed to a stub or proxy.
    pub fn target(&self) -> Option<(&str, Channel)> {
        match self {
            Event::Request(e) => Some((e.target().thread(), e.target().channel())),
            Event::Notification(e) => Some((e.target().thread(), e.target().channel())),
            Event::Response(e) => Some((e.target().thread(), e.target().channel())),
            Event::ServiceConnection(_) | Event::Timer(_) | Event::Custom(_) => None,
        }
    }

    pub fn custom<T: Any + Send>(class: RuntimeClassId, data: T) -> Self {
        Event::Custom(CustomEvent::new(class, data))
    }
}
