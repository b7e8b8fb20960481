// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{Event, EventClass};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// Receiver of dispatched events, always called on the dispatcher thread.
pub trait EventConsumer: Send + Sync {
    /// Returns true if the event was handled.
    fn process_event(&self, event: &Event) -> bool;
}

/// Dispatch hooks of one dispatcher.
pub trait DispatchHooks: Send {
    /// Return false to skip dispatching `event`.
    fn prepare_dispatch_event(&mut self, _event: &Event) -> bool {
        true
    }

    /// Last look at every event; it is dropped when this returns.
    fn post_dispatch_event(&mut self, _event: Event, _handled: bool) {}
}

/// Hooks that dispatch everything and log nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl DispatchHooks for NoHooks {}

enum Envelope {
    Event(Event),
    Exit,
}

type ConsumerTable = HashMap<EventClass, Vec<Arc<dyn EventConsumer>>>;

struct Shared {
    name: String,
    sender: Sender<Envelope>,
    // Held shared while queueing, exclusively by `stop`, so no event can
    // slip in behind the exit marker.
    accepting: RwLock<bool>,
    consumers: Mutex<ConsumerTable>,
}

/// Cloneable, thread-safe side of a dispatcher: queueing and consumer
/// registration.
#[derive(Clone)]
pub struct DispatcherHandle {
    shared: Arc<Shared>,
}

impl DispatcherHandle {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn is_accepting(&self) -> bool {
        *self.shared.accepting.read()
    }

    /// Queue `event` for the owner thread. A rejected event is handed back.
    pub fn queue_event(&self, event: Event) -> Result<(), Event> {
        let accepting = self.shared.accepting.read();
        if !*accepting {
            return Err(event);
        }
        match self.shared.sender.send(Envelope::Event(event)) {
            Ok(()) => Ok(()),
            Err(channel::SendError(Envelope::Event(event))) => Err(event),
            Err(channel::SendError(Envelope::Exit)) => Ok(()),
        }
    }

    /// Register `consumer` for `class`; false if the pair already exists.
    pub fn register_event_consumer(&self, class: EventClass, consumer: Arc<dyn EventConsumer>) -> bool {
        let mut table = self.shared.consumers.lock();
        let list = table.entry(class).or_default();
        if list.iter().any(|c| Arc::ptr_eq(c, &consumer)) {
            return false;
        }
        list.push(consumer);
        true
    }

    pub fn unregister_event_consumer(&self, class: EventClass, consumer: &Arc<dyn EventConsumer>) -> bool {
        let mut table = self.shared.consumers.lock();
        let Some(list) = table.get_mut(&class) else {
            return false;
        };
        let before = list.len();
        list.retain(|c| !Arc::ptr_eq(c, consumer));
        let removed = list.len() != before;
        if list.is_empty() {
            table.remove(&class);
        }
        removed
    }

    /// Remove `consumer` from every class; returns how many registrations
    /// were dropped.
    pub fn remove_consumer(&self, consumer: &Arc<dyn EventConsumer>) -> usize {
        let mut table = self.shared.consumers.lock();
        let mut removed = 0;
        for list in table.values_mut() {
            let before = list.len();
            list.retain(|c| !Arc::ptr_eq(c, consumer));
            removed += before - list.len();
        }
        table.retain(|_, list| !list.is_empty());
        removed
    }

    pub fn has_registered_consumer(&self, class: EventClass) -> bool {
        self.shared
            .consumers
            .lock()
            .get(&class)
            .is_some_and(|list| !list.is_empty())
    }

    /// Stop accepting events and ask the loop to exit after the events
    /// already queued.
    pub fn stop(&self) {
        let mut accepting = self.shared.accepting.write();
        if *accepting {
            *accepting = false;
            let _ = self.shared.sender.send(Envelope::Exit);
        }
    }

    pub fn same_dispatcher(&self, other: &DispatcherHandle) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn consumers_of(&self, class: EventClass) -> Vec<Arc<dyn EventConsumer>> {
        self.shared
            .consumers
            .lock()
            .get(&class)
            .cloned()
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for DispatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherHandle")
            .field("name", &self.name())
            .field("accepting", &self.is_accepting())
            .finish()
    }
}

thread_local! {
    static CURRENT: RefCell<Option<DispatcherHandle>> = const { RefCell::new(None) };
}

/// Dispatcher running on the calling thread, if any.
pub fn current_dispatcher() -> Option<DispatcherHandle> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Event queue plus consumer table, driven by the owner thread.
pub struct EventDispatcher {
    handle: DispatcherHandle,
    receiver: Receiver<Envelope>,
    hooks: Box<dyn DispatchHooks>,
    running: bool,
}

impl EventDispatcher {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_hooks(name, Box::new(NoHooks))
    }

    pub fn with_hooks(name: impl Into<String>, hooks: Box<dyn DispatchHooks>) -> Self {
        let (sender, receiver) = channel::unbounded();
        let shared = Arc::new(Shared {
            name: name.into(),
            sender,
            accepting: RwLock::new(true),
            consumers: Mutex::new(HashMap::new()),
        });
        Self {
            handle: DispatcherHandle { shared },
            receiver,
            hooks,
            running: true,
        }
    }

    pub fn handle(&self) -> DispatcherHandle {
        self.handle.clone()
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Deliver `event` to every consumer of its class. True iff at least
    /// one consumer handled it.
    ///
    /// Timer events go to the timer's own consumer, and only while the
    /// timer generation still matches.
    pub fn dispatch_event(&self, event: &Event) -> bool {
        if let Event::Timer(timer_event) = event {
            return timer_event.deliver();
        }

        // Consumers may (un)register while being called.
        let consumers = self.handle.consumers_of(event.class());
        let mut handled = false;
        for consumer in consumers {
            handled |= consumer.process_event(event);
        }
        if !handled {
            log::trace!("[EventDispatcher:{}] no consumer handled {:?}", self.name(), event.class());
        }
        handled
    }

    /// Run one event through prepare, dispatch and post.
    pub fn process(&mut self, event: Event) -> bool {
        let handled = if self.hooks.prepare_dispatch_event(&event) {
            self.dispatch_event(&event)
        } else {
            false
        };
        self.hooks.post_dispatch_event(event, handled);
        handled
    }

    /// Process every queued event without blocking; returns the count.
    pub fn pump(&mut self) -> usize {
        let mut count = 0;
        while self.running {
            match self.receiver.try_recv() {
                Ok(Envelope::Event(event)) => {
                    self.process(event);
                    count += 1;
                }
                Ok(Envelope::Exit) => self.running = false,
                Err(_) => break,
            }
        }
        count
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Blocking loop; returns after [`DispatcherHandle::stop`].
    pub fn run(&mut self) {
        CURRENT.with(|current| *current.borrow_mut() = Some(self.handle.clone()));
        log::debug!("[EventDispatcher:{}] started", self.name());

        while self.running {
            match self.receiver.recv() {
                Ok(Envelope::Event(event)) => {
                    self.process(event);
                }
                Ok(Envelope::Exit) | Err(_) => self.running = false,
            }
        }

        let dropped = self.receiver.try_iter().count();
        if dropped > 0 {
            log::debug!("[EventDispatcher:{}] dropped {} late events", self.name(), dropped);
        }
        CURRENT.with(|current| *current.borrow_mut() = None);
        log::debug!("[EventDispatcher:{}] stopped", self.name());
    }
}
