// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Named dispatcher threads and the process-wide directory used to post
//! events to them by name.

use super::dispatcher::{DispatchHooks, DispatcherHandle, EventDispatcher, NoHooks};
use super::Event;
use crate::error::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::OnceLock;
use std::thread::{self, JoinHandle};

fn directory() -> &'static DashMap<String, DispatcherHandle> {
    static DIRECTORY: OnceLock<DashMap<String, DispatcherHandle>> = OnceLock::new();
    DIRECTORY.get_or_init(DashMap::new)
}

/// Running dispatcher registered under `name`.
pub fn find_dispatcher(name: &str) -> Option<DispatcherHandle> {
    directory().get(name).map(|entry| entry.value().clone())
}

/// Queue `event` on the dispatcher thread called `name`.
///
/// The event is handed back if no such thread runs or it stopped.
pub fn post_event(name: &str, event: Event) -> std::result::Result<(), Event> {
    match find_dispatcher(name) {
        Some(handle) => handle.queue_event(event),
        None => {
            log::debug!("[post_event] no dispatcher named '{}'", name);
            Err(event)
        }
    }
}

/// OS thread running one [`EventDispatcher`] loop.
///
/// When dropped, stops the loop and waits for the thread to join.
pub struct DispatcherThread {
    handle: DispatcherHandle,
    thread: Option<JoinHandle<()>>,
}

impl DispatcherThread {
    pub fn start(name: &str) -> Result<Self> {
        Self::start_with_hooks(name, NoHooks)
    }

    /// Start a thread named `name`; fails if that name is already taken.
    pub fn start_with_hooks(name: &str, hooks: impl DispatchHooks + 'static) -> Result<Self> {
        let mut dispatcher = EventDispatcher::with_hooks(name, Box::new(hooks));
        let handle = dispatcher.handle();

        match directory().entry(name.to_string()) {
            Entry::Occupied(_) => {
                return Err(Error::InvalidState(format!(
                    "dispatcher '{}' is already running",
                    name
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(handle.clone());
            }
        }

        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || dispatcher.run());
        match spawned {
            Ok(thread) => {
                log::debug!("[DispatcherThread] '{}' started", name);
                Ok(Self {
                    handle,
                    thread: Some(thread),
                })
            }
            Err(e) => {
                directory().remove(name);
                Err(Error::Io(e))
            }
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn handle(&self) -> DispatcherHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop after the already queued events and join.
    ///
    /// Called from the dispatcher thread itself it only signals the stop.
    pub fn stop(&mut self) {
        self.handle.stop();
        directory().remove_if(self.handle.name(), |_, h| h.same_dispatcher(&self.handle));

        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                log::error!("[DispatcherThread] '{}' panicked", self.handle.name());
            }
        }
    }
}

impl Drop for DispatcherThread {
    fn drop(&mut self) {
        self.stop();
    }
}
