// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Timers delivered through the owner thread's dispatcher.
//!
//! The [`TimerManager`] thread keeps the deadlines. On expiry it posts a
//! [`TimerEvent`] to the dispatcher thread that owns the timer, which calls
//! [`TimerConsumer::process_timer`] exactly once per firing. Stopping or
//! restarting a timer bumps its generation so events already in flight are
//! dropped on arrival.

mod manager;

pub use manager::TimerManager;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Event count of a timer that fires until stopped.
pub const CONTINUOUSLY: u32 = u32::MAX;

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

/// Called on the owner thread when a timer fires.
pub trait TimerConsumer: Send + Sync {
    fn process_timer(&self, timer: &Timer);
}

/// A named timer bound to one owner thread.
pub struct Timer {
    id: u64,
    name: String,
    owner_thread: String,
    consumer: Arc<dyn TimerConsumer>,
    generation: AtomicU64,
    active: AtomicBool,
    fired: AtomicU32,
}

impl Timer {
    pub fn new(
        name: impl Into<String>,
        owner_thread: impl Into<String>,
        consumer: Arc<dyn TimerConsumer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            owner_thread: owner_thread.into(),
            consumer,
            generation: AtomicU64::new(0),
            active: AtomicBool::new(false),
            fired: AtomicU32::new(0),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the dispatcher thread the timer fires on.
    pub fn owner_thread(&self) -> &str {
        &self.owner_thread
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Firings delivered since the last start.
    pub fn fired_count(&self) -> u32 {
        self.fired.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// New generation for a fresh start; in-flight events become stale.
    fn restart(&self) -> u64 {
        self.fired.store(0, Ordering::Release);
        self.active.store(true, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn halt(&self) {
        self.active.store(false, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn finish(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("owner_thread", &self.owner_thread)
            .field("active", &self.is_active())
            .field("generation", &self.generation())
            .finish()
    }
}

/// What the timer manager should do with a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Ignore,
    Start,
    Stop,
    Cancel,
    Expired,
    Remove,
}

/// Request processed by the timer manager thread.
#[derive(Debug, Clone)]
pub struct TimerManagingEventData {
    pub action: TimerAction,
    pub timer: Arc<Timer>,
    /// Id of the timer (stable across restarts).
    pub handle: u64,
    pub timeout: Duration,
    pub event_count: u32,
}

impl TimerManagingEventData {
    pub fn new(action: TimerAction, timer: &Arc<Timer>) -> Self {
        Self {
            action,
            timer: timer.clone(),
            handle: timer.id(),
            timeout: Duration::ZERO,
            event_count: 0,
        }
    }

    pub fn start(timer: &Arc<Timer>, timeout: Duration, event_count: u32) -> Self {
        Self {
            timeout,
            event_count,
            ..Self::new(TimerAction::Start, timer)
        }
    }
}

/// One firing of a timer, queued on the owner's dispatcher.
#[derive(Debug, Clone)]
pub struct TimerEvent {
    timer: Arc<Timer>,
    generation: u64,
}

impl TimerEvent {
    pub(crate) fn new(timer: Arc<Timer>, generation: u64) -> Self {
        Self { timer, generation }
    }

    pub fn timer(&self) -> &Arc<Timer> {
        &self.timer
    }

    /// False once the timer was stopped or restarted after this firing.
    pub fn is_current(&self) -> bool {
        self.timer.generation() == self.generation
    }

    /// Hand the firing to the timer's consumer; called by the dispatcher.
    pub(crate) fn deliver(&self) -> bool {
        if !self.is_current() {
            log::trace!("[Timer:{}] stale event dropped", self.timer.name());
            return false;
        }
        self.timer.fired.fetch_add(1, Ordering::AcqRel);
        self.timer.consumer.process_timer(&self.timer);
        true
    }
}
