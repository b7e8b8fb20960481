// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{Timer, TimerAction, TimerEvent, TimerManagingEventData, CONTINUOUSLY};
use crate::config::TIMER_MANAGER_THREAD;
use crate::error::{Error, Result};
use crate::event::{post_event, Event};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Pending expiry of one timer generation.
struct Deadline {
    at: Instant,
    order: u64,
    timer: Arc<Timer>,
    generation: u64,
    timeout: Duration,
    remaining: u32,
}

// Min-heap by expiry time, then by insertion order.
impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Deadline {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
    }
}

impl Eq for Deadline {}

/// Deadline bookkeeping owned by the manager thread.
#[derive(Default)]
struct Schedule {
    heap: BinaryHeap<Deadline>,
    timers: HashMap<u64, Arc<Timer>>,
    next_order: u64,
}

impl Schedule {
    fn apply(&mut self, data: TimerManagingEventData) {
        match data.action {
            TimerAction::Ignore => {}
            TimerAction::Start => {
                if data.timeout.is_zero() || data.event_count == 0 {
                    log::warn!(
                        "[TimerManager] '{}' not started: timeout {:?}, count {}",
                        data.timer.name(),
                        data.timeout,
                        data.event_count
                    );
                    return;
                }
                let generation = data.timer.restart();
                self.timers.insert(data.handle, data.timer.clone());
                self.push(data.timer, generation, Instant::now() + data.timeout, data.timeout, data.event_count);
            }
            TimerAction::Stop | TimerAction::Cancel | TimerAction::Remove => {
                data.timer.halt();
                self.timers.remove(&data.handle);
            }
            TimerAction::Expired => {
                log::debug!("[TimerManager] expiry of '{}' is internal", data.timer.name());
            }
        }
    }

    fn push(&mut self, timer: Arc<Timer>, generation: u64, at: Instant, timeout: Duration, remaining: u32) {
        self.next_order += 1;
        self.heap.push(Deadline {
            at,
            order: self.next_order,
            timer,
            generation,
            timeout,
            remaining,
        });
    }

    /// Time until the next live deadline, dropping stale ones.
    fn next_wait(&mut self, now: Instant) -> Option<Duration> {
        while let Some(top) = self.heap.peek() {
            if top.timer.generation() != top.generation {
                self.heap.pop();
                continue;
            }
            return Some(top.at.saturating_duration_since(now));
        }
        None
    }

    /// Fire every deadline due at `now`.
    fn expire(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while self.heap.peek().is_some_and(|top| top.at <= now) {
            let Some(due) = self.heap.pop() else {
                break;
            };
            if due.timer.generation() != due.generation {
                continue;
            }

            let event = Event::Timer(TimerEvent::new(due.timer.clone(), due.generation));
            if post_event(due.timer.owner_thread(), event).is_err() {
                log::warn!(
                    "[TimerManager] owner '{}' of timer '{}' is gone, stopping it",
                    due.timer.owner_thread(),
                    due.timer.name()
                );
                due.timer.halt();
                self.timers.remove(&due.timer.id());
                continue;
            }
            fired += 1;

            let remaining = match due.remaining {
                CONTINUOUSLY => CONTINUOUSLY,
                n => n - 1,
            };
            if remaining == 0 {
                due.timer.finish();
                self.timers.remove(&due.timer.id());
            } else {
                let next = due.at + due.timeout;
                self.push(due.timer, due.generation, next, due.timeout, remaining);
            }
        }
        fired
    }
}

fn manager_loop(receiver: Receiver<TimerManagingEventData>) {
    log::debug!("[TimerManager] started");
    let mut schedule = Schedule::default();

    loop {
        let received = match schedule.next_wait(Instant::now()) {
            Some(wait) => receiver.recv_timeout(wait),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(data) => schedule.apply(data),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        schedule.expire(Instant::now());
    }

    for timer in schedule.timers.values() {
        timer.halt();
    }
    log::debug!("[TimerManager] stopped");
}

/// Thread keeping the deadlines of every timer of the process.
///
/// When dropped, stops every timer and joins the thread.
pub struct TimerManager {
    sender: Option<Sender<TimerManagingEventData>>,
    thread: Option<JoinHandle<()>>,
}

impl TimerManager {
    pub fn start() -> Result<Self> {
        Self::start_named(TIMER_MANAGER_THREAD)
    }

    pub fn start_named(name: &str) -> Result<Self> {
        let (sender, receiver) = channel::unbounded();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || manager_loop(receiver))?;
        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    /// Queue a raw request for the manager thread.
    pub fn send(&self, data: TimerManagingEventData) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| Error::InvalidState("timer manager stopped".to_string()))?;
        sender
            .send(data)
            .map_err(|_| Error::InvalidState("timer manager stopped".to_string()))
    }

    /// Fire `event_count` times (or [`CONTINUOUSLY`]) every `timeout`.
    pub fn start_timer(&self, timer: &Arc<Timer>, timeout: Duration, event_count: u32) -> Result<()> {
        self.send(TimerManagingEventData::start(timer, timeout, event_count))
    }

    pub fn stop_timer(&self, timer: &Arc<Timer>) -> Result<()> {
        // Stale events are dropped at once, before the manager sees the request.
        timer.halt();
        self.send(TimerManagingEventData::new(TimerAction::Stop, timer))
    }

    /// Stop `timer` and forget it.
    pub fn remove_timer(&self, timer: &Arc<Timer>) -> Result<()> {
        timer.halt();
        self.send(TimerManagingEventData::new(TimerAction::Remove, timer))
    }

    pub fn stop(&mut self) {
        drop(self.sender.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("[TimerManager] thread panicked");
            }
        }
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DispatcherThread;
    use crate::timer::TimerConsumer;
    use crossbeam::channel::Sender;

    struct Tick {
        out: Sender<(String, u32)>,
    }

    impl TimerConsumer for Tick {
        fn process_timer(&self, timer: &Timer) {
            let thread = thread::current().name().unwrap_or_default().to_string();
            let _ = self.out.send((thread, timer.fired_count()));
        }
    }

    #[test]
    fn test_fires_n_times_on_owner_thread() {
        let _owner = DispatcherThread::start("svcbus-test-timer-owner").expect("owner");
        let manager = TimerManager::start_named("svcbus-test-timers-n").expect("manager");
        let (tx, rx) = channel::unbounded();
        let timer = Timer::new("tick", "svcbus-test-timer-owner", Arc::new(Tick { out: tx }));

        manager
            .start_timer(&timer, Duration::from_millis(10), 3)
            .expect("start");

        for expected in 1..=3 {
            let (thread, count) = rx.recv_timeout(Duration::from_secs(5)).expect("tick");
            assert_eq!(thread, "svcbus-test-timer-owner");
            assert_eq!(count, expected);
        }
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(!timer.is_active());
    }

    #[test]
    fn test_stop_silences_timer() {
        let _owner = DispatcherThread::start("svcbus-test-timer-stop").expect("owner");
        let manager = TimerManager::start_named("svcbus-test-timers-stop").expect("manager");
        let (tx, rx) = channel::unbounded();
        let timer = Timer::new("tick", "svcbus-test-timer-stop", Arc::new(Tick { out: tx }));

        manager
            .start_timer(&timer, Duration::from_millis(5), CONTINUOUSLY)
            .expect("start");
        rx.recv_timeout(Duration::from_secs(5)).expect("first tick");
        manager.stop_timer(&timer).expect("stop");

        // Drain whatever was already delivered before the stop.
        while rx.recv_timeout(Duration::from_millis(50)).is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert!(!timer.is_active());
    }

    #[test]
    fn test_missing_owner_stops_timer() {
        let manager = TimerManager::start_named("svcbus-test-timers-orphan").expect("manager");
        let (tx, _rx) = channel::unbounded();
        let timer = Timer::new("tick", "svcbus-test-no-such-thread", Arc::new(Tick { out: tx }));
        manager
            .start_timer(&timer, Duration::from_millis(1), CONTINUOUSLY)
            .expect("start");

        let deadline = Instant::now() + Duration::from_secs(5);
        while timer.is_active() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!timer.is_active());
    }

    #[test]
    fn test_retired_timers_leave_the_schedule() {
        let _owner = DispatcherThread::start("svcbus-test-timer-retire").expect("owner");
        let (tx, _rx) = channel::unbounded();
        let once = Timer::new("once", "svcbus-test-timer-retire", Arc::new(Tick { out: tx.clone() }));
        let twice = Timer::new("twice", "svcbus-test-timer-retire", Arc::new(Tick { out: tx.clone() }));
        let stopped = Timer::new("stopped", "svcbus-test-timer-retire", Arc::new(Tick { out: tx }));
        let timeout = Duration::from_millis(10);

        let mut schedule = Schedule::default();
        schedule.apply(TimerManagingEventData::start(&once, timeout, 1));
        schedule.apply(TimerManagingEventData::start(&twice, timeout, 2));
        schedule.apply(TimerManagingEventData::start(&stopped, timeout, CONTINUOUSLY));
        assert_eq!(schedule.timers.len(), 3);

        schedule.apply(TimerManagingEventData::new(TimerAction::Stop, &stopped));
        assert_eq!(schedule.timers.len(), 2);

        let start = Instant::now();
        assert_eq!(schedule.expire(start + timeout), 2);
        assert!(!schedule.timers.contains_key(&once.id()));
        assert!(schedule.timers.contains_key(&twice.id()));

        assert_eq!(schedule.expire(start + timeout * 3), 1);
        assert!(schedule.timers.is_empty());
        assert!(!twice.is_active());
    }

    #[test]
    fn test_invalid_start_is_ignored() {
        let manager = TimerManager::start_named("svcbus-test-timers-invalid").expect("manager");
        let (tx, _rx) = channel::unbounded();
        let timer = Timer::new("tick", "nobody", Arc::new(Tick { out: tx }));
        manager.start_timer(&timer, Duration::ZERO, 1).expect("queued");
        manager.send(TimerManagingEventData::new(TimerAction::Ignore, &timer)).expect("queued");
        thread::sleep(Duration::from_millis(20));
        assert!(!timer.is_active());
    }
}
