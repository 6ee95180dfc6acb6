//! The shared blocking FIFO that every worker talks through.
//!
//! [`EventBus`] is a `Mutex<VecDeque<Event>>` plus a [`Condvar`].  Producers
//! never block; the inference worker blocks in [`EventBus::pop_where`]; the
//! foreground loop only ever uses the non-blocking `try_pop*` family.
//!
//! # Shutdown contract
//!
//! [`EventBus::shutdown`] marks the bus closed and wakes every waiter, but
//! blocking pops keep draining whatever is still queued.  A pop reports
//! "closed" (`None`) only after it has observed an empty queue *after* the
//! close flag was set.  This drain-then-close behaviour is part of the API:
//! events accepted before shutdown are never lost.
//!
//! Pushes after shutdown are still accepted and queued; they will be handed
//! out by the next pop or try-pop.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use super::event::Event;

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

struct BusState {
    queue: VecDeque<Event>,
    closed: bool,
    /// Number of threads currently parked inside `pop_where`.
    filtered_waiters: usize,
}

/// Unbounded multi-producer / multi-consumer event queue.
///
/// Share it as `Arc<EventBus>`; all methods take `&self`.
///
/// ```
/// use desktop_pet::bus::{Event, EventBus};
///
/// let bus = EventBus::new();
/// bus.push(Event::think("hello"));
/// bus.shutdown();
///
/// // Queued events survive shutdown…
/// assert_eq!(bus.pop().unwrap().payload(), "hello");
/// // …and only then does the bus report closed.
/// assert!(bus.pop().is_none());
/// ```
pub struct EventBus {
    state: Mutex<BusState>,
    available: Condvar,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BusState {
                queue: VecDeque::new(),
                closed: false,
                filtered_waiters: 0,
            }),
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `event` to the tail.  Never blocks, never fails.
    ///
    /// Wakes one waiting consumer.  When a filtered consumer is parked the
    /// wake-up goes to every waiter instead, so a consumer whose filter does
    /// not match cannot swallow the notification.
    pub fn push(&self, event: Event) {
        let mut st = self.lock();
        st.queue.push_back(event);
        if st.filtered_waiters > 0 {
            self.available.notify_all();
        } else {
            self.available.notify_one();
        }
    }

    /// Block until an event is available or the bus is closed and drained.
    ///
    /// Returns `None` only when the bus has been shut down and the queue is
    /// empty.
    pub fn pop(&self) -> Option<Event> {
        let mut st = self.lock();
        loop {
            if let Some(event) = st.queue.pop_front() {
                return Some(event);
            }
            if st.closed {
                return None;
            }
            st = self
                .available
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until the oldest event matching `wanted` is available.
    ///
    /// Events that do not match stay queued in their original order for other
    /// consumers.  Returns `None` once the bus is closed and no matching event
    /// remains.
    pub fn pop_where<F>(&self, wanted: F) -> Option<Event>
    where
        F: Fn(&Event) -> bool,
    {
        let mut st = self.lock();
        loop {
            if let Some(pos) = st.queue.iter().position(&wanted) {
                return st.queue.remove(pos);
            }
            if st.closed {
                return None;
            }
            st.filtered_waiters += 1;
            st = self
                .available
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
            st.filtered_waiters -= 1;
        }
    }

    /// Take the head event without blocking.
    pub fn try_pop(&self) -> Option<Event> {
        self.lock().queue.pop_front()
    }

    /// Take the oldest event matching `wanted` without blocking.
    pub fn try_pop_where<F>(&self, wanted: F) -> Option<Event>
    where
        F: Fn(&Event) -> bool,
    {
        let mut st = self.lock();
        let pos = st.queue.iter().position(wanted)?;
        st.queue.remove(pos)
    }

    /// Close the bus and wake every waiting consumer.  Idempotent.
    pub fn shutdown(&self) {
        let mut st = self.lock();
        if !st.closed {
            log::debug!("bus: shutdown with {} event(s) still queued", st.queue.len());
        }
        st.closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
