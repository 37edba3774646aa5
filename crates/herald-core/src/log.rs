use std::collections::VecDeque;

use tracing::warn;

use crate::cursor::{Cursor, EventId};
use crate::event::Event;

/// Upper bound on slots reserved up front; larger logs grow on demand.
const PREALLOCATE_LIMIT: usize = 1024;

/// Append-only, size-bounded sequence of events.
///
/// Holds at most `capacity` of the most recent events in id order. Appending
/// past the bound evicts from the front. The log is not synchronized on its
/// own; [`crate::PollService`] keeps it behind the same lock as the waiter
/// registry.
#[derive(Debug)]
pub struct EventLog<P> {
    events: VecDeque<Event<P>>,
    capacity: usize,
    last_id: EventId,
    total_appended: u64,
}

impl<P: Clone> EventLog<P> {
    /// Create an empty log retaining at most `capacity` events.
    ///
    /// A capacity of zero is accepted: every append is evicted immediately.
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            warn!("event log capacity is 0; published events will not be retained");
        }
        Self {
            events: VecDeque::with_capacity(capacity.min(PREALLOCATE_LIMIT)),
            capacity,
            last_id: EventId::ORIGIN,
            total_appended: 0,
        }
    }

    /// Append a payload under the next id, evicting the oldest entries past
    /// the bound.
    pub fn append(&mut self, payload: P) -> Event<P> {
        self.append_with(|_| payload)
    }

    /// Like [`append`](Self::append), but builds the payload from the id it
    /// is about to be stored under.
    pub fn append_with<F>(&mut self, build: F) -> Event<P>
    where
        F: FnOnce(EventId) -> P,
    {
        self.last_id = self.last_id.next();
        self.total_appended += 1;

        let event = Event::new(self.last_id, build(self.last_id));
        self.events.push_back(event.clone());
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
        event
    }

    /// All retained events newer than `cursor`, oldest first.
    ///
    /// A cursor that predates the retained window yields the whole window.
    pub fn since(&self, cursor: Cursor) -> Vec<Event<P>> {
        let start = self.events.partition_point(|e| e.id <= cursor);
        self.events.range(start..).cloned().collect()
    }

    /// The newest `n` retained events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Event<P>> {
        let start = self.events.len().saturating_sub(n);
        self.events.range(start..).cloned().collect()
    }

    /// Most recent event still retained.
    pub fn last(&self) -> Option<&Event<P>> {
        self.events.back()
    }
}

impl<P> EventLog<P> {
    /// Highest id ever assigned, or [`Cursor::ORIGIN`] before the first append.
    pub fn latest_id(&self) -> Cursor {
        self.last_id
    }

    /// Id of the oldest retained event.
    pub fn oldest_id(&self) -> Option<EventId> {
        self.events.front().map(|e| e.id)
    }

    /// Returns `true` if events newer than `cursor` were evicted before the
    /// holder of `cursor` could see them.
    pub fn is_stale(&self, cursor: Cursor) -> bool {
        match self.oldest_id() {
            Some(oldest) => cursor.value() < oldest.value().saturating_sub(1),
            None => cursor < self.last_id,
        }
    }

    /// Returns `true` if `cursor` points past anything this log has issued.
    pub fn is_ahead(&self, cursor: Cursor) -> bool {
        cursor > self.last_id
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events appended over the lifetime of the log, evicted ones
    /// included.
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }
}
