use std::collections::BTreeMap;
use std::time::Instant;

use tokio::sync::oneshot;
use tracing::trace;

use crate::cursor::Cursor;
use crate::event::Event;

/// Handle identifying one registered waiter.
///
/// Ordered by cursor first, so the registry can split off every waiter a new
/// event satisfies without scanning the ones it does not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaiterId {
    cursor: Cursor,
    seq: u64,
}

impl WaiterId {
    /// The cursor the waiter registered with.
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }
}

/// Receiving half handed to the owner of a waiter.
///
/// Resolves with the event that woke it, or errors if the waiter was dropped
/// from the registry without being woken (shutdown).
pub type WakeReceiver<P> = oneshot::Receiver<Event<P>>;

/// Bookkeeping for one in-flight long-poll request.
struct Waiter<P> {
    created_at: Instant,
    wake: oneshot::Sender<Event<P>>,
}

/// Set of pending waiters, keyed by the cursor they are waiting past.
///
/// Like the log, the registry has no lock of its own. It is only mutated
/// while the owning service's lock is held, which is what makes
/// check-then-register atomic with respect to publishers.
pub struct WaitRegistry<P> {
    waiters: BTreeMap<WaiterId, Waiter<P>>,
    next_seq: u64,
}

impl<P: Clone> WaitRegistry<P> {
    pub fn new() -> Self {
        Self {
            waiters: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Register a waiter for anything newer than `cursor`.
    pub fn register(&mut self, cursor: Cursor) -> (WaiterId, WakeReceiver<P>) {
        let id = WaiterId {
            cursor,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        let (tx, rx) = oneshot::channel();
        self.waiters.insert(
            id,
            Waiter {
                created_at: Instant::now(),
                wake: tx,
            },
        );
        (id, rx)
    }

    /// Wake and remove every waiter whose cursor predates `event`.
    ///
    /// Waiters at or past `event.id` stay registered untouched. Returns the
    /// number of waiters that were still listening.
    pub fn notify(&mut self, event: &Event<P>) -> usize {
        let boundary = WaiterId {
            cursor: event.id,
            seq: 0,
        };
        let still_waiting = self.waiters.split_off(&boundary);
        let ready = std::mem::replace(&mut self.waiters, still_waiting);

        let mut woken = 0;
        for (id, waiter) in ready {
            trace!(
                cursor = %id.cursor,
                waited_ms = waiter.created_at.elapsed().as_millis() as u64,
                "waking waiter"
            );
            // A closed receiver means the owner already gave up; nothing to do.
            if waiter.wake.send(event.clone()).is_ok() {
                woken += 1;
            }
        }
        woken
    }

    /// Drop every pending waiter without waking it.
    ///
    /// Owners observe a closed channel. Returns how many were dropped.
    pub fn close_all(&mut self) -> usize {
        let count = self.waiters.len();
        self.waiters.clear();
        count
    }
}

impl<P> WaitRegistry<P> {
    /// Remove a waiter. Idempotent: returns `true` only if it was still
    /// registered, i.e. nobody had woken it yet.
    pub fn deregister(&mut self, id: WaiterId) -> bool {
        self.waiters.remove(&id).is_some()
    }

    pub fn contains(&self, id: WaiterId) -> bool {
        self.waiters.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

impl<P: Clone> Default for WaitRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}
