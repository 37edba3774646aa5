use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{LogConfig, PollConfig};
use crate::cursor::{Cursor, EventId};
use crate::event::Event;
use crate::log::EventLog;
use crate::registry::{WaitRegistry, WaiterId};

/// Terminal outcome of one long-poll call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollResult<P> {
    /// Events newer than the caller's cursor, oldest first.
    Delivered(Vec<Event<P>>),
    /// Nothing arrived before the timeout elapsed.
    TimedOut,
    /// The caller cancelled the wait, or the service shut down.
    Cancelled,
}

impl<P> PollResult<P> {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }

    /// Delivered events; empty for the other outcomes.
    pub fn events(&self) -> &[Event<P>] {
        match self {
            Self::Delivered(events) => events,
            Self::TimedOut | Self::Cancelled => &[],
        }
    }

    /// The cursor the caller should present on its next poll.
    pub fn next_cursor(&self, previous: Cursor) -> Cursor {
        self.events().last().map_or(previous, |e| e.id)
    }
}

/// Point-in-time summary of the service.
#[derive(Clone, Debug, Serialize)]
pub struct ServiceStatus<P> {
    pub retained: usize,
    pub capacity: usize,
    pub total_published: u64,
    pub pending_waiters: usize,
    pub latest_id: Cursor,
    pub oldest_id: Option<EventId>,
    pub last_event: Option<Event<P>>,
}

/// State guarded by the service lock.
///
/// Keeping the log and the registry under one lock is what makes
/// append-then-notify and check-then-register atomic with respect to each
/// other.
struct Shared<P> {
    log: EventLog<P>,
    waiters: WaitRegistry<P>,
    closed: bool,
}

struct Inner<P> {
    state: Mutex<Shared<P>>,
    config: PollConfig,
}

/// Long-poll façade over the event log and the waiter registry.
///
/// Cheap to clone; all clones share one log and one registry.
pub struct PollService<P> {
    inner: Arc<Inner<P>>,
}

impl<P> Clone for PollService<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Clone + Send + 'static> PollService<P> {
    pub fn new(log: &LogConfig, poll: PollConfig) -> Self {
        info!(
            capacity = log.capacity,
            default_timeout_ms = poll.default_timeout_ms,
            max_timeout_ms = poll.max_timeout_ms,
            "poll service started"
        );
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(Shared {
                    log: EventLog::new(log.capacity),
                    waiters: WaitRegistry::new(),
                    closed: false,
                }),
                config: poll,
            }),
        }
    }

    /// A panicking holder cannot leave the state half-updated (every mutation
    /// is a single push/remove), so a poisoned lock is simply reclaimed.
    fn lock(&self) -> MutexGuard<'_, Shared<P>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `payload` to the log and wake every waiter it satisfies.
    pub fn publish(&self, payload: P) -> Event<P> {
        self.publish_with(|_| payload)
    }

    /// Like [`publish`](Self::publish), but builds the payload from the id
    /// the event is assigned.
    pub fn publish_with<F>(&self, build: F) -> Event<P>
    where
        F: FnOnce(EventId) -> P,
    {
        let mut state = self.lock();
        let event = state.log.append_with(build);
        let woken = state.waiters.notify(&event);
        let pending = state.waiters.len();
        drop(state);

        debug!(id = %event.id, woken, pending, "event published");
        event
    }

    /// Wait for events newer than `cursor` using the configured default
    /// timeout.
    pub async fn poll(&self, cursor: Cursor) -> PollResult<P> {
        self.await_since(cursor, self.inner.config.default_timeout())
            .await
    }

    /// Wait up to `timeout` for events newer than `cursor`.
    ///
    /// Returns immediately if such events are already retained. Dropping the
    /// returned future before it completes deregisters the waiter.
    pub async fn await_since(&self, cursor: Cursor, timeout: Duration) -> PollResult<P> {
        self.await_since_or_cancel(cursor, timeout, &CancellationToken::new())
            .await
    }

    /// Like [`await_since`](Self::await_since), but also resolves to
    /// [`PollResult::Cancelled`] once `cancel` fires.
    pub async fn await_since_or_cancel(
        &self,
        cursor: Cursor,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> PollResult<P> {
        let timeout = self.inner.config.clamp(timeout);

        let (mut guard, mut wake) = {
            let mut state = self.lock();
            if state.closed {
                return PollResult::Cancelled;
            }

            let cursor = if state.log.is_ahead(cursor) {
                debug!(
                    %cursor,
                    latest = %state.log.latest_id(),
                    "cursor ahead of log, replaying window"
                );
                Cursor::ORIGIN
            } else {
                cursor
            };

            let ready = state.log.since(cursor);
            if !ready.is_empty() {
                if state.log.is_stale(cursor) {
                    debug!(
                        %cursor,
                        oldest = ?state.log.oldest_id(),
                        "stale cursor, events were evicted unseen"
                    );
                }
                return PollResult::Delivered(ready);
            }

            let (id, wake) = state.waiters.register(cursor);
            (WaiterGuard::new(self, id), wake)
        };

        tokio::select! {
            biased;

            woke = &mut wake => {
                guard.disarm();
                match woke {
                    Ok(event) => self.deliver(guard.id.cursor(), event),
                    Err(_) => PollResult::Cancelled,
                }
            }
            _ = tokio::time::sleep(timeout) => {
                if guard.deregister() {
                    debug!(
                        cursor = %guard.id.cursor(),
                        timeout_ms = timeout.as_millis() as u64,
                        "poll timed out"
                    );
                    PollResult::TimedOut
                } else {
                    // Woken (or closed) between the timer firing and taking the lock.
                    match wake.try_recv() {
                        Ok(event) => self.deliver(guard.id.cursor(), event),
                        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => {
                            PollResult::Cancelled
                        }
                    }
                }
            }
            _ = cancel.cancelled() => {
                guard.deregister();
                debug!(cursor = %guard.id.cursor(), "poll cancelled");
                PollResult::Cancelled
            }
        }
    }

    /// Build the delivery for a woken waiter.
    ///
    /// Everything retained past the cursor is returned, so events published
    /// between the wake and this read ride along. If the log retains nothing
    /// (zero capacity), the waking event is delivered on its own.
    fn deliver(&self, cursor: Cursor, woke_by: Event<P>) -> PollResult<P> {
        let events = self.lock().log.since(cursor);
        if events.is_empty() {
            PollResult::Delivered(vec![woke_by])
        } else {
            PollResult::Delivered(events)
        }
    }

    /// Retained events newer than `cursor`, without waiting.
    pub fn since(&self, cursor: Cursor) -> Vec<Event<P>> {
        self.lock().log.since(cursor)
    }

    /// The newest `n` retained events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Event<P>> {
        self.lock().log.recent(n)
    }

    pub fn latest_id(&self) -> Cursor {
        self.lock().log.latest_id()
    }

    /// Returns `true` if events newer than `cursor` have already been evicted.
    pub fn is_stale(&self, cursor: Cursor) -> bool {
        self.lock().log.is_stale(cursor)
    }

    pub fn pending_waiters(&self) -> usize {
        self.lock().waiters.len()
    }

    pub fn status(&self) -> ServiceStatus<P> {
        let state = self.lock();
        ServiceStatus {
            retained: state.log.len(),
            capacity: state.log.capacity(),
            total_published: state.log.total_appended(),
            pending_waiters: state.waiters.len(),
            latest_id: state.log.latest_id(),
            oldest_id: state.log.oldest_id(),
            last_event: state.log.last().cloned(),
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.inner.config
    }

    /// Release every pending waiter as [`PollResult::Cancelled`] and refuse
    /// new waits. Publishing keeps working.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.closed = true;
        let released = state.waiters.close_all();
        drop(state);
        info!(released, "poll service shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().closed
    }
}

/// Removes its waiter from the registry when dropped, so a long-poll future
/// abandoned mid-wait never leaves an entry behind.
struct WaiterGuard<'a, P: Clone + Send + 'static> {
    service: &'a PollService<P>,
    id: WaiterId,
    armed: bool,
}

impl<'a, P: Clone + Send + 'static> WaiterGuard<'a, P> {
    fn new(service: &'a PollService<P>, id: WaiterId) -> Self {
        Self {
            service,
            id,
            armed: true,
        }
    }

    /// The waiter already left the registry through a wake or shutdown.
    fn disarm(&mut self) {
        self.armed = false;
    }

    /// Returns `true` if the waiter was still registered.
    fn deregister(&mut self) -> bool {
        self.armed = false;
        self.service.lock().waiters.deregister(self.id)
    }
}

impl<P: Clone + Send + 'static> Drop for WaiterGuard<'_, P> {
    fn drop(&mut self) {
        if self.armed {
            self.service.lock().waiters.deregister(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn service(capacity: usize) -> PollService<&'static str> {
        PollService::new(&LogConfig { capacity }, PollConfig::default())
    }

    async fn wait_for_waiters(svc: &PollService<&'static str>, n: usize) {
        while svc.pending_waiters() < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn returns_immediately_when_data_exists() {
        let svc = service(50);
        let a = svc.publish("a");
        svc.publish("b");

        let start = Instant::now();
        let result = svc.await_since(a.id, Duration::from_secs(30)).await;
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(
            result.events().iter().map(|e| e.payload).collect::<Vec<_>>(),
            vec!["b"]
        );
        assert_eq!(svc.pending_waiters(), 0);
    }

    #[tokio::test]
    async fn publish_wakes_pending_waiter() {
        let svc = service(50);
        let cursor = svc.latest_id();
        assert_eq!(cursor, Cursor::ORIGIN);

        let waiter = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.await_since(cursor, Duration::from_secs(30)).await })
        };
        wait_for_waiters(&svc, 1).await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        let start = Instant::now();
        let x = svc.publish("x");

        let result = waiter.await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(result, PollResult::Delivered(vec![x.clone()]));
        assert_eq!(result.next_cursor(cursor), x.id);
        assert_eq!(svc.pending_waiters(), 0);
    }

    #[tokio::test]
    async fn waiter_receives_only_events_past_its_cursor() {
        let svc = service(50);
        svc.publish("a");
        let b = svc.publish("b");

        let at_b = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.await_since(b.id, Duration::from_secs(10)).await })
        };
        wait_for_waiters(&svc, 1).await;

        let c = svc.publish("c");
        let result = at_b.await.unwrap();
        assert_eq!(result, PollResult::Delivered(vec![c.clone()]));

        // Nothing newer than `c`: a waiter there stays pending until it times out.
        let at_c = svc.await_since(c.id, Duration::from_millis(30)).await;
        assert_eq!(at_c, PollResult::TimedOut);
    }

    #[tokio::test]
    async fn timeout_removes_waiter() {
        let svc = service(50);
        assert_eq!(svc.pending_waiters(), 0);
        let result = svc
            .await_since(svc.latest_id(), Duration::from_millis(20))
            .await;
        assert_eq!(result, PollResult::TimedOut);
        assert_eq!(result.next_cursor(Cursor::ORIGIN), Cursor::ORIGIN);
        assert_eq!(svc.pending_waiters(), 0);
    }

    #[tokio::test]
    async fn zero_timeout_times_out_without_data() {
        let svc = service(50);
        let result = svc.await_since(Cursor::ORIGIN, Duration::ZERO).await;
        assert_eq!(result, PollResult::TimedOut);
        assert_eq!(svc.pending_waiters(), 0);
    }

    #[tokio::test]
    async fn concurrent_waiters_all_receive_same_event() {
        let svc = service(50);
        let cursor = svc.latest_id();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                svc.await_since(cursor, Duration::from_secs(10)).await
            }));
        }
        wait_for_waiters(&svc, 16).await;

        let event = svc.publish("fanout");
        for h in handles {
            assert_eq!(h.await.unwrap(), PollResult::Delivered(vec![event.clone()]));
        }
        assert_eq!(svc.pending_waiters(), 0);
    }

    #[tokio::test]
    async fn cancel_removes_only_that_waiter() {
        let svc = service(50);
        let token = CancellationToken::new();

        let cancelled = {
            let svc = svc.clone();
            let token = token.clone();
            tokio::spawn(async move {
                svc.await_since_or_cancel(Cursor::ORIGIN, Duration::from_secs(10), &token)
                    .await
            })
        };
        let survivor = {
            let svc = svc.clone();
            tokio::spawn(async move {
                svc.await_since(Cursor::ORIGIN, Duration::from_secs(10))
                    .await
            })
        };
        wait_for_waiters(&svc, 2).await;

        token.cancel();
        assert_eq!(cancelled.await.unwrap(), PollResult::Cancelled);
        assert_eq!(svc.pending_waiters(), 1);

        let event = svc.publish("still delivered");
        assert_eq!(survivor.await.unwrap(), PollResult::Delivered(vec![event]));
        assert_eq!(svc.pending_waiters(), 0);
    }

    #[tokio::test]
    async fn dropped_future_deregisters() {
        let svc = service(50);
        let handle = {
            let svc = svc.clone();
            tokio::spawn(async move {
                svc.await_since(Cursor::ORIGIN, Duration::from_secs(10))
                    .await
            })
        };
        wait_for_waiters(&svc, 1).await;

        handle.abort();
        let _ = handle.await;
        assert_eq!(svc.pending_waiters(), 0);
    }

    #[tokio::test]
    async fn stale_cursor_gets_full_window() {
        let svc = service(2);
        let a = svc.publish("A");
        let b = svc.publish("B");
        svc.publish("C");

        assert!(svc.is_stale(Cursor::ORIGIN));
        let from_a = svc.await_since(a.id, Duration::from_secs(1)).await;
        assert_eq!(
            from_a.events().iter().map(|e| e.payload).collect::<Vec<_>>(),
            vec!["B", "C"]
        );
        let from_b = svc.await_since(b.id, Duration::from_secs(1)).await;
        assert_eq!(
            from_b.events().iter().map(|e| e.payload).collect::<Vec<_>>(),
            vec!["C"]
        );
    }

    #[tokio::test]
    async fn cursor_ahead_of_log_treated_as_origin() {
        let svc = service(50);
        svc.publish("a");
        let result = svc
            .await_since(EventId::new(999), Duration::from_millis(10))
            .await;
        assert_eq!(result.events().len(), 1);
    }

    #[tokio::test]
    async fn zero_capacity_still_wakes_waiters() {
        let svc = service(0);
        let waiter = {
            let svc = svc.clone();
            tokio::spawn(async move {
                svc.await_since(Cursor::ORIGIN, Duration::from_secs(10))
                    .await
            })
        };
        wait_for_waiters(&svc, 1).await;

        let event = svc.publish("ephemeral");
        assert_eq!(waiter.await.unwrap(), PollResult::Delivered(vec![event]));
        assert!(svc.since(Cursor::ORIGIN).is_empty());
        assert_eq!(svc.status().retained, 0);
    }

    #[tokio::test]
    async fn shutdown_releases_waiters() {
        let svc = service(50);
        let waiter = {
            let svc = svc.clone();
            tokio::spawn(async move {
                svc.await_since(Cursor::ORIGIN, Duration::from_secs(10))
                    .await
            })
        };
        wait_for_waiters(&svc, 1).await;

        svc.shutdown();
        assert_eq!(waiter.await.unwrap(), PollResult::Cancelled);
        assert!(svc.is_shut_down());
        assert_eq!(svc.pending_waiters(), 0);

        // New waits are refused; publishing still works.
        assert_eq!(
            svc.await_since(Cursor::ORIGIN, Duration::from_secs(1)).await,
            PollResult::Cancelled
        );
        svc.publish("after shutdown");
        assert_eq!(svc.latest_id(), EventId::new(1));
    }

    #[tokio::test(start_paused = true)]
    async fn wake_wins_over_elapsed_timeout() {
        let svc = service(50);
        let mut wait = std::pin::pin!(svc.await_since(Cursor::ORIGIN, Duration::from_millis(100)));

        // Poll once so the waiter registers and its timer starts.
        tokio::select! {
            biased;
            r = &mut wait => panic!("resolved before any publish: {r:?}"),
            _ = std::future::ready(()) => {}
        }
        assert_eq!(svc.pending_waiters(), 1);

        // Timer is past due and the event lands before the waiter runs again.
        tokio::time::advance(Duration::from_millis(150)).await;
        let event = svc.publish("just in time");

        assert_eq!(wait.await, PollResult::Delivered(vec![event]));
        assert_eq!(svc.pending_waiters(), 0);
    }

    #[tokio::test]
    async fn publish_with_builds_from_assigned_id() {
        let svc: PollService<String> =
            PollService::new(&LogConfig::default(), PollConfig::default());
        svc.publish("first".to_string());
        let waiter = {
            let svc = svc.clone();
            tokio::spawn(async move {
                svc.await_since(EventId::new(1), Duration::from_secs(10))
                    .await
            })
        };
        while svc.pending_waiters() < 1 {
            tokio::task::yield_now().await;
        }

        let event = svc.publish_with(|id| format!("second #{id}"));
        assert_eq!(event.id, EventId::new(2));
        assert_eq!(event.payload, "second #2");
        assert_eq!(waiter.await.unwrap(), PollResult::Delivered(vec![event]));
    }

    #[tokio::test]
    async fn requested_timeout_is_clamped() {
        let svc: PollService<&str> = PollService::new(
            &LogConfig::default(),
            PollConfig {
                default_timeout_ms: 10,
                max_timeout_ms: 20,
            },
        );
        let start = Instant::now();
        let result = svc.await_since(Cursor::ORIGIN, Duration::from_secs(3600)).await;
        assert_eq!(result, PollResult::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(5));

        assert_eq!(svc.poll(Cursor::ORIGIN).await, PollResult::TimedOut);
    }

    #[test]
    fn status_reflects_log() {
        let svc = service(2);
        assert!(svc.status().last_event.is_none());
        svc.publish("a");
        svc.publish("b");
        svc.publish("c");

        let status = svc.status();
        assert_eq!(status.retained, 2);
        assert_eq!(status.capacity, 2);
        assert_eq!(status.total_published, 3);
        assert_eq!(status.pending_waiters, 0);
        assert_eq!(status.latest_id, EventId::new(3));
        assert_eq!(status.oldest_id, Some(EventId::new(2)));
        assert_eq!(status.last_event.map(|e| e.payload), Some("c"));
    }
}
