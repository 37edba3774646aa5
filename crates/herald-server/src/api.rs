use serde::{Deserialize, Serialize};

use herald_core::{Cursor, Event, Notification, PollResult};

/// HTTP endpoint paths.
pub mod endpoints {
    pub const HEALTH: &str = "/v1/health";
    pub const EVENTS: &str = "/v1/events";
    pub const POLL: &str = "/v1/poll";
    pub const STATUS: &str = "/v1/status";
}

/// Number of events returned by the recent-events endpoint when no limit is
/// given.
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Health check response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Query string of the long-poll endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PollQuery {
    /// Last event id the client has seen. Parsed leniently.
    pub cursor: Option<String>,
    /// Requested wait; clamped by the service.
    pub timeout_ms: Option<u64>,
}

impl PollQuery {
    pub fn cursor(&self) -> Cursor {
        self.cursor
            .as_deref()
            .map_or(Cursor::ORIGIN, Cursor::parse_lenient)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollOutcome {
    Delivered,
    TimedOut,
    Cancelled,
}

/// Body of every long-poll response.
///
/// `cursor` is what the client should send on its next poll. `gap` is set
/// when the delivery starts past the event after the client's cursor, i.e.
/// some events were evicted before the client saw them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollResponse {
    pub outcome: PollOutcome,
    pub events: Vec<Event<Notification>>,
    pub cursor: Cursor,
    pub gap: bool,
}

impl PollResponse {
    pub fn from_result(cursor: Cursor, result: PollResult<Notification>) -> Self {
        let next = result.next_cursor(cursor);
        match result {
            PollResult::Delivered(events) => {
                // Cursors past the log are served from the origin.
                let from = match events.first() {
                    Some(first) if first.id <= cursor => Cursor::ORIGIN,
                    _ => cursor,
                };
                let gap = events
                    .first()
                    .is_some_and(|e| e.id.value() > from.value().saturating_add(1));
                Self {
                    outcome: PollOutcome::Delivered,
                    events,
                    cursor: next,
                    gap,
                }
            }
            PollResult::TimedOut => Self::empty(PollOutcome::TimedOut, cursor),
            PollResult::Cancelled => Self::empty(PollOutcome::Cancelled, cursor),
        }
    }

    fn empty(outcome: PollOutcome, cursor: Cursor) -> Self {
        Self {
            outcome,
            events: Vec::new(),
            cursor,
            gap: false,
        }
    }
}
