use std::fmt;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cursor::EventId;

/// A single published event.
///
/// Events are immutable once appended to the log; readers receive clones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event<P> {
    /// Monotonic identifier, unique within one service lifetime.
    pub id: EventId,
    /// Caller-supplied data.
    pub payload: P,
    /// Wall-clock time the event was appended.
    pub created_at: DateTime<Utc>,
}

impl<P> Event<P> {
    pub(crate) fn new(id: EventId, payload: P) -> Self {
        Self {
            id,
            payload,
            created_at: Utc::now(),
        }
    }

    /// Returns `true` if a client holding `cursor` has not yet seen this event.
    pub fn is_newer_than(&self, cursor: EventId) -> bool {
        self.id > cursor
    }
}

/// Severity attached to a notification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// The payload the server and the background producer publish.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub level: Level,
    pub message: String,
}

/// Activity-style notifications used when a client asks for a sample.
const SAMPLE_NOTIFICATIONS: &[(Level, &str)] = &[
    (Level::Info, "New user registered"),
    (Level::Success, "Payment processed successfully"),
    (Level::Warning, "System maintenance scheduled"),
    (Level::Error, "Failed login attempt detected"),
    (Level::Info, "New comment on your post"),
];

impl Notification {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    /// Pick a random activity-style notification.
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let (level, message) = SAMPLE_NOTIFICATIONS
            .choose(rng)
            .copied()
            .unwrap_or((Level::Info, "Notification"));
        Self::new(level, message)
    }
}
