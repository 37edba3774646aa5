use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonic identifier assigned to every published event.
///
/// Identifiers start at 1; the zero value is reserved for
/// [`EventId::ORIGIN`], the position before the first event.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventId(u64);

/// A client-held marker meaning "I have seen everything up to here".
///
/// A cursor is just the id of the last event the client observed. The core
/// only ever compares against it.
pub type Cursor = EventId;

impl EventId {
    /// The position before any event has been published.
    pub const ORIGIN: Self = Self(0);

    /// Wrap a raw sequence number.
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// The raw sequence number.
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns `true` for the origin sentinel.
    pub const fn is_origin(&self) -> bool {
        self.0 == 0
    }

    /// The identifier following this one.
    pub(crate) fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Parse a cursor supplied by a client.
    ///
    /// Anything that is not a non-negative integer maps to [`EventId::ORIGIN`],
    /// so a garbled cursor replays the retained window instead of failing.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.trim().parse::<u64>().map(Self).unwrap_or(Self::ORIGIN)
    }
}

impl From<u64> for EventId {
    fn from(seq: u64) -> Self {
        Self(seq)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
