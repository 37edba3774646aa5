//! Long-polling notification core for Herald.
//!
//! A bounded in-memory [`EventLog`] paired with a [`WaitRegistry`] lets many
//! clients block on "anything newer than this cursor" and be woken as soon as
//! a matching event is published, or released after a bounded timeout. The
//! [`PollService`] façade is the only entry point callers need; the
//! [`BackgroundProducer`] feeds it synthetic notifications through the same
//! public `publish` path.

pub mod config;
pub mod cursor;
pub mod error;
pub mod event;
pub mod log;
pub mod producer;
pub mod registry;
pub mod service;

pub use config::{LogConfig, PollConfig, ProducerConfig};
pub use cursor::{Cursor, EventId};
pub use error::{CoreError, CoreResult};
pub use event::{Event, Level, Notification};
pub use log::EventLog;
pub use producer::{BackgroundProducer, NotificationGenerator, PayloadGenerator};
pub use registry::{WaitRegistry, WaiterId, WakeReceiver};
pub use service::{PollResult, PollService, ServiceStatus};
