//! HTTP adapter for Herald.
//!
//! Exposes the long-poll core over a small JSON API and ties the background
//! producer's lifetime to the listener's.

pub mod api;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use api::{endpoints, HealthResponse, PollOutcome, PollResponse};
pub use config::{HeraldConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use server::HeraldServer;
