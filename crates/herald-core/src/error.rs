/// Errors produced by the notification core.
///
/// Publishing and polling never fail; these only surface while validating
/// configuration or tearing down the background producer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The producer interval range is inverted.
    #[error("producer interval is inverted: min={min_ms}ms, max={max_ms}ms")]
    InvalidProducerInterval { min_ms: u64, max_ms: u64 },

    /// The producer task panicked or was aborted before it could be joined.
    #[error("producer task failed: {0}")]
    ProducerJoin(String),
}

/// Convenience alias used throughout the core crate.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
