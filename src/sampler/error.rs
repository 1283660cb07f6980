//! Sampler-specific error types.

use thiserror::Error;

/// Errors that can occur while setting up or tearing down the sampler.
///
/// Nothing on the scrape path returns this type: missing data is reported by
/// omitting samples, never by failing a poll.
#[derive(Debug, Error)]
pub enum SamplerError {
    /// Invalid reading definitions.
    #[error("config error: {0}")]
    Config(String),

    /// Failed to spawn the reporting process or open its output.
    #[error("failed to start facility: {0}")]
    Spawn(#[from] std::io::Error),

    /// Background task failed to join (panic or abort).
    #[error("internal error: {0}")]
    Internal(String),
}
