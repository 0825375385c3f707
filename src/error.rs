//! Error types for the periodic source.

/// Errors raised while configuring or running a periodic source.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A construction parameter was out of range. Fix the configuration
    /// and restart; retrying will not help.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A metrics sink could not record an observation.
    #[error("metrics emission failed: {0}")]
    MetricsEmission(String),
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
