//! Engine error handling
//!
//! Every fallible operation in the engine returns [`DemResult`]. Configuration
//! errors are raised before the first timestep; invariant violations abort a
//! running simulation because the physical state can no longer be trusted.

/// Errors produced by the DEM engine
#[derive(Debug, thiserror::Error)]
pub enum DemError {
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Unrecognized {category} selection: {value}")]
    UnknownSelection { category: &'static str, value: String },

    #[error("Malformed decomposition: {message}")]
    Decomposition { message: String },

    #[error("Invariant violated: {message}")]
    InvariantViolation { message: String },

    #[error("Message exchange failed: {message}")]
    Exchange { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Type alias for engine results
pub type DemResult<T> = Result<T, DemError>;

/// Helper trait attaching exchange context to codec and channel errors
pub trait ExchangeContext<T> {
    fn exchange_context(self, context: &str) -> DemResult<T>;
}

impl<T, E> ExchangeContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn exchange_context(self, context: &str) -> DemResult<T> {
        self.map_err(|e| DemError::Exchange {
            message: format!("{}: {}", context, e),
        })
    }
}

/// Create a configuration error
pub fn config_error(reason: impl std::fmt::Display) -> DemError {
    DemError::Config {
        message: reason.to_string(),
    }
}

/// Create a decomposition error
pub fn decomposition_error(reason: impl std::fmt::Display) -> DemError {
    DemError::Decomposition {
        message: reason.to_string(),
    }
}

/// Create an invariant violation error
pub fn invariant_violation(reason: impl std::fmt::Display) -> DemError {
    DemError::InvariantViolation {
        message: reason.to_string(),
    }
}
