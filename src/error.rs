use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the simulation engine and its front-ends.
#[derive(Debug, Error)]
pub enum SimError {
    /// Malformed generator, family or runner configuration.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// One model could not be fit on one dataset.
    ///
    /// The runner recovers from this per run; it only reaches the top level
    /// when a caller fits a model directly.
    #[error("Degenerate fit for model '{model}': {reason}")]
    DegenerateFit { model: String, reason: String },

    /// An aggregation invariant failed. Always a defect, never data noise.
    #[error("Aggregation mismatch: {0}")]
    AggregationMismatch(String),

    /// A statistic was requested for a key with no retained runs.
    #[error("No retained runs for model '{model}'")]
    NoData { model: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SimError {
    pub fn invalid(message: impl Into<String>) -> Self {
        SimError::InvalidParameter(message.into())
    }

    pub fn degenerate(model: impl Into<String>, reason: impl Into<String>) -> Self {
        SimError::DegenerateFit {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Process exit code for the `bvsim` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            SimError::InvalidParameter(_) | SimError::Config(_) | SimError::Io { .. } => 2,
            SimError::NoData { .. } => 3,
            SimError::DegenerateFit { .. } | SimError::AggregationMismatch(_) => 4,
        }
    }
}
