//! Error types for catflow

use thiserror::Error;

use crate::types::Year;

/// catflow error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Invalid mass-region boundaries.
    #[error("invalid mass region: {0}")]
    InvalidMassRegion(String),

    /// Requested mass hypothesis is not known (canonical list or signal samples).
    #[error("unknown mass point: {0}")]
    UnknownMassPoint(u32),

    /// Year overlay lookup on an epoch the category does not define.
    #[error("category '{category}' has no selection for year {year}")]
    UnknownEpoch {
        /// Category name.
        category: String,
        /// Requested data-taking year.
        year: Year,
    },

    /// Malformed binning (non-ascending edges, too few edges, zero bins).
    #[error("invalid binning: {0}")]
    InvalidBinning(String),

    /// Category name not present in the registry.
    #[error("unknown category: '{0}'")]
    UnknownCategory(String),

    /// Any other configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Event-selection evaluator failure.
    #[error("selection error: {0}")]
    Selection(String),

    /// Histogram construction or filling failure.
    #[error("histogram error: {0}")]
    Histogram(String),

    /// Sample collaborator failure (score or array retrieval).
    #[error("sample '{sample}': {message}")]
    Sample {
        /// Sample name.
        sample: String,
        /// Failure description.
        message: String,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Whether this is a fatal configuration error (abort the current build, no retry).
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::InvalidMassRegion(_)
                | Error::UnknownMassPoint(_)
                | Error::UnknownEpoch { .. }
                | Error::InvalidBinning(_)
                | Error::UnknownCategory(_)
                | Error::Config(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
