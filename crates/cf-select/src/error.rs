//! Error type for the selection layer.

use thiserror::Error;

/// Errors raised while parsing/evaluating selections or filling histograms.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectError {
    /// Expression tokenizer/parser failure.
    #[error("expression error: {0}")]
    Expression(String),

    /// An expression references a column the event table does not have.
    #[error("missing column: '{0}'")]
    MissingColumn(String),

    /// Column lengths disagree within one event table.
    #[error("column '{name}' has {got} entries, expected {expected}")]
    ColumnLength {
        /// Column name.
        name: String,
        /// Length of the offending column.
        got: usize,
        /// Length shared by the other columns.
        expected: usize,
    },

    /// Malformed binning.
    #[error("{0}")]
    InvalidBinning(String),

    /// Efficiency target outside `(0, 1]`.
    #[error("efficiency must be in (0, 1], got {0}")]
    InvalidEfficiency(f64),

    /// Histogram filling failure.
    #[error("histogram fill error: {0}")]
    HistogramFill(String),
}

/// Result alias for the selection layer.
pub type Result<T> = std::result::Result<T, SelectError>;

impl From<SelectError> for cf_core::Error {
    fn from(e: SelectError) -> Self {
        match e {
            SelectError::InvalidBinning(msg) => cf_core::Error::InvalidBinning(msg),
            SelectError::InvalidEfficiency(_) => cf_core::Error::Config(e.to_string()),
            SelectError::HistogramFill(msg) => cf_core::Error::Histogram(msg),
            other => cf_core::Error::Selection(other.to_string()),
        }
    }
}
