//! # cf-core
//!
//! Core types for catflow.
//!
//! Holds the error taxonomy shared by every crate in the workspace and the
//! small value types (score arrays, histogram styles) passed between the
//! selection layer and the channel builder.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{HistStyle, NOMINAL, SystematicScores, WeightedScores, Year};
