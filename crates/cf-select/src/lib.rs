//! # cf-select
//!
//! Selection layer for catflow.
//!
//! - [`Cut`]: immutable boolean selection expressions with `and`/`or`/`negate`
//!   combinators and a canonical string form.
//! - [`CompiledExpr`] / [`EventTable`]: the built-in evaluator for those
//!   strings over named event columns.
//! - [`Binning`], [`Histogram`], [`efficiency_cut`]: binned counters filled
//!   from score/weight arrays and the signal-efficiency blinding threshold.
//!
//! ## Example
//!
//! ```
//! use cf_select::{Cut, EventTable};
//!
//! let lead = Cut::new("jet1_pt > 50000");
//! let sublead = Cut::new("jet2_pt > 30000");
//! let boosted = lead.and(&sublead.negate());
//! assert_eq!(boosted.to_string(), "(jet1_pt > 50000) && (!(jet2_pt > 30000))");
//!
//! let events = EventTable::new()
//!     .with_column("jet1_pt", vec![60000.0, 60000.0, 20000.0]).unwrap()
//!     .with_column("jet2_pt", vec![40000.0, 10000.0, 10000.0]).unwrap();
//! assert_eq!(events.mask(&boosted).unwrap(), vec![false, true, false]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binning;
pub mod cut;
pub mod efficiency;
pub mod error;
pub mod expr;
pub mod histogram;
pub mod table;

pub use binning::{Binning, OVERFLOW_SENTINEL, uniform_edges, validate_edges};
pub use cut::{Cut, CutNode};
pub use efficiency::efficiency_cut;
pub use error::{Result, SelectError};
pub use expr::CompiledExpr;
pub use histogram::Histogram;
pub use table::{EventTable, ExprEvaluator, SelectionEvaluator};
