//! # cf-analysis
//!
//! Categories, score aggregation and channel construction for catflow.
//!
//! The flow of one build:
//!
//! 1. a [`CategoryRegistry`] (the hadhad definitions in [`hadhad`], plus any
//!    configured ones) is populated once and then only read;
//! 2. an [`Analysis`] holds the samples and normalizes the data-driven
//!    backgrounds of a category in its normalization category;
//! 3. a [`ScoreAggregator`] gathers classifier scores (or kinematic values)
//!    of data, backgrounds and the signals of each requested mass over a
//!    shared, padded range;
//! 4. a [`ChannelBuilder`] turns them into histograms, blinds data and emits
//!    one [`Channel`] per mass hypothesis, exportable as a pyhf
//!    [`Workspace`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod category;
pub mod channel;
pub mod config;
pub mod cutflow;
pub mod hadhad;
pub mod mass;
pub mod norm;
pub mod region;
pub mod sample;
pub mod scores;
pub mod source;
pub mod workspace;

pub use analysis::{Analysis, ChannelOptions};
pub use category::{Category, CategoryRegistry, CategoryRegistryBuilder};
pub use channel::{Channel, ChannelBuilder, ChannelSample, Channels, SampleRole, make_channel};
pub use config::{AnalysisConfig, EventFile};
pub use cutflow::{Cutflow, CutflowStep, RenderOptions, TableFormat};
pub use mass::{HH_MASS_POINTS, MODES_COMBINED, MassPoints, ModeFilter, NOMINAL_MASS, ProductionMode};
pub use norm::{NormCache, NormRequest, Normalization, Normalizer, YieldRatioNormalizer};
pub use region::{MassRegions, Region};
pub use sample::{Classifier, Discriminant, Sample, SampleKind, SampleQuery, SignalProvider};
pub use scores::{ScoreAggregator, ScoreRequest, Scores, Unblind};
pub use source::{ExprClassifier, MergedSample, TableSample, TableSignals};
pub use workspace::Workspace;
