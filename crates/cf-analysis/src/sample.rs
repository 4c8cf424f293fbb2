//! Sample, classifier and signal-provider interfaces.

use std::iter;
use std::sync::Arc;

use cf_core::{HistStyle, NOMINAL, Result, SystematicScores, Year};
use cf_select::Cut;
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::mass::ModeFilter;
use crate::region::Region;

/// Trained discriminant producing one score per event.
pub trait Classifier: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Score every event of `events`.
    fn score(&self, events: &cf_select::EventTable) -> Result<Vec<f64>>;
}

/// What to histogram: classifier output or a kinematic expression.
#[derive(Clone, Copy)]
pub enum Discriminant<'a> {
    /// Classifier scores.
    Classifier(&'a dyn Classifier),
    /// Values of an event expression.
    Field(&'a str),
}

impl Discriminant<'_> {
    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            Discriminant::Classifier(c) => format!("classifier '{}'", c.name()),
            Discriminant::Field(expr) => format!("field '{expr}'"),
        }
    }
}

impl std::fmt::Debug for Discriminant<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Where to take events from: category, region and optional extra cuts.
#[derive(Debug, Clone, Copy)]
pub struct SampleQuery<'a> {
    /// Category providing the base and epoch cuts.
    pub category: &'a Category,
    /// Charge/track region.
    pub region: Region,
    /// Extra cuts (mass region, ...).
    pub cuts: Option<&'a Cut>,
}

impl<'a> SampleQuery<'a> {
    /// Query without extra cuts.
    pub fn new(category: &'a Category, region: Region) -> Self {
        Self { category, region, cuts: None }
    }

    /// Add extra cuts.
    pub fn cuts(mut self, cuts: Option<&'a Cut>) -> Self {
        self.cuts = cuts;
        self
    }

    /// Complete selection for a sample of `year`.
    pub fn selection(&self, year: Year) -> Result<Cut> {
        let cut = self.category.selection(year, self.region)?;
        Ok(match self.cuts {
            Some(extra) => cut.and(extra),
            None => cut,
        })
    }
}

/// Role of a sample in the fit model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    /// Observed events.
    Data,
    /// Simulated background with fixed normalization.
    #[default]
    Background,
    /// Background whose normalization is measured in data.
    DataDriven,
    /// Higgs signal.
    Signal,
}

/// A named event source able to produce per-variation scores.
pub trait Sample: Send + Sync {
    /// Unique name.
    fn name(&self) -> &str;

    /// Display attributes.
    fn style(&self) -> &HistStyle;

    /// Data-taking year, used to select the category's epoch overlay.
    fn year(&self) -> Year;

    /// Role in the fit model.
    fn kind(&self) -> SampleKind;

    /// Systematic variations this sample provides besides [`NOMINAL`].
    fn workspace_systematics(&self) -> &[String] {
        &[]
    }

    /// Discriminant values and weights of the events passing `query`, keyed by
    /// variation. Always contains [`NOMINAL`]; `systematics` names the extra
    /// variations requested.
    fn values(
        &self,
        discriminant: Discriminant<'_>,
        query: &SampleQuery<'_>,
        systematics: &[String],
    ) -> Result<SystematicScores>;

    /// Classifier scores per variation.
    fn scores(
        &self,
        classifier: &dyn Classifier,
        query: &SampleQuery<'_>,
        systematics: &[String],
    ) -> Result<SystematicScores> {
        self.values(Discriminant::Classifier(classifier), query, systematics)
    }

    /// Expression values per variation.
    fn field(&self, expr: &str, query: &SampleQuery<'_>, systematics: &[String]) -> Result<SystematicScores> {
        self.values(Discriminant::Field(expr), query, systematics)
    }

    /// Nominal sum of weights passing `query`.
    fn total_weight(&self, query: &SampleQuery<'_>) -> Result<f64> {
        Ok(self
            .values(Discriminant::Field("1"), query, &[])?
            .get(NOMINAL)
            .map_or(0.0, |s| s.total_weight()))
    }

    /// Whether this is observed data.
    fn is_data(&self) -> bool {
        self.kind() == SampleKind::Data
    }
}

/// Signal samples per mass hypothesis.
pub trait SignalProvider: Send + Sync {
    /// Masses with at least one signal sample, ascending.
    fn masses(&self) -> Vec<u32>;

    /// Signal samples at `mass` grouped according to `modes`.
    fn signals(&self, mass: u32, modes: ModeFilter) -> Result<Vec<Arc<dyn Sample>>>;
}

/// Union of the requested variation names with [`NOMINAL`] first.
pub(crate) fn variation_names<'a>(systematics: &'a [String]) -> impl Iterator<Item = &'a str> {
    iter::once(NOMINAL).chain(systematics.iter().map(String::as_str).filter(|s| *s != NOMINAL))
}
