//! In-memory samples backed by [`EventTable`]s.

use std::collections::BTreeMap;
use std::sync::Arc;

use cf_core::{Error, HistStyle, NOMINAL, Result, SystematicScores, WeightedScores, Year};
use cf_select::{CompiledExpr, EventTable, ExprEvaluator, SelectionEvaluator};

use crate::mass::{ModeFilter, ProductionMode};
use crate::region::Region;
use crate::sample::{
    Classifier, Discriminant, Sample, SampleKind, SampleQuery, SignalProvider, variation_names,
};

/// Classifier whose score is an event expression.
#[derive(Debug, Clone)]
pub struct ExprClassifier {
    name: String,
    expr: CompiledExpr,
}

impl ExprClassifier {
    /// Compile `expr` as the score.
    pub fn new(name: impl Into<String>, expr: &str) -> Result<Self> {
        Ok(Self { name: name.into(), expr: CompiledExpr::compile(expr)? })
    }
}

impl Classifier for ExprClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, events: &EventTable) -> Result<Vec<f64>> {
        Ok(events.eval(&self.expr)?)
    }
}

/// Sample holding one event table per systematic variation.
#[derive(Clone)]
pub struct TableSample {
    name: String,
    style: HistStyle,
    year: Year,
    kind: SampleKind,
    variations: BTreeMap<String, EventTable>,
    systematics: Vec<String>,
    weight: Option<CompiledExpr>,
    scale: f64,
    shape_region: Option<Region>,
    evaluator: Arc<dyn SelectionEvaluator>,
}

impl TableSample {
    /// Sample with the nominal events only, unit weights and the built-in evaluator.
    pub fn new(name: impl Into<String>, kind: SampleKind, year: Year, nominal: EventTable) -> Self {
        let name = name.into();
        let mut variations = BTreeMap::new();
        variations.insert(NOMINAL.to_string(), nominal);
        Self {
            style: HistStyle::labelled(name.clone()),
            name,
            year,
            kind,
            variations,
            systematics: Vec::new(),
            weight: None,
            scale: 1.0,
            shape_region: None,
            evaluator: Arc::new(ExprEvaluator),
        }
    }

    /// Add a systematic variation.
    pub fn with_variation(mut self, name: impl Into<String>, events: EventTable) -> Self {
        let name = name.into();
        if name != NOMINAL && !self.systematics.contains(&name) {
            self.systematics.push(name.clone());
        }
        self.variations.insert(name, events);
        self
    }

    /// Per-event weight expression (ignored for data).
    pub fn with_weight(mut self, expr: &str) -> Result<Self> {
        self.weight = Some(CompiledExpr::compile(expr)?);
        Ok(self)
    }

    /// Global weight factor (ignored for data).
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Display attributes.
    pub fn with_style(mut self, style: HistStyle) -> Self {
        self.style = style;
        self
    }

    /// Always select events in `region`, whatever region is queried
    /// (data-driven shapes taken from a control region).
    pub fn with_shape_region(mut self, region: Region) -> Self {
        self.shape_region = Some(region);
        self
    }

    /// Replace the selection evaluator.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn SelectionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Events of one variation.
    pub fn events(&self, variation: &str) -> Option<&EventTable> {
        self.variations.get(variation)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Sample { sample: self.name.clone(), message: message.into() }
    }

    fn weights(&self, events: &EventTable) -> Result<Vec<f64>> {
        if self.kind == SampleKind::Data {
            return Ok(vec![1.0; events.len()]);
        }
        let mut weights = match &self.weight {
            Some(w) => events.eval(w)?,
            None => vec![1.0; events.len()],
        };
        if self.scale != 1.0 {
            for w in &mut weights {
                *w *= self.scale;
            }
        }
        Ok(weights)
    }
}

impl Sample for TableSample {
    fn name(&self) -> &str {
        &self.name
    }

    fn style(&self) -> &HistStyle {
        &self.style
    }

    fn year(&self) -> Year {
        self.year
    }

    fn kind(&self) -> SampleKind {
        self.kind
    }

    fn workspace_systematics(&self) -> &[String] {
        &self.systematics
    }

    fn values(
        &self,
        discriminant: Discriminant<'_>,
        query: &SampleQuery<'_>,
        systematics: &[String],
    ) -> Result<SystematicScores> {
        let query = match self.shape_region {
            Some(region) => SampleQuery { region, ..*query },
            None => *query,
        };
        let selection = query.selection(self.year)?.serialize();
        let systematics: &[String] = if self.kind == SampleKind::Data { &[] } else { systematics };

        let mut out = SystematicScores::new();
        for variation in variation_names(systematics) {
            let events = self
                .variations
                .get(variation)
                .ok_or_else(|| self.error(format!("no events for variation '{variation}'")))?;
            let selected = self.evaluator.select(&selection, events)?;
            let values = match discriminant {
                Discriminant::Classifier(clf) => clf.score(&selected)?,
                Discriminant::Field(expr) => selected.eval_str(expr)?,
            };
            let weights = self.weights(&selected)?;
            if values.len() != weights.len() {
                return Err(self.error(format!(
                    "{} produced {} values for {} events",
                    discriminant.describe(),
                    values.len(),
                    weights.len()
                )));
            }
            out.insert(variation.to_string(), WeightedScores::new(values, weights));
        }
        Ok(out)
    }
}

/// Several samples treated as one; variations missing from a part fall back
/// to that part's nominal events.
#[derive(Clone)]
pub struct MergedSample {
    name: String,
    style: HistStyle,
    kind: SampleKind,
    year: Year,
    parts: Vec<Arc<dyn Sample>>,
    systematics: Vec<String>,
}

impl MergedSample {
    /// Merge `parts`, which must share one year.
    pub fn new(name: impl Into<String>, parts: Vec<Arc<dyn Sample>>) -> Result<Self> {
        let name = name.into();
        let Some(first) = parts.first() else {
            return Err(Error::Config(format!("merged sample '{name}' has no parts")));
        };
        let (year, kind, style) = (first.year(), first.kind(), first.style().clone());
        if let Some(other) = parts.iter().find(|p| p.year() != year) {
            return Err(Error::Config(format!(
                "merged sample '{name}': '{}' is from {} but '{}' from {year}",
                other.name(),
                other.year(),
                first.name()
            )));
        }
        let mut systematics: Vec<String> = Vec::new();
        for s in parts.iter().flat_map(|p| p.workspace_systematics()) {
            if !systematics.contains(s) {
                systematics.push(s.clone());
            }
        }
        Ok(Self { style: HistStyle { label: name.clone(), ..style }, name, kind, year, parts, systematics })
    }

    /// Display attributes.
    pub fn with_style(mut self, style: HistStyle) -> Self {
        self.style = style;
        self
    }

    /// Constituent samples.
    pub fn parts(&self) -> &[Arc<dyn Sample>] {
        &self.parts
    }
}

impl Sample for MergedSample {
    fn name(&self) -> &str {
        &self.name
    }

    fn style(&self) -> &HistStyle {
        &self.style
    }

    fn year(&self) -> Year {
        self.year
    }

    fn kind(&self) -> SampleKind {
        self.kind
    }

    fn workspace_systematics(&self) -> &[String] {
        &self.systematics
    }

    fn values(
        &self,
        discriminant: Discriminant<'_>,
        query: &SampleQuery<'_>,
        systematics: &[String],
    ) -> Result<SystematicScores> {
        let mut out = SystematicScores::new();
        for part in &self.parts {
            let own: Vec<String> = systematics
                .iter()
                .filter(|s| part.workspace_systematics().contains(s))
                .cloned()
                .collect();
            let scores = part.values(discriminant, query, &own)?;
            let nominal = scores.get(NOMINAL).cloned().unwrap_or_default();
            for variation in variation_names(systematics) {
                let part_scores = scores.get(variation).unwrap_or(&nominal);
                out.entry(variation.to_string()).or_default().extend(part_scores);
            }
        }
        Ok(out)
    }
}

/// Signal samples keyed by mass and production mode.
#[derive(Clone, Default)]
pub struct TableSignals {
    samples: BTreeMap<u32, BTreeMap<ProductionMode, Arc<dyn Sample>>>,
}

impl TableSignals {
    /// No signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the sample for `mode` at `mass`.
    pub fn insert(&mut self, mass: u32, mode: ProductionMode, sample: Arc<dyn Sample>) {
        self.samples.entry(mass).or_default().insert(mode, sample);
    }

    /// Builder form of [`TableSignals::insert`].
    pub fn with(mut self, mass: u32, mode: ProductionMode, sample: Arc<dyn Sample>) -> Self {
        self.insert(mass, mode, sample);
        self
    }
}

impl SignalProvider for TableSignals {
    fn masses(&self) -> Vec<u32> {
        self.samples.keys().copied().collect()
    }

    fn signals(&self, mass: u32, modes: ModeFilter) -> Result<Vec<Arc<dyn Sample>>> {
        let by_mode = self.samples.get(&mass).ok_or(Error::UnknownMassPoint(mass))?;
        let mut out: Vec<Arc<dyn Sample>> = Vec::new();
        for group in modes.groups() {
            let mut parts: Vec<Arc<dyn Sample>> =
                group.iter().filter_map(|m| by_mode.get(m).cloned()).collect();
            match parts.len() {
                0 => {
                    if let ModeFilter::Single(mode) = modes {
                        return Err(Error::Config(format!("no {mode} signal sample at {mass} GeV")));
                    }
                    log::debug!("no signal sample for modes {group:?} at {mass} GeV");
                }
                1 => out.extend(parts.pop()),
                _ => {
                    let tag: Vec<&str> = group.iter().map(|m| m.as_str()).collect();
                    let name = format!("Signal_{}_{mass}", tag.join("_"));
                    out.push(Arc::new(MergedSample::new(name, parts)?));
                }
            }
        }
        if out.is_empty() {
            return Err(Error::UnknownMassPoint(mass));
        }
        Ok(out)
    }
}
