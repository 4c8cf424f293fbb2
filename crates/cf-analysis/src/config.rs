//! YAML analysis configuration and the JSON event file it points to.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cf_core::{Error, HistStyle, Result, Year};
use cf_select::{Cut, EventTable};
use serde::{Deserialize, Serialize};

use crate::analysis::{Analysis, ChannelOptions, DEFAULT_FIT_PARAM};
use crate::category::{Category, CategoryRegistry};
use crate::channel::Channel;
use crate::hadhad;
use crate::mass::{HH_MASS_POINTS, ModeFilter, ProductionMode};
use crate::region::{DEFAULT_HIGH_MASS, DEFAULT_LOW_MASS, MassRegions, Region};
use crate::sample::{Sample, SampleKind};
use crate::scores::Unblind;
use crate::source::{ExprClassifier, TableSample, TableSignals};

fn default_true() -> bool {
    true
}

fn default_fit_param() -> String {
    DEFAULT_FIT_PARAM.to_string()
}

fn default_mu() -> f64 {
    1.0
}

fn default_bins() -> usize {
    10
}

fn default_group() -> String {
    "mva".to_string()
}

fn default_scale() -> f64 {
    1.0
}

/// Complete analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Data-taking year.
    pub year: Year,
    /// Retrieve systematic variations.
    #[serde(default)]
    pub systematics: bool,
    /// Embedded (true) or ALPGEN (false) Ztautau.
    #[serde(default = "default_true")]
    pub use_embedding: bool,
    /// Overrides the categories' target region.
    #[serde(default)]
    pub target_region: Option<Region>,
    /// Overrides the categories' QCD shape region.
    #[serde(default)]
    pub qcd_shape_region: Option<Region>,
    /// Fitted quantity of the normalizations.
    #[serde(default = "default_fit_param")]
    pub fit_param: String,
    /// Signal strength applied to signal weights.
    #[serde(default = "default_mu")]
    pub mu: f64,
    /// Mass-region boundaries.
    #[serde(default)]
    pub mass_regions: MassRegionsConfig,
    /// Restrict events to one mass region.
    #[serde(default)]
    pub mass_region: Option<MassRegionKind>,
    /// Which categories to build.
    #[serde(default)]
    pub categories: CategorySelection,
    /// Categories added to the registry.
    #[serde(default)]
    pub extra_categories: Vec<CategoryConfig>,
    /// What to histogram.
    pub discriminant: DiscriminantConfig,
    /// Number of bins of classifier channels.
    #[serde(default = "default_bins")]
    pub bins: usize,
    /// Signal masses (empty: background only).
    #[serde(default)]
    pub mass_points: BTreeSet<u32>,
    /// Signal grouping.
    #[serde(default)]
    pub mode: ModeFilter,
    /// `false`, `true` or the signal efficiency kept above the blinding cut.
    #[serde(default)]
    pub unblind: Unblind,
    /// JSON event file, relative to the configuration file.
    pub events: PathBuf,
}

/// Mass-region boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassRegionsConfig {
    /// Lower signal-region boundary (GeV).
    #[serde(default = "default_low")]
    pub low: f64,
    /// Upper boundary (GeV).
    #[serde(default = "default_high")]
    pub high: f64,
    /// Whether events above `high` belong to the control region.
    #[serde(default)]
    pub high_sideband_in_control: bool,
}

fn default_low() -> f64 {
    DEFAULT_LOW_MASS
}

fn default_high() -> f64 {
    DEFAULT_HIGH_MASS
}

impl Default for MassRegionsConfig {
    fn default() -> Self {
        Self { low: DEFAULT_LOW_MASS, high: DEFAULT_HIGH_MASS, high_sideband_in_control: false }
    }
}

/// One of the three mass regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MassRegionKind {
    /// Signal region.
    Signal,
    /// Sidebands.
    Control,
    /// Classifier training region.
    Train,
}

impl MassRegionKind {
    /// Selection of this region.
    pub fn cut(&self, regions: &MassRegions) -> Cut {
        match self {
            MassRegionKind::Signal => regions.signal_region(),
            MassRegionKind::Control => regions.control_region(),
            MassRegionKind::Train => regions.train_region(),
        }
    }
}

/// Category group to build, optionally restricted by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySelection {
    /// Registry group.
    #[serde(default = "default_group")]
    pub group: String,
    /// Category names within the group.
    #[serde(default)]
    pub names: Option<Vec<String>>,
}

impl Default for CategorySelection {
    fn default() -> Self {
        Self { group: default_group(), names: None }
    }
}

/// Categories declared in the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Registry group the categories are listed in.
    pub group: String,
    /// Definitions.
    pub categories: Vec<Category>,
}

/// Discriminant of the channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscriminantConfig {
    /// Classifier whose score is an event expression.
    Classifier {
        /// Classifier name.
        name: String,
        /// Score expression.
        expr: String,
    },
    /// Kinematic expressions, one channel set each.
    Fields {
        /// Expressions.
        fields: Vec<String>,
    },
}

impl AnalysisConfig {
    /// Parse and validate YAML.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_yaml_ng::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> Result<()> {
        self.mass_regions()?;
        HH_MASS_POINTS.validate(&self.mass_points)?;
        if self.bins == 0 {
            return Err(Error::InvalidBinning("bins must be positive".into()));
        }
        if !(self.mu.is_finite() && self.mu >= 0.0) {
            return Err(Error::Config(format!("mu must be a non-negative number, got {}", self.mu)));
        }
        if let DiscriminantConfig::Fields { fields } = &self.discriminant
            && fields.is_empty()
        {
            return Err(Error::Config("discriminant lists no fields".into()));
        }
        Ok(())
    }

    /// Mass regions from the configured boundaries.
    pub fn mass_regions(&self) -> Result<MassRegions> {
        let m = self.mass_regions;
        MassRegions::new(m.low, m.high, m.high_sideband_in_control)
    }

    /// The hadhad categories plus the configured ones.
    pub fn registry(&self) -> Result<CategoryRegistry> {
        let mut builder = hadhad::builder();
        for extra in &self.extra_categories {
            for c in &extra.categories {
                builder = builder.category(&extra.group, c.clone());
            }
        }
        builder.build()
    }

    /// Channel options of this configuration.
    pub fn channel_options(&self) -> Result<ChannelOptions> {
        let cuts = match self.mass_region {
            Some(kind) => Some(kind.cut(&self.mass_regions()?)),
            None => None,
        };
        Ok(ChannelOptions {
            cuts,
            bins: self.bins,
            mass_points: self.mass_points.clone(),
            modes: self.mode,
            unblind: self.unblind,
        })
    }

    /// Event file path with relative paths taken from `base_dir`.
    pub fn events_path(&self, base_dir: &Path) -> PathBuf {
        if self.events.is_absolute() { self.events.clone() } else { base_dir.join(&self.events) }
    }

    /// Analysis over `events`.
    pub fn analysis(&self, events: &EventFile) -> Result<Analysis> {
        let data: Arc<dyn Sample> = Arc::new(events.data.table_sample(SampleKind::Data, self.year)?);
        let mut backgrounds: Vec<Arc<dyn Sample>> = Vec::with_capacity(events.backgrounds.len());
        for b in &events.backgrounds {
            backgrounds.push(Arc::new(b.table_sample(b.kind, self.year)?));
        }
        let mut signals = TableSignals::new();
        for s in &events.signals {
            let sample = s.sample.table_sample(SampleKind::Signal, self.year)?.with_scale(s.sample.scale * self.mu);
            signals.insert(s.mass, s.mode, Arc::new(sample));
        }

        let mut analysis = Analysis::new(self.year, Arc::new(self.registry()?), data, backgrounds, Arc::new(signals))
            .with_systematics(self.systematics)
            .with_embedding(self.use_embedding)
            .with_fit_param(self.fit_param.clone())
            .with_mass_regions(self.mass_regions()?);
        if self.target_region.is_some() || self.qcd_shape_region.is_some() {
            analysis = analysis.with_regions(
                self.target_region.unwrap_or(Region::Os),
                self.qcd_shape_region.unwrap_or(Region::Ss),
            );
        }
        Ok(analysis)
    }

    /// Channels of every selected category. A failing category is reported
    /// in place and does not stop the others.
    pub fn build_channels(&self, analysis: &Analysis) -> Result<Vec<(String, Result<Vec<Channel>>)>> {
        let options = self.channel_options()?;
        let categories: Vec<&Category> = analysis
            .iter_categories(&self.categories.group, self.categories.names.as_deref())?
            .into_iter()
            .map(|(c, _)| c)
            .collect();
        match &self.discriminant {
            DiscriminantConfig::Classifier { name, expr } => {
                let clf = ExprClassifier::new(name.clone(), expr)?;
                Ok(analysis
                    .channels_for_categories(&clf, &categories, &options)
                    .into_iter()
                    .map(|(category, r)| (category, r.map(|c| c.into_vec())))
                    .collect())
            }
            DiscriminantConfig::Fields { fields } => {
                let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
                Ok(categories
                    .iter()
                    .map(|c| {
                        let channels = analysis
                            .field_channels(&fields, c, &options)
                            .map(|by_field| by_field.into_values().flat_map(|ch| ch.into_vec()).collect());
                        (c.name.clone(), channels)
                    })
                    .collect())
            }
        }
    }
}

/// Events of every sample of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFile {
    /// Observed events.
    pub data: SampleEvents,
    /// Background samples.
    pub backgrounds: Vec<SampleEvents>,
    /// Signal samples per mass and mode.
    #[serde(default)]
    pub signals: Vec<SignalEvents>,
}

impl EventFile {
    /// Read a JSON event file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Events of one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleEvents {
    /// Sample name.
    pub name: String,
    /// Role (`background` or `data_driven` for backgrounds).
    #[serde(default)]
    pub kind: SampleKind,
    /// Per-event weight expression.
    #[serde(default)]
    pub weight: Option<String>,
    /// Global weight factor.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Display attributes.
    #[serde(default)]
    pub style: Option<HistStyle>,
    /// Nominal events.
    pub events: EventTable,
    /// Systematic variations.
    #[serde(default)]
    pub variations: BTreeMap<String, EventTable>,
    /// Region the events are always taken from.
    #[serde(default)]
    pub shape_region: Option<Region>,
}

impl SampleEvents {
    /// In-memory sample of `kind`.
    pub fn table_sample(&self, kind: SampleKind, year: Year) -> Result<TableSample> {
        let mut sample = TableSample::new(self.name.clone(), kind, year, self.events.clone()).with_scale(self.scale);
        for (name, events) in &self.variations {
            sample = sample.with_variation(name.clone(), events.clone());
        }
        if let Some(w) = &self.weight {
            sample = sample.with_weight(w)?;
        }
        if let Some(style) = &self.style {
            sample = sample.with_style(style.clone());
        }
        if let Some(region) = self.shape_region {
            sample = sample.with_shape_region(region);
        }
        Ok(sample)
    }
}

/// Signal events at one mass for one production mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvents {
    /// Mass hypothesis (GeV).
    pub mass: u32,
    /// Production mode.
    pub mode: ProductionMode,
    /// The sample itself.
    #[serde(flatten)]
    pub sample: SampleEvents,
}
