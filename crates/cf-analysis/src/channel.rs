//! Binned channels built from aggregated scores.

use std::collections::{BTreeMap, BTreeSet};

use cf_core::{Error, NOMINAL, Result, SystematicScores, WeightedScores};
use cf_select::{Histogram, efficiency_cut, uniform_edges};
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::mass::{MassPoints, NOMINAL_MASS};
use crate::norm::Normalization;
use crate::sample::{Sample, SampleKind};
use crate::scores::{Scores, Unblind};

/// Role of a histogram in a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleRole {
    /// Observed data.
    Data,
    /// Background model.
    Background,
    /// Signal hypothesis.
    Signal,
}

/// Nominal and systematic histograms of one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSample {
    /// Sample name.
    pub name: String,
    /// Role in the fit model.
    pub role: SampleRole,
    /// Nominal histogram.
    pub nominal: Histogram,
    /// Systematic variations (never [`NOMINAL`]).
    #[serde(default)]
    pub variations: BTreeMap<String, Histogram>,
}

/// Named set of histograms sharing one binning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel name.
    pub name: String,
    /// Background and signal samples.
    pub samples: Vec<ChannelSample>,
    /// Observed data, absent when blinded.
    pub data: Option<ChannelSample>,
}

impl Channel {
    /// Data (if present) followed by the model samples.
    pub fn histograms(&self) -> impl Iterator<Item = &ChannelSample> {
        self.data.iter().chain(&self.samples)
    }

    /// Model sample by name.
    pub fn sample(&self, name: &str) -> Option<&ChannelSample> {
        self.samples.iter().find(|s| s.name == name)
    }

    /// Bin edges of the channel.
    pub fn bin_edges(&self) -> Option<&[f64]> {
        self.histograms().next().map(|s| s.nominal.bin_edges.as_slice())
    }
}

/// Assemble a channel.
pub fn make_channel(name: impl Into<String>, samples: Vec<ChannelSample>, data: Option<ChannelSample>) -> Channel {
    Channel { name: name.into(), samples, data }
}

/// Result of one build: background only, or one channel per mass.
#[derive(Debug, Clone, PartialEq)]
pub enum Channels {
    /// No mass requested.
    Background(Channel),
    /// One channel per requested mass, in canonical order.
    PerMass(Vec<(u32, Channel)>),
}

impl Channels {
    /// All channels in order.
    pub fn channels(&self) -> Vec<&Channel> {
        match self {
            Channels::Background(c) => vec![c],
            Channels::PerMass(v) => v.iter().map(|(_, c)| c).collect(),
        }
    }

    /// Channel of `mass`.
    pub fn for_mass(&self, mass: u32) -> Option<&Channel> {
        match self {
            Channels::Background(_) => None,
            Channels::PerMass(v) => v.iter().find(|(m, _)| *m == mass).map(|(_, c)| c),
        }
    }

    /// Owned channels in order.
    pub fn into_vec(self) -> Vec<Channel> {
        match self {
            Channels::Background(c) => vec![c],
            Channels::PerMass(v) => v.into_iter().map(|(_, c)| c).collect(),
        }
    }
}

/// Turns [`Scores`] into histograms and channels.
#[derive(Debug, Clone, Copy)]
pub struct ChannelBuilder<'a> {
    mass_points: MassPoints,
    normalization: &'a Normalization,
}

impl<'a> ChannelBuilder<'a> {
    /// Builder scaling data-driven backgrounds by `normalization`.
    pub fn new(mass_points: MassPoints, normalization: &'a Normalization) -> Self {
        Self { mass_points, normalization }
    }

    /// Classifier channels: `bins` equal-width bins over the score range.
    pub fn build(
        &self,
        scores: &Scores,
        category: &Category,
        bins: usize,
        mass_points: &BTreeSet<u32>,
        unblind: Unblind,
    ) -> Result<Channels> {
        let edges = uniform_edges(bins, scores.min_score, scores.max_score)?;
        self.build_with_edges(scores, &category.name, None, edges, mass_points, unblind)
    }

    /// Kinematic channels named `{category}[_{mass}]_{field}`, binned with the
    /// category's limit binning.
    pub fn build_field(
        &self,
        scores: &Scores,
        category: &Category,
        field: &str,
        mass_points: &BTreeSet<u32>,
        unblind: Unblind,
    ) -> Result<Channels> {
        let edges = category.limit_bins.resolve(scores.min_score, scores.max_score)?;
        self.build_with_edges(scores, &category.name, Some(field), edges, mass_points, unblind)
    }

    /// [`Self::build_field`] for several fields, keyed by field.
    pub fn build_fields(
        &self,
        scores: &BTreeMap<String, Scores>,
        category: &Category,
        mass_points: &BTreeSet<u32>,
        unblind: Unblind,
    ) -> Result<BTreeMap<String, Channels>> {
        scores
            .iter()
            .map(|(field, s)| Ok((field.clone(), self.build_field(s, category, field, mass_points, unblind)?)))
            .collect()
    }

    fn build_with_edges(
        &self,
        scores: &Scores,
        category: &str,
        field: Option<&str>,
        edges: Vec<f64>,
        mass_points: &BTreeSet<u32>,
        unblind: Unblind,
    ) -> Result<Channels> {
        let masses = self.mass_points.select(mass_points)?;
        if let Some(&m) = masses.iter().find(|m| !scores.all_sig_scores.contains_key(m)) {
            return Err(Error::UnknownMassPoint(m));
        }
        let name = |mass: Option<u32>| {
            let mut name = category.to_string();
            if let Some(m) = mass {
                name.push_str(&format!("_{m}"));
            }
            if let Some(f) = field {
                name.push_str(&format!("_{f}"));
            }
            name
        };

        let backgrounds = scores
            .bkg_scores
            .iter()
            .map(|(s, v)| self.sample_histograms(s.as_ref(), v, &edges, SampleRole::Background))
            .collect::<Result<Vec<_>>>()?;

        let data = match &scores.data_scores {
            Some(values) => {
                let max_score = match unblind {
                    Unblind::Efficiency(eff) => Some(self.blinding_threshold(scores, &edges, eff)?),
                    Unblind::Full | Unblind::Blind => None,
                };
                if let Some(t) = max_score {
                    log::info!("blinding data above {t}");
                }
                let mut hist = Histogram::new(scores.data.name(), edges.clone())?
                    .with_style(scores.data.style().clone());
                hist.fill_weighted(values, max_score)?;
                Some(ChannelSample {
                    name: scores.data.name().to_string(),
                    role: SampleRole::Data,
                    nominal: hist,
                    variations: BTreeMap::new(),
                })
            }
            None => None,
        };

        if masses.is_empty() {
            return Ok(Channels::Background(make_channel(name(None), backgrounds, data)));
        }

        let mut channels = Vec::with_capacity(masses.len());
        for mass in masses {
            log::info!("{mass} GeV mass hypothesis");
            let mut samples = backgrounds.clone();
            for (s, v) in scores.all_sig_scores.get(&mass).into_iter().flatten() {
                samples.push(self.sample_histograms(s.as_ref(), v, &edges, SampleRole::Signal)?);
            }
            channels.push((mass, make_channel(name(Some(mass)), samples, data.clone())));
        }
        Ok(Channels::PerMass(channels))
    }

    /// Score at which the nominal-mass signal keeps `efficiency` of its yield above.
    fn blinding_threshold(&self, scores: &Scores, edges: &[f64], efficiency: f64) -> Result<f64> {
        let signals = scores.all_sig_scores.get(&NOMINAL_MASS).ok_or_else(|| {
            Error::Config(format!(
                "blinding by signal efficiency needs the {NOMINAL_MASS} GeV signal scores"
            ))
        })?;
        let mut total = Histogram::new(format!("signal_{NOMINAL_MASS}"), edges.to_vec())?;
        for (_, values) in signals {
            if let Some(nominal) = values.get(NOMINAL) {
                total.fill_weighted(nominal, None)?;
            }
        }
        Ok(efficiency_cut(&total, efficiency)?)
    }

    fn sample_histograms(
        &self,
        sample: &dyn Sample,
        values: &SystematicScores,
        edges: &[f64],
        role: SampleRole,
    ) -> Result<ChannelSample> {
        let factor = match sample.kind() {
            SampleKind::DataDriven => self.normalization.factor(sample.name()),
            _ => 1.0,
        };
        let fill = |name: String, scores: &WeightedScores| -> Result<Histogram> {
            let mut hist = Histogram::new(name, edges.to_vec())?.with_style(sample.style().clone());
            hist.fill_weighted(scores, None)?;
            if factor != 1.0 {
                hist.scale(factor);
            }
            Ok(hist)
        };

        let empty = WeightedScores::default();
        let nominal = fill(sample.name().to_string(), values.get(NOMINAL).unwrap_or(&empty))?;
        let mut variations = BTreeMap::new();
        for (variation, scores) in values.iter().filter(|(k, _)| k.as_str() != NOMINAL) {
            variations.insert(variation.clone(), fill(format!("{}_{variation}", sample.name()), scores)?);
        }
        Ok(ChannelSample { name: sample.name().to_string(), role, nominal, variations })
    }
}
