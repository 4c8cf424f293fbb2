//! The analysis: samples, categories and normalizations tied together.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use cf_core::{Error, Result, Year};
use cf_select::Cut;
use rayon::prelude::*;

use crate::category::{Category, CategoryRegistry};
use crate::channel::{ChannelBuilder, Channels};
use crate::mass::{HH_MASS_POINTS, MassPoints, ModeFilter};
use crate::norm::{NormCache, NormRequest, Normalization};
use crate::region::{MassRegions, Region};
use crate::sample::{Classifier, Discriminant, Sample, SampleKind, SignalProvider};
use crate::scores::{ScoreAggregator, ScoreRequest, Scores, Unblind};

/// Default fitted quantity.
pub const DEFAULT_FIT_PARAM: &str = "TRACK";

/// Per-build options shared by the channel entry points.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOptions {
    /// Extra cuts (mass region, ...).
    pub cuts: Option<Cut>,
    /// Number of equal-width bins of classifier channels.
    pub bins: usize,
    /// Signal masses; empty builds a background-only channel.
    pub mass_points: BTreeSet<u32>,
    /// Signal grouping.
    pub modes: ModeFilter,
    /// Data unblinding.
    pub unblind: Unblind,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            cuts: None,
            bins: 10,
            mass_points: BTreeSet::new(),
            modes: ModeFilter::Grouped,
            unblind: Unblind::Blind,
        }
    }
}

/// One analysis configuration over a fixed set of samples.
pub struct Analysis {
    year: Year,
    systematics: bool,
    use_embedding: bool,
    target_region: Option<Region>,
    qcd_shape_region: Option<Region>,
    fit_param: String,
    mass_regions: MassRegions,
    mass_points: MassPoints,
    registry: Arc<CategoryRegistry>,
    data: Arc<dyn Sample>,
    backgrounds: Vec<Arc<dyn Sample>>,
    signals: Arc<dyn SignalProvider>,
    norm_cache: NormCache,
}

impl Analysis {
    /// Analysis of `year` with systematics off, embedded Ztautau, the
    /// category regions, default mass regions and the hadhad mass points.
    pub fn new(
        year: Year,
        registry: Arc<CategoryRegistry>,
        data: Arc<dyn Sample>,
        backgrounds: Vec<Arc<dyn Sample>>,
        signals: Arc<dyn SignalProvider>,
    ) -> Self {
        Self {
            year,
            systematics: false,
            use_embedding: true,
            target_region: None,
            qcd_shape_region: None,
            fit_param: DEFAULT_FIT_PARAM.to_string(),
            mass_regions: MassRegions::default(),
            mass_points: HH_MASS_POINTS,
            registry,
            data,
            backgrounds,
            signals,
            norm_cache: NormCache::default(),
        }
    }

    /// Retrieve systematic variations.
    pub fn with_systematics(mut self, systematics: bool) -> Self {
        self.systematics = systematics;
        self
    }

    /// Whether Ztautau comes from embedding (otherwise ALPGEN).
    pub fn with_embedding(mut self, use_embedding: bool) -> Self {
        self.use_embedding = use_embedding;
        self
    }

    /// Override every category's target and QCD shape regions.
    pub fn with_regions(mut self, target_region: Region, qcd_shape_region: Region) -> Self {
        self.target_region = Some(target_region);
        self.qcd_shape_region = Some(qcd_shape_region);
        self
    }

    /// Fitted quantity used for normalizations.
    pub fn with_fit_param(mut self, fit_param: impl Into<String>) -> Self {
        self.fit_param = fit_param.into();
        self
    }

    /// Mass-region boundaries.
    pub fn with_mass_regions(mut self, mass_regions: MassRegions) -> Self {
        self.mass_regions = mass_regions;
        self
    }

    /// Canonical mass hypotheses.
    pub fn with_mass_points(mut self, mass_points: MassPoints) -> Self {
        self.mass_points = mass_points;
        self
    }

    /// Replace the normalization cache (and thereby the normalizer).
    pub fn with_norm_cache(mut self, norm_cache: NormCache) -> Self {
        self.norm_cache = norm_cache;
        self
    }

    /// Data-taking year.
    pub fn year(&self) -> Year {
        self.year
    }

    /// Whether systematic variations are retrieved.
    pub fn systematics(&self) -> bool {
        self.systematics
    }

    /// Fitted quantity.
    pub fn fit_param(&self) -> &str {
        &self.fit_param
    }

    /// Mass-region boundaries.
    pub fn mass_regions(&self) -> &MassRegions {
        &self.mass_regions
    }

    /// Canonical mass hypotheses.
    pub fn mass_points(&self) -> MassPoints {
        self.mass_points
    }

    /// Category registry.
    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    /// Observed data.
    pub fn data(&self) -> &Arc<dyn Sample> {
        &self.data
    }

    /// Background samples.
    pub fn backgrounds(&self) -> &[Arc<dyn Sample>] {
        &self.backgrounds
    }

    /// Normalization cache.
    pub fn norm_cache(&self) -> &NormCache {
        &self.norm_cache
    }

    /// Signal samples at `mass`.
    pub fn signals(&self, mass: u32, modes: ModeFilter) -> Result<Vec<Arc<dyn Sample>>> {
        self.mass_points.validate(&BTreeSet::from([mass]))?;
        self.signals.signals(mass, modes)
    }

    /// Region events are taken from in `category`.
    pub fn target_region(&self, category: &Category) -> Region {
        self.target_region.unwrap_or(category.target_region)
    }

    /// Region the QCD shape is taken from in `category`.
    pub fn qcd_shape_region(&self, category: &Category) -> Region {
        self.qcd_shape_region.unwrap_or(category.qcd_shape_region)
    }

    /// Scale factors of the data-driven backgrounds for `category`, measured
    /// in its normalization category.
    pub fn normalize(&self, category: &Category) -> Result<Normalization> {
        let norm_category = self.registry.norm_category_of(category)?;
        let fixed: Vec<Arc<dyn Sample>> =
            self.backgrounds.iter().filter(|b| b.kind() != SampleKind::DataDriven).cloned().collect();
        let mut normalization = Normalization::identity();
        for background in self.backgrounds.iter().filter(|b| b.kind() == SampleKind::DataDriven) {
            let factor = self.norm_cache.get_or_compute(&NormRequest {
                background: background.as_ref(),
                reference: self.data.as_ref(),
                fixed: &fixed,
                category: norm_category,
                region: self.target_region(norm_category),
                shape_region: self.qcd_shape_region(norm_category),
                fit_param: &self.fit_param,
            })?;
            normalization.insert(background.name(), factor);
        }
        Ok(normalization)
    }

    /// Categories of `group` (restricted to `names` when given), each with
    /// its normalization.
    pub fn iter_categories(
        &self,
        group: &str,
        names: Option<&[String]>,
    ) -> Result<Vec<(&Category, Normalization)>> {
        let categories = self.registry.group(group)?;
        if let Some(names) = names
            && let Some(missing) = names.iter().find(|n| !categories.iter().any(|c| &c.name == *n))
        {
            return Err(Error::UnknownCategory(format!("{missing} (group '{group}')")));
        }
        let mut out = Vec::new();
        for category in categories {
            if names.is_some_and(|n| !n.contains(&category.name)) {
                continue;
            }
            log::info!("{}", "=".repeat(40));
            log::info!("Category: {}", category.name);
            log::info!("{}", "=".repeat(40));
            log::info!("Cuts: {}", category.selection(self.year, self.target_region(category))?);
            out.push((category, self.normalize(category)?));
        }
        Ok(out)
    }

    /// Output-name suffix: `_{fit}fit_{qcd region}_{embedding|alpgen}[_{extra}]_{yy}`.
    pub fn suffix(&self, fit_param: &str, extra: Option<&str>) -> String {
        let qcd = self.qcd_shape_region.unwrap_or(Region::Ss);
        let mut out = format!("_{}fit_{qcd}", fit_param.to_lowercase());
        out.push_str(if self.use_embedding { "_embedding" } else { "_alpgen" });
        if let Some(extra) = extra {
            out.push('_');
            out.push_str(extra);
        }
        out.push_str(&format!("_{}", self.year % 1000));
        out
    }

    /// Aggregated values of `discriminant` in `category`.
    pub fn scores(&self, discriminant: Discriminant<'_>, category: &Category, options: &ChannelOptions) -> Result<Scores> {
        ScoreAggregator::new(&self.data, &self.backgrounds, self.signals.as_ref(), self.mass_points).aggregate(
            &ScoreRequest {
                discriminant,
                category,
                region: self.target_region(category),
                shape_region: self.qcd_shape_region(category),
                cuts: options.cuts.as_ref(),
                mass_points: &options.mass_points,
                modes: options.modes,
                unblind: options.unblind,
                systematics: self.systematics,
            },
        )
    }

    /// Classifier scores and their channels in `category`.
    pub fn clf_channels(
        &self,
        classifier: &dyn Classifier,
        category: &Category,
        options: &ChannelOptions,
    ) -> Result<(Scores, Channels)> {
        let normalization = self.normalize(category)?;
        let scores = self.scores(Discriminant::Classifier(classifier), category, options)?;
        let channels = ChannelBuilder::new(self.mass_points, &normalization).build(
            &scores,
            category,
            options.bins,
            &options.mass_points,
            options.unblind,
        )?;
        Ok((scores, channels))
    }

    /// Channels of kinematic expressions in `category`, keyed by expression.
    pub fn field_channels(
        &self,
        fields: &[&str],
        category: &Category,
        options: &ChannelOptions,
    ) -> Result<BTreeMap<String, Channels>> {
        let normalization = self.normalize(category)?;
        let mut scores = BTreeMap::new();
        for &field in fields {
            scores.insert(field.to_string(), self.scores(Discriminant::Field(field), category, options)?);
        }
        ChannelBuilder::new(self.mass_points, &normalization).build_fields(
            &scores,
            category,
            &options.mass_points,
            options.unblind,
        )
    }

    /// [`Self::clf_channels`] over several categories in parallel. A failing
    /// category does not affect the others.
    pub fn channels_for_categories(
        &self,
        classifier: &dyn Classifier,
        categories: &[&Category],
        options: &ChannelOptions,
    ) -> Vec<(String, Result<Channels>)> {
        categories
            .par_iter()
            .map(|c| (c.name.clone(), self.clf_channels(classifier, c, options).map(|(_, ch)| ch)))
            .collect()
    }
}
