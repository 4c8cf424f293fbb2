//! Normalization of data-driven backgrounds.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use cf_core::{Error, Result};

use crate::category::Category;
use crate::region::Region;
use crate::sample::{Sample, SampleQuery};

/// Inputs of one normalization.
#[derive(Clone, Copy)]
pub struct NormRequest<'a> {
    /// Sample being normalized.
    pub background: &'a dyn Sample,
    /// Observed data.
    pub reference: &'a dyn Sample,
    /// Backgrounds with fixed normalization, subtracted from the reference.
    pub fixed: &'a [Arc<dyn Sample>],
    /// Normalization category.
    pub category: &'a Category,
    /// Region in which yields are compared.
    pub region: Region,
    /// Region the background yield is taken from.
    pub shape_region: Region,
    /// Name of the fitted quantity (part of the cache key).
    pub fit_param: &'a str,
}

/// Computes a scale factor for a data-driven background.
pub trait Normalizer: Send + Sync {
    /// Scale factor for `request.background`.
    fn compute(&self, request: &NormRequest<'_>) -> Result<f64>;
}

/// Scales the background so that it fills the data excess over the fixed
/// backgrounds: `(data - sum(fixed)) / background`. The background yield is
/// measured in the shape region, the others in the target region.
#[derive(Debug, Clone, Copy, Default)]
pub struct YieldRatioNormalizer;

impl Normalizer for YieldRatioNormalizer {
    fn compute(&self, request: &NormRequest<'_>) -> Result<f64> {
        let query = SampleQuery::new(request.category, request.region);
        let data = request.reference.total_weight(&query)?;
        let mut fixed = 0.0;
        for s in request.fixed {
            fixed += s.total_weight(&query)?;
        }
        let shape_query = SampleQuery::new(request.category, request.shape_region);
        let yield_bkg = request.background.total_weight(&shape_query)?;
        if !(yield_bkg > 0.0) {
            return Err(Error::Sample {
                sample: request.background.name().to_string(),
                message: format!(
                    "cannot normalize with non-positive yield {yield_bkg} in '{}' {}",
                    request.category.name, request.shape_region
                ),
            });
        }
        let factor = (data - fixed) / yield_bkg;
        if factor < 0.0 {
            log::warn!(
                "negative normalization {factor:.4} for '{}' in '{}' (data {data}, fixed {fixed})",
                request.background.name(),
                request.category.name
            );
        }
        Ok(factor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NormKey {
    sample: String,
    category: String,
    fit_param: String,
}

type Slot = Arc<Mutex<Option<f64>>>;

/// Memoizing wrapper: each (sample, category, fit parameter) is computed at most once.
pub struct NormCache {
    normalizer: Box<dyn Normalizer>,
    slots: Mutex<HashMap<NormKey, Slot>>,
}

impl NormCache {
    /// Wrap `normalizer`.
    pub fn new(normalizer: Box<dyn Normalizer>) -> Self {
        Self { normalizer, slots: Mutex::new(HashMap::new()) }
    }

    /// Cached factor, computing it on first use.
    ///
    /// Callers for the same key wait on that key's slot; distinct keys
    /// compute concurrently. A failed computation leaves the slot empty.
    pub fn get_or_compute(&self, request: &NormRequest<'_>) -> Result<f64> {
        let key = NormKey {
            sample: request.background.name().to_string(),
            category: request.category.name.clone(),
            fit_param: request.fit_param.to_string(),
        };
        let slot = Arc::clone(
            self.slots.lock().unwrap_or_else(PoisonError::into_inner).entry(key.clone()).or_default(),
        );
        let mut factor = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(f) = *factor {
            return Ok(f);
        }
        let f = self.normalizer.compute(request)?;
        log::info!(
            "normalization of '{}' in '{}' ({} fit): {f:.4}",
            key.sample,
            key.category,
            key.fit_param
        );
        *factor = Some(f);
        Ok(f)
    }

    /// Number of cached factors.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.lock().unwrap_or_else(PoisonError::into_inner).values().cloned().collect();
        slots.iter().filter(|s| s.lock().unwrap_or_else(PoisonError::into_inner).is_some()).count()
    }

    /// Whether nothing was computed yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NormCache {
    fn default() -> Self {
        Self::new(Box::new(YieldRatioNormalizer))
    }
}

/// Scale factors per sample name for one category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalization {
    factors: BTreeMap<String, f64>,
}

impl Normalization {
    /// No rescaling.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Set the factor of `sample`.
    pub fn insert(&mut self, sample: impl Into<String>, factor: f64) {
        self.factors.insert(sample.into(), factor);
    }

    /// Factor of `sample`, 1 if not normalized.
    pub fn factor(&self, sample: &str) -> f64 {
        self.factors.get(sample).copied().unwrap_or(1.0)
    }

    /// Normalized samples and their factors.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.factors.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
