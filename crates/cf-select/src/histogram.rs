//! Weighted 1D histogram.

use cf_core::{HistStyle, WeightedScores};
use serde::{Deserialize, Serialize};

use crate::binning::{uniform_edges, validate_edges};
use crate::error::{Result, SelectError};

/// A weighted 1D histogram with explicit edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Histogram name.
    pub name: String,
    /// Display attributes (label, colour, line style).
    #[serde(default)]
    pub style: HistStyle,
    /// Bin edges (length = n_bins + 1).
    pub bin_edges: Vec<f64>,
    /// Sum of weights per bin.
    pub bin_content: Vec<f64>,
    /// Sum of weights squared per bin.
    pub sumw2: Vec<f64>,
    /// Sum of weights below the first edge.
    pub underflow: f64,
    /// Sum of weights at or above the last edge.
    pub overflow: f64,
    /// Number of in-range fills.
    pub entries: u64,
}

impl Histogram {
    /// Empty histogram on validated `bin_edges`.
    pub fn new(name: impl Into<String>, bin_edges: Vec<f64>) -> Result<Self> {
        validate_edges(&bin_edges)?;
        let n = bin_edges.len() - 1;
        Ok(Self {
            name: name.into(),
            style: HistStyle::default(),
            bin_edges,
            bin_content: vec![0.0; n],
            sumw2: vec![0.0; n],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
        })
    }

    /// Empty histogram with `n_bins` equal-width bins over `[low, high]`.
    pub fn uniform(name: impl Into<String>, n_bins: usize, low: f64, high: f64) -> Result<Self> {
        Histogram::new(name, uniform_edges(n_bins, low, high)?)
    }

    /// Attach display attributes.
    pub fn with_style(mut self, style: HistStyle) -> Self {
        self.style = style;
        self
    }

    /// Same binning and style, zero content, new name.
    pub fn empty_like(&self, name: impl Into<String>) -> Self {
        let n = self.n_bins();
        Self {
            name: name.into(),
            style: self.style.clone(),
            bin_edges: self.bin_edges.clone(),
            bin_content: vec![0.0; n],
            sumw2: vec![0.0; n],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
        }
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.bin_content.len()
    }

    /// Bin index of `val`, `None` for under/overflow.
    pub fn find_bin(&self, val: f64) -> Option<usize> {
        let edges = &self.bin_edges;
        if val.is_nan() || val < edges[0] || val >= edges[edges.len() - 1] {
            return None;
        }
        // First edge strictly greater than `val`, minus one.
        let upper = edges.partition_point(|&e| e <= val);
        Some(upper - 1)
    }

    /// Add one weighted entry, dropping out-of-range values into under/overflow.
    pub fn fill(&mut self, val: f64, weight: f64) {
        let Some(bin) = self.find_bin(val) else {
            if val < self.bin_edges[0] {
                self.underflow += weight;
            } else if !val.is_nan() {
                self.overflow += weight;
            }
            return;
        };
        self.bin_content[bin] += weight;
        self.sumw2[bin] += weight * weight;
        self.entries += 1;
    }

    /// Fill from parallel score/weight arrays; values `>= max_value` are skipped.
    pub fn fill_weighted(&mut self, scores: &WeightedScores, max_value: Option<f64>) -> Result<()> {
        if scores.scores.len() != scores.weights.len() {
            return Err(SelectError::HistogramFill(format!(
                "'{}': {} scores but {} weights",
                self.name,
                scores.scores.len(),
                scores.weights.len()
            )));
        }
        for (&s, &w) in scores.scores.iter().zip(&scores.weights) {
            if max_value.is_some_and(|m| s >= m) {
                continue;
            }
            self.fill(s, w);
        }
        Ok(())
    }

    /// Sum of in-range bin contents.
    pub fn integral(&self) -> f64 {
        self.bin_content.iter().sum()
    }

    /// Bin-wise sum; binnings must match exactly.
    pub fn add(&mut self, other: &Histogram) -> Result<()> {
        if self.bin_edges != other.bin_edges {
            return Err(SelectError::HistogramFill(format!(
                "cannot add '{}' to '{}': bin edges differ",
                other.name, self.name
            )));
        }
        for (a, b) in self.bin_content.iter_mut().zip(&other.bin_content) {
            *a += b;
        }
        for (a, b) in self.sumw2.iter_mut().zip(&other.sumw2) {
            *a += b;
        }
        self.underflow += other.underflow;
        self.overflow += other.overflow;
        self.entries += other.entries;
        Ok(())
    }

    /// Multiply contents by `factor` (sumw2 by `factor^2`).
    pub fn scale(&mut self, factor: f64) {
        for c in &mut self.bin_content {
            *c *= factor;
        }
        for s in &mut self.sumw2 {
            *s *= factor * factor;
        }
        self.underflow *= factor;
        self.overflow *= factor;
    }

    /// Per-bin statistical uncertainty, `sqrt(sumw2)`.
    pub fn errors(&self) -> Vec<f64> {
        self.sumw2.iter().map(|s| s.sqrt()).collect()
    }
}
