//! Common data types for catflow

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Data-taking epoch (e.g. 2011, 2012).
pub type Year = u32;

/// Name of the nominal systematic variation.
pub const NOMINAL: &str = "NOMINAL";

/// Per-event discriminant values with their event weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedScores {
    /// Discriminant value per selected event.
    pub scores: Vec<f64>,
    /// Event weight per selected event (same length as `scores`).
    pub weights: Vec<f64>,
}

impl WeightedScores {
    /// Create from parallel arrays.
    pub fn new(scores: Vec<f64>, weights: Vec<f64>) -> Self {
        Self { scores, weights }
    }

    /// Unit weights for every score.
    pub fn unweighted(scores: Vec<f64>) -> Self {
        let weights = vec![1.0; scores.len()];
        Self { scores, weights }
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether no event was selected.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// `(min, max)` of the scores, `None` when empty.
    pub fn range(&self) -> Option<(f64, f64)> {
        let mut it = self.scores.iter().copied();
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), s| (lo.min(s), hi.max(s))))
    }

    /// Sum of weights.
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Append another set of events (merge of disjoint samples).
    pub fn extend(&mut self, other: &WeightedScores) {
        self.scores.extend_from_slice(&other.scores);
        self.weights.extend_from_slice(&other.weights);
    }

    /// Multiply every weight by `factor`.
    pub fn scale_weights(&mut self, factor: f64) {
        for w in &mut self.weights {
            *w *= factor;
        }
    }
}

/// Scores keyed by systematic variation name (always contains [`NOMINAL`]
/// when produced by a sample).
pub type SystematicScores = BTreeMap<String, WeightedScores>;

/// Display attributes forwarded to histogram consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistStyle {
    /// Legend label.
    #[serde(default)]
    pub label: String,
    /// Line/fill colour name or hex code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Line width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linewidth: Option<u32>,
    /// Line style (`solid`, `dashed`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linestyle: Option<String>,
}

impl HistStyle {
    /// Style with only a label.
    pub fn labelled(label: impl Into<String>) -> Self {
        Self { label: label.into(), ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_ignores_nothing_and_handles_empty() {
        let s = WeightedScores::unweighted(vec![0.3, -1.0, 2.5]);
        assert_eq!(s.range(), Some((-1.0, 2.5)));
        assert_eq!(WeightedScores::default().range(), None);
    }

    #[test]
    fn extend_concatenates() {
        let mut a = WeightedScores::new(vec![1.0], vec![0.5]);
        a.extend(&WeightedScores::new(vec![2.0, 3.0], vec![1.0, 2.0]));
        assert_eq!(a.len(), 3);
        assert_eq!(a.total_weight(), 3.5);
    }
}
