//! Histogram binning.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SelectError};

/// Legacy "effectively infinite" last edge used by explicit mass-fit binnings.
pub const OVERFLOW_SENTINEL: f64 = 1e100;

/// Either a bin count over a data-driven range or explicit edges.
///
/// Deserializes from `12` or `[0, 64, 80, 1e100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Binning {
    /// `n` equal-width bins over the range supplied at resolution time.
    Constant(usize),
    /// Explicit ascending edges; the last may be `+inf` or [`OVERFLOW_SENTINEL`].
    Edges(Vec<f64>),
}

impl Binning {
    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        match self {
            Binning::Constant(n) => *n,
            Binning::Edges(e) => e.len().saturating_sub(1),
        }
    }

    /// Check the binning without a range.
    pub fn validate(&self) -> Result<()> {
        match self {
            Binning::Constant(0) => {
                Err(SelectError::InvalidBinning("constant binning needs at least one bin".into()))
            }
            Binning::Constant(_) => Ok(()),
            Binning::Edges(e) => validate_edges(e),
        }
    }

    /// Edge list: equal-width over `[low, high]` for [`Binning::Constant`],
    /// the validated explicit edges (sentinel mapped to `+inf`) otherwise.
    pub fn resolve(&self, low: f64, high: f64) -> Result<Vec<f64>> {
        match self {
            Binning::Constant(n) => uniform_edges(*n, low, high),
            Binning::Edges(e) => {
                validate_edges(e)?;
                Ok(e.iter().map(|&x| if x >= OVERFLOW_SENTINEL { f64::INFINITY } else { x }).collect())
            }
        }
    }
}

impl From<usize> for Binning {
    fn from(n: usize) -> Self {
        Binning::Constant(n)
    }
}

impl From<Vec<f64>> for Binning {
    fn from(edges: Vec<f64>) -> Self {
        Binning::Edges(edges)
    }
}

/// `n` equal-width bins spanning `[low, high]`.
pub fn uniform_edges(n: usize, low: f64, high: f64) -> Result<Vec<f64>> {
    if n == 0 {
        return Err(SelectError::InvalidBinning("constant binning needs at least one bin".into()));
    }
    if !(low.is_finite() && high.is_finite()) || high <= low {
        return Err(SelectError::InvalidBinning(format!(
            "invalid range [{low}, {high}] for {n} bins"
        )));
    }
    let width = (high - low) / n as f64;
    let mut edges: Vec<f64> = (0..n).map(|i| low + width * i as f64).collect();
    edges.push(high);
    Ok(edges)
}

/// At least two edges, strictly ascending, finite except a trailing overflow edge.
pub fn validate_edges(edges: &[f64]) -> Result<()> {
    if edges.len() < 2 {
        return Err(SelectError::InvalidBinning(format!(
            "need at least 2 bin edges, got {}",
            edges.len()
        )));
    }
    let last = edges.len() - 1;
    for (i, &e) in edges.iter().enumerate() {
        let open_end = i == last && (e == f64::INFINITY || e >= OVERFLOW_SENTINEL);
        if !e.is_finite() && !open_end {
            return Err(SelectError::InvalidBinning(format!("edge {i} is not finite: {e}")));
        }
    }
    if let Some(i) = edges.windows(2).position(|w| w[1] <= w[0]) {
        return Err(SelectError::InvalidBinning(format!(
            "bin edges must be strictly ascending: edge {} ({}) <= edge {} ({})",
            i + 1,
            edges[i + 1],
            i,
            edges[i]
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn constant_resolves_to_uniform_edges() {
        let e = Binning::Constant(4).resolve(0.0, 2.0).unwrap();
        assert_eq!(e.len(), 5);
        assert_relative_eq!(e[1], 0.5);
        assert_eq!(*e.last().unwrap(), 2.0);
    }

    #[test]
    fn explicit_edges_map_sentinel_to_infinity() {
        let b = Binning::Edges(vec![0.0, 64.0, 80.0, OVERFLOW_SENTINEL]);
        assert_eq!(b.n_bins(), 3);
        let e = b.resolve(0.0, 1.0).unwrap();
        assert_eq!(e, vec![0.0, 64.0, 80.0, f64::INFINITY]);
    }

    #[test]
    fn rejects_malformed_edges() {
        assert!(validate_edges(&[1.0]).is_err());
        assert!(validate_edges(&[0.0, 2.0, 1.0]).is_err());
        assert!(validate_edges(&[0.0, 1.0, 1.0]).is_err());
        assert!(validate_edges(&[0.0, f64::INFINITY, 5.0]).is_err());
        assert!(validate_edges(&[f64::NAN, 1.0]).is_err());
        assert!(Binning::Constant(0).validate().is_err());
        assert!(uniform_edges(3, 1.0, 1.0).is_err());
    }

    #[test]
    fn deserializes_both_forms() {
        let n: Binning = serde_json::from_str("12").unwrap();
        assert_eq!(n, Binning::Constant(12));
        let e: Binning = serde_json::from_str("[0, 64, 1e100]").unwrap();
        assert_eq!(e, Binning::Edges(vec![0.0, 64.0, 1e100]));
    }
}
