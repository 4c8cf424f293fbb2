//! Efficiency-based score thresholds (blinding boundaries).

use crate::error::{Result, SelectError};
use crate::histogram::Histogram;

/// Highest bin edge `t` such that the content of `hist` in bins at or above `t`
/// is at least `efficiency` of the total.
///
/// Edges separated only by empty bins retain the same fraction; among those the
/// lowest edge is returned. A histogram with non-positive integral yields the
/// first edge (nothing below it).
pub fn efficiency_cut(hist: &Histogram, efficiency: f64) -> Result<f64> {
    if !(efficiency > 0.0 && efficiency <= 1.0) {
        return Err(SelectError::InvalidEfficiency(efficiency));
    }

    let n = hist.n_bins();
    // above[i] = content of bins i..n
    let mut above = vec![0.0f64; n + 1];
    for i in (0..n).rev() {
        above[i] = above[i + 1] + hist.bin_content[i];
    }
    let total = above[0];
    if total <= 0.0 {
        log::warn!(
            "'{}' has non-positive integral ({total}); efficiency cut at the first edge",
            hist.name
        );
        return Ok(hist.bin_edges[0]);
    }

    let target = efficiency * total;
    let mut cut = (0..n).rev().find(|&i| above[i] >= target).unwrap_or(0);
    while cut > 0 && hist.bin_content[cut - 1] == 0.0 {
        cut -= 1;
    }
    Ok(hist.bin_edges[cut])
}
