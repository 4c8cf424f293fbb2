//! Higgs mass hypotheses and production modes.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use cf_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Mass hypothesis used for blinding and as the default signal (GeV).
pub const NOMINAL_MASS: u32 = 125;

/// Ordered, versioned list of mass hypotheses (GeV).
///
/// Channel construction always iterates in this order, whatever order the
/// caller requested masses in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MassPoints {
    /// Identifier of this list.
    pub version: &'static str,
    points: &'static [u32],
}

/// 100 to 150 GeV in 5 GeV steps.
pub const HH_MASS_POINTS: MassPoints = MassPoints {
    version: "hh-2013",
    points: &[100, 105, 110, 115, 120, 125, 130, 135, 140, 145, 150],
};

impl MassPoints {
    /// Custom list; `points` must be strictly ascending.
    pub fn new(version: &'static str, points: &'static [u32]) -> Result<Self> {
        if points.is_empty() || points.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::Config(format!(
                "mass point list '{version}' must be non-empty and strictly ascending"
            )));
        }
        Ok(Self { version, points })
    }

    /// Masses in canonical order.
    pub fn points(&self) -> &'static [u32] {
        self.points
    }

    /// Whether `mass` is part of the list.
    pub fn contains(&self, mass: u32) -> bool {
        self.points.binary_search(&mass).is_ok()
    }

    /// Reject masses outside the list.
    pub fn validate(&self, requested: &BTreeSet<u32>) -> Result<()> {
        match requested.iter().find(|m| !self.contains(**m)) {
            Some(&m) => Err(Error::UnknownMassPoint(m)),
            None => Ok(()),
        }
    }

    /// The requested masses, validated, in canonical order.
    pub fn select(&self, requested: &BTreeSet<u32>) -> Result<Vec<u32>> {
        self.validate(requested)?;
        Ok(self.points.iter().copied().filter(|m| requested.contains(m)).collect())
    }
}

impl Default for MassPoints {
    fn default() -> Self {
        HH_MASS_POINTS
    }
}

/// Higgs production mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductionMode {
    /// Gluon fusion.
    Ggf,
    /// Vector boson fusion.
    Vbf,
    /// Associated production with a Z.
    Zh,
    /// Associated production with a W.
    Wh,
}

impl ProductionMode {
    /// Every mode.
    pub const ALL: [ProductionMode; 4] =
        [ProductionMode::Ggf, ProductionMode::Vbf, ProductionMode::Zh, ProductionMode::Wh];

    /// Lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionMode::Ggf => "ggf",
            ProductionMode::Vbf => "vbf",
            ProductionMode::Zh => "zh",
            ProductionMode::Wh => "wh",
        }
    }
}

impl fmt::Display for ProductionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ProductionMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s.to_ascii_lowercase())
            .ok_or_else(|| Error::Config(format!("unknown production mode '{s}'")))
    }
}

/// Default signal grouping: ggF and VBF separately, VH merged.
pub const MODES_COMBINED: &[&[ProductionMode]] = &[
    &[ProductionMode::Ggf],
    &[ProductionMode::Vbf],
    &[ProductionMode::Zh, ProductionMode::Wh],
];

/// Which signal samples a mass hypothesis contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeFilter {
    /// One sample per [`MODES_COMBINED`] group.
    #[default]
    Grouped,
    /// A single sample merging every mode.
    Combined,
    /// Only the given mode.
    Single(ProductionMode),
}

impl ModeFilter {
    /// Mode groups, each yielding one signal sample.
    pub fn groups(&self) -> Vec<Vec<ProductionMode>> {
        match self {
            ModeFilter::Grouped => MODES_COMBINED.iter().map(|g| g.to_vec()).collect(),
            ModeFilter::Combined => vec![ProductionMode::ALL.to_vec()],
            ModeFilter::Single(m) => vec![vec![*m]],
        }
    }
}

impl FromStr for ModeFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "grouped" | "" => Ok(ModeFilter::Grouped),
            "combined" => Ok(ModeFilter::Combined),
            other => other.parse().map(ModeFilter::Single),
        }
    }
}
