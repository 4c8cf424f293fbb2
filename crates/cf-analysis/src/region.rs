//! Charge/track regions and invariant-mass regions.

use std::fmt;
use std::str::FromStr;

use cf_core::{Error, Result};
use cf_select::Cut;
use serde::{Deserialize, Serialize};

/// Reconstructed di-tau mass branch.
pub const MASS_BRANCH: &str = "mass_mmc_tau1_tau2";
/// Below this mass the reconstruction is considered to have failed (GeV).
pub const BAD_MASS: f64 = 80.0;
/// Default lower signal-region boundary (GeV).
pub const DEFAULT_LOW_MASS: f64 = 110.0;
/// Default upper signal-region boundary (GeV).
pub const DEFAULT_HIGH_MASS: f64 = 180.0;

const OS: &str = "tau1_charge * tau2_charge == -1";
const SS: &str = "tau1_charge * tau2_charge == 1";
const NOT_OS: &str = "tau1_charge * tau2_charge != -1";
const TRACKS: &str = "(tau1_numTrack == 1 || tau1_numTrack == 3) && (tau2_numTrack == 1 || tau2_numTrack == 3)";

/// Orthogonal selection used to separate the nominal analysis region from
/// data-driven background shape regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    /// Opposite-sign tau pair.
    #[serde(rename = "OS")]
    Os,
    /// Same-sign tau pair.
    #[serde(rename = "SS")]
    Ss,
    /// Anything but opposite sign.
    #[serde(rename = "nOS")]
    NotOs,
    /// Opposite sign with 1 or 3 tracks per tau.
    #[serde(rename = "OS_TRK")]
    OsTrk,
    /// Same sign with 1 or 3 tracks per tau.
    #[serde(rename = "SS_TRK")]
    SsTrk,
    /// Not opposite sign with 1 or 3 tracks per tau.
    #[serde(rename = "nOS_TRK")]
    NotOsTrk,
    /// No charge/track requirement.
    #[serde(rename = "ALL")]
    All,
}

impl Region {
    /// Every region, in declaration order.
    pub const ALL_REGIONS: [Region; 7] = [
        Region::Os,
        Region::Ss,
        Region::NotOs,
        Region::OsTrk,
        Region::SsTrk,
        Region::NotOsTrk,
        Region::All,
    ];

    /// Short identifier (`OS`, `nOS`, `OS_TRK`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Os => "OS",
            Region::Ss => "SS",
            Region::NotOs => "nOS",
            Region::OsTrk => "OS_TRK",
            Region::SsTrk => "SS_TRK",
            Region::NotOsTrk => "nOS_TRK",
            Region::All => "ALL",
        }
    }

    /// Selection for this region.
    pub fn cut(&self) -> Cut {
        let tracks = Cut::new(TRACKS);
        match self {
            Region::Os => Cut::new(OS),
            Region::Ss => Cut::new(SS),
            Region::NotOs => Cut::new(NOT_OS),
            Region::OsTrk => Cut::new(OS).and(&tracks),
            Region::SsTrk => Cut::new(SS).and(&tracks),
            Region::NotOsTrk => Cut::new(NOT_OS).and(&tracks),
            Region::All => Cut::all(),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Region::ALL_REGIONS
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| Error::Config(format!("unknown region '{s}'")))
    }
}

/// Control, signal and training selections derived from one mass boundary pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MassRegions {
    low: f64,
    high: f64,
    high_sideband_in_control: bool,
    control: Cut,
    signal: Cut,
    train: Cut,
}

impl MassRegions {
    /// Control region is `mass < low` (plus `mass > high` with the high sideband),
    /// signal region its complement, training region everything.
    pub fn new(low: f64, high: f64, high_sideband_in_control: bool) -> Result<Self> {
        if !(low > BAD_MASS) {
            return Err(Error::InvalidMassRegion(format!(
                "low boundary {low} must exceed the mass reconstruction floor {BAD_MASS}"
            )));
        }
        let mut control = Cut::new(format!("{MASS_BRANCH} < {low}"));
        if high_sideband_in_control {
            if !(high > low) {
                return Err(Error::InvalidMassRegion(format!(
                    "high boundary {high} must exceed low boundary {low}"
                )));
            }
            control |= &Cut::new(format!("{MASS_BRANCH} > {high}"));
        }
        let signal = control.negate();
        Ok(Self { low, high, high_sideband_in_control, control, signal, train: Cut::all() })
    }

    /// Lower boundary.
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Upper boundary (only used with the high sideband).
    pub fn high(&self) -> f64 {
        self.high
    }

    /// Whether the high sideband belongs to the control region.
    pub fn high_sideband_in_control(&self) -> bool {
        self.high_sideband_in_control
    }

    /// Sidebands.
    pub fn control_region(&self) -> Cut {
        self.control.clone()
    }

    /// Exact complement of the control region.
    pub fn signal_region(&self) -> Cut {
        self.signal.clone()
    }

    /// Classifier training pools signal and control regions.
    pub fn train_region(&self) -> Cut {
        self.train.clone()
    }
}

impl Default for MassRegions {
    fn default() -> Self {
        Self::new(DEFAULT_LOW_MASS, DEFAULT_HIGH_MASS, false)
            .unwrap_or_else(|_| unreachable!("default mass boundaries are valid"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_select::EventTable;
    use proptest::prelude::*;

    fn masses(values: Vec<f64>) -> EventTable {
        EventTable::new().with_column(MASS_BRANCH, values).unwrap()
    }

    #[test]
    fn control_and_signal_split_at_low_boundary() {
        let r = MassRegions::new(110.0, 180.0, false).unwrap();
        let t = masses(vec![100.0, 150.0]);
        assert_eq!(t.mask(&r.control_region()).unwrap(), vec![true, false]);
        assert_eq!(t.mask(&r.signal_region()).unwrap(), vec![false, true]);
        assert!(r.train_region().is_all());
    }

    #[test]
    fn high_sideband_extends_control_region() {
        let r = MassRegions::new(110.0, 180.0, true).unwrap();
        let t = masses(vec![100.0, 150.0, 200.0]);
        assert_eq!(t.mask(&r.control_region()).unwrap(), vec![true, false, true]);
        assert_eq!(t.mask(&r.signal_region()).unwrap(), vec![false, true, false]);
    }

    #[test]
    fn boundaries_are_validated() {
        assert!(MassRegions::new(100.0, 180.0, false).is_ok());
        let err = MassRegions::new(80.0, 180.0, false).unwrap_err();
        assert!(err.is_config());
        assert!(MassRegions::new(120.0, 110.0, true).is_err());
        // the high boundary is irrelevant without the sideband
        assert!(MassRegions::new(120.0, 110.0, false).is_ok());
    }

    #[test]
    fn accessors_return_independent_copies() {
        let r = MassRegions::default();
        let mut c = r.control_region();
        c &= &Cut::new("MET > 20000");
        assert_eq!(r.control_region().serialize(), "mass_mmc_tau1_tau2 < 110");
        assert_eq!(r.signal_region(), r.control_region().negate());
    }

    #[test]
    fn region_names_round_trip() {
        for r in Region::ALL_REGIONS {
            assert_eq!(r.as_str().parse::<Region>().unwrap(), r);
        }
        let json = serde_json::to_string(&Region::NotOs).unwrap();
        assert_eq!(json, "\"nOS\"");
        assert!("XS".parse::<Region>().is_err());
    }

    #[test]
    fn same_sign_and_opposite_sign_are_disjoint() {
        let t = EventTable::new()
            .with_column("tau1_charge", vec![1.0, 1.0, -1.0, -1.0])
            .unwrap()
            .with_column("tau2_charge", vec![1.0, -1.0, 1.0, -1.0])
            .unwrap();
        let os = t.mask(&Region::Os.cut()).unwrap();
        let ss = t.mask(&Region::Ss.cut()).unwrap();
        let nos = t.mask(&Region::NotOs.cut()).unwrap();
        assert_eq!(os, vec![false, true, true, false]);
        assert_eq!(ss, vec![true, false, false, true]);
        assert_eq!(nos, ss);
    }

    proptest! {
        #[test]
        fn prop_signal_is_complement_of_control(
            low in 81.0f64..150.0,
            width in 1.0f64..100.0,
            sideband in any::<bool>(),
            m in prop::collection::vec(0.0f64..300.0, 1..40),
        ) {
            let r = MassRegions::new(low, low + width, sideband).unwrap();
            let t = masses(m);
            let control = t.mask(&r.control_region()).unwrap();
            let signal = t.mask(&r.signal_region()).unwrap();
            for (c, s) in control.iter().zip(&signal) {
                prop_assert_ne!(c, s);
            }
        }
    }
}
