//! Collecting discriminant values for every sample of a category.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use cf_core::{Error, NOMINAL, Result, SystematicScores, WeightedScores};
use cf_select::Cut;
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::mass::{MassPoints, ModeFilter};
use crate::region::Region;
use crate::sample::{Discriminant, Sample, SampleKind, SampleQuery, SignalProvider};

/// Added below the minimum and above the maximum observed value so every
/// value falls strictly inside the histogram range.
pub const SCORE_PADDING: f64 = 1e-5;

/// Data unblinding mode.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "UnblindRepr", into = "UnblindRepr")]
pub enum Unblind {
    /// No data.
    #[default]
    Blind,
    /// All data.
    Full,
    /// Data below the score retaining this fraction of the nominal signal.
    Efficiency(f64),
}

impl Unblind {
    /// Whether data is retrieved at all.
    pub fn includes_data(&self) -> bool {
        !matches!(self, Unblind::Blind)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum UnblindRepr {
    Flag(bool),
    Efficiency(f64),
}

impl TryFrom<UnblindRepr> for Unblind {
    type Error = String;

    fn try_from(r: UnblindRepr) -> std::result::Result<Self, String> {
        match r {
            UnblindRepr::Flag(false) => Ok(Unblind::Blind),
            UnblindRepr::Flag(true) => Ok(Unblind::Full),
            UnblindRepr::Efficiency(e) if e > 0.0 && e <= 1.0 => Ok(Unblind::Efficiency(e)),
            UnblindRepr::Efficiency(e) => Err(format!("unblind efficiency must be in (0, 1], got {e}")),
        }
    }
}

impl From<Unblind> for UnblindRepr {
    fn from(u: Unblind) -> Self {
        match u {
            Unblind::Blind => UnblindRepr::Flag(false),
            Unblind::Full => UnblindRepr::Flag(true),
            Unblind::Efficiency(e) => UnblindRepr::Efficiency(e),
        }
    }
}

/// A sample and its per-variation values.
pub type SampleScores = (Arc<dyn Sample>, SystematicScores);

/// Values of every sample in one category, with the range shared by all histograms.
#[derive(Clone)]
pub struct Scores {
    /// Observed data sample.
    pub data: Arc<dyn Sample>,
    /// Data values; `None` when blinded.
    pub data_scores: Option<WeightedScores>,
    /// Background samples in configuration order.
    pub bkg_scores: Vec<SampleScores>,
    /// Signal samples per requested mass.
    pub all_sig_scores: BTreeMap<u32, Vec<SampleScores>>,
    /// Padded lower end of all non-empty values.
    pub min_score: f64,
    /// Padded upper end of all non-empty values.
    pub max_score: f64,
}

/// What to aggregate.
#[derive(Debug, Clone, Copy)]
pub struct ScoreRequest<'a> {
    /// Classifier or field.
    pub discriminant: Discriminant<'a>,
    /// Category to select.
    pub category: &'a Category,
    /// Charge/track region.
    pub region: Region,
    /// Region data-driven backgrounds are taken from.
    pub shape_region: Region,
    /// Extra cuts.
    pub cuts: Option<&'a Cut>,
    /// Signal masses; empty for background only.
    pub mass_points: &'a BTreeSet<u32>,
    /// Signal grouping.
    pub modes: ModeFilter,
    /// Data unblinding.
    pub unblind: Unblind,
    /// Retrieve systematic variations.
    pub systematics: bool,
}

#[derive(Debug, Clone, Copy)]
struct Range {
    lo: f64,
    hi: f64,
}

impl Range {
    fn empty() -> Self {
        Self { lo: f64::INFINITY, hi: f64::NEG_INFINITY }
    }

    fn include(&mut self, scores: &WeightedScores) {
        if let Some((lo, hi)) = scores.range() {
            self.lo = self.lo.min(lo);
            self.hi = self.hi.max(hi);
        }
    }

    fn padded(&self) -> Option<(f64, f64)> {
        (self.lo <= self.hi).then(|| (self.lo - SCORE_PADDING, self.hi + SCORE_PADDING))
    }
}

/// Gathers data, background and signal values for one category.
pub struct ScoreAggregator<'a> {
    data: &'a Arc<dyn Sample>,
    backgrounds: &'a [Arc<dyn Sample>],
    signals: &'a dyn SignalProvider,
    mass_points: MassPoints,
}

impl<'a> ScoreAggregator<'a> {
    /// Aggregator over the given samples.
    pub fn new(
        data: &'a Arc<dyn Sample>,
        backgrounds: &'a [Arc<dyn Sample>],
        signals: &'a dyn SignalProvider,
        mass_points: MassPoints,
    ) -> Self {
        Self { data, backgrounds, signals, mass_points }
    }

    /// Collect values and the shared padded range.
    ///
    /// Requested masses are validated against the canonical list and the
    /// signal provider before any sample is read. Empty variations do not
    /// contribute to the range; systematic ones are dropped.
    pub fn aggregate(&self, request: &ScoreRequest<'_>) -> Result<Scores> {
        let masses = self.mass_points.select(request.mass_points)?;
        let available = self.signals.masses();
        if let Some(&m) = masses.iter().find(|m| !available.contains(m)) {
            return Err(Error::UnknownMassPoint(m));
        }

        log::info!(
            "getting {} in '{}' {}",
            request.discriminant.describe(),
            request.category.name,
            request.region
        );
        let query = SampleQuery::new(request.category, request.region).cuts(request.cuts);
        let shape_query = SampleQuery::new(request.category, request.shape_region).cuts(request.cuts);
        let mut range = Range::empty();

        let data_scores = if request.unblind.includes_data() {
            let mut values = self.data.values(request.discriminant, &query, &[])?;
            let nominal = values.remove(NOMINAL).unwrap_or_default();
            range.include(&nominal);
            Some(nominal)
        } else {
            None
        };

        let bkg_scores = self
            .backgrounds
            .iter()
            .map(|b| {
                let query = if b.kind() == SampleKind::DataDriven { &shape_query } else { &query };
                self.sample_scores(b, request, query, &mut range)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut all_sig_scores = BTreeMap::new();
        for mass in masses {
            let signals = self.signals.signals(mass, request.modes)?;
            let scores = signals
                .iter()
                .map(|s| self.sample_scores(s, request, &query, &mut range))
                .collect::<Result<Vec<_>>>()?;
            all_sig_scores.insert(mass, scores);
        }

        let (min_score, max_score) = range.padded().ok_or_else(|| {
            Error::Validation(format!(
                "no events selected for {} in '{}' {}",
                request.discriminant.describe(),
                request.category.name,
                request.region
            ))
        })?;
        log::info!("min score: {min_score} max score: {max_score}");
        Ok(Scores { data: Arc::clone(self.data), data_scores, bkg_scores, all_sig_scores, min_score, max_score })
    }

    fn sample_scores(
        &self,
        sample: &Arc<dyn Sample>,
        request: &ScoreRequest<'_>,
        query: &SampleQuery<'_>,
        range: &mut Range,
    ) -> Result<SampleScores> {
        let systematics: &[String] = if request.systematics { sample.workspace_systematics() } else { &[] };
        let mut values = sample.values(request.discriminant, query, systematics)?;
        values.retain(|variation, scores| {
            if scores.is_empty() {
                log::debug!("'{}' {variation}: no events selected", sample.name());
                return variation == NOMINAL;
            }
            range.include(scores);
            true
        });
        Ok((Arc::clone(sample), values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mass::{HH_MASS_POINTS, ProductionMode};
    use crate::source::{ExprClassifier, TableSample, TableSignals};
    use approx::assert_relative_eq;
    use cf_select::EventTable;

    fn charged(scores: Vec<f64>, tau2_charge: f64) -> EventTable {
        let n = scores.len();
        EventTable::new()
            .with_column("score", scores)
            .unwrap()
            .with_column("tau1_charge", vec![1.0; n])
            .unwrap()
            .with_column("tau2_charge", vec![tau2_charge; n])
            .unwrap()
    }

    fn table(scores: Vec<f64>) -> EventTable {
        charged(scores, -1.0)
    }

    fn sample(name: &str, kind: SampleKind, scores: Vec<f64>) -> Arc<dyn Sample> {
        Arc::new(TableSample::new(name, kind, 2012, table(scores)))
    }

    fn same_sign(name: &str, kind: SampleKind, scores: Vec<f64>) -> Arc<dyn Sample> {
        Arc::new(TableSample::new(name, kind, 2012, charged(scores, 1.0)))
    }

    fn category() -> Category {
        Category::new("vbf", Cut::all()).year_cut(2012, Cut::all())
    }

    struct Fixture {
        data: Arc<dyn Sample>,
        backgrounds: Vec<Arc<dyn Sample>>,
        signals: TableSignals,
        clf: ExprClassifier,
        category: Category,
    }

    fn fixture() -> Fixture {
        Fixture {
            data: sample("Data", SampleKind::Data, vec![-3.0, 7.0]),
            backgrounds: vec![
                sample("Ztautau", SampleKind::Background, vec![1.0, 2.0, 3.0]),
                same_sign("QCD", SampleKind::DataDriven, vec![0.0, 5.0]),
            ],
            signals: TableSignals::new()
                .with(125, ProductionMode::Vbf, sample("VBFH", SampleKind::Signal, vec![4.0]))
                .with(150, ProductionMode::Vbf, sample("VBFH150", SampleKind::Signal, vec![6.0])),
            clf: ExprClassifier::new("bdt", "score").unwrap(),
            category: category(),
        }
    }

    impl Fixture {
        fn aggregate(&self, masses: &[u32], unblind: Unblind) -> Result<Scores> {
            let masses: BTreeSet<u32> = masses.iter().copied().collect();
            let agg = ScoreAggregator::new(&self.data, &self.backgrounds, &self.signals, HH_MASS_POINTS);
            agg.aggregate(&ScoreRequest {
                discriminant: Discriminant::Classifier(&self.clf),
                category: &self.category,
                region: Region::Os,
                shape_region: Region::Ss,
                cuts: None,
                mass_points: &masses,
                modes: ModeFilter::Grouped,
                unblind,
                systematics: true,
            })
        }
    }

    #[test]
    fn range_spans_backgrounds_with_padding() {
        let s = fixture().aggregate(&[], Unblind::Blind).unwrap();
        assert_relative_eq!(s.min_score, -1e-5);
        assert_relative_eq!(s.max_score, 5.0 + 1e-5);
        assert!(s.data_scores.is_none());
        assert!(s.all_sig_scores.is_empty());
        assert_eq!(s.bkg_scores.len(), 2);
    }

    #[test]
    fn signal_arrays_set_the_padded_range() {
        let mut f = fixture();
        f.data = sample("Data", SampleKind::Data, vec![]);
        let ztt = TableSample::new("Ztautau", SampleKind::Background, 2012, table(vec![1.0, 2.0, 3.0]))
            .with_variation("TES_UP", table(vec![]));
        f.backgrounds = vec![Arc::new(ztt)];
        f.signals =
            TableSignals::new().with(125, ProductionMode::Vbf, sample("VBFH", SampleKind::Signal, vec![0.0, 5.0]));
        let s = f.aggregate(&[125], Unblind::Blind).unwrap();
        assert_relative_eq!(s.min_score, 0.0 - 1e-5);
        assert_relative_eq!(s.max_score, 5.0 + 1e-5);
        assert!(!s.bkg_scores[0].1.contains_key("TES_UP"));
        assert_eq!(s.all_sig_scores[&125][0].1[NOMINAL].len(), 2);
    }

    #[test]
    fn data_driven_backgrounds_come_from_the_shape_region() {
        let mut f = fixture();
        // opposite-sign QCD events lie outside the same-sign shape region
        f.backgrounds = vec![
            sample("Ztautau", SampleKind::Background, vec![1.0, 2.0]),
            sample("QCD", SampleKind::DataDriven, vec![9.0]),
        ];
        let s = f.aggregate(&[], Unblind::Blind).unwrap();
        assert!(s.bkg_scores[1].1[NOMINAL].is_empty());
        assert_relative_eq!(s.max_score, 2.0 + 1e-5);
    }

    #[test]
    fn data_extends_range_only_when_unblinded() {
        let f = fixture();
        let full = f.aggregate(&[], Unblind::Full).unwrap();
        assert_relative_eq!(full.min_score, -3.0 - 1e-5);
        assert_relative_eq!(full.max_score, 7.0 + 1e-5);
        let partial = f.aggregate(&[], Unblind::Efficiency(0.3)).unwrap();
        assert_eq!(partial.data_scores.unwrap().len(), 2);
    }

    #[test]
    fn signal_scores_per_requested_mass() {
        let s = fixture().aggregate(&[150, 125], Unblind::Blind).unwrap();
        assert_eq!(s.all_sig_scores.keys().copied().collect::<Vec<_>>(), vec![125, 150]);
        assert_relative_eq!(s.max_score, 6.0 + 1e-5);
    }

    #[test]
    fn unknown_or_unavailable_mass_fails() {
        let f = fixture();
        assert!(matches!(f.aggregate(&[127], Unblind::Blind), Err(Error::UnknownMassPoint(127))));
        assert!(matches!(f.aggregate(&[130], Unblind::Blind), Err(Error::UnknownMassPoint(130))));
    }

    #[test]
    fn empty_everything_is_an_error() {
        let mut f = fixture();
        f.category = Category::new("vbf", Cut::new("score > 100")).year_cut(2012, Cut::all());
        let err = f.aggregate(&[], Unblind::Blind).err().unwrap();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn empty_systematic_variations_are_dropped() {
        let ztt = TableSample::new("Ztautau", SampleKind::Background, 2012, table(vec![1.0]))
            .with_variation("TES_UP", table(vec![]));
        let mut f = fixture();
        f.backgrounds = vec![Arc::new(ztt)];
        let s = f.aggregate(&[], Unblind::Blind).unwrap();
        let (_, values) = &s.bkg_scores[0];
        assert!(values.contains_key(NOMINAL));
        assert!(!values.contains_key("TES_UP"));
    }

    #[test]
    fn unblind_deserializes_from_flag_or_efficiency() {
        assert_eq!(serde_json::from_str::<Unblind>("false").unwrap(), Unblind::Blind);
        assert_eq!(serde_json::from_str::<Unblind>("true").unwrap(), Unblind::Full);
        assert_eq!(serde_json::from_str::<Unblind>("0.3").unwrap(), Unblind::Efficiency(0.3));
        assert!(serde_json::from_str::<Unblind>("1.5").is_err());
    }
}
