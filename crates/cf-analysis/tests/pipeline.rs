use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use approx::assert_relative_eq;
use cf_analysis::config::DiscriminantConfig;
use cf_analysis::workspace::{DEFAULT_POI, Modifier};
use cf_analysis::{
    AnalysisConfig, Category, CategoryRegistry, ChannelBuilder, EventFile, ExprClassifier,
    HH_MASS_POINTS, MassRegions, ModeFilter, Normalization, ProductionMode, Region, Sample, SampleKind,
    ScoreAggregator, ScoreRequest, TableSample, TableSignals, Unblind, Workspace, hadhad,
};
use cf_core::Error;
use cf_select::{Cut, EventTable};

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("catflow_pipeline_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn events(values: &[f64]) -> EventTable {
    let n = values.len();
    EventTable::new()
        .with_column("x", values.to_vec())
        .unwrap()
        .with_column("tau1_charge", vec![1.0; n])
        .unwrap()
        .with_column("tau2_charge", vec![-1.0; n])
        .unwrap()
}

fn sample(name: &str, kind: SampleKind, values: &[f64]) -> Arc<dyn Sample> {
    Arc::new(TableSample::new(name, kind, 2012, events(values)))
}

fn inclusive() -> Category {
    Category::new("inclusive", Cut::all()).year_cut(2012, Cut::all())
}

#[test]
fn mass_region_boundaries() {
    let r = MassRegions::new(110.0, 180.0, false).unwrap();
    let table = EventTable::new().with_column("mass_mmc_tau1_tau2", vec![100.0, 150.0]).unwrap();
    assert_eq!(table.mask(&r.control_region()).unwrap(), [true, false]);
    assert_eq!(table.mask(&r.signal_region()).unwrap(), [false, true]);
    assert!(MassRegions::new(100.0, 180.0, false).is_ok());
    assert!(MassRegions::new(80.0, 180.0, false).unwrap_err().is_config());
}

#[test]
fn aggregated_range_spans_backgrounds_and_signals() {
    let data = sample("Data", SampleKind::Data, &[]);
    let backgrounds = vec![sample("Ztautau", SampleKind::Background, &[1.0, 2.0, 3.0])];
    let signals = TableSignals::new().with(125, ProductionMode::Vbf, sample("VBFH", SampleKind::Signal, &[0.0, 5.0]));
    let clf = ExprClassifier::new("x", "x").unwrap();
    let category = inclusive();
    let masses = BTreeSet::from([125]);
    let aggregator = ScoreAggregator::new(&data, &backgrounds, &signals, HH_MASS_POINTS);
    let request = ScoreRequest {
        discriminant: cf_analysis::Discriminant::Classifier(&clf),
        category: &category,
        region: Region::Os,
        shape_region: Region::Ss,
        cuts: None,
        mass_points: &masses,
        modes: ModeFilter::Grouped,
        unblind: Unblind::Blind,
        systematics: false,
    };
    let scores = aggregator.aggregate(&request).unwrap();
    assert_relative_eq!(scores.min_score, -1e-5);
    assert_relative_eq!(scores.max_score, 5.0 + 1e-5);

    let norm = Normalization::identity();
    let builder = ChannelBuilder::new(HH_MASS_POINTS, &norm);
    let channels = builder.build(&scores, &category, 5, &masses, Unblind::Blind).unwrap();
    assert_eq!(channels.channels()[0].name, "inclusive_125");

    let wrong = BTreeSet::from([130]);
    let err = aggregator.aggregate(&ScoreRequest { mass_points: &wrong, ..request }).err().unwrap();
    assert!(matches!(err, Error::UnknownMassPoint(130)));
    assert!(err.is_config());
}

#[test]
fn blinding_keeps_the_requested_signal_fraction_above_the_cut() {
    // signal rising with score: 1, 2, ..., 10 events per bin
    let mut values = Vec::new();
    for bin in 0..10 {
        for _ in 0..=bin {
            values.push(bin as f64 + 0.5);
        }
    }
    let data = sample("Data", SampleKind::Data, &(0..10).map(|i| i as f64 + 0.5).collect::<Vec<_>>());
    let backgrounds = vec![sample("Ztautau", SampleKind::Background, &[0.0, 10.0])];
    let signals = TableSignals::new().with(125, ProductionMode::Ggf, sample("ggH", SampleKind::Signal, &values));
    let clf = ExprClassifier::new("x", "x").unwrap();
    let category = inclusive();
    let masses = BTreeSet::from([125]);
    let scores = ScoreAggregator::new(&data, &backgrounds, &signals, HH_MASS_POINTS)
        .aggregate(&ScoreRequest {
            discriminant: cf_analysis::Discriminant::Classifier(&clf),
            category: &category,
            region: Region::Os,
            shape_region: Region::Ss,
            cuts: None,
            mass_points: &masses,
            modes: ModeFilter::Grouped,
            unblind: Unblind::Efficiency(0.3),
            systematics: false,
        })
        .unwrap();

    let norm = Normalization::identity();
    let channels = ChannelBuilder::new(HH_MASS_POINTS, &norm)
        .build(&scores, &category, 10, &masses, Unblind::Efficiency(0.3))
        .unwrap();
    let ch = channels.for_mass(125).unwrap();
    let signal = ch.sample("ggH").unwrap();
    let data = ch.data.as_ref().unwrap();
    let total = signal.nominal.integral();
    // data survives only in the bins below the cut
    let kept = data.nominal.bin_content.iter().filter(|&&c| c > 0.0).count();
    let above: f64 = signal.nominal.bin_content[kept..].iter().sum();
    assert!(above >= 0.3 * total);
    // one bin fewer to blind would leave less than 30% above the cut
    let tighter: f64 = signal.nominal.bin_content[kept + 1..].iter().sum();
    assert!(tighter < 0.3 * total);
}

#[test]
fn hadhad_registry_groups() {
    let registry: CategoryRegistry = hadhad::registry().unwrap();
    let mva: Vec<_> = registry.group("mva").unwrap().iter().map(|c| c.name.clone()).collect();
    assert_eq!(mva, ["vbf", "boosted", "ggf"]);
    let cuts = registry.group("cuts").unwrap();
    assert!(cuts.iter().all(|c| registry.norm_category_of(c).unwrap().name == "preselection"));
    assert!(registry.get("vbf").unwrap().cuts_for_year(2012).is_ok());
    assert!(matches!(
        registry.get("vbf").unwrap().cuts_for_year(2010),
        Err(Error::UnknownEpoch { year: 2010, .. })
    ));
}

fn write_inputs() -> PathBuf {
    let events = serde_json::json!({
        "data": {"name": "Data", "events": {
            "score": [0.1, 0.2, 0.3, 0.6, 0.7, 0.8],
            "tau1_charge": [1, 1, 1, 1, 1, 1], "tau2_charge": [-1, -1, -1, -1, -1, -1]}},
        "backgrounds": [
            {"name": "Ztautau", "events": {
                "score": [0.2, 0.4], "tau1_charge": [1, 1], "tau2_charge": [-1, -1]},
             "variations": {
                "TES_UP": {"score": [0.25, 0.45], "tau1_charge": [1, 1], "tau2_charge": [-1, -1]},
                "TES_DOWN": {"score": [0.15], "tau1_charge": [1], "tau2_charge": [-1]}}},
            {"name": "QCD", "kind": "data_driven", "events": {
                "score": [0.1, 0.5], "tau1_charge": [1, 1], "tau2_charge": [1, 1]}}
        ],
        "signals": [
            {"name": "ggH", "mass": 125, "mode": "ggf", "events": {
                "score": [0.7, 0.9], "tau1_charge": [1, 1], "tau2_charge": [-1, -1]}},
            {"name": "VBFH", "mass": 125, "mode": "vbf", "weight": "0.5", "events": {
                "score": [0.95], "tau1_charge": [1], "tau2_charge": [-1]}}
        ]
    });
    let events_path = tmp_path("events.json");
    std::fs::write(&events_path, serde_json::to_vec(&events).unwrap()).unwrap();
    events_path
}

fn config(events_path: &std::path::Path) -> String {
    format!(
        r#"
year: 2012
systematics: true
mass_points: [125]
mode: combined
extra_categories:
  - group: test
    categories:
      - name: all
        year_cuts: {{2012: ""}}
categories:
  group: test
discriminant:
  type: classifier
  name: bdt
  expr: score
bins: 4
events: {}
"#,
        events_path.display()
    )
}

#[test]
fn config_to_workspace() {
    let events_path = write_inputs();
    let config_path = tmp_path("analysis.yaml");
    std::fs::write(&config_path, config(&events_path)).unwrap();

    let config = AnalysisConfig::from_path(&config_path).unwrap();
    assert!(matches!(config.discriminant, DiscriminantConfig::Classifier { .. }));
    let events = EventFile::from_path(&config.events_path(config_path.parent().unwrap())).unwrap();
    let analysis = config.analysis(&events).unwrap();
    let built = config.build_channels(&analysis).unwrap();
    assert_eq!(built.len(), 1);
    let (name, channels) = &built[0];
    assert_eq!(name, "all");
    let channels = channels.as_ref().unwrap();
    assert_eq!(channels.len(), 1);
    let ch = &channels[0];
    assert_eq!(ch.name, "all_125");
    assert!(ch.data.is_none());

    // (6 data - 2 ztautau) / 2 qcd events taken same-sign
    let qcd = ch.sample("QCD").unwrap();
    assert_relative_eq!(qcd.nominal.integral(), 4.0);
    let signal = ch.sample("Signal_ggf_vbf_zh_wh_125").unwrap();
    assert_relative_eq!(signal.nominal.integral(), 2.5);

    let ws = Workspace::from_channels(channels, DEFAULT_POI);
    let ztt = &ws.channels[0].samples[0];
    assert_eq!(ztt.name, "Ztautau");
    assert!(ztt.modifiers.iter().any(|m| matches!(m, Modifier::HistoSys { name, .. } if name == "TES")));
    assert_eq!(ws.measurements[0].config.poi, "mu");
    assert_eq!(ws.observations[0].data.len(), 4);
}

#[test]
fn field_channels_from_config() {
    let events_path = write_inputs();
    let text = config(&events_path).replace(
        "discriminant:\n  type: classifier\n  name: bdt\n  expr: score\n",
        "discriminant:\n  type: fields\n  fields: [score, \"2 * score\"]\n",
    );
    let config = AnalysisConfig::from_yaml_str(&text).unwrap();
    let events = EventFile::from_path(&events_path).unwrap();
    let analysis = config.analysis(&events).unwrap();
    let built = config.build_channels(&analysis).unwrap();
    let names: Vec<String> = built[0].1.as_ref().unwrap().iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, ["all_125_2 * score", "all_125_score"]);
}
