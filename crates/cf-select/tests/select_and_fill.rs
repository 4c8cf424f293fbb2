//! Cut algebra → evaluator → histogram, end to end on a small event table.

use cf_core::WeightedScores;
use cf_select::{Binning, Cut, EventTable, ExprEvaluator, Histogram, SelectionEvaluator};

fn events() -> EventTable {
    EventTable::new()
        .with_column("mass_mmc_tau1_tau2", vec![70.0, 95.0, 112.0, 125.0, 150.0, 200.0])
        .unwrap()
        .with_column("weight", vec![1.0, 0.5, 2.0, 1.5, 1.0, 0.25])
        .unwrap()
}

#[test]
fn selection_string_feeds_the_evaluator() {
    let mass_fix = Cut::new("mass_mmc_tau1_tau2 > 80");
    let window = Cut::new("mass_mmc_tau1_tau2 < 130");
    let sel = mass_fix.and(&window);

    let mask = ExprEvaluator.mask(&sel.serialize(), &events()).unwrap();
    assert_eq!(mask, vec![false, true, true, true, false, false]);

    let picked = ExprEvaluator.select(&sel.serialize(), &events()).unwrap();
    assert_eq!(picked.column("weight").unwrap(), &[0.5, 2.0, 1.5]);
}

#[test]
fn explicit_and_constant_binnings_fill_uniformly() {
    let t = events();
    let values = WeightedScores::new(
        t.column("mass_mmc_tau1_tau2").unwrap().to_vec(),
        t.column("weight").unwrap().to_vec(),
    );

    let explicit = Binning::Edges(vec![0.0, 80.0, 120.0, 1e100]);
    let mut h = Histogram::new("m", explicit.resolve(0.0, 0.0).unwrap()).unwrap();
    h.fill_weighted(&values, None).unwrap();
    assert_eq!(h.bin_content, vec![1.0, 2.5, 2.75]);
    assert_eq!(h.overflow, 0.0);

    let constant = Binning::Constant(2);
    let (lo, hi) = values.range().unwrap();
    let mut h = Histogram::new("m", constant.resolve(lo, hi + 1e-5).unwrap()).unwrap();
    h.fill_weighted(&values, None).unwrap();
    assert_eq!(h.integral(), 6.25);
    assert_eq!(h.entries, 6);
}
