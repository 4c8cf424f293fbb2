use std::path::PathBuf;
use std::process::{Command, Output};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_catflow"))
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

#[test]
fn categories_json_lists_the_mva_group() {
    let out = run(&["categories", "--group", "mva", "--year", "2012", "--json"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let rows = v.as_array().unwrap();
    let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["vbf", "boosted", "ggf"]);
    assert_eq!(rows[0]["fit_bins"], 5);
    assert_eq!(rows[0]["norm_category"], "vbf");
    let selection = rows[0]["selection"].as_str().unwrap();
    assert!(selection.contains("jet1_pt > 50000"));
    assert!(selection.contains("tau1_JetBDTSigTight == 1"));
}

#[test]
fn categories_text_covers_every_group() {
    let out = run(&["categories"]);
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.lines().any(|l| l.starts_with("controls") && l.contains("preselection")));
    assert!(text.lines().any(|l| l.starts_with("cuts") && l.contains("cuts_boosted_tight")));
}

#[test]
fn unknown_group_fails() {
    let out = run(&["categories", "--group", "nope"]);
    assert!(!out.status.success());
}

#[test]
fn regions_print_the_mass_cuts() {
    let out = run(&["regions", "--low", "100", "--high", "150", "--high-sideband"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let text = String::from_utf8(out.stdout).unwrap();
    let control = text.lines().find(|l| l.starts_with("control:")).unwrap();
    assert!(control.contains("mass_mmc_tau1_tau2 < 100"));
    assert!(control.contains("mass_mmc_tau1_tau2 > 150"));
    assert!(text.lines().any(|l| l.starts_with("signal:")));
}

#[test]
fn regions_reject_low_boundary_at_the_floor() {
    let out = run(&["regions", "--low", "80"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid mass region"));
}
