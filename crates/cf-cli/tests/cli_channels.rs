use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_catflow"))
}

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("catflow_cli_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn os(scores: &[f64]) -> serde_json::Value {
    let n = scores.len();
    serde_json::json!({"score": scores, "tau1_charge": vec![1.0; n], "tau2_charge": vec![-1.0; n]})
}

/// Writes the event file next to the configuration, which refers to it by a
/// relative path.
fn write_inputs(unblind: &str, mass_points: &str) -> PathBuf {
    let dir = tmp_path("channels");
    std::fs::create_dir_all(&dir).unwrap();
    let events = serde_json::json!({
        "data": {"name": "Data", "events": os(&[0.1, 0.3, 0.55, 0.8])},
        "backgrounds": [
            {"name": "Ztautau", "events": os(&[0.2, 0.4, 0.6])},
            {"name": "Others", "weight": "0.25", "events": os(&[0.5, 0.9])}
        ],
        "signals": [
            {"name": "ggH", "mass": 125, "mode": "ggf", "events": os(&[0.7, 0.9])},
            {"name": "VBFH", "mass": 125, "mode": "vbf", "events": os(&[0.95])},
            {"name": "VBFH150", "mass": 150, "mode": "vbf", "events": os(&[0.85])}
        ]
    });
    std::fs::write(dir.join("events.json"), serde_json::to_vec(&events).unwrap()).unwrap();
    let config = format!(
        r#"
year: 2012
mass_points: {mass_points}
unblind: {unblind}
extra_categories:
  - group: test
    categories:
      - name: low
        cuts: "score < 0.5"
        year_cuts: {{2012: ""}}
      - name: high
        cuts: "score >= 0.5"
        year_cuts: {{2012: ""}}
categories:
  group: test
discriminant:
  type: classifier
  name: bdt
  expr: score
bins: 5
events: events.json
"#
    );
    let config_path = dir.join("analysis.yaml");
    std::fs::write(&config_path, config).unwrap();
    config_path
}

#[test]
fn channels_write_a_workspace_per_category_and_mass() {
    let config = write_inputs("true", "[125, 150]");
    let output = tmp_path("ws.json");
    let out = run(&[
        "channels",
        "--config",
        config.to_string_lossy().as_ref(),
        "--output",
        output.to_string_lossy().as_ref(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let ws: serde_json::Value = serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
    let names: Vec<&str> = ws["channels"].as_array().unwrap().iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["low_125", "low_150", "high_125", "high_150"]);

    let high_125 = &ws["channels"][2]["samples"];
    let samples: Vec<&str> = high_125.as_array().unwrap().iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert_eq!(samples, ["Ztautau", "Others", "ggH", "VBFH"]);
    assert_eq!(high_125[2]["modifiers"][0]["type"], "normfactor");
    assert_eq!(high_125[2]["modifiers"][0]["name"], "mu");

    // unblinded: observations are the data, 2 events above 0.5
    let obs: f64 = ws["observations"][2]["data"].as_array().unwrap().iter().map(|v| v.as_f64().unwrap()).sum();
    assert_eq!(obs, 2.0);
    assert_eq!(ws["measurements"][0]["config"]["poi"], "mu");
}

#[test]
fn unknown_mass_point_is_a_configuration_error() {
    let config = write_inputs("false", "[127]");
    let out = run(&["channels", "--config", config.to_string_lossy().as_ref()]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown mass point: 127"));
}

#[test]
fn mass_without_signal_samples_fails_every_category() {
    let config = write_inputs("false", "[130]");
    let out = run(&["channels", "--config", config.to_string_lossy().as_ref()]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("no channel was built"));
}

#[test]
fn background_only_workspace_to_stdout() {
    let config = write_inputs("false", "[]");
    let out = run(&["channels", "--config", config.to_string_lossy().as_ref()]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let ws: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let names: Vec<&str> = ws["channels"].as_array().unwrap().iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["low", "high"]);
    // blinded: Asimov observation equals the summed backgrounds
    let obs: f64 = ws["observations"][0]["data"].as_array().unwrap().iter().map(|v| v.as_f64().unwrap()).sum();
    assert_eq!(obs, 2.0);
}
