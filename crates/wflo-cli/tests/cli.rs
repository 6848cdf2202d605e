use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn repo_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join(relative)
}

fn wflo() -> Command {
    Command::cargo_bin("wflo").unwrap()
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// Two crowded turbines in a 2 km square, wind from the west only
const CROWDED: &str = r#"
[turbine]
preset = "sg-8.0-167-dd"

[[site.sectors]]
direction_deg = 270.0
frequency = 1.0
weibull_a = 9.0
weibull_k = 2.0

[aep.speed_bins]
min = 3.0
max = 25.0
step = 2.0

[layout]
min_spacing = 334.0
boundary = [[0.0, 0.0], [2000.0, 0.0], [2000.0, 2000.0], [0.0, 2000.0]]
turbines = [[900.0, 1000.0], [1100.0, 1000.0]]
"#;

#[test]
fn validate_accepts_demo_problem() {
    wflo()
        .args(["validate", "--problem"])
        .arg(repo_path("demos/coastal.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No issues"));
}

#[test]
fn validate_reports_crowded_seeds_as_warning() {
    let dir = tempdir().unwrap();
    let problem = dir.path().join("crowded.toml");
    fs::write(&problem, CROWDED).unwrap();

    wflo()
        .args(["validate", "--problem"])
        .arg(&problem)
        .assert()
        .success()
        .stdout(predicate::str::contains("[warning:spacing]"))
        .stdout(predicate::str::contains("1 warning"));
}

#[test]
fn validate_rejects_unknown_turbine() {
    let dir = tempdir().unwrap();
    let problem = dir.path().join("bad.toml");
    fs::write(&problem, CROWDED.replace("sg-8.0-167-dd", "v80")).unwrap();

    wflo()
        .args(["validate", "--problem"])
        .arg(&problem)
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error:turbine]"))
        .stderr(predicate::str::contains("not a usable layout problem"));
}

#[test]
fn missing_problem_file_fails() {
    wflo()
        .args(["aep", "--problem", "does/not/exist.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading problem file"));
}

#[test]
fn aep_reports_demo_yield() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("aep.json");

    wflo()
        .args(["aep", "--threads", "2", "--problem"])
        .arg(repo_path("demos/coastal.toml"))
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("AEP:"))
        .stdout(predicate::str::contains("GWh/year"));

    let json = read_json(&out);
    let aep = json["aep_gwh"].as_f64().unwrap();
    assert!(aep > 0.0);
    // 8 turbines at 8 MW can never exceed 8 · 8 MW · 8760 h
    assert!(aep < 8.0 * 8.0 * 8.76);
    assert_eq!(json["report"]["per_turbine_gwh"].as_array().unwrap().len(), 8);
    assert_eq!(json["wake"]["deficit"], "gaussian");
    assert_eq!(json["sectors"], 12);
}

#[test]
fn aep_model_override_without_wakes_has_no_loss() {
    let dir = tempdir().unwrap();
    let problem = dir.path().join("crowded.toml");
    let out = dir.path().join("aep.json");
    fs::write(&problem, CROWDED).unwrap();

    wflo()
        .args(["aep", "--model", "none", "--problem"])
        .arg(&problem)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let json = read_json(&out);
    assert_eq!(json["wake"]["deficit"], "none");
    assert!(json["wake_loss_percent"].as_f64().unwrap().abs() < 1e-9);
}

#[test]
fn optimize_writes_feasible_layout() {
    let dir = tempdir().unwrap();
    let problem = dir.path().join("crowded.toml");
    let out = dir.path().join("results/layout.json");
    fs::write(&problem, CROWDED).unwrap();

    wflo()
        .args(["optimize", "--problem"])
        .arg(&problem)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Optimized AEP:"));

    let json = read_json(&out);
    let solution = &json["solution"];
    assert_eq!(solution["backend"], "sqp");
    assert_eq!(solution["layout"].as_array().unwrap().len(), 2);
    assert!(solution["iterations"].as_u64().unwrap() <= 20);
    assert!(solution["max_spacing_violation"].as_f64().unwrap() <= 1e-3);
    let aep = solution["aep_gwh"].as_f64().unwrap();
    assert!(aep >= solution["initial_aep_gwh"].as_f64().unwrap());
    assert_eq!(json["problem"]["turbines"], 2);
    assert_eq!(json["diagnostics"].as_array().unwrap().len(), 1);
}

#[test]
fn optimize_accepts_json_problem_and_algorithm_override() {
    let dir = tempdir().unwrap();
    let problem = dir.path().join("corners.json");
    let out = dir.path().join("result.json");
    fs::write(
        &problem,
        r#"{
            "turbine": { "preset": "sg-8.0-167-dd" },
            "site": { "n_sectors": 4 },
            "layout": {
                "min_spacing_diameters": 2.0,
                "boundary": [[0.0, 0.0], [2000.0, 0.0], [2000.0, 2000.0], [0.0, 2000.0]],
                "turbines": [[100.0, 100.0], [1900.0, 100.0], [100.0, 1900.0], [1900.0, 1900.0]]
            }
        }"#,
    )
    .unwrap();

    wflo()
        .args(["optimize", "--algorithm", "penalty-lbfgs", "--max-iterations", "3"])
        .arg("--problem")
        .arg(&problem)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("penalty-lbfgs"));

    let json = read_json(&out);
    assert_eq!(json["solution"]["backend"], "penalty-lbfgs");
    assert_eq!(json["problem"]["min_spacing"], 334.0);
}

#[test]
fn optimize_rejects_unknown_algorithm() {
    wflo()
        .args(["optimize", "--algorithm", "genetic", "--problem"])
        .arg(repo_path("demos/coastal.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown optimizer algorithm"));
}

#[test]
fn optimize_fails_on_impossible_spacing_but_keeps_output() {
    let dir = tempdir().unwrap();
    let problem = dir.path().join("tiny.toml");
    let out = dir.path().join("result.json");
    fs::write(
        &problem,
        r#"
[turbine]
preset = "sg-8.0-167-dd"

[site]
n_sectors = 4

[layout]
min_spacing = 334.0
boundary = [[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]]
turbines = [[20.0, 50.0], [80.0, 50.0]]
"#,
    )
    .unwrap();

    wflo()
        .args(["optimize", "--max-iterations", "3", "--problem"])
        .arg(&problem)
        .arg("--out")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no feasible layout found"));

    let json = read_json(&out);
    assert_eq!(json["solution"]["phase"], "infeasible");
    assert_eq!(json["solution"]["converged"], false);
}
