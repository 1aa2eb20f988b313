use std::path::Path;
use std::process::Command;

use approx::assert_relative_eq;
use serde_json::Value;

const TASK: &str = r#"
[pairs]
message_types = ["ADPSFC"]
obs_window = [-3600, 3600]

[fcst]
name = "TMP"

[obs]
name = "TMP"

[[mask]]
name = "FULL"

[cat]
fcst_thresh = [">=285"]
obs_thresh = [">=285"]
"#;

const CASE: &str = r#"{
    "fcst_time": 1700000000,
    "grid": {"lat_ll": 40.0, "lon_ll": -105.0, "delta_lat": 1.0, "delta_lon": 1.0, "nx": 4, "ny": 4},
    "fcst": [{"data": [285, 285, 285, 285, 285, 285, 285, 285,
                       285, 285, 285, 285, 285, 285, 285, 285]}],
    "observations": [
        {"sid": "A", "msg_typ": "ADPSFC", "var_name": "TMP", "lat": 41.1, "lon": -103.9, "vld": 1700000000, "value": 284.0},
        {"sid": "B", "msg_typ": "ADPSFC", "var_name": "TMP", "lat": 42.0, "lon": -102.8, "vld": 1700000600, "value": 286.0},
        {"sid": "C", "msg_typ": "ADPSFC", "var_name": "TMP", "lat": 40.2, "lon": -104.9, "vld": 1699999400, "value": 283.0},
        {"sid": "D", "msg_typ": "ADPSFC", "var_name": "DPT", "lat": 41.0, "lon": -104.0, "vld": 1700000000, "value": 270.0},
        {"sid": "E", "msg_typ": "ADPSFC", "var_name": "TMP", "lat": 10.0, "lon": 10.0, "vld": 1700000000, "value": 290.0}
    ]
}"#;

fn verif() -> Command {
    Command::new(env!("CARGO_BIN_EXE_verif"))
}

fn write(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_verify_then_aggregate() {
    let dir = tempfile::tempdir().unwrap();
    let task = write(dir.path(), "task.toml", TASK);
    let case = write(dir.path(), "case.json", CASE);
    let stats = dir.path().join("stats.json");

    let status = verif()
        .args(["verify", "--config"])
        .arg(&task)
        .arg("--case")
        .arg(&case)
        .arg("--output")
        .arg(&stats)
        .status()
        .unwrap();
    assert!(status.success());

    let out = read_json(&stats);
    assert_eq!(out["n_obs"], 5);
    assert_eq!(out["n_kept"], 3);
    assert_eq!(out["counts"]["rej_var"], 1);
    assert_eq!(out["counts"]["rej_grd"], 1);

    let part = &out["partitions"][0];
    assert_eq!(part["msg_typ"], "ADPSFC");
    assert_eq!(part["mask"], "FULL");
    assert_eq!(part["n_pairs"], 3);
    assert_relative_eq!(part["cnt"]["me"]["v"].as_f64().unwrap(), 2.0 / 3.0, epsilon = 1e-9);
    assert_eq!(part["sl1l2"]["scount"], 3);
    let table = &part["cts"][0]["stats"]["cts"];
    assert_eq!(table["fy_oy"], 1.0);
    assert_eq!(table["fy_on"], 2.0);

    let agg = dir.path().join("agg.json");
    let status = verif()
        .arg("aggregate")
        .arg(&stats)
        .arg(&stats)
        .arg("--output")
        .arg(&agg)
        .status()
        .unwrap();
    assert!(status.success());

    let agg = read_json(&agg);
    assert_eq!(agg["n_files"], 2);
    let group = &agg["groups"][0];
    assert_eq!(group["n_cases"], 2);
    assert_eq!(group["sl1l2"]["scount"], 6);
    assert_relative_eq!(group["cnt"]["me"]["v"].as_f64().unwrap(), 2.0 / 3.0, epsilon = 1e-9);
}

#[test]
fn test_bad_config_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let task = write(dir.path(), "task.toml", &format!("{TASK}\n[ci]\nalphas = [2.0]\n"));
    let case = write(dir.path(), "case.json", CASE);

    let output = verif()
        .args(["verify", "--config"])
        .arg(&task)
        .arg("--case")
        .arg(&case)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr: {stderr}");
}
