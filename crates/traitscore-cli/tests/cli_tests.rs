//! CLI integration tests using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn traitscore() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("traitscore").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Run `init` in a fresh directory.
fn initialized() -> TempDir {
    let dir = TempDir::new().unwrap();
    traitscore()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();
    dir
}

fn score_sample(dir: &Path, out: &str) {
    traitscore()
        .current_dir(dir)
        .args(["score", "--bank", "banks/sample.toml"])
        .args(["--session", "sessions/sample.json", "--out", out])
        .assert()
        .success();
}

fn only_record(dir: &Path) -> std::path::PathBuf {
    let mut records: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    assert_eq!(records.len(), 1, "{records:?}");
    records.pop().unwrap()
}

#[test]
fn validate_standard_bank() {
    traitscore()
        .arg("validate")
        .arg("--bank")
        .arg("../../banks/standard.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("37 questions"))
        .stdout(predicate::str::contains("work_rhythm 12"))
        .stdout(predicate::str::contains("All question banks valid"));
}

#[test]
fn validate_directory() {
    traitscore()
        .arg("validate")
        .arg("--bank")
        .arg("../../banks")
        .assert()
        .success()
        .stdout(predicate::str::contains("Standard Student Profile"));
}

#[test]
fn validate_reports_unscorable_bank() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(
        &path,
        r#"
[bank]
id = "broken"
name = "Broken"

[[instruments]]
instrument = "big_five"
policy = "mean_scaled"
traits = ["O"]

[[questions]]
id = "o1"
instrument = "big_five"
type = "likert"
trait = "O"
min = 1
max = 5
text = "I like art"
"#,
    )
    .unwrap();

    traitscore()
        .arg("validate")
        .arg("--bank")
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("no reverse-key flag"))
        .stderr(predicate::str::contains("cannot be scored"));
}

#[test]
fn validate_nonexistent_file() {
    traitscore()
        .arg("validate")
        .arg("--bank")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    traitscore()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created traitscore.toml"))
        .stdout(predicate::str::contains("Created banks/sample.toml"))
        .stdout(predicate::str::contains("Created sessions/sample.json"));

    assert!(dir.path().join("traitscore.toml").exists());
    assert!(dir.path().join("banks/sample.toml").exists());
    assert!(dir.path().join("sessions/sample.json").exists());
}

#[test]
fn init_skips_existing() {
    let dir = initialized();

    traitscore()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn score_sample_session() {
    let dir = initialized();

    traitscore()
        .current_dir(dir.path())
        .args(["score", "--bank", "banks/sample.toml"])
        .args(["--session", "sessions/sample.json", "--out", "results"])
        .assert()
        .success()
        .stdout(predicate::str::contains("big_five"))
        .stdout(predicate::str::contains("RIASEC profile"))
        .stderr(predicate::str::contains("1/1 scored"));

    let record = only_record(&dir.path().join("results"));
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(record).unwrap()).unwrap();
    assert_eq!(json["instruments"]["work_rhythm"]["complete"], true);
    assert_eq!(json["instruments"]["riasec"]["profile_code"].as_str().map(str::len), Some(3));
}

#[test]
fn score_json_output() {
    let dir = initialized();

    let output = traitscore()
        .current_dir(dir.path())
        .args(["score", "--bank", "banks/sample.toml", "--session", "sessions"])
        .args(["--out", "results", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["bank_id"], "sample");
    assert!(json["instruments"]["big_five"]["traits"]["O"]["score"].is_number());
}

#[test]
fn score_rejects_incomplete_session() {
    let dir = initialized();
    let session_path = dir.path().join("sessions/sample.json");
    let mut session: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&session_path).unwrap()).unwrap();
    session["completed_at"] = serde_json::Value::Null;
    std::fs::write(&session_path, session.to_string()).unwrap();

    traitscore()
        .current_dir(dir.path())
        .args(["score", "--bank", "banks/sample.toml"])
        .args(["--session", "sessions/sample.json", "--out", "results"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not marked complete"));
}

#[test]
fn compare_identical_records() {
    let dir = initialized();
    score_sample(dir.path(), "results");
    let record = only_record(&dir.path().join("results"));

    traitscore()
        .arg("compare")
        .arg("--baseline")
        .arg(&record)
        .arg("--current")
        .arg(&record)
        .arg("--fail-on-drift")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 drifted"));
}

#[test]
fn compare_detects_drift() {
    let dir = initialized();
    score_sample(dir.path(), "results");
    let baseline = only_record(&dir.path().join("results"));

    let mut record: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&baseline).unwrap()).unwrap();
    let score = record["instruments"]["big_five"]["traits"]["O"]["score"].as_f64().unwrap();
    let flipped = if score > 50.0 { 0.0 } else { 100.0 };
    record["instruments"]["big_five"]["traits"]["O"]["score"] = serde_json::json!(flipped);
    let current = dir.path().join("current.json");
    std::fs::write(&current, record.to_string()).unwrap();

    traitscore()
        .arg("compare")
        .arg("--baseline")
        .arg(&baseline)
        .arg("--current")
        .arg(&current)
        .arg("--format")
        .arg("markdown")
        .assert()
        .success()
        .stdout(predicate::str::contains("Drifted traits"));

    traitscore()
        .arg("compare")
        .arg("--baseline")
        .arg(&baseline)
        .arg("--current")
        .arg(&current)
        .arg("--fail-on-drift")
        .assert()
        .failure();
}

#[test]
fn compare_nonexistent_record() {
    traitscore()
        .arg("compare")
        .arg("--baseline")
        .arg("no_such_file.json")
        .arg("--current")
        .arg("also_no_file.json")
        .assert()
        .failure();
}

#[test]
fn show_in_arabic() {
    traitscore()
        .arg("show")
        .arg("--bank")
        .arg("../../banks/standard.toml")
        .arg("--lang")
        .arg("ar")
        .assert()
        .success()
        .stdout(predicate::str::contains("dir=rtl"))
        .stdout(predicate::str::contains("الاهتمامات"))
        .stdout(predicate::str::contains("نادي الروبوتات"));
}

#[test]
fn show_unsupported_language_falls_back_to_english() {
    traitscore()
        .arg("show")
        .arg("--bank")
        .arg("../../banks/standard.toml")
        .arg("--lang")
        .arg("fr")
        .assert()
        .success()
        .stdout(predicate::str::contains("lang=en dir=ltr"))
        .stdout(predicate::str::contains("Robotics club"));
}

#[test]
fn help_output() {
    traitscore()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bilingual psychometric scoring engine"));
}

#[test]
fn version_output() {
    traitscore()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("traitscore"));
}
