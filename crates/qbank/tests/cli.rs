use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const BANK_CSV: &str = "\
Question,Option A,Option B,Option C,Answer,Rationale
What is the normal adult resting heart rate?,40-50,60-100,120-140,B,Normal sinus range.
Which electrolyte imbalance causes peaked T waves?,Hyperkalemia,Hyponatremia,Hypocalcemia,A,
";

const UNANSWERED_TXT: &str = "\
1. Which electrolyte imbalance causes peaked T waves on the ECG?
A. Hyperkalemia
B. Hyponatremia
C. Hypocalcemia
";

fn qbank(dir: &Path) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("qbank").into();
    cmd.current_dir(dir);
    cmd.env("NO_COLOR", "1");
    for var in [
        "QBANK_MAX_QUESTIONS",
        "QBANK_SIMILARITY_THRESHOLD",
        "QBANK_MAX_EXPLANATION_CHARS",
        "QBANK_MIN_STEM_CHARS",
        "QBANK_ASSUME_FIRST_OPTION",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn write(dir: &TempDir, name: &str, content: &str) {
    std::fs::write(dir.path().join(name), content).unwrap();
}

// --- Basics ---

#[test]
fn binary_runs() {
    let dir = TempDir::new().unwrap();
    qbank(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("qbank"));
}

#[test]
fn parse_requires_files() {
    let dir = TempDir::new().unwrap();
    qbank(dir.path()).arg("parse").assert().failure();
}

// --- Parse ---

#[test]
fn parse_csv_prints_questions() {
    let dir = TempDir::new().unwrap();
    write(&dir, "bank.csv", BANK_CSV);

    qbank(dir.path())
        .args(["parse", "bank.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"correctAnswers\""))
        .stdout(predicate::str::contains("What is the normal adult resting heart rate?"))
        .stdout(predicate::str::contains("\"file\": \"bank.csv\""))
        .stderr(predicate::str::contains("bank.csv: 2 questions"));
}

#[test]
fn parse_compact_is_one_line_per_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, "bank.csv", BANK_CSV);

    let output = qbank(dir.path())
        .args(["parse", "--compact", "bank.csv"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1);
    let parsed: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(parsed["totalFound"], 2);
    assert_eq!(parsed["questions"][0]["correctAnswers"][0], "B");
}

#[test]
fn parse_max_questions_caps_output() {
    let dir = TempDir::new().unwrap();
    write(&dir, "bank.csv", BANK_CSV);

    qbank(dir.path())
        .args(["parse", "--max-questions", "1", "bank.csv"])
        .assert()
        .success()
        .stderr(predicate::str::contains("bank.csv: 1 questions"));
}

#[test]
fn parse_unsupported_format_fails() {
    let dir = TempDir::new().unwrap();
    write(&dir, "slides.pptx", "not really a deck");

    qbank(dir.path())
        .args(["parse", "slides.pptx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported file format: pptx"));
}

#[test]
fn parse_missing_file_fails_but_reports_others() {
    let dir = TempDir::new().unwrap();
    write(&dir, "bank.csv", BANK_CSV);

    qbank(dir.path())
        .args(["parse", "bank.csv", "missing.csv"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("What is the normal adult resting heart rate?"))
        .stderr(predicate::str::contains("missing.csv"));
}

#[test]
fn parse_unanswered_text_defaults_to_first_option() {
    let dir = TempDir::new().unwrap();
    write(&dir, "notes.txt", UNANSWERED_TXT);

    let output = qbank(dir.path())
        .args(["parse", "--compact", "notes.txt"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["questions"][0]["correctAnswers"][0], "A");
}

#[test]
fn parse_require_answer_reports_error() {
    let dir = TempDir::new().unwrap();
    write(&dir, "notes.txt", UNANSWERED_TXT);

    qbank(dir.path())
        .args(["parse", "--require-answer", "notes.txt"])
        .assert()
        .success()
        .stderr(predicate::str::contains("notes.txt: 0 questions"))
        .stderr(predicate::str::contains("no correct answer"));
}

#[test]
fn parse_env_disables_first_option_default() {
    let dir = TempDir::new().unwrap();
    write(&dir, "notes.txt", UNANSWERED_TXT);

    qbank(dir.path())
        .env("QBANK_ASSUME_FIRST_OPTION", "false")
        .args(["parse", "notes.txt"])
        .assert()
        .success()
        .stderr(predicate::str::contains("no correct answer"));
}

// --- Config ---

#[test]
fn config_file_is_applied() {
    let dir = TempDir::new().unwrap();
    write(&dir, "bank.csv", BANK_CSV);
    write(&dir, "qbank.json", r#"{ "max_questions": 1 }"#);

    qbank(dir.path())
        .args(["parse", "--config", "qbank.json", "bank.csv"])
        .assert()
        .success()
        .stderr(predicate::str::contains("bank.csv: 1 questions"));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    write(&dir, "bank.csv", BANK_CSV);

    qbank(dir.path())
        .args(["parse", "--similarity", "1.5", "bank.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("similarity_threshold"));
}

// --- Import ---

#[test]
fn import_then_reimport_skips() {
    let dir = TempDir::new().unwrap();
    write(&dir, "bank.csv", BANK_CSV);

    qbank(dir.path())
        .args(["import", "--db", "bank.db", "bank.csv"])
        .assert()
        .success()
        .stderr(predicate::str::contains("imported 2, skipped 0"));

    assert!(dir.path().join("bank.db").exists());

    qbank(dir.path())
        .args(["import", "--db", "bank.db", "bank.csv"])
        .assert()
        .success()
        .stderr(predicate::str::contains("imported 0, skipped 2"))
        .stderr(predicate::str::contains("2 total"));
}

#[test]
fn import_creates_database_directory() {
    let dir = TempDir::new().unwrap();
    write(&dir, "bank.csv", BANK_CSV);

    qbank(dir.path())
        .args(["import", "--db", "data/nested/bank.db", "bank.csv"])
        .assert()
        .success();

    assert!(dir.path().join("data/nested/bank.db").exists());
}
