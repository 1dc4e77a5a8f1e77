use assert_cmd::Command;
use chrono::Local;
use tempfile::tempdir;

use typewise::session::{Difficulty, TextType};
use typewise::stats::{SessionRecord, StatsStore};

fn seeded_ledger(path: &std::path::Path) {
    let mut store = StatsStore::load(path);
    for wpm in [25.0, 35.0] {
        store
            .append(SessionRecord {
                timestamp: Local::now(),
                wpm,
                accuracy: 88.0,
                difficulty: Difficulty::new(2),
                text_type: TextType::Short,
                elapsed_time: 20.0,
                avg_reaction_time: 0.3,
            })
            .unwrap();
    }
}

fn typewise() -> Command {
    let mut cmd = Command::cargo_bin("typewise").unwrap();
    cmd.env("RUST_LOG", "off");
    cmd
}

#[test]
fn stats_on_empty_ledger() {
    let dir = tempdir().unwrap();
    let output = typewise()
        .args(["stats", "--ledger"])
        .arg(dir.path().join("stats.json"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No sessions recorded yet"));
}

#[test]
fn stats_reports_recorded_sessions() {
    let dir = tempdir().unwrap();
    let ledger = dir.path().join("stats.json");
    seeded_ledger(&ledger);

    let output = typewise()
        .arg("stats")
        .arg("--ledger")
        .arg(&ledger)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("30.0"), "average wpm missing: {stdout}");
}

#[test]
fn reset_stats_clears_ledger() {
    let dir = tempdir().unwrap();
    let ledger = dir.path().join("stats.json");
    seeded_ledger(&ledger);

    typewise()
        .arg("reset-stats")
        .arg("--ledger")
        .arg(&ledger)
        .assert()
        .success();

    let store = StatsStore::load(&ledger);
    assert!(store.sessions().is_empty());
    assert_eq!(store.ledger().user_level, 1);
}

#[test]
fn export_writes_csv() {
    let dir = tempdir().unwrap();
    let ledger = dir.path().join("stats.json");
    let csv_path = dir.path().join("out.csv");
    seeded_ledger(&ledger);

    typewise()
        .arg("export")
        .arg(&csv_path)
        .arg("--ledger")
        .arg(&ledger)
        .assert()
        .success();

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("date,wpm,accuracy"));
}

#[test]
fn practice_requires_a_tty() {
    let dir = tempdir().unwrap();
    typewise()
        .arg("--ledger")
        .arg(dir.path().join("stats.json"))
        .write_stdin("")
        .assert()
        .failure();
}
