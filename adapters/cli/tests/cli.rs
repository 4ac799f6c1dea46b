use std::process::Command;

fn rank_pressure() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rank-pressure"))
}

#[test]
fn simulate_persists_pressure_for_inspection() {
    let directory = tempfile::tempdir().expect("tempdir");
    let state = directory.path().join("pressure.json");

    let output = rank_pressure()
        .args(["simulate", "--minutes", "2", "--spawns-per-minute", "20", "--seed", "11"])
        .arg("--pressure")
        .arg(&state)
        .output()
        .expect("failed to run rank-pressure simulate");
    assert!(
        output.status.success(),
        "simulate failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("restored 0 pressure regions"), "{stdout}");
    assert!(stdout.contains("spawned 40 monsters"), "{stdout}");
    assert!(state.exists());

    let output = rank_pressure()
        .arg("inspect")
        .arg(&state)
        .output()
        .expect("failed to run rank-pressure inspect");
    assert!(
        output.status.success(),
        "inspect failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("INTENSITY"));
}

#[test]
fn inspect_reports_missing_state() {
    let directory = tempfile::tempdir().expect("tempdir");
    let output = rank_pressure()
        .arg("inspect")
        .arg(directory.path().join("absent.json"))
        .output()
        .expect("failed to run rank-pressure inspect");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read pressure state"));
}

#[test]
fn malformed_rank_file_is_rejected() {
    let directory = tempfile::tempdir().expect("tempdir");
    let ranks = directory.path().join("ranks.json");
    std::fs::write(&ranks, "{ \"order\": ").expect("write ranks");

    let output = rank_pressure()
        .args(["simulate", "--minutes", "1"])
        .arg("--ranks")
        .arg(&ranks)
        .output()
        .expect("failed to run rank-pressure simulate");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load rank configuration"));
}

#[test]
fn exhausted_clock_is_reported_instead_of_panicking() {
    let directory = tempfile::tempdir().expect("tempdir");
    let state = directory.path().join("pressure.json");
    std::fs::write(
        &state,
        format!(
            r#"{{ "regions": [ {{ "rx": 0, "ry": 0, "z": 7, "lastUpdateMs": {} }} ] }}"#,
            u64::MAX
        ),
    )
    .expect("write state");

    let output = rank_pressure()
        .args(["simulate", "--minutes", "1"])
        .arg("--pressure")
        .arg(&state)
        .output()
        .expect("failed to run rank-pressure simulate");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("too late"), "{stderr}");
    assert!(!stderr.contains("panicked"), "{stderr}");
}

#[test]
fn inspect_reports_bias_of_far_regions() {
    let directory = tempfile::tempdir().expect("tempdir");
    let state = directory.path().join("pressure.json");
    std::fs::write(
        &state,
        format!(
            r#"{{ "regions": [ {{
                "rx": {}, "ry": 0, "z": 3,
                "intensity": 2.0,
                "lastUpdateMs": 1000
            }} ] }}"#,
            i32::MAX
        ),
    )
    .expect("write state");

    let output = rank_pressure()
        .arg("inspect")
        .arg(&state)
        .output()
        .expect("failed to run rank-pressure inspect");
    assert!(
        output.status.success(),
        "inspect failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("strongest region bias 0.5000 at 1000 ms lifts spawns by 1 tiers"),
        "{stdout}"
    );
}
