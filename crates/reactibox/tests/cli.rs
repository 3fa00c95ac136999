use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

fn reactibox(config_dir: &std::path::Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_reactibox"))
        .env("REACTIBOX_CONFIG_DIR", config_dir)
        .env_remove("REACTIBOX_CONFIG")
        .env_remove("REACTIBOX_SHADER")
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run reactibox")
}

#[test]
fn where_reports_config_dir_and_bundled_shader() {
    let root = TempDir::new().unwrap();
    let output = reactibox(root.path(), &["where"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&root.path().display().to_string()), "{stdout}");
    assert!(stdout.contains("reactibox.toml (not found)"), "{stdout}");
    assert!(stdout.contains("bundled"), "{stdout}");
}

#[test]
fn debug_without_sensor_prints_resting_tilt() {
    let root = TempDir::new().unwrap();
    let output = reactibox(
        root.path(),
        &["debug", "--frames", "3", "--hz", "50", "--sensor", "none"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3, "{stdout}");
    for line in lines {
        assert!(line.starts_with("frame"), "{line}");
        assert!(line.contains("x=+0.000 rad"), "{line}");
        assert!(line.contains("limit=±1.50"), "{line}");
        assert!(line.ends_with("sensor=unavailable"), "{line}");
    }
}

#[test]
fn debug_json_replays_a_recording_within_bounds() {
    let root = TempDir::new().unwrap();
    let recording = root.path().join("walk.jsonl");
    let mut lines = String::new();
    for step in 0..50u64 {
        let half = 0.01 * step as f32;
        lines.push_str(&format!(
            "{{\"t_ms\": {}, \"vector\": [{}, 0.0, 0.0, {}]}}\n",
            step * 5,
            half.sin(),
            half.cos()
        ));
    }
    fs::write(&recording, lines).unwrap();

    let output = reactibox(
        root.path(),
        &[
            "debug",
            "--frames",
            "4",
            "--hz",
            "40",
            "--json",
            "--loop",
            "--replay",
            recording.to_str().unwrap(),
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let readouts: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(readouts.len(), 4);
    for (index, readout) in readouts.iter().enumerate() {
        assert_eq!(readout["frame"], index as u64 + 1);
        assert_eq!(readout["sensor"], "active");
        let x = readout["x"].as_f64().unwrap();
        let y = readout["y"].as_f64().unwrap();
        assert!(x.abs() <= 1.5 && y.abs() <= 1.5, "{readout}");
    }
}

#[test]
fn invalid_config_fails_before_running() {
    let root = TempDir::new().unwrap();
    let config = root.path().join("broken.toml");
    fs::write(&config, "version = 2\n").unwrap();

    let output = reactibox(
        root.path(),
        &["debug", "--frames", "1", "--config", config.to_str().unwrap()],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported config version 2"), "{stderr}");
}
