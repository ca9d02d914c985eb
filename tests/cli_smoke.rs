use std::path::PathBuf;
use std::process::Command;

fn exe() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_toodle"))
}

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

#[test]
fn cli_check_reports_location() {
    let ok = Command::new(exe())
        .arg("check")
        .arg(data("spiral.toodle"))
        .output()
        .unwrap();
    assert!(ok.status.success(), "{}", String::from_utf8_lossy(&ok.stderr));

    let bad = Command::new(exe())
        .arg("check")
        .arg(data("broken.toodle"))
        .output()
        .unwrap();
    assert!(!bad.status.success());
    let stderr = String::from_utf8_lossy(&bad.stderr);
    assert!(stderr.contains("broken.toodle:2:6: unknown name 'q'"), "{stderr}");
}

#[test]
fn cli_run_writes_png() {
    let dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();
    let out_path = dir.join("spiral.png");
    let _ = std::fs::remove_file(&out_path);

    let out = Command::new(exe())
        .arg("run")
        .arg(data("spiral.toodle"))
        .arg("--out")
        .arg(&out_path)
        .args(["--seconds", "0.5", "--fps", "20", "--width", "96", "--height", "64"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let img = image::open(&out_path).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (96, 64));
    // Background from setup covers the corners.
    let corner = img.get_pixel(0, 0).0;
    assert_eq!(corner[3], 255);
    assert!(corner[2] > corner[0]);

    let stats: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(stats["evaluation"], "success");
    assert_eq!(stats["run"]["frames"], 10);
    assert!(stats["frames"]["segments"].as_u64().unwrap() >= 9);
}

#[test]
fn cli_run_echoes_script_prints() {
    let out = Command::new(exe())
        .arg("run")
        .arg(data("counter.toodle"))
        .args(["--seconds", "0.25", "--fps", "20", "--width", "32", "--height", "32"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("counter.toodle: out: 42\n"), "{stderr}");
    assert!(stderr.contains("counter.toodle: out: 4\n"), "{stderr}");
    assert!(!stderr.contains(": error: "), "{stderr}");

    let stats: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(stats["frames"]["steps"], 5);
}

#[test]
fn cli_dump_prints_step_geometry() {
    let out = Command::new(exe())
        .arg("dump")
        .arg(data("spiral.toodle"))
        .args(["--steps", "3"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let text = String::from_utf8(out.stdout).unwrap();
    let rows: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 4);
    assert!(rows[0]["setup"]["background"]["b"].as_f64().unwrap() > 0.09);
    assert_eq!(rows[1]["output"]["lines"].as_array().unwrap().len(), 1);
    assert_eq!(rows[3]["step"], 2);
}
