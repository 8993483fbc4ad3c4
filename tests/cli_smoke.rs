use std::path::PathBuf;
use std::process::Command;

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_skyreel")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "skyreel.exe"
            } else {
                "skyreel"
            });
            p
        })
}

fn fixture() -> String {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/query_3day.json").to_owned()
}

#[test]
fn cli_still_writes_png() {
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();
    let out_path = dir.join("chart.png");
    let _ = std::fs::remove_file(&out_path);

    let status = Command::new(exe())
        .args(["still", "--in", fixture().as_str(), "--width", "192", "--height", "108"])
        .arg("--out")
        .arg(&out_path)
        .status()
        .unwrap();

    assert!(status.success());
    let img = image::open(&out_path).unwrap();
    assert_eq!((img.width(), img.height()), (192, 108));
}

#[test]
fn cli_dry_run_reports_the_frame_count() {
    let output = Command::new(exe())
        .args(["animate", "--in", fixture().as_str(), "--dry-run", "--day-cap", "1"])
        .args(["--width", "192", "--height", "108"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("100 frames"), "{stderr}");
}

#[test]
fn cli_rejects_an_unknown_layer_key() {
    let output = Command::new(exe())
        .args(["animate", "--in", fixture().as_str(), "--dry-run", "--hide", "z"])
        .output()
        .unwrap();

    assert!(!output.status.success());
}
