//! Retention passes driven by a loaded configuration

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use camwatch::config::Settings;
use camwatch::orchestrator::OrchestratorConfig;
use camwatch::retention::RetentionManager;

use super::helpers::{toml_path, write_config};

const MB: usize = 1024 * 1024;

fn recording(dir: &Path, name: &str, size: usize, age_minutes: u64) -> PathBuf {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, vec![0u8; size]).unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(age_minutes * 60))
        .unwrap();
    path
}

/// Two cameras, a store quota of 3 MiB and a cap templated on the camera count.
fn load(root: &Path) -> Settings {
    let main = format!(
        r#"pid_dir = {pid_dir}

[retention]
capture_dir = {capture_dir}
max_store_gb = {quota}
keep_free_gb = 0.0
force_remove_below_bytes = 1024
max_removes_per_run = "[cams_number]"
run_every_minutes = 1

[camera]
cmd = "sleep 30"
cap_cmd = "sleep 30"
cap_url = "http://127.0.0.1:9/[cam_name]"
cap_dir_cam = "capture/[cam_name]"
max_start_seconds = 10
pid_streamer = "[cam_name]_streamer.pid"
pid_capturer = "[cam_name]_capturer.pid"
"#,
        pid_dir = toml_path(&root.join("run")),
        capture_dir = toml_path(&root.join("capture")),
        quota = 3.0 / 1024.0,
    );
    write_config(
        &root.join("cfg"),
        &main,
        &[
            ("cam_front.toml", "name = \"front\"\n"),
            ("cam_back.toml", "name = \"back\"\n"),
        ],
    );
    Settings::load(&root.join("cfg"), "main.toml").unwrap()
}

#[test]
fn test_pass_removes_oldest_up_to_camera_count() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let capture = root.join("capture");
    let stub = recording(&capture, "front/000.ts", 10, 90);
    let oldest = recording(&capture, "back/001.ts", MB, 80);
    let older = recording(&capture, "front/002.ts", MB, 70);
    let newer = recording(&capture, "back/003.ts", MB, 60);
    let newest = recording(&capture, "front/004.ts", MB, 50);

    let settings = load(root);
    let config = OrchestratorConfig::from_global(&settings.global, settings.cameras.len()).unwrap();
    assert_eq!(config.budget.max_counted_removals, 2);

    let report = RetentionManager::new()
        .reclaim(&config.capture_dir, &config.budget)
        .unwrap();

    assert!(report.warranted);
    assert!(report.cap_reached);
    assert_eq!(report.removed, vec![stub, oldest, older]);
    assert!(newer.exists() && newest.exists());

    // 2 MiB left, under the 3 MiB quota: the next pass has nothing to do
    let report = RetentionManager::new()
        .reclaim(&config.capture_dir, &config.budget)
        .unwrap();
    assert!(!report.warranted);
    assert_eq!(report.used_bytes, Some(2 * MB as u64));
}

#[test]
fn test_pass_over_missing_capture_dir_is_a_no_op() {
    let temp = TempDir::new().unwrap();
    let settings = load(temp.path());
    let config = OrchestratorConfig::from_global(&settings.global, settings.cameras.len()).unwrap();

    let report = RetentionManager::new()
        .reclaim(&config.capture_dir, &config.budget)
        .unwrap();

    assert!(!report.warranted);
    assert_eq!(report.used_bytes, Some(0));
    assert!(report.removed.is_empty());
}
