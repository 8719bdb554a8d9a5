//! Configuration loading
//!
//! A configuration directory holds one global file (`main.toml` by default)
//! and one TOML file per camera, found with a glob mask. Camera files are
//! overlaid on the global `[camera]` table and resolved once, at load time,
//! into immutable [`CameraConfig`]s. Nothing downstream probes for keys.

pub mod camera;
pub mod template;

pub use camera::{CameraConfig, CameraSettings, CaptureCommand, CaptureSetting};
pub use template::Template;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration directory
pub const DEFAULT_CONFIG_DIR: &str = "cfg";
/// Default global configuration file name inside the configuration directory
pub const DEFAULT_CONFIG_FILE: &str = "main.toml";

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Global settings from the main configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub log_dir: PathBuf,
    pub log_filename: String,
    pub log_level: String,
    pub pid_dir: PathBuf,
    /// The supervisor's own PID file name inside `pid_dir`
    pub pid_filename: String,
    /// Glob, relative to the configuration directory, matching camera files
    pub camera_config_mask: String,
    pub tick_interval_ms: u64,
    pub probe_timeout_ms: u64,
    /// Run every camera's reset command during teardown
    pub reset_on_shutdown: bool,
    pub reset_timeout_seconds: u64,
    pub retention: RetentionSettings,
    /// Defaults for every camera key
    pub camera: CameraSettings,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("log"),
            log_filename: "camwatch.log".to_string(),
            log_level: "info".to_string(),
            pid_dir: PathBuf::from("pid"),
            pid_filename: "camwatch.pid".to_string(),
            camera_config_mask: "cam_*.toml".to_string(),
            tick_interval_ms: 1000,
            probe_timeout_ms: 1000,
            reset_on_shutdown: false,
            reset_timeout_seconds: 60,
            retention: RetentionSettings::default(),
            camera: CameraSettings::default(),
        }
    }
}

impl GlobalConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_seconds)
    }

    pub fn pid_file(&self) -> PathBuf {
        self.pid_dir.join(&self.pid_filename)
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(&self.log_filename)
    }
}

/// `max_removes_per_run` may be a number or a template such as `"[cams_number]"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RemovalCap {
    Count(u64),
    Template(String),
}

/// The `[retention]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    pub capture_dir: PathBuf,
    /// 0 disables the size check
    pub max_store_gb: f64,
    /// 0 disables the free-space check
    pub keep_free_gb: f64,
    /// Removing a file of at most this many bytes does not count against the cap
    pub force_remove_below_bytes: u64,
    /// 0 means no cap
    pub max_removes_per_run: RemovalCap,
    pub run_every_minutes: u64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            capture_dir: PathBuf::from("capture"),
            max_store_gb: 0.0,
            keep_free_gb: 0.0,
            force_remove_below_bytes: 1024,
            max_removes_per_run: RemovalCap::Count(10),
            run_every_minutes: 10,
        }
    }
}

impl RetentionSettings {
    pub fn max_store_bytes(&self) -> u64 {
        gb_to_bytes(self.max_store_gb)
    }

    pub fn keep_free_bytes(&self) -> u64 {
        gb_to_bytes(self.keep_free_gb)
    }

    pub fn run_every(&self) -> Duration {
        Duration::from_secs(self.run_every_minutes * 60)
    }

    /// Resolve the removal cap, substituting `[cams_number]`.
    pub fn removal_cap(&self, cams_number: usize) -> Result<u64> {
        match &self.max_removes_per_run {
            RemovalCap::Count(n) => Ok(*n),
            RemovalCap::Template(s) => {
                let resolved = s.replace(template::CAMS_NUMBER, &cams_number.to_string());
                resolved.trim().parse().with_context(|| {
                    format!("max_removes_per_run is not a number after substitution: {resolved}")
                })
            }
        }
    }
}

fn gb_to_bytes(gb: f64) -> u64 {
    if gb <= 0.0 {
        0
    } else {
        (gb * BYTES_PER_GB) as u64
    }
}

/// Everything the supervisor needs, loaded and resolved.
#[derive(Debug, Clone)]
pub struct Settings {
    pub global: GlobalConfig,
    /// Active cameras in stable (sorted file path) order
    pub cameras: Vec<CameraConfig>,
}

impl Settings {
    /// Load the global file and every active camera file from `config_dir`.
    pub fn load(config_dir: &Path, config_file: &str) -> Result<Self> {
        let global = load_global(config_dir, config_file)?;
        let cameras = load_cameras(config_dir, config_file, &global)?;
        Ok(Self { global, cameras })
    }
}

/// Read only the global file.
pub fn load_global(config_dir: &Path, config_file: &str) -> Result<GlobalConfig> {
    let path = config_dir.join(config_file);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to open the file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn load_cameras(
    config_dir: &Path,
    config_file: &str,
    global: &GlobalConfig,
) -> Result<Vec<CameraConfig>> {
    let main_path = config_dir.join(config_file);
    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&config_dir.to_string_lossy()),
        global.camera_config_mask
    );
    tracing::debug!("Configs search path: {pattern}");

    let mut paths: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("Invalid camera_config_mask: {}", global.camera_config_mask))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Skipping unreadable camera config: {e}");
                None
            }
        })
        .filter(|path| path != &main_path && path.is_file())
        .collect();
    paths.sort();
    tracing::debug!("Found configs: {paths:?}");

    let mut active = Vec::new();
    for path in paths {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read camera config: {}", path.display()))?;
        let mut cam: CameraSettings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse camera config: {}", path.display()))?;

        if !cam.is_active() {
            tracing::debug!("Camera config is skipped due active flag: {}", path.display());
            continue;
        }

        if cam.name.is_none() {
            cam.name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string());
        }
        let cam = cam.overlay(&global.camera);
        tracing::debug!(
            "Loaded settings for: {}",
            cam.name.as_deref().unwrap_or_default()
        );
        active.push(cam);
    }

    let cams_number = active.len();
    active
        .iter()
        .map(|cam| {
            cam.resolve(&global.pid_dir, cams_number)
                .map_err(anyhow::Error::from)
        })
        .collect()
}
