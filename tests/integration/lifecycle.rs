//! Camera lifecycle against real processes and a local readiness endpoint

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use camwatch::config::Settings;
use camwatch::orchestrator::{IntervalScheduler, Orchestrator, OrchestratorConfig};
use camwatch::probe::{HttpProber, Readiness};
use camwatch::process::pid_file::read_pid_file;
use camwatch::process::{is_process_alive, ShellRunner};
use camwatch::retention::RetentionManager;
use camwatch::supervisor::{CameraEvent, CameraPhase, CameraSupervisor, Role};

use super::helpers::{toml_path, wait_for, write_config, ReadyServer};

struct Fixture {
    _temp: TempDir,
    root: PathBuf,
    server: ReadyServer,
}

impl Fixture {
    fn new(initial_status: u16) -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let root = temp.path().to_path_buf();
        fs::create_dir_all(root.join("run")).unwrap();
        Self {
            _temp: temp,
            root,
            server: ReadyServer::start(initial_status),
        }
    }

    fn config_dir(&self) -> PathBuf {
        self.root.join("cfg")
    }

    fn pid(&self, file: &str) -> PathBuf {
        self.root.join("run").join(file)
    }

    fn marker(&self, name: &str) -> PathBuf {
        self.root.join(format!("reset_{name}"))
    }

    /// Write configs and load them. Every camera defaults to long-running
    /// `sleep` processes and a reset command that leaves a marker file.
    fn load(&self, extra_main: &str, max_start: u64, cameras: &[(&str, &str)]) -> Settings {
        let root = &self.root;
        let main = format!(
            r#"log_dir = {log_dir}
pid_dir = {pid_dir}
tick_interval_ms = 20
probe_timeout_ms = 500
reset_timeout_seconds = 5
{extra_main}

[retention]
capture_dir = {capture_dir}

[camera]
cmd = "sleep 30"
cap_cmd = "sleep 30"
reset_cmd = "touch {root_str}/reset_[cam_name]"
cap_url = "http://127.0.0.1:{port}/[cam_name]"
cap_dir_cam = "{root_str}/capture/[cam_name]"
max_start_seconds = {max_start}
pid_streamer = "[cam_name]_streamer.pid"
pid_capturer = "[cam_name]_capturer.pid"
"#,
            log_dir = toml_path(&root.join("log")),
            pid_dir = toml_path(&root.join("run")),
            capture_dir = toml_path(&root.join("capture")),
            root_str = root.display(),
            port = self.server.port(),
        );
        write_config(&self.config_dir(), &main, cameras);
        Settings::load(&self.config_dir(), "main.toml").expect("Failed to load settings")
    }
}

fn supervisor(settings: Settings) -> CameraSupervisor {
    CameraSupervisor::new(
        settings.cameras,
        Box::new(ShellRunner::new(settings.global.reset_timeout())),
        Box::new(HttpProber::new().unwrap()),
        settings.global.probe_timeout(),
    )
}

fn started(events: &[(usize, CameraEvent)], role: Role) -> Option<u32> {
    events.iter().find_map(|(_, e)| match e {
        CameraEvent::Started { role: r, pid } if *r == role => Some(*pid),
        _ => None,
    })
}

#[test]
fn test_capturer_starts_once_streamer_is_ready() {
    let fx = Fixture::new(503);
    let settings = fx.load("", 30, &[("cam_front.toml", "name = \"front\"\n")]);
    let mut sup = supervisor(settings);
    let t0 = Instant::now();

    let events = sup.tick(t0).unwrap();
    assert!(events.contains(&(0, CameraEvent::Probed(Readiness::NotReady(503)))));
    assert_eq!(sup.cameras()[0].phase(), CameraPhase::AwaitingReady);
    let streamer = read_pid_file(&fx.pid("front_streamer.pid")).unwrap();
    assert_eq!(started(&events, Role::Streamer), Some(streamer));
    assert!(is_process_alive(streamer));
    assert!(!fx.pid("front_capturer.pid").exists());

    fx.server.set_status(200);
    let events = sup.tick(t0 + Duration::from_secs(1)).unwrap();
    assert!(events.contains(&(0, CameraEvent::Probed(Readiness::Ready))));
    let capturer = read_pid_file(&fx.pid("front_capturer.pid")).unwrap();
    assert_eq!(started(&events, Role::Capturer), Some(capturer));
    assert_eq!(sup.cameras()[0].phase(), CameraPhase::CaptureActive);
    assert!(fx.root.join("capture/front").is_dir());

    // Steady state: no further probes or spawns
    let events = sup.tick(t0 + Duration::from_secs(2)).unwrap();
    assert!(events.is_empty());

    sup.stop_all(false);
    assert!(!fx.pid("front_streamer.pid").exists());
    assert!(!fx.pid("front_capturer.pid").exists());
    assert!(!fx.marker("front").exists());
}

#[test]
fn test_dead_streamer_is_restarted() {
    let fx = Fixture::new(503);
    let settings = fx.load(
        "",
        30,
        &[("cam_flaky.toml", "name = \"flaky\"\ncmd = \"exit 3\"\n")],
    );
    let mut sup = supervisor(settings);

    let first = started(&sup.tick(Instant::now()).unwrap(), Role::Streamer).unwrap();

    let mut restart = None;
    let seen = wait_for(Duration::from_secs(5), || {
        let events = sup.tick(Instant::now()).unwrap();
        if events.contains(&(
            0,
            CameraEvent::Exited {
                role: Role::Streamer,
                code: Some(3),
            },
        )) {
            restart = started(&events, Role::Streamer);
            true
        } else {
            false
        }
    });

    assert!(seen, "streamer exit was never observed");
    let restart = restart.expect("streamer was not respawned in the same tick");
    assert_ne!(restart, first);
    sup.stop_all(false);
}

#[test]
fn test_untrackable_streamer_does_not_multiply() {
    let fx = Fixture::new(404);
    let spawned = fx.root.join("spawned");
    let camera = format!(
        "name = \"stuck\"\ncmd = \"echo $$ >> {spawned}; exec sleep 30\"\npid_streamer = \"{missing}\"\n",
        spawned = spawned.display(),
        missing = fx.root.join("missing/stuck_streamer.pid").display(),
    );
    let settings = fx.load("", 30, &[("cam_stuck.toml", camera.as_str())]);
    let mut sup = supervisor(settings);
    let t0 = Instant::now();

    for n in 0..5 {
        let events = sup.tick(t0 + Duration::from_secs(n)).unwrap();
        assert!(events.iter().any(|(_, e)| matches!(
            e,
            CameraEvent::SpawnFailed {
                role: Role::Streamer,
                ..
            }
        )));
        assert!(started(&events, Role::Streamer).is_none());
        assert_eq!(sup.cameras()[0].phase(), CameraPhase::Starting);
    }

    let pids: Vec<u32> = fs::read_to_string(&spawned)
        .unwrap_or_default()
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect();
    assert!(pids.len() <= 5);
    let live = pids.iter().filter(|pid| is_process_alive(**pid)).count();
    assert_eq!(live, 0, "untracked streamers left running: {pids:?}");
    sup.stop_all(false);
}

#[test]
fn test_start_timeout_kills_and_resets() {
    let fx = Fixture::new(404);
    let settings = fx.load("", 1, &[("cam_slow.toml", "name = \"slow\"\n")]);
    let mut sup = supervisor(settings);
    let t0 = Instant::now();

    let first = started(&sup.tick(t0).unwrap(), Role::Streamer).unwrap();

    // Exactly at the limit is still allowed
    let events = sup.tick(t0 + Duration::from_secs(1)).unwrap();
    assert!(!events
        .iter()
        .any(|(_, e)| matches!(e, CameraEvent::StartTimedOut { .. })));

    let events = sup.tick(t0 + Duration::from_secs(2)).unwrap();
    assert!(events.contains(&(
        0,
        CameraEvent::StartTimedOut {
            elapsed: Duration::from_secs(2)
        }
    )));
    assert!(events.contains(&(0, CameraEvent::Reset { exit_code: Some(0) })));
    assert!(fx.marker("slow").exists());
    assert!(!fx.pid("slow_streamer.pid").exists());
    assert_eq!(sup.cameras()[0].phase(), CameraPhase::Starting);

    let events = sup.tick(t0 + Duration::from_secs(3)).unwrap();
    let second = started(&events, Role::Streamer).unwrap();
    assert_ne!(second, first);
    assert_eq!(read_pid_file(&fx.pid("slow_streamer.pid")), Some(second));
    sup.stop_all(false);
}

#[test]
fn test_disabled_capture_never_spawns_capturer() {
    let fx = Fixture::new(200);
    let settings = fx.load(
        "",
        30,
        &[("cam_view.toml", "name = \"view\"\ncap_cmd = false\n")],
    );
    let mut sup = supervisor(settings);

    let events = sup.tick(Instant::now()).unwrap();

    assert!(events.contains(&(0, CameraEvent::CaptureDisabled)));
    assert!(started(&events, Role::Capturer).is_none());
    assert!(!fx.pid("view_capturer.pid").exists());
    // Capture directory is only prepared for cameras that capture
    assert!(!fx.root.join("capture/view").exists());
    sup.stop_all(false);
}

fn wait_for_files(paths: &[PathBuf]) -> bool {
    wait_for(Duration::from_secs(5), || paths.iter().all(|p| p.exists()))
}

#[test]
fn test_orchestrator_runs_from_config_and_tears_down() {
    let fx = Fixture::new(200);
    let settings = fx.load(
        "reset_on_shutdown = true",
        30,
        &[
            ("cam_a.toml", "name = \"a\"\n"),
            ("cam_b.toml", "name = \"b\"\n"),
            ("cam_off.toml", "name = \"off\"\nactive = false\n"),
        ],
    );
    assert_eq!(settings.cameras.len(), 2);

    let global = settings.global.clone();
    let config = OrchestratorConfig::from_global(&global, settings.cameras.len()).unwrap();
    let own_pid = config.pid_file.clone();
    let mut orchestrator = Orchestrator::new(
        config,
        supervisor(settings),
        RetentionManager::new(),
        Box::new(IntervalScheduler::new(global.retention.run_every())),
    );

    let flag = orchestrator.shutdown_flag();
    let expected: Vec<PathBuf> = ["a", "b"]
        .iter()
        .flat_map(|n| {
            [
                fx.pid(&format!("{n}_streamer.pid")),
                fx.pid(&format!("{n}_capturer.pid")),
            ]
        })
        .chain([own_pid.clone()])
        .collect();
    let watcher = {
        let expected = expected.clone();
        thread::spawn(move || {
            let up = wait_for_files(&expected);
            flag.store(true, Ordering::SeqCst);
            up
        })
    };

    orchestrator.run().unwrap();

    assert!(watcher.join().unwrap(), "pipelines never came up");
    for path in &expected {
        assert!(!path.exists(), "{} survived teardown", path.display());
    }
    assert!(fx.marker("a").exists());
    assert!(fx.marker("b").exists());
    assert!(!fx.pid("off_streamer.pid").exists());
}

#[test]
fn test_leftovers_from_previous_run_are_killed_on_start() {
    let fx = Fixture::new(503);
    let settings = fx.load("", 30, &[("cam_front.toml", "name = \"front\"\n")]);
    let mut leftover = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    fs::write(fx.pid("front_streamer.pid"), leftover.id().to_string()).unwrap();

    let config = OrchestratorConfig::from_global(&settings.global, 1).unwrap();
    let mut orchestrator = Orchestrator::new(
        config,
        supervisor(settings),
        RetentionManager::new(),
        Box::new(IntervalScheduler::new(Duration::ZERO)),
    );
    orchestrator.start().unwrap();

    assert!(!leftover.wait().unwrap().success());
    assert!(!fx.pid("front_streamer.pid").exists());
    orchestrator.teardown();
}
