//! Main loop driving the camera supervisor and scheduled retention
//!
//! The orchestrator owns the process-wide lifecycle: the single-instance PID
//! file, cleanup of processes left behind by a previous run, the tick loop, and
//! teardown. Teardown runs on every exit path (termination signal, fatal
//! configuration error, or a panic caught at the tick boundary) and is safe
//! to run more than once.

mod instance;
mod scheduler;

pub use instance::InstanceLock;
pub use scheduler::{IntervalScheduler, Scheduler};

use anyhow::{Context, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::GlobalConfig;
use crate::error::SupervisorError;
use crate::retention::{ReclaimReport, RetentionBudget, RetentionManager};
use crate::supervisor::{CameraEvent, CameraSupervisor};

/// Upper bound on how long a shutdown request waits for the current sleep.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub tick_interval: Duration,
    /// The supervisor's own PID file
    pub pid_file: PathBuf,
    /// Run every camera's reset command during teardown
    pub reset_on_shutdown: bool,
    pub capture_dir: PathBuf,
    pub budget: RetentionBudget,
}

impl OrchestratorConfig {
    /// Derive the loop settings from the global configuration.
    ///
    /// `cams_number` is substituted into a templated removal cap.
    pub fn from_global(global: &GlobalConfig, cams_number: usize) -> Result<Self> {
        let retention = &global.retention;
        let budget = RetentionBudget {
            max_total_bytes: retention.max_store_bytes(),
            min_free_bytes: retention.keep_free_bytes(),
            max_counted_removals: retention.removal_cap(cams_number)?,
            force_remove_below_bytes: retention.force_remove_below_bytes,
        };
        Ok(Self {
            tick_interval: global.tick_interval(),
            pid_file: global.pid_file(),
            reset_on_shutdown: global.reset_on_shutdown,
            capture_dir: retention.capture_dir.clone(),
            budget,
        })
    }
}

/// What a single tick did
#[derive(Debug, Default)]
pub struct TickReport {
    pub events: Vec<(usize, CameraEvent)>,
    /// Present when a retention pass ran and completed
    pub retention: Option<ReclaimReport>,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    supervisor: CameraSupervisor,
    retention: RetentionManager,
    scheduler: Box<dyn Scheduler>,
    shutdown: Arc<AtomicBool>,
    lock: Option<InstanceLock>,
    torn_down: bool,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        supervisor: CameraSupervisor,
        retention: RetentionManager,
        scheduler: Box<dyn Scheduler>,
    ) -> Self {
        Self {
            config,
            supervisor,
            retention,
            scheduler,
            shutdown: Arc::new(AtomicBool::new(false)),
            lock: None,
            torn_down: false,
        }
    }

    pub fn supervisor(&self) -> &CameraSupervisor {
        &self.supervisor
    }

    /// Flag that stops the loop after the current tick when set.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Route SIGINT, SIGTERM and SIGHUP to the shutdown flag.
    ///
    /// Can only be installed once per process.
    pub fn install_signal_handler(&self) -> Result<()> {
        let shutdown = self.shutdown_flag();
        ctrlc::set_handler(move || {
            tracing::info!("Caught termination signal");
            shutdown.store(true, Ordering::SeqCst);
        })
        .context("Failed to set termination handler")
    }

    /// Take the instance lock, then clear processes a previous run left behind.
    pub fn start(&mut self) -> Result<()> {
        self.lock = Some(InstanceLock::acquire(&self.config.pid_file)?);

        tracing::info!("Kill cams processes");
        self.supervisor.stop_all(false);
        Ok(())
    }

    /// Run until a shutdown is requested or a fatal error occurs.
    ///
    /// Teardown runs before returning in both cases. Fails without touching any
    /// camera when another instance holds the PID file.
    ///
    /// # Returns
    /// `Ok` after a requested shutdown, the fatal error otherwise
    pub fn run(&mut self) -> Result<()> {
        self.start()?;

        tracing::info!("Start main loop");
        let result = self.run_loop();
        self.teardown();

        if result.is_ok() {
            tracing::info!("Finish");
        }
        result
    }

    fn run_loop(&mut self) -> Result<()> {
        while !self.shutdown_requested() {
            if let Err(e) = self.guarded_tick(Instant::now()) {
                tracing::error!("Unhandled exception: {e:#}");
                return Err(e);
            }
            self.sleep_until_next_tick();
        }
        tracing::info!("Shutdown requested, leaving main loop");
        Ok(())
    }

    fn sleep_until_next_tick(&self) {
        let deadline = Instant::now() + self.config.tick_interval;
        while !self.shutdown_requested() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(SHUTDOWN_POLL));
        }
    }

    /// [`Orchestrator::tick`] with panics converted into a fatal fault.
    pub fn guarded_tick(&mut self, now: Instant) -> Result<TickReport> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.tick(now))) {
            Ok(result) => result,
            Err(payload) => Err(SupervisorError::Fault(panic_message(payload.as_ref())).into()),
        }
    }

    /// Advance every camera once, then run retention if it is due.
    ///
    /// A failed retention pass is logged and does not fail the tick.
    pub fn tick(&mut self, now: Instant) -> Result<TickReport> {
        let events = self.supervisor.tick(now)?;

        let retention = if self.scheduler.due(now) {
            match self.reclaim_now() {
                Ok(report) => Some(report),
                Err(e) => {
                    tracing::warn!("Retention pass failed: {e:#}");
                    None
                }
            }
        } else {
            None
        };

        Ok(TickReport { events, retention })
    }

    /// Run one retention pass over the capture directory.
    pub fn reclaim_now(&self) -> Result<ReclaimReport> {
        self.retention
            .reclaim(&self.config.capture_dir, &self.config.budget)
    }

    /// Stop every camera and release the PID file. Later calls do nothing.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        tracing::info!("Stop all cams");
        self.supervisor.stop_all(self.config.reset_on_shutdown);

        match self.lock.take() {
            Some(mut lock) => lock.release(),
            None => tracing::warn!("PID file not found: {}", self.config.pid_file.display()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panic: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panic: {msg}")
    } else {
        "panic with non-string payload".to_string()
    }
}
