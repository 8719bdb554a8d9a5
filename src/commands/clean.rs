//! Clean command - run one retention pass right now

use anyhow::Result;
use colored::Colorize;

use super::ConfigSource;
use crate::config::Settings;
use crate::logging;
use crate::orchestrator::OrchestratorConfig;
use crate::retention::{ReclaimReport, RetentionManager};

pub fn execute(source: &ConfigSource, log_level: Option<&str>) -> Result<()> {
    let settings = Settings::load(&source.dir, &source.file)?;
    logging::init(&settings.global, log_level)?;

    let config = OrchestratorConfig::from_global(&settings.global, settings.cameras.len())?;
    let report = RetentionManager::new().reclaim(&config.capture_dir, &config.budget)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &ReclaimReport) {
    if !report.warranted {
        println!("{} Storage within limits, nothing to clean", "─".dimmed());
        return;
    }

    println!(
        "{} Removed {} file(s), {} counted against the cap",
        "✓".green().bold(),
        report.removed.len(),
        report.counted_removals
    );
    if report.cap_reached {
        println!(
            "{} Removal cap reached; the next pass continues",
            "!".yellow().bold()
        );
    }
}
