//! `run`: execute a prepared update plan.
//!
//! This is the orchestrator process `apply` spawns. It logs to the
//! console and, because its console is usually detached, also to a
//! persistent `logs/updater.log` under the app root. The file log is the
//! record an operator consults after a failed unattended update.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Args;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::constants::{LOGS_DIR_NAME, UPDATER_LOG_NAME};
use crate::orchestrator;
use crate::plan::UpdatePlan;
use crate::utils::fs::ensure_dir;

#[derive(Args)]
pub struct RunCommand {
    /// Path of the plan file to execute
    #[arg(long, default_value_os_t = UpdatePlan::default_path())]
    pub plan: PathBuf,
}

impl RunCommand {
    pub async fn execute(self, default_filter: &str) -> Result<()> {
        // Peek at the plan for the app root before logging starts, so the
        // persistent log lands next to the installation being updated.
        let app_dir = UpdatePlan::load(&self.plan)?.app_dir;
        init_run_logging(&app_dir, default_filter)?;

        orchestrator::run_plan_file(&self.plan).await
    }
}

fn init_run_logging(app_dir: &std::path::Path, default_filter: &str) -> Result<()> {
    let logs_dir = app_dir.join(LOGS_DIR_NAME);
    ensure_dir(&logs_dir)?;
    let log_path = logs_dir.join(UPDATER_LOG_NAME);
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .init();
    Ok(())
}
