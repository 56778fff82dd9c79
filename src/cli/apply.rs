//! `apply`: confirm, stage and hand off to the orchestrator.
//!
//! Everything network-bound happens here, while the application is still
//! running undisturbed: the payload is downloaded (and checksum-verified
//! in archive mode) or mirrored in full. Only then is a plan written and
//! a detached orchestrator spawned; the installation itself is mutated
//! exclusively by that orchestrator process.

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::catalog::{CatalogCache, Fetcher, PayloadRef, RemoteCatalog};
use crate::cli::check::print_check;
use crate::config::UpdaterConfig;
use crate::constants::ENV_SOURCE_URL;
use crate::lock::UpdateLock;
use crate::plan::UpdatePlan;
use crate::stage::PayloadStager;
use crate::store::VersionStore;

#[derive(Args)]
pub struct ApplyCommand {
    /// Update source URL (a JSON manifest or an autoindex directory)
    #[arg(long, env = ENV_SOURCE_URL)]
    pub source: Option<String>,

    /// Root directory of the installation
    #[arg(long, default_value = ".")]
    pub app_dir: PathBuf,

    /// Interpreter for the dependency step and the relaunch
    #[arg(long)]
    pub python: Option<PathBuf>,

    /// Skip the interactive confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl ApplyCommand {
    pub async fn execute(self) -> Result<()> {
        let config = UpdaterConfig::from_env();
        let source = self
            .source
            .or(config.source_url)
            .context("No update source configured. Set UPDATE_SOURCE_URL or pass --source.")?;

        if UpdateLock::exists(&self.app_dir) {
            println!(
                "{}",
                "An update is already in progress (lock marker present).".yellow()
            );
            return Ok(());
        }

        let current = VersionStore::new(&self.app_dir).read();
        let catalog =
            RemoteCatalog::with_cache(Fetcher::default(), CatalogCache::new(&self.app_dir));
        let check = catalog.check(&source, current).await;
        print_check(&check);

        let (Some(latest), Some(payload)) = (&check.latest, &check.payload) else {
            return Ok(());
        };
        if !self.yes && !confirm(&format!("Install update {latest}? [Y/n] ")) {
            println!("Declined.");
            return Ok(());
        }

        let stager = PayloadStager::new(Fetcher::default());
        let app_dir = self
            .app_dir
            .canonicalize()
            .with_context(|| format!("App directory not found: {}", self.app_dir.display()))?;

        let mut plan = UpdatePlan {
            app_dir,
            python_exe: self.python,
            zip: None,
            dir: None,
            version: latest.as_str().to_string(),
            exclude: vec![],
            post_install: vec![],
            cleanup_dir: None,
        };
        match payload {
            PayloadRef::Archive {
                url,
                sha256,
                post_install,
                exclude,
            } => {
                println!("Downloading archive...");
                let archive = stager.download_archive(url, sha256.as_deref()).await?;
                plan.zip = Some(archive);
                plan.post_install = post_install.clone();
                plan.exclude = exclude.clone().unwrap_or_default();
            }
            PayloadRef::Tree { url } => {
                println!("Mirroring version directory...");
                let staged = stager.mirror_tree(url).await?;
                plan.dir = Some(staged);
                plan.cleanup_dir = Some(true);
            }
        }

        let plan_path = UpdatePlan::default_path();
        plan.save(&plan_path)?;
        spawn_orchestrator(&plan_path)?;

        println!(
            "{}",
            format!("Update to {latest} started in the background.").green().bold()
        );
        println!("Progress is logged to logs/updater.log in the app directory.");
        Ok(())
    }
}

/// Interactive confirmation. Only an explicit `n`/`no` declines; a plain
/// Enter, EOF or a non-interactive stdin all proceed, so unattended runs
/// are never blocked on a prompt.
fn confirm(prompt: &str) -> bool {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return true;
    }
    print!("{prompt}");
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    if stdin.lock().read_line(&mut answer).is_err() {
        return true;
    }
    !matches!(answer.trim().to_ascii_lowercase().as_str(), "n" | "no")
}

/// Spawn the orchestrator as a fully detached process so the update can
/// replace this very binary's surroundings without killing it mid-run.
fn spawn_orchestrator(plan_path: &std::path::Path) -> Result<()> {
    let exe = std::env::current_exe().context("Failed to locate own executable")?;
    let child = std::process::Command::new(&exe)
        .arg("run")
        .arg("--plan")
        .arg(plan_path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context("Failed to spawn the update orchestrator")?;
    info!(pid = child.id(), plan = %plan_path.display(), "Orchestrator spawned");
    Ok(())
}
