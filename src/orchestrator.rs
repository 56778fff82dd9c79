//! The update orchestrator: executes a plan file phase by phase.
//!
//! Runs as a short-lived process separate from the application being
//! updated, so the application's own files (including its interpreter
//! environment) can be replaced freely. The phase order is fixed:
//!
//! lock, stage, backup, dependencies, overlay, delete-list, version
//! bump, post-install, relaunch, cleanup.
//!
//! The backup phase runs before the first mutation of the app root, so
//! every failure after it leaves a restore candidate on disk. There is
//! no automatic rollback: on failure the orchestrator names the newest
//! backup archive in its log and exits non-zero, leaving restoration to
//! the operator. Cleanup (plan file, downloaded archive, ephemeral
//! staging, lock marker) runs unconditionally.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::apply;
use crate::backup;
use crate::config::UpdaterConfig;
use crate::constants::{APP_ENTRY_NAME, ENV_SPAWN, REQUIREMENTS_FILE_NAME};
use crate::core::UpdaterError;
use crate::lock::UpdateLock;
use crate::plan::{PlanSource, UpdatePlan};
use crate::stage;
use crate::store::VersionStore;
use crate::version::VersionId;

/// The phase an orchestrator run is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Staging,
    Backup,
    Dependencies,
    Overlay,
    DeleteList,
    VersionBump,
    PostInstall,
    Relaunch,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Staging => "staging",
            Phase::Backup => "backup",
            Phase::Dependencies => "dependencies",
            Phase::Overlay => "overlay",
            Phase::DeleteList => "delete-list",
            Phase::VersionBump => "version-bump",
            Phase::PostInstall => "post-install",
            Phase::Relaunch => "relaunch",
        };
        f.write_str(name)
    }
}

/// Executes one update plan to completion.
pub struct Orchestrator {
    plan: UpdatePlan,
    plan_path: PathBuf,
    staging: Option<PathBuf>,
}

/// Load the plan at `plan_path` and execute it.
///
/// This is the entry point behind `run --plan`; it owns the lock marker
/// and the unconditional cleanup.
pub async fn run_plan_file(plan_path: &Path) -> Result<()> {
    let plan = UpdatePlan::load(plan_path)?;
    info!(
        app_dir = %plan.app_dir.display(),
        version = %plan.version,
        "Starting update run"
    );

    let lock = UpdateLock::acquire(&plan.app_dir);
    let mut orchestrator = Orchestrator {
        plan,
        plan_path: plan_path.to_path_buf(),
        staging: None,
    };

    let outcome = orchestrator.execute().await;
    if let Err(e) = &outcome {
        match backup::latest_backup(&orchestrator.plan.app_dir) {
            Some(archive) => error!(
                error = %format!("{e:#}"),
                restore_from = %archive.display(),
                "Update failed; restore manually from the named backup"
            ),
            None => error!(
                error = %format!("{e:#}"),
                "Update failed before a backup was taken; installation is unmodified"
            ),
        }
    }
    orchestrator.cleanup();
    lock.release();
    outcome
}

impl Orchestrator {
    async fn execute(&mut self) -> Result<()> {
        let staging = self.phase_staging()?;
        self.staging = Some(staging.clone());

        self.phase(Phase::Backup);
        backup::create_backup(&self.plan.app_dir, &self.plan.effective_exclude())?;

        self.phase(Phase::Dependencies);
        self.install_dependencies(&staging).await?;

        self.phase(Phase::Overlay);
        apply::overlay(&staging, &self.plan.app_dir, &self.plan.effective_exclude())?;

        self.phase(Phase::DeleteList);
        apply::apply_delete_list(&self.plan.app_dir, &staging)?;

        self.phase(Phase::VersionBump);
        if !self.plan.version.trim().is_empty() {
            let store = VersionStore::new(&self.plan.app_dir);
            store.write(&VersionId::parse(&self.plan.version))?;
        }

        self.phase(Phase::PostInstall);
        self.run_post_install().await?;

        self.phase(Phase::Relaunch);
        self.relaunch_app()?;

        info!(version = %self.plan.version, "Update applied");
        Ok(())
    }

    fn phase(&self, phase: Phase) {
        info!(%phase, "Entering phase");
    }

    fn phase_staging(&self) -> Result<PathBuf> {
        self.phase(Phase::Staging);
        match self.plan.source()? {
            PlanSource::Archive(zip_path) => stage::unpack_archive(zip_path),
            PlanSource::Staged(dir) => {
                if !dir.is_dir() {
                    return Err(UpdaterError::InvalidPlan {
                        reason: format!("staged directory does not exist: {}", dir.display()),
                    }
                    .into());
                }
                Ok(dir.to_path_buf())
            }
        }
    }

    /// Install the payload's dependency spec, when both an interpreter
    /// and a `requirements.txt` are present.
    async fn install_dependencies(&self, staging: &Path) -> Result<()> {
        let Some(python) = &self.plan.python_exe else {
            debug!("No interpreter in plan; skipping dependency step");
            return Ok(());
        };
        let requirements = staging.join(REQUIREMENTS_FILE_NAME);
        if !requirements.is_file() {
            debug!("Payload carries no dependency spec");
            return Ok(());
        }

        run_command(
            python,
            &["-m", "pip", "install", "--upgrade", "pip"],
            &self.plan.app_dir,
        )
        .await
        .context("pip self-upgrade failed")?;

        run_command(
            python,
            &[
                "-m",
                "pip",
                "install",
                "-r",
                &requirements.to_string_lossy(),
            ],
            &self.plan.app_dir,
        )
        .await
        .context("Dependency installation failed")?;
        info!("Dependencies installed");
        Ok(())
    }

    /// Run the plan's post-install commands in order, stopping at the
    /// first failure.
    async fn run_post_install(&self) -> Result<()> {
        for command in &self.plan.post_install {
            let trimmed = command.trim();
            if trimmed.is_empty() {
                continue;
            }
            info!(command = trimmed, "Running post-install command");
            run_shell(trimmed, &self.plan.app_dir)
                .await
                .with_context(|| format!("Post-install command failed: {trimmed}"))?;
        }
        Ok(())
    }

    /// Spawn a fresh, detached instance of the application.
    ///
    /// Skipped when the plan has no interpreter or `UPDATER_SPAWN` is
    /// off (an external supervisor restarts the app itself).
    fn relaunch_app(&self) -> Result<()> {
        let Some(python) = &self.plan.python_exe else {
            debug!("No interpreter in plan; skipping relaunch");
            return Ok(());
        };
        if !UpdaterConfig::from_env().spawn_after_update {
            info!("Relaunch disabled by {}", ENV_SPAWN);
            return Ok(());
        }

        let entry = self.plan.app_dir.join(APP_ENTRY_NAME);
        let child = std::process::Command::new(python)
            .arg(&entry)
            .current_dir(&self.plan.app_dir)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| UpdaterError::CommandFailed {
                command: format!("{} {}", python.display(), entry.display()),
                code: e.raw_os_error(),
            })?;
        info!(pid = child.id(), "Application relaunched");
        Ok(())
    }

    /// Remove everything transient the run produced. Best-effort; every
    /// failure is logged and swallowed.
    fn cleanup(&self) {
        remove_quietly(&self.plan_path, "plan file");
        if let Some(zip_path) = &self.plan.zip {
            remove_quietly(zip_path, "downloaded archive");
        }
        if self.plan.should_cleanup_staging()
            && let Some(staging) = &self.staging
        {
            if let Err(e) = std::fs::remove_dir_all(staging) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %staging.display(), error = %e, "Could not remove staging directory");
                }
            } else {
                debug!(path = %staging.display(), "Staging directory removed");
            }
        }
    }
}

fn remove_quietly(path: &Path, what: &str) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed {what}"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Could not remove {what}"),
    }
}

async fn run_command(program: &Path, args: &[&str], cwd: &Path) -> Result<()> {
    let status = tokio::process::Command::new(program)
        .args(args)
        .current_dir(cwd)
        .status()
        .await
        .with_context(|| format!("Failed to spawn {}", program.display()))?;
    if !status.success() {
        return Err(UpdaterError::CommandFailed {
            command: format!("{} {}", program.display(), args.join(" ")),
            code: status.code(),
        }
        .into());
    }
    Ok(())
}

async fn run_shell(command: &str, cwd: &Path) -> Result<()> {
    let mut cmd = if cfg!(windows) {
        let mut c = tokio::process::Command::new("cmd");
        c.args(["/C", command]);
        c
    } else {
        let mut c = tokio::process::Command::new("sh");
        c.args(["-c", command]);
        c
    };
    let status = cmd
        .current_dir(cwd)
        .status()
        .await
        .with_context(|| format!("Failed to spawn shell for: {command}"))?;
    if !status.success() {
        return Err(UpdaterError::CommandFailed {
            command: command.to_string(),
            code: status.code(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn base_plan(app_dir: &Path, staging: &Path) -> UpdatePlan {
        UpdatePlan {
            app_dir: app_dir.to_path_buf(),
            python_exe: None,
            zip: None,
            dir: Some(staging.to_path_buf()),
            version: "v1.1.0".into(),
            exclude: vec![],
            post_install: vec![],
            cleanup_dir: Some(true),
        }
    }

    #[tokio::test]
    async fn staged_plan_runs_end_to_end() {
        let tmp = TempDir::new().unwrap();
        let app = tmp.path().join("app");
        let staging = tmp.path().join("staging");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(app.join("VERSION"), "v1.0.0").unwrap();
        std::fs::write(app.join("stale.py"), "old").unwrap();
        std::fs::write(staging.join("main.py"), "new entry").unwrap();
        std::fs::write(staging.join("delete"), "stale.py\n").unwrap();

        let plan_path = tmp.path().join("plan.json");
        base_plan(&app, &staging).save(&plan_path).unwrap();

        run_plan_file(&plan_path).await.unwrap();

        assert_eq!(std::fs::read_to_string(app.join("main.py")).unwrap(), "new entry");
        assert!(!app.join("stale.py").exists());
        assert_eq!(std::fs::read_to_string(app.join("VERSION")).unwrap(), "v1.1.0");
        assert!(backup::latest_backup(&app).is_some());
        // Everything transient is gone.
        assert!(!plan_path.exists());
        assert!(!staging.exists());
        assert!(!UpdateLock::exists(&app));
    }

    #[tokio::test]
    async fn post_install_failure_aborts_with_backup_on_disk() {
        let tmp = TempDir::new().unwrap();
        let app = tmp.path().join("app");
        let staging = tmp.path().join("staging");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("main.py"), "x").unwrap();

        let mut plan = base_plan(&app, &staging);
        plan.post_install = vec!["exit 3".into()];
        let plan_path = tmp.path().join("plan.json");
        plan.save(&plan_path).unwrap();

        let err = run_plan_file(&plan_path).await.unwrap_err();
        assert!(format!("{err:#}").contains("exit 3"));
        // Backup exists and cleanup still ran.
        assert!(backup::latest_backup(&app).is_some());
        assert!(!plan_path.exists());
        assert!(!UpdateLock::exists(&app));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_pip_upgrade_aborts_the_run() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let app = tmp.path().join("app");
        let staging = tmp.path().join("staging");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("main.py"), "new entry").unwrap();
        std::fs::write(staging.join("requirements.txt"), "aiogram==3.4\n").unwrap();

        // Fake interpreter that fails only the pip self-upgrade call.
        let python = tmp.path().join("python3");
        std::fs::write(
            &python,
            "#!/bin/sh\nfor a in \"$@\"; do [ \"$a\" = \"--upgrade\" ] && exit 7; done\nexit 0\n",
        )
        .unwrap();
        std::fs::set_permissions(&python, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut plan = base_plan(&app, &staging);
        plan.python_exe = Some(python);
        let plan_path = tmp.path().join("plan.json");
        plan.save(&plan_path).unwrap();

        let err = run_plan_file(&plan_path).await.unwrap_err();
        assert!(format!("{err:#}").contains("pip self-upgrade failed"));
        // The dependency phase runs after backup but before overlay: a
        // restore candidate exists and the app root was never touched.
        assert!(backup::latest_backup(&app).is_some());
        assert!(!app.join("main.py").exists());
        assert!(!UpdateLock::exists(&app));
    }

    #[tokio::test]
    async fn missing_staged_directory_fails_before_backup() {
        let tmp = TempDir::new().unwrap();
        let app = tmp.path().join("app");
        std::fs::create_dir_all(&app).unwrap();

        let plan = base_plan(&app, &tmp.path().join("nowhere"));
        let plan_path = tmp.path().join("plan.json");
        plan.save(&plan_path).unwrap();

        assert!(run_plan_file(&plan_path).await.is_err());
        assert!(backup::latest_backup(&app).is_none());
        assert!(!UpdateLock::exists(&app));
    }

    #[tokio::test]
    async fn archive_plan_unpacks_and_applies() {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let tmp = TempDir::new().unwrap();
        let app = tmp.path().join("app");
        std::fs::create_dir_all(&app).unwrap();

        let zip_path = tmp.path().join("update.zip");
        let file = std::fs::File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("main.py", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"from archive").unwrap();
        writer.finish().unwrap();

        let mut plan = base_plan(&app, Path::new("unused"));
        plan.dir = None;
        plan.zip = Some(zip_path.clone());
        plan.cleanup_dir = None;
        let plan_path = tmp.path().join("plan.json");
        plan.save(&plan_path).unwrap();

        run_plan_file(&plan_path).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(app.join("main.py")).unwrap(),
            "from archive"
        );
        // The archive itself is consumed.
        assert!(!zip_path.exists());
    }
}
