//! `check`: report whether a newer version is published.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::catalog::{CatalogCache, Fetcher, RemoteCatalog, UpdateCheck};
use crate::config::UpdaterConfig;
use crate::constants::ENV_SOURCE_URL;
use crate::store::VersionStore;

#[derive(Args)]
pub struct CheckCommand {
    /// Update source URL (a JSON manifest or an autoindex directory)
    #[arg(long, env = ENV_SOURCE_URL)]
    pub source: Option<String>,

    /// Root directory of the installation
    #[arg(long, default_value = ".")]
    pub app_dir: PathBuf,
}

impl CheckCommand {
    pub async fn execute(self) -> Result<()> {
        let config = UpdaterConfig::from_env();
        if !config.auto_update {
            println!("{}", "Update checks are disabled (AUTO_UPDATE=0).".yellow());
            return Ok(());
        }
        let Some(source) = self.source else {
            println!(
                "{}",
                "No update source configured. Set UPDATE_SOURCE_URL or pass --source.".yellow()
            );
            return Ok(());
        };

        let current = VersionStore::new(&self.app_dir).read();
        let catalog =
            RemoteCatalog::with_cache(Fetcher::default(), CatalogCache::new(&self.app_dir));
        let check = catalog.check(&source, current).await;
        print_check(&check);
        Ok(())
    }
}

pub(crate) fn print_check(check: &UpdateCheck) {
    println!("Installed version: {}", check.current.as_str().cyan());
    match (&check.latest, check.available) {
        (Some(latest), true) => {
            println!(
                "{} {} {}",
                "Update available:".green().bold(),
                check.current.as_str(),
                format!("-> {latest}").green().bold()
            );
            if let Some(notes) = &check.notes {
                println!("\n{}", "Release notes:".bold());
                println!("{}", notes.trim());
            }
        }
        (Some(latest), false) => {
            println!("Latest published:  {latest}");
            println!("{}", "Already up to date.".green());
        }
        (None, _) => {
            println!("{}", "No published versions found at the source.".yellow());
        }
    }
}
