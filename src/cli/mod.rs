//! Command-line interface.
//!
//! Three subcommands with a clear split of responsibility:
//!
//! - `check` reports whether a newer version is published, mutating
//!   nothing.
//! - `apply` confirms, stages the payload locally, writes a plan file
//!   and hands off to a detached orchestrator process.
//! - `run` is that orchestrator process; it consumes a plan file and
//!   performs the installation. Operators normally never invoke it by
//!   hand.

mod apply;
mod check;
mod run;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

pub use apply::ApplyCommand;
pub use check::CheckCommand;
pub use run::RunCommand;

/// Staged self-update tool for the movie catalog bot.
#[derive(Parser)]
#[command(name = "moviebot-updater")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug-level diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the configured source for a newer published version
    Check(CheckCommand),
    /// Download, confirm and install the latest published version
    Apply(ApplyCommand),
    /// Execute a prepared update plan (spawned internally by `apply`)
    Run(RunCommand),
}

impl Cli {
    /// Dispatch the parsed command.
    pub async fn execute(self) -> Result<()> {
        let filter = self.log_filter();
        match self.command {
            Commands::Check(cmd) => {
                init_console_logging(&filter);
                cmd.execute().await
            }
            Commands::Apply(cmd) => {
                init_console_logging(&filter);
                cmd.execute().await
            }
            // The orchestrator owns its logging; it also writes a
            // persistent log next to the installation.
            Commands::Run(cmd) => cmd.execute(&filter).await,
        }
    }

    fn log_filter(&self) -> String {
        if self.verbose {
            "debug".to_string()
        } else if self.quiet {
            "warn".to_string()
        } else {
            "info".to_string()
        }
    }
}

fn init_console_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
