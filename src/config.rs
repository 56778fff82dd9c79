//! Environment-driven configuration for the host commands.
//!
//! CLI flags take precedence over environment variables; this module only
//! captures the environment side so the precedence logic lives with the
//! commands that apply it.

use crate::constants::{ENV_AUTO_UPDATE, ENV_SOURCE_URL, ENV_SPAWN};
use crate::utils::env_flag;

/// Settings read from the process environment.
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Remote catalog source, from `UPDATE_SOURCE_URL`. There is no
    /// built-in default; without a source, checks report "not configured".
    pub source_url: Option<String>,
    /// Whether update checks are enabled at all (`AUTO_UPDATE`, default on).
    pub auto_update: bool,
    /// Whether a fresh app instance is spawned after a successful apply
    /// (`UPDATER_SPAWN`, default on; disable under a process supervisor).
    pub spawn_after_update: bool,
}

impl UpdaterConfig {
    pub fn from_env() -> Self {
        let source_url = std::env::var(ENV_SOURCE_URL)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self {
            source_url,
            auto_update: env_flag(ENV_AUTO_UPDATE, true),
            spawn_after_update: env_flag(ENV_SPAWN, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_toggle_follows_env() {
        unsafe {
            std::env::set_var(ENV_SPAWN, "0");
        }
        assert!(!UpdaterConfig::from_env().spawn_after_update);
        unsafe {
            std::env::remove_var(ENV_SPAWN);
        }
        assert!(UpdaterConfig::from_env().spawn_after_update);
    }

    #[test]
    fn blank_source_url_reads_as_unset() {
        unsafe {
            std::env::set_var(ENV_SOURCE_URL, "   ");
        }
        let config = UpdaterConfig::from_env();
        assert!(config.source_url.is_none());
        unsafe {
            std::env::remove_var(ENV_SOURCE_URL);
        }
    }
}
