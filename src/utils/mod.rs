//! Cross-cutting utilities: atomic file writes and path sanitization.

pub mod fs;
pub mod paths;

/// Parse the truthy set used by the updater's environment toggles.
///
/// `1`, `true`, `yes`, `on` (any casing) are true; everything else is
/// false. Absent variables fall back to `default`.
pub fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_flag_parses_truthy_set() {
        // Use a name no other test touches; env vars are process-global.
        unsafe {
            std::env::set_var("MOVIEBOT_TEST_FLAG", "Yes");
        }
        assert!(env_flag("MOVIEBOT_TEST_FLAG", false));
        unsafe {
            std::env::set_var("MOVIEBOT_TEST_FLAG", "off");
        }
        assert!(!env_flag("MOVIEBOT_TEST_FLAG", true));
        unsafe {
            std::env::remove_var("MOVIEBOT_TEST_FLAG");
        }
        assert!(env_flag("MOVIEBOT_TEST_FLAG", true));
        assert!(!env_flag("MOVIEBOT_TEST_FLAG", false));
    }
}
