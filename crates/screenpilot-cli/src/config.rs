//! Timing configuration.
//!
//! The pacing policy is read from the first source that exists:
//! 1. `--timing <FILE>`
//! 2. `SCREENPILOT_TIMING` (path to a JSON file)
//! 3. `{config_dir}/screenpilot/timing.json`
//! 4. built-in defaults
//!
//! Fields missing from the file keep their default value.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use screenpilot_core::timing::TimingPolicy;
use tracing::debug;

use crate::args::TimingArgs;

/// Pick the timing file to load, if any.
pub fn timing_path(flag: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = flag {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = env::var("SCREENPILOT_TIMING") {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join("screenpilot").join("timing.json"))
        .filter(|path| path.is_file())
}

pub fn load_timing_file(path: &Path) -> Result<TimingPolicy> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read timing config {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid timing config {:?}", path))
}

/// Resolve the timing policy for a command.
pub fn load_timing(args: &TimingArgs) -> Result<TimingPolicy> {
    if args.instant {
        debug!("Using instant timing");
        return Ok(TimingPolicy::instant());
    }

    match timing_path(args.timing.as_deref()) {
        Some(path) => {
            debug!("Loading timing from {:?}", path);
            load_timing_file(&path)
        }
        None => Ok(TimingPolicy::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::paths::tests::EnvGuard;

    fn write_temp(contents: &str) -> PathBuf {
        let path = env::temp_dir().join(format!(
            "screenpilot-timing-{}.json",
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_flag_wins_over_env() {
        let _guard = EnvGuard::new(&["SCREENPILOT_TIMING"]);
        // SAFETY: We hold ENV_MUTEX via _guard
        unsafe { env::set_var("SCREENPILOT_TIMING", "/from/env.json") };

        assert_eq!(
            timing_path(Some(Path::new("/from/flag.json"))),
            Some(PathBuf::from("/from/flag.json"))
        );
        assert_eq!(timing_path(None), Some(PathBuf::from("/from/env.json")));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let path = write_temp(r#"{"after_click_ms": 50, "path_step": 4}"#);
        let timing = load_timing_file(&path).unwrap();
        assert_eq!(timing.after_click_ms, 50);
        assert_eq!(timing.path_step, 4);
        assert_eq!(timing.move_settle_ms, TimingPolicy::default().move_settle_ms);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_invalid_file_names_path() {
        let path = write_temp("not json");
        let err = load_timing_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid timing config"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = load_timing_file(Path::new("/nonexistent/screenpilot.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_instant_skips_files() {
        let args = TimingArgs {
            timing: Some(PathBuf::from("/nonexistent/screenpilot.json")),
            instant: true,
        };
        assert_eq!(load_timing(&args).unwrap(), TimingPolicy::instant());
    }

    #[test]
    fn test_flag_file_is_loaded() {
        let path = write_temp(r#"{"key_press_ms": 1}"#);
        let args = TimingArgs {
            timing: Some(path.clone()),
            instant: false,
        };
        assert_eq!(load_timing(&args).unwrap().key_press_ms, 1);
        let _ = std::fs::remove_file(&path);
    }
}
