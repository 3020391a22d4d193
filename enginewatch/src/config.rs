//! Runtime configuration for enginewatch.
//!
//! Every value has a compile-time default and can be overridden through an
//! environment variable.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONFIG_DIR: &str = ".config/enginewatch";
const PARAMS_FILE_NAME: &str = "engine_parameters.json";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_UPDATE_INTERVAL_MS: u64 = 100;

/// Where stored engine parameters live.
///
/// Priority:
/// 1. `ENGINEWATCH_PARAMS_PATH` env variable if set
/// 2. `$HOME/.config/enginewatch/engine_parameters.json` if HOME is set
/// 3. `./engine_parameters.json` as fallback
pub fn get_params_path() -> PathBuf {
    if let Ok(path) = std::env::var("ENGINEWATCH_PARAMS_PATH") {
        return PathBuf::from(path);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(DEFAULT_CONFIG_DIR)
            .join(PARAMS_FILE_NAME);
    }

    PathBuf::from(PARAMS_FILE_NAME)
}

/// Directory for the rolling log files.
///
/// Priority:
/// 1. `ENGINEWATCH_LOG_DIR` env variable if set
/// 2. `./logs` as fallback
pub fn get_log_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ENGINEWATCH_LOG_DIR") {
        return PathBuf::from(dir);
    }

    PathBuf::from(DEFAULT_LOG_DIR)
}

/// Minimum time between two printed updates of the same line.
///
/// `ENGINEWATCH_UPDATE_INTERVAL_MS` overrides the 100 ms default; values that
/// do not parse fall back to the default.
pub fn get_update_interval() -> Duration {
    let ms = std::env::var("ENGINEWATCH_UPDATE_INTERVAL_MS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_UPDATE_INTERVAL_MS);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_params_path() {
        let path = get_params_path();
        match std::env::var("ENGINEWATCH_PARAMS_PATH") {
            Ok(val) => assert_eq!(path, PathBuf::from(val)),
            Err(_) => assert!(path.ends_with(PARAMS_FILE_NAME)),
        }
    }

    #[test]
    fn test_get_log_dir() {
        let dir = get_log_dir();
        match std::env::var("ENGINEWATCH_LOG_DIR") {
            Ok(val) => assert_eq!(dir, PathBuf::from(val)),
            Err(_) => assert_eq!(dir, PathBuf::from(DEFAULT_LOG_DIR)),
        }
    }

    #[test]
    fn test_get_update_interval_default() {
        if std::env::var("ENGINEWATCH_UPDATE_INTERVAL_MS").is_err() {
            assert_eq!(get_update_interval(), Duration::from_millis(100));
        }
    }
}
