//! Logging configuration for commands-next.
//!
//! The `cnext` binary prints bot replies on stdout, so diagnostics go to
//! stderr by default or to a log file when one is requested.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initializes logging to a file.
///
/// Uses `path` when given, otherwise [`get_log_path`]. The file is truncated
/// on each run. Falls back to stderr logging if the file cannot be created.
pub fn init_file_logging(path: Option<&Path>) {
    let log_path = path.map(Path::to_path_buf).unwrap_or_else(get_log_path);

    if let Some(parent) = log_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory: {e}");
            init_stderr_logging();
            return;
        }
    }

    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {e}");
            init_stderr_logging();
            return;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(log_file)
        .with_ansi(false)
        .init();
}

/// Initializes logging to stderr.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Returns the default log file path.
///
/// Uses the XDG state directory on Linux (`~/.local/state/commands-next/cnext.log`),
/// or falls back to the config directory on other platforms.
pub fn get_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        return state_dir.join("commands-next").join("cnext.log");
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("commands-next").join("cnext.log");
    }

    std::env::temp_dir().join("cnext.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path_is_absolute() {
        let path = get_log_path();
        assert!(path.is_absolute());
    }

    #[test]
    fn test_log_path_ends_with_cnext_log() {
        let path = get_log_path();
        assert!(path.ends_with("cnext.log"));
    }
}
