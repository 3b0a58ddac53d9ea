//! Per-application logging helper.
//!
//! # Responsibility
//! - Create `<root>/<app>/` and one file per severity for every app name.
//! - Hand out named loggers (`<app>_logger`, `<app>_request_logger`).
//! - Keep one process-wide registry behind an explicit initializer.
//!
//! # Invariants
//! - Each app name is configured at most once per process.
//! - Initialization is idempotent for identical settings and rejects
//!   conflicting re-initialization.
//! - Filesystem failures never fail a `get_logger` call; the app degrades to
//!   console output.

pub mod config;
mod registry;
mod writer;

pub use config::{
    build_app_config, AppLogConfig, HandlerSpec, LoggerSpec, RecordFilter, Severity, Sink,
};
pub use registry::{AppLogger, LoggerRegistry};
pub use writer::app_format;

use once_cell::sync::OnceCell;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Overrides the log root directory.
pub const LOG_DIR_ENV: &str = "YZUTILS_LOG_DIR";
/// Overrides debug mode (`1|true|yes|on` or `0|false|no|off`).
pub const LOG_DEBUG_ENV: &str = "YZUTILS_LOG_DEBUG";
/// Overrides the number of rotated files kept per handler.
pub const LOG_KEEP_FILES_ENV: &str = "YZUTILS_LOG_KEEP_FILES";

const DEFAULT_LOG_DIR_NAME: &str = "logs";
const DEFAULT_KEEP_FILES: usize = 5;

static REGISTRY: OnceCell<LoggerRegistry> = OnceCell::new();

#[derive(Debug)]
pub enum LoggingError {
    InvalidAppName(String),
    InvalidLogRoot(String),
    /// The process-wide registry already runs with other settings.
    AlreadyInitialized {
        active: LogSettings,
        requested: LogSettings,
    },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAppName(name) => write!(
                f,
                "invalid app name `{name}`; expected [A-Za-z0-9][A-Za-z0-9_.-]*"
            ),
            Self::InvalidLogRoot(message) => write!(f, "invalid log root: {message}"),
            Self::AlreadyInitialized { active, requested } => write!(
                f,
                "logging already initialized at `{}` (debug={}); refusing to switch to `{}` (debug={})",
                active.log_root.display(),
                active.is_debug,
                requested.log_root.display(),
                requested.is_debug
            ),
        }
    }
}

impl Error for LoggingError {}

/// Shared settings for every application logger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogSettings {
    /// Parent directory of the per-app log directories.
    pub log_root: PathBuf,
    /// Console shows only debug records when set, everything else otherwise.
    pub is_debug: bool,
    /// Rotated files kept per file handler.
    pub keep_files: usize,
}

impl Default for LogSettings {
    /// `<cwd>/logs`, debug mode in debug builds, five backups.
    fn default() -> Self {
        let log_root = std::env::current_dir()
            .map(|dir| dir.join(DEFAULT_LOG_DIR_NAME))
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR_NAME));
        Self {
            log_root,
            is_debug: cfg!(debug_assertions),
            keep_files: DEFAULT_KEEP_FILES,
        }
    }
}

impl LogSettings {
    /// Defaults overridden by `YZUTILS_LOG_*` environment variables.
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        if let Some(dir) = lookup(LOG_DIR_ENV).filter(|dir| !dir.trim().is_empty()) {
            settings.log_root = PathBuf::from(dir.trim());
        }
        if let Some(flag) = lookup(LOG_DEBUG_ENV).and_then(|value| parse_flag(&value)) {
            settings.is_debug = flag;
        }
        if let Some(keep) = lookup(LOG_KEEP_FILES_ENV).and_then(|value| value.trim().parse().ok()) {
            settings.keep_files = keep;
        }
        settings
    }

    /// Rejects empty or relative roots.
    pub(crate) fn normalized(mut self) -> Result<Self, LoggingError> {
        self.log_root = normalize_log_root(&self.log_root)?;
        Ok(self)
    }
}

/// Initializes the process-wide registry.
///
/// # Invariants
/// - Calling this repeatedly with identical settings is a no-op.
/// - Calling it with different settings after initialization is rejected,
///   including after an implicit initialization by [`get_logger`].
pub fn init_logging(settings: LogSettings) -> Result<(), LoggingError> {
    let requested = settings.normalized()?;
    let registry = REGISTRY.get_or_try_init(|| LoggerRegistry::new(requested.clone()))?;
    if registry.settings() != &requested {
        return Err(LoggingError::AlreadyInitialized {
            active: registry.settings().clone(),
            requested,
        });
    }
    Ok(())
}

/// Active process-wide settings, or `None` before initialization.
pub fn logging_settings() -> Option<LogSettings> {
    REGISTRY.get().map(|registry| registry.settings().clone())
}

/// Process-wide registry, initialized from the environment on first use.
pub fn global_registry() -> Result<&'static LoggerRegistry, LoggingError> {
    REGISTRY.get_or_try_init(|| LoggerRegistry::new(LogSettings::from_env()))
}

/// Returns `<app>_logger` from the process-wide registry.
pub fn get_logger(app_name: &str) -> Result<AppLogger, LoggingError> {
    global_registry()?.logger(app_name)
}

/// Returns `<app>_request_logger` from the process-wide registry.
pub fn get_request_logger(app_name: &str) -> Result<AppLogger, LoggingError> {
    global_registry()?.request_logger(app_name)
}

fn normalize_log_root(log_root: &Path) -> Result<PathBuf, LoggingError> {
    if log_root.as_os_str().is_empty() {
        return Err(LoggingError::InvalidLogRoot(
            "log root cannot be empty".to_string(),
        ));
    }
    if !log_root.is_absolute() {
        return Err(LoggingError::InvalidLogRoot(format!(
            "log root must be an absolute path, got `{}`",
            log_root.display()
        )));
    }
    Ok(log_root.to_path_buf())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        parse_flag, LogSettings, LoggingError, LOG_DEBUG_ENV, LOG_DIR_ENV, LOG_KEEP_FILES_ENV,
    };
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_use_logs_under_working_directory() {
        let settings = LogSettings::default();
        assert!(settings.log_root.ends_with("logs"));
        assert_eq!(settings.keep_files, 5);
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = LogSettings::from_lookup(lookup(&[
            (LOG_DIR_ENV, " /srv/logs "),
            (LOG_DEBUG_ENV, "off"),
            (LOG_KEEP_FILES_ENV, "12"),
        ]));
        assert_eq!(settings.log_root, PathBuf::from("/srv/logs"));
        assert!(!settings.is_debug);
        assert_eq!(settings.keep_files, 12);
    }

    #[test]
    fn unparseable_environment_values_are_ignored() {
        let defaults = LogSettings::default();
        let settings = LogSettings::from_lookup(lookup(&[
            (LOG_DEBUG_ENV, "maybe"),
            (LOG_KEEP_FILES_ENV, "-1"),
        ]));
        assert_eq!(settings, defaults);
    }

    #[test]
    fn relative_root_is_rejected() {
        let settings = LogSettings {
            log_root: PathBuf::from("logs/dev"),
            is_debug: true,
            keep_files: 5,
        };
        let err = settings.normalized().unwrap_err();
        assert!(matches!(err, LoggingError::InvalidLogRoot(ref msg) if msg.contains("absolute")));
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag(""), None);
    }
}
