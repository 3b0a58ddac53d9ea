//! Per-application logging configuration assembly.
//!
//! Pure functions only: nothing here touches the filesystem. The registry
//! turns an [`AppLogConfig`] into live handlers.

use super::LogSettings;
use serde::Serialize;
use std::path::PathBuf;

/// Record severity understood by application loggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Closest `log` level; `Critical` has none of its own.
    pub fn level(self) -> log::Level {
        match self {
            Self::Debug => log::Level::Debug,
            Self::Info => log::Level::Info,
            Self::Warning => log::Level::Warn,
            Self::Error | Self::Critical => log::Level::Error,
        }
    }
}

/// Which severities a handler accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFilter {
    Only(Severity),
    AllExcept(Severity),
}

impl RecordFilter {
    pub fn accepts(self, severity: Severity) -> bool {
        match self {
            Self::Only(only) => severity == only,
            Self::AllExcept(excluded) => severity != excluded,
        }
    }
}

/// Handler output target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sink {
    Console,
    /// Daily-rotated file `<dir>/<basename>.log`.
    File {
        dir: PathBuf,
        basename: String,
        keep_files: usize,
    },
}

impl Sink {
    /// Active file path for file sinks.
    pub fn path(&self) -> Option<PathBuf> {
        match self {
            Self::Console => None,
            Self::File { dir, basename, .. } => Some(dir.join(format!("{basename}.log"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerSpec {
    pub name: String,
    pub sink: Sink,
    pub filter: RecordFilter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggerSpec {
    pub name: String,
    /// Handler names, in dispatch order.
    pub handlers: Vec<String>,
}

/// Complete handler/logger layout for one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppLogConfig {
    pub app_name: String,
    pub log_dir: PathBuf,
    pub handlers: Vec<HandlerSpec>,
    pub loggers: Vec<LoggerSpec>,
}

impl AppLogConfig {
    pub fn handler(&self, name: &str) -> Option<&HandlerSpec> {
        self.handlers.iter().find(|handler| handler.name == name)
    }

    pub fn logger(&self, name: &str) -> Option<&LoggerSpec> {
        self.loggers.iter().find(|logger| logger.name == name)
    }
}

const REQUEST_CHANNEL: &str = "request";

pub fn logger_name(app_name: &str) -> String {
    format!("{app_name}_logger")
}

pub fn request_logger_name(app_name: &str) -> String {
    format!("{app_name}_request_logger")
}

fn handler_name(app_name: &str, channel: &str) -> String {
    format!("{app_name}_{channel}")
}

/// Assembles the handler and logger layout for `app_name`.
///
/// - `<app>_debug` prints to the console: only debug records in debug mode,
///   every record except debug otherwise.
/// - `<app>_info|warning|error|critical` write exact-level records to
///   `<root>/<app>/<level>.log`.
/// - `<app>_request` writes info records of the request logger to
///   `request.log`.
pub fn build_app_config(app_name: &str, settings: &LogSettings) -> AppLogConfig {
    let log_dir = settings.log_root.join(app_name);
    let file_sink = |basename: &str| Sink::File {
        dir: log_dir.clone(),
        basename: basename.to_string(),
        keep_files: settings.keep_files,
    };

    let mut handlers = vec![HandlerSpec {
        name: handler_name(app_name, Severity::Debug.as_str()),
        sink: Sink::Console,
        filter: if settings.is_debug {
            RecordFilter::Only(Severity::Debug)
        } else {
            RecordFilter::AllExcept(Severity::Debug)
        },
    }];
    for severity in &Severity::ALL[1..] {
        handlers.push(HandlerSpec {
            name: handler_name(app_name, severity.as_str()),
            sink: file_sink(severity.as_str()),
            filter: RecordFilter::Only(*severity),
        });
    }
    handlers.push(HandlerSpec {
        name: handler_name(app_name, REQUEST_CHANNEL),
        sink: file_sink(REQUEST_CHANNEL),
        filter: RecordFilter::Only(Severity::Info),
    });

    let channels = |info_channel: &str| -> Vec<String> {
        Severity::ALL
            .iter()
            .map(|severity| match severity {
                Severity::Info => handler_name(app_name, info_channel),
                other => handler_name(app_name, other.as_str()),
            })
            .collect()
    };
    let loggers = vec![
        LoggerSpec {
            name: logger_name(app_name),
            handlers: channels(Severity::Info.as_str()),
        },
        LoggerSpec {
            name: request_logger_name(app_name),
            handlers: channels(REQUEST_CHANNEL),
        },
    ];

    AppLogConfig {
        app_name: app_name.to_string(),
        log_dir,
        handlers,
        loggers,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_app_config, RecordFilter, Severity, Sink};
    use crate::logging::LogSettings;
    use std::path::PathBuf;

    fn settings(is_debug: bool) -> LogSettings {
        LogSettings {
            log_root: PathBuf::from("/var/log/apps"),
            is_debug,
            keep_files: 5,
        }
    }

    #[test]
    fn app_logger_routes_info_to_info_file() {
        let config = build_app_config("billing", &settings(true));

        assert_eq!(config.log_dir, PathBuf::from("/var/log/apps/billing"));
        let logger = config.logger("billing_logger").unwrap();
        assert_eq!(
            logger.handlers,
            vec![
                "billing_debug",
                "billing_info",
                "billing_warning",
                "billing_error",
                "billing_critical"
            ]
        );
        let info = config.handler("billing_info").unwrap();
        assert_eq!(
            info.sink.path(),
            Some(PathBuf::from("/var/log/apps/billing/info.log"))
        );
        assert_eq!(info.filter, RecordFilter::Only(Severity::Info));
    }

    #[test]
    fn request_logger_swaps_info_for_request_file() {
        let config = build_app_config("billing", &settings(true));

        let logger = config.logger("billing_request_logger").unwrap();
        assert_eq!(logger.handlers[1], "billing_request");
        assert!(!logger.handlers.contains(&"billing_info".to_string()));

        let request = config.handler("billing_request").unwrap();
        assert_eq!(
            request.sink.path(),
            Some(PathBuf::from("/var/log/apps/billing/request.log"))
        );
    }

    #[test]
    fn every_referenced_handler_is_defined() {
        let config = build_app_config("svc", &settings(false));
        for logger in &config.loggers {
            for handler in &logger.handlers {
                assert!(config.handler(handler).is_some(), "{handler} missing");
            }
        }
    }

    #[test]
    fn console_filter_follows_debug_flag() {
        let debug = build_app_config("svc", &settings(true));
        let console = debug.handler("svc_debug").unwrap();
        assert_eq!(console.sink, Sink::Console);
        assert!(console.filter.accepts(Severity::Debug));
        assert!(!console.filter.accepts(Severity::Error));

        let quiet = build_app_config("svc", &settings(false));
        let console = quiet.handler("svc_debug").unwrap();
        assert!(!console.filter.accepts(Severity::Debug));
        assert!(console.filter.accepts(Severity::Warning));
    }

    #[test]
    fn file_handlers_keep_configured_backups() {
        let mut custom = settings(true);
        custom.keep_files = 9;
        let config = build_app_config("svc", &custom);
        let critical = config.handler("svc_critical").unwrap();
        assert!(matches!(critical.sink, Sink::File { keep_files: 9, .. }));
    }
}
