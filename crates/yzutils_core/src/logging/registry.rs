//! Application-name -> configured-logger registry.
//!
//! # Invariants
//! - Each app name is configured at most once per registry.
//! - Configuration never fails on filesystem problems; the app falls back
//!   to its console handler and a warning is printed.

use super::config::{
    build_app_config, logger_name, request_logger_name, AppLogConfig, RecordFilter, Severity,
};
use super::writer::build_writer;
use super::{LogSettings, LoggingError};
use flexi_logger::writers::LogWriter;
use flexi_logger::DeferredNow;
use log::{info, Record};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::panic::Location;
use std::sync::{Arc, Mutex, PoisonError};

static APP_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("valid app name regex"));

struct Handler {
    name: String,
    filter: RecordFilter,
    writer: Box<dyn LogWriter>,
}

struct AppState {
    config: AppLogConfig,
    handlers: BTreeMap<String, Arc<Handler>>,
    degraded: bool,
}

impl AppState {
    fn install(config: AppLogConfig) -> Self {
        let mut handlers = BTreeMap::new();
        let mut failure = std::fs::create_dir_all(&config.log_dir)
            .err()
            .map(|err| format!("cannot create `{}`: {err}", config.log_dir.display()));

        for spec in &config.handlers {
            if failure.is_some() && spec.sink.path().is_some() {
                continue;
            }
            match build_writer(&spec.sink) {
                Ok(writer) => {
                    handlers.insert(
                        spec.name.clone(),
                        Arc::new(Handler {
                            name: spec.name.clone(),
                            filter: spec.filter,
                            writer,
                        }),
                    );
                }
                Err(err) => failure = Some(format!("handler `{}`: {err}", spec.name)),
            }
        }

        let degraded = failure.is_some();
        if let Some(reason) = failure {
            // Logging cannot report its own setup failure through itself.
            eprintln!(
                "warning: file logging disabled for app `{}` ({reason}); using console only",
                config.app_name
            );
            let file_handlers: Vec<String> = config
                .handlers
                .iter()
                .filter(|spec| spec.sink.path().is_some())
                .map(|spec| spec.name.clone())
                .collect();
            for name in file_handlers {
                handlers.remove(&name);
            }
        }

        Self {
            config,
            handlers,
            degraded,
        }
    }

    fn logger(&self, name: String) -> AppLogger {
        let handlers = self
            .config
            .logger(&name)
            .map(|spec| {
                spec.handlers
                    .iter()
                    .filter_map(|handler| self.handlers.get(handler).cloned())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        AppLogger {
            name,
            handlers: handlers.into(),
        }
    }
}

/// Named application logger.
///
/// Cheap to clone; all clones share the same handlers.
#[derive(Clone)]
pub struct AppLogger {
    name: String,
    handlers: Arc<[Arc<Handler>]>,
}

impl AppLogger {
    /// Logger name, e.g. `billing_logger`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the handlers this logger dispatches to.
    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name.as_str()).collect()
    }

    #[track_caller]
    pub fn debug(&self, message: impl Display) {
        self.log(Severity::Debug, message);
    }

    #[track_caller]
    pub fn info(&self, message: impl Display) {
        self.log(Severity::Info, message);
    }

    #[track_caller]
    pub fn warning(&self, message: impl Display) {
        self.log(Severity::Warning, message);
    }

    #[track_caller]
    pub fn error(&self, message: impl Display) {
        self.log(Severity::Error, message);
    }

    #[track_caller]
    pub fn critical(&self, message: impl Display) {
        self.log(Severity::Critical, message);
    }

    /// Sends one record to every handler whose filter accepts `severity`.
    #[track_caller]
    pub fn log(&self, severity: Severity, message: impl Display) {
        let location = Location::caller();
        if severity == Severity::Critical {
            self.dispatch(severity, location, format_args!("[critical] {message}"));
        } else {
            self.dispatch(severity, location, format_args!("{message}"));
        }
    }

    /// Flushes every handler.
    pub fn flush(&self) {
        for handler in self.handlers.iter() {
            if let Err(err) = handler.writer.flush() {
                eprintln!("warning: flushing log handler `{}` failed: {err}", handler.name);
            }
        }
    }

    fn dispatch(
        &self,
        severity: Severity,
        location: &'static Location<'static>,
        args: fmt::Arguments<'_>,
    ) {
        let mut now = DeferredNow::new();
        let record = Record::builder()
            .args(args)
            .level(severity.level())
            .target(&self.name)
            .file(Some(location.file()))
            .line(Some(location.line()))
            .build();
        for handler in self.handlers.iter() {
            if !handler.filter.accepts(severity) {
                continue;
            }
            if let Err(err) = handler.writer.write(&mut now, &record) {
                eprintln!("warning: log handler `{}` failed: {err}", handler.name);
            }
        }
    }
}

impl Debug for AppLogger {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppLogger")
            .field("name", &self.name)
            .field("handlers", &self.handler_names())
            .finish()
    }
}

/// Registry of configured applications sharing one [`LogSettings`].
pub struct LoggerRegistry {
    settings: LogSettings,
    apps: Mutex<BTreeMap<String, Arc<AppState>>>,
}

impl LoggerRegistry {
    /// Creates an empty registry.
    ///
    /// # Errors
    /// - Returns an error when `settings.log_root` is empty or relative.
    pub fn new(settings: LogSettings) -> Result<Self, LoggingError> {
        Ok(Self {
            settings: settings.normalized()?,
            apps: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn settings(&self) -> &LogSettings {
        &self.settings
    }

    /// Returns `<app>_logger`, configuring the app on first use.
    pub fn logger(&self, app_name: &str) -> Result<AppLogger, LoggingError> {
        Ok(self.ensure_app(app_name)?.logger(logger_name(app_name)))
    }

    /// Returns `<app>_request_logger`, configuring the app on first use.
    pub fn request_logger(&self, app_name: &str) -> Result<AppLogger, LoggingError> {
        Ok(self
            .ensure_app(app_name)?
            .logger(request_logger_name(app_name)))
    }

    /// Configured layout for an app, if it was initialized.
    pub fn app_config(&self, app_name: &str) -> Option<AppLogConfig> {
        self.lock_apps()
            .get(app_name)
            .map(|state| state.config.clone())
    }

    /// Whether the app fell back to console-only output.
    pub fn is_degraded(&self, app_name: &str) -> Option<bool> {
        self.lock_apps().get(app_name).map(|state| state.degraded)
    }

    /// Sorted names of configured apps.
    pub fn apps(&self) -> Vec<String> {
        self.lock_apps().keys().cloned().collect()
    }

    fn ensure_app(&self, app_name: &str) -> Result<Arc<AppState>, LoggingError> {
        if !APP_NAME_RE.is_match(app_name) {
            return Err(LoggingError::InvalidAppName(app_name.to_string()));
        }

        let mut apps = self.lock_apps();
        if let Some(state) = apps.get(app_name) {
            return Ok(Arc::clone(state));
        }

        let state = Arc::new(AppState::install(build_app_config(
            app_name,
            &self.settings,
        )));
        info!(
            "event=app_logger_init module=logging status={} app={} log_dir={}",
            if state.degraded { "degraded" } else { "ok" },
            app_name,
            state.config.log_dir.display()
        );
        apps.insert(app_name.to_string(), Arc::clone(&state));
        Ok(state)
    }

    fn lock_apps(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Arc<AppState>>> {
        self.apps.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
