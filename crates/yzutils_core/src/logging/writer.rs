//! Record layout and handler writers.

use super::config::Sink;
use flexi_logger::writers::{FileLogWriter, LogWriter};
use flexi_logger::{
    Age, Cleanup, Criterion, DeferredNow, FlexiLoggerError, FileSpec, Naming, WriteMode,
    TS_DASHES_BLANK_COLONS_DOT_BLANK,
};
use log::Record;
use std::fs::OpenOptions;
use std::io::{self, Write};

/// Infix format of rotated files, e.g. `info_2024-06-09.log`.
const ROTATED_INFIX: &str = "%Y-%m-%d";

/// `time | LEVEL | PID:.. | TID:.. | [target: file:line] | - message`
///
/// The bracketed location names the logger and the call site's `file:line`
/// instead of a module and function name; `AppLogger` captures callers via
/// `#[track_caller]`, which exposes no function name.
pub fn app_format(w: &mut dyn Write, now: &mut DeferredNow, record: &Record) -> io::Result<()> {
    let thread = std::thread::current();
    write!(
        w,
        "{} | {} | PID:{} | TID:{} | [{}: {}:{}] | - {}",
        now.format(TS_DASHES_BLANK_COLONS_DOT_BLANK),
        record.level(),
        std::process::id(),
        thread.name().unwrap_or("<unnamed>"),
        record.target(),
        record.file().unwrap_or("<unknown>"),
        record.line().unwrap_or(0),
        record.args()
    )
}

/// Console handler writer.
pub(crate) struct StdoutWriter;

impl LogWriter for StdoutWriter {
    fn write(&self, now: &mut DeferredNow, record: &Record) -> io::Result<()> {
        let mut out = io::stdout().lock();
        app_format(&mut out, now, record)?;
        out.write_all(b"\n")
    }

    fn flush(&self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// Builds the writer backing one sink.
///
/// File sinks write to `<dir>/<basename>.log`, created here so every level
/// file exists before its first record. They rotate daily to
/// `<basename>_<date>.log` and keep `keep_files` rotated files.
pub(crate) fn build_writer(sink: &Sink) -> Result<Box<dyn LogWriter>, FlexiLoggerError> {
    match sink {
        Sink::Console => Ok(Box::new(StdoutWriter)),
        Sink::File {
            dir,
            basename,
            keep_files,
        } => {
            if let Some(path) = sink.path() {
                OpenOptions::new().create(true).append(true).open(path)?;
            }
            let writer = FileLogWriter::builder(
                FileSpec::default()
                    .directory(dir.as_path())
                    .basename(basename.as_str())
                    .suppress_timestamp(),
            )
            .format(app_format)
            .rotate(
                Criterion::Age(Age::Day),
                Naming::TimestampsCustomFormat {
                    current_infix: Some(""),
                    format: ROTATED_INFIX,
                },
                Cleanup::KeepLogFiles(*keep_files),
            )
            .append()
            .write_mode(WriteMode::Direct)
            .try_build()?;
            Ok(Box::new(writer))
        }
    }
}
