//! Logging setup for runkit.
//!
//! Builds a layered `tracing` subscriber:
//! - console output to stderr (unless disabled)
//! - `{log_dir}/{name}.log` with everything at the configured level
//! - `{log_dir}/error.log` with errors only
//!
//! File output starts on `tracing-appender` non-blocking writers. Their
//! guards are held in `LogGuards`. `LogGuards::flush` drains each writer
//! and switches its sink to direct, synchronous writes on the same file, so
//! exit handlers that log after the flush still reach the files.

use crate::error::{Result, RunkitError};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Options for `init_logging`.
#[derive(Debug, Clone)]
pub struct LogOptions<'a> {
    /// Base name of the main log file (`{name}.log`).
    pub name: &'a str,
    /// Directory the log files are written to. Must exist.
    pub log_dir: &'a Path,
    /// Emit debug-level events.
    pub debug: bool,
    /// Skip the console layer.
    pub no_console: bool,
}

enum SinkState {
    Buffered(NonBlocking),
    Direct(File),
}

/// A log file writer, non-blocking until its worker is flushed.
#[derive(Clone)]
pub struct FileSink {
    state: Arc<Mutex<SinkState>>,
}

impl FileSink {
    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Whether writes still go through the background worker.
    pub fn is_buffered(&self) -> bool {
        matches!(*self.lock(), SinkState::Buffered(_))
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut *self.lock() {
            SinkState::Buffered(writer) => writer.write(buf),
            SinkState::Direct(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut *self.lock() {
            SinkState::Buffered(writer) => writer.flush(),
            SinkState::Direct(file) => file.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for FileSink {
    type Writer = FileSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// The background half of a `FileSink`.
struct FileWorker {
    guard: WorkerGuard,
    sink: FileSink,
    file: File,
}

impl FileWorker {
    /// Drain the worker, then point the sink at the file directly.
    fn finish(self) {
        let FileWorker { guard, sink, file } = self;
        let mut state = sink.lock();
        drop(guard);
        *state = SinkState::Direct(file);
    }
}

/// Open `dir/file_name` for appending behind a non-blocking writer.
fn open_file_sink(dir: &Path, file_name: &str) -> Result<(FileSink, FileWorker)> {
    let path = dir.join(file_name);
    let file = open_log_file(dir, file_name)?;
    let direct = file
        .try_clone()
        .map_err(|e| RunkitError::filesystem(&path, e))?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    let sink = FileSink {
        state: Arc::new(Mutex::new(SinkState::Buffered(writer))),
    };
    let worker = FileWorker {
        guard,
        sink: sink.clone(),
        file: direct,
    };
    Ok((sink, worker))
}

/// Keeps the non-blocking file writers alive until `flush`.
#[must_use = "dropping LogGuards immediately stops file logging"]
pub struct LogGuards {
    workers: Vec<FileWorker>,
}

impl LogGuards {
    /// Guards for a subscriber that has no buffered writers.
    pub fn empty() -> Self {
        Self {
            workers: Vec::new(),
        }
    }

    /// Write out pending log output. Later events are written synchronously.
    pub fn flush(self) {
        for worker in self.workers {
            worker.finish();
        }
    }
}

impl std::fmt::Debug for LogGuards {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogGuards")
            .field("writers", &self.workers.len())
            .finish()
    }
}

/// Install the global subscriber. Fails if the log files cannot be opened
/// or a global subscriber is already installed.
pub fn init_logging(options: &LogOptions<'_>) -> Result<LogGuards> {
    let default_level = if options.debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let main_file_name = format!("{}.log", options.name);
    let (main_sink, main_worker) = open_file_sink(options.log_dir, &main_file_name)?;
    let (error_sink, error_worker) = open_file_sink(options.log_dir, "error.log")?;

    let console = (!options.no_console).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(main_sink)
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(error_sink)
                .with_ansi(false)
                .with_filter(LevelFilter::ERROR),
        )
        .try_init()
        .map_err(|e| RunkitError::UserError(format!("failed to initialise logging: {}", e)))?;

    Ok(LogGuards {
        workers: vec![main_worker, error_worker],
    })
}

/// Install a console-only subscriber for commands that don't own a log
/// directory. Ignores an already-installed subscriber.
pub fn init_console_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .ok();
}

fn open_log_file(dir: &Path, file_name: &str) -> Result<std::fs::File> {
    let path = dir.join(file_name);
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| RunkitError::filesystem(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_log_file_creates_and_appends() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("svc.log"), "existing\n").unwrap();

        let mut file = open_log_file(temp_dir.path(), "svc.log").unwrap();
        use std::io::Write;
        writeln!(file, "appended").unwrap();

        let content = std::fs::read_to_string(temp_dir.path().join("svc.log")).unwrap();
        assert_eq!(content, "existing\nappended\n");
    }

    #[test]
    fn test_open_log_file_in_missing_dir_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = open_log_file(&temp_dir.path().join("missing"), "svc.log").unwrap_err();
        assert!(matches!(err, RunkitError::FilesystemError { .. }));
    }

    #[test]
    fn test_sink_keeps_writing_after_flush() {
        let temp_dir = TempDir::new().unwrap();
        let (mut sink, worker) = open_file_sink(temp_dir.path(), "svc.log").unwrap();
        let guards = LogGuards {
            workers: vec![worker],
        };

        sink.write_all(b"before\n").unwrap();
        assert!(sink.is_buffered());

        guards.flush();
        assert!(!sink.is_buffered());
        sink.write_all(b"after\n").unwrap();

        let content = std::fs::read_to_string(temp_dir.path().join("svc.log")).unwrap();
        assert_eq!(content, "before\nafter\n");
    }

    #[test]
    fn test_events_logged_after_flush_reach_file() {
        let temp_dir = TempDir::new().unwrap();
        let (sink, worker) = open_file_sink(temp_dir.path(), "svc.log").unwrap();
        let guards = LogGuards {
            workers: vec![worker],
        };
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_writer(sink)
                .with_ansi(false),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("serving");
            guards.flush();
            tracing::warn!("lock file survived shutdown");
        });

        let content = std::fs::read_to_string(temp_dir.path().join("svc.log")).unwrap();
        let serving = content.find("serving").unwrap();
        let survived = content.find("lock file survived shutdown").unwrap();
        assert!(serving < survived);
    }

    #[test]
    fn test_empty_guards_flush() {
        let guards = LogGuards::empty();
        assert!(format!("{:?}", guards).contains("writers: 0"));
        guards.flush();
    }
}
