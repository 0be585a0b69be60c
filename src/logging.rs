// In: src/logging.rs

//! Process and session logging.
//!
//! The process logger is installed once at bootstrap with `init`. It always writes to
//! stderr and owns an empty file slot. During `open` the session hands the decoded
//! `conf` values to its `LogSink`, which fills that slot once. After that, records
//! go to both targets, each with its own level.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use env_logger::{Builder, Logger, Target};
use log::{LevelFilter, Log, Metadata, Record};

use crate::config::{ServerConfig, SessionLogConfig};
use crate::error::{BridgeError, Result};

/// Where the session sends its `conf`-derived log configuration.
pub trait LogSink: Send {
    fn attach(&self, config: &SessionLogConfig) -> Result<()>;
}

/// Accepts any configuration and writes nowhere. Used when the embedder owns logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    fn attach(&self, config: &SessionLogConfig) -> Result<()> {
        log::debug!("ignoring session log config for {:?}", config.log_dir);
        Ok(())
    }
}

type FileSlot = Arc<OnceLock<Logger>>;

/// The process-wide logger: stderr, plus a file target once a session attaches one.
pub struct SessionLogger {
    console: Logger,
    file: FileSlot,
}

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata) || self.file.get().map_or(false, |f| f.enabled(metadata))
    }

    fn log(&self, record: &Record) {
        if self.console.matches(record) {
            self.console.log(record);
        }
        if let Some(file) = self.file.get() {
            if file.matches(record) {
                file.log(record);
            }
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Some(file) = self.file.get() {
            file.flush();
        }
    }
}

/// Fills the file slot of the `SessionLogger` it was created with. Only the first
/// attach takes effect.
#[derive(Clone)]
pub struct FileLogSink {
    file: FileSlot,
    console_level: LevelFilter,
}

impl FileLogSink {
    /// File path for a session log: `<log_dir>/<UTC timestamp>-<pid>`.
    pub fn file_name_for(config: &SessionLogConfig) -> PathBuf {
        let stamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f");
        config
            .log_dir
            .join(format!("{}-{}", stamp, std::process::id()))
    }

    pub fn is_attached(&self) -> bool {
        self.file.get().is_some()
    }
}

impl LogSink for FileLogSink {
    fn attach(&self, config: &SessionLogConfig) -> Result<()> {
        if self.is_attached() {
            log::warn!("a session log file is already attached, ignoring {:?}", config.log_dir);
            return Ok(());
        }

        let path = Self::file_name_for(config);
        log::info!("Attaching a file sink to the logger, file path: {}", path.display());
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let logger = formatted_builder(config.level)
            .target(Target::Pipe(Box::new(file)))
            .build();
        if self.file.set(logger).is_err() {
            log::warn!("lost a race attaching the session log file {}", path.display());
            return Ok(());
        }

        log::set_max_level(self.console_level.max(config.level));
        log::info!("Logger file sink is now attached, previous logs are on stderr only.");
        Ok(())
    }
}

/// Shared record format: `LEVEL: timestamp - target - pid - message`.
fn formatted_builder(level: LevelFilter) -> Builder {
    let mut builder = Builder::new();
    builder.is_test(false);
    builder.filter_level(level);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{}: {} - {} - {} - {}",
            record.level(),
            Utc::now().to_rfc3339(),
            record.target(),
            std::process::id(),
            record.args()
        )?;
        buf.flush()
    });
    builder
}

/// Builds the process logger and its attachable file sink without installing it.
pub fn build(config: &ServerConfig) -> Result<(SessionLogger, FileLogSink)> {
    let console_level = config.level_filter()?;
    let file: FileSlot = Arc::new(OnceLock::new());

    let logger = SessionLogger {
        console: formatted_builder(console_level)
            .target(Target::Stderr)
            .build(),
        file: file.clone(),
    };
    let sink = FileLogSink {
        file,
        console_level,
    };
    Ok((logger, sink))
}

/// Installs the process logger. Must be called at most once per process.
pub fn init(config: &ServerConfig) -> Result<FileLogSink> {
    let (logger, sink) = build(config)?;
    log::set_boxed_logger(Box::new(logger))
        .map_err(|e| BridgeError::InvalidConfiguration(format!("logger already set: {}", e)))?;
    log::set_max_level(sink.console_level);
    Ok(sink)
}
