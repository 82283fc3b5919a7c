use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Default maximum number of journal entries to keep in memory
pub const DEFAULT_MAX_LOG_LINES: usize = 10000;

/// Log file name prefix inside the log directory
pub const LOG_FILE_PREFIX: &str = "folder_copier";

/// Rotated log files kept on disk
pub const MAX_LOG_FILES: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    Validation,
    Backup,
    Copy,
    Restore,
    Outcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: String,
    pub level: LogLevel,
    pub category: LogCategory,
    pub message: String,
    pub operation_id: Option<String>,
}

/// Bounded, in-memory journal of user-facing operation history.
///
/// Every entry is also forwarded to `tracing`, so the journal and the
/// diagnostic log never disagree.
pub struct LogManager {
    entries: Mutex<VecDeque<LogEntry>>,
    max_lines: usize,
    next_id: AtomicU64,
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOG_LINES)
    }
}

impl LogManager {
    pub fn new(max_lines: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(max_lines.min(1024))),
            max_lines,
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn log(
        &self,
        level: LogLevel,
        category: LogCategory,
        message: &str,
        operation_id: Option<String>,
    ) {
        let op = operation_id.as_deref().unwrap_or("-");
        match level {
            LogLevel::Debug => debug!(operation_id = op, ?category, "{message}"),
            LogLevel::Info | LogLevel::Success => info!(operation_id = op, ?category, "{message}"),
            LogLevel::Warning => warn!(operation_id = op, ?category, "{message}"),
            LogLevel::Error => error!(operation_id = op, ?category, "{message}"),
        }

        let seq = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = LogEntry {
            id: seq.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            level,
            category,
            message: message.to_string(),
            operation_id,
        };

        let mut entries = self.lock();
        entries.push_back(entry);

        // Remove from front if full
        while entries.len() > self.max_lines {
            entries.pop_front();
        }
    }

    pub fn get_logs(&self, operation_id: Option<&str>) -> Vec<LogEntry> {
        let entries = self.lock();
        match operation_id {
            Some(id) => entries
                .iter()
                .filter(|e| e.operation_id.as_deref() == Some(id))
                .cloned()
                .collect(),
            None => entries.iter().cloned().collect(),
        }
    }

    /// Get entries with pagination for large journals
    pub fn get_logs_paginated(
        &self,
        operation_id: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Vec<LogEntry> {
        let entries = self.lock();
        entries
            .iter()
            .filter(|e| operation_id.is_none() || e.operation_id.as_deref() == operation_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Daily-rotating `folder_copier.<date>.log` appender keeping the last
/// [`MAX_LOG_FILES`] files.
pub fn file_appender(log_dir: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)
        .with_context(|| format!("failed to open log file in {}", log_dir.display()))
}

/// Install the global subscriber for the binary.
///
/// `verbosity` maps -q/-v counts to a level (0 = WARN). `RUST_LOG` directives
/// are honoured on top of it. With `log_dir`, events are also written to a
/// rotating file through a non-blocking writer; keep the returned guard alive
/// until exit so buffered lines are flushed.
pub fn init_tracing(verbosity: i8, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbosity {
        i8::MIN..=-1 => Level::ERROR,
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(dir)?);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // Ignore error if already set in tests or env
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .with(file_layer)
        .try_init();

    Ok(guard)
}
