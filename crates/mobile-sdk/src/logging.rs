//! Host-facing SDK log sink, gated by an enable flag and a minimum level.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Verbose,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    /// Suppresses all output.
    None,
}

impl LogLevel {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Verbose,
            1 => Self::Debug,
            2 => Self::Info,
            3 => Self::Warn,
            4 => Self::Error,
            _ => Self::None,
        }
    }
}

/// Destination for accepted log records.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Forwards records to `tracing` under the `campaign_sdk` target.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Verbose => tracing::trace!(target: "campaign_sdk", "{message}"),
            LogLevel::Debug => tracing::debug!(target: "campaign_sdk", "{message}"),
            LogLevel::Info => tracing::info!(target: "campaign_sdk", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "campaign_sdk", "{message}"),
            LogLevel::Error => tracing::error!(target: "campaign_sdk", "{message}"),
            LogLevel::None => {}
        }
    }
}

/// In-memory sink that captures records for testing.
#[derive(Default)]
pub struct CaptureLogSink {
    records: Mutex<Vec<(LogLevel, String)>>,
}

impl CaptureLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(LogLevel, String)> {
        self.records.lock().clone()
    }

    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl LogSink for CaptureLogSink {
    fn log(&self, level: LogLevel, message: &str) {
        self.records.lock().push((level, message.to_string()));
    }
}

pub struct SdkLogger {
    enabled: AtomicBool,
    min_level: AtomicU8,
    sink: Arc<dyn LogSink>,
}

impl SdkLogger {
    pub fn new(enabled: bool, min_level: LogLevel, sink: Arc<dyn LogSink>) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            min_level: AtomicU8::new(min_level as u8),
            sink,
        }
    }

    pub fn set_enabled(&self, enabled: bool, min_level: LogLevel) {
        self.enabled.store(enabled, Ordering::Relaxed);
        self.min_level.store(min_level as u8, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn min_level(&self) -> LogLevel {
        LogLevel::from_u8(self.min_level.load(Ordering::Relaxed))
    }

    pub fn is_enabled_for(&self, level: LogLevel) -> bool {
        level != LogLevel::None && self.is_enabled() && level >= self.min_level()
    }

    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        if self.is_enabled_for(level) {
            self.sink.log(level, message.as_ref());
        }
    }

    pub fn verbose(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Verbose, message);
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }
}

impl Default for SdkLogger {
    fn default() -> Self {
        Self::new(false, LogLevel::Info, Arc::new(TracingSink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_logger_is_silent() {
        let sink = Arc::new(CaptureLogSink::new());
        let logger = SdkLogger::new(false, LogLevel::Verbose, sink.clone());
        logger.error("boom");
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_min_level_gates_records() {
        let sink = Arc::new(CaptureLogSink::new());
        let logger = SdkLogger::new(true, LogLevel::Warn, sink.clone());
        logger.debug("hidden");
        logger.info("hidden");
        logger.warn("shown warn");
        logger.error("shown error");

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], (LogLevel::Warn, "shown warn".to_string()));
        assert!(sink.contains(LogLevel::Error, "shown"));
    }

    #[test]
    fn test_level_none_suppresses_everything() {
        let sink = Arc::new(CaptureLogSink::new());
        let logger = SdkLogger::new(true, LogLevel::None, sink.clone());
        logger.error("hidden");
        logger.log(LogLevel::None, "hidden");
        assert!(sink.records().is_empty());

        logger.set_enabled(true, LogLevel::Verbose);
        logger.verbose("now visible");
        assert_eq!(sink.records().len(), 1);
        assert_eq!(logger.min_level(), LogLevel::Verbose);
    }
}
