//! Diagnostic sinks
//!
//! Probe failures and unsupported paths are reported through a [`DiagnosticSink`] so that a
//! condition hit on every frame produces one log line instead of thousands.

use parking_lot::Mutex;
use std::collections::HashSet;

/// Receives one-shot diagnostic messages
pub trait DiagnosticSink: Send + Sync {
    /// Emits `message` unless an identical message was emitted before
    fn log_once(&self, message: &str);
}

/// Deduplicating sink backed by the `log` facade
#[derive(Default)]
pub struct LogOnce {
    seen: Mutex<HashSet<String>>,
}

impl LogOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct messages emitted so far
    pub fn distinct_messages(&self) -> usize {
        self.seen.lock().len()
    }
}

impl DiagnosticSink for LogOnce {
    fn log_once(&self, message: &str) {
        let first = self.seen.lock().insert(message.to_owned());
        if first {
            log::info!("{message}");
        }
    }
}

/// Sink that records every emitted message, deduplicated the same way as [`LogOnce`]
#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages emitted so far, in order
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn log_once(&self, message: &str) {
        let mut lines = self.lines.lock();
        if !lines.iter().any(|line| line == message) {
            lines.push(message.to_owned());
        }
    }
}
