//! Observability as an injected capability.
//!
//! Request-path code records through [`EventRecorder`] and never calls a
//! logging backend directly. Recording is infallible: a backend that cannot
//! write drops the entry.

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for RecordLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordLevel::Debug => "debug",
            RecordLevel::Info => "info",
            RecordLevel::Warn => "warn",
            RecordLevel::Error => "error",
        };
        f.write_str(label)
    }
}

pub trait EventRecorder: Send + Sync {
    fn record(&self, level: RecordLevel, message: &str);
}

/// Forwards records to `tracing`, tagged with a service name.
#[derive(Debug, Clone)]
pub struct TracingRecorder {
    service: String,
}

impl TracingRecorder {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl EventRecorder for TracingRecorder {
    fn record(&self, level: RecordLevel, message: &str) {
        match level {
            RecordLevel::Debug => tracing::debug!(service = %self.service, "{}", message),
            RecordLevel::Info => tracing::info!(service = %self.service, "{}", message),
            RecordLevel::Warn => tracing::warn!(service = %self.service, "{}", message),
            RecordLevel::Error => tracing::error!(service = %self.service, "{}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEntry {
    pub level: RecordLevel,
    pub message: String,
}

/// Keeps every record in memory. Used by tests to assert on side effects.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    entries: Mutex<Vec<RecordedEntry>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<RecordedEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, level: RecordLevel) -> usize {
        self.entries().iter().filter(|e| e.level == level).count()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl EventRecorder for MemoryRecorder {
    fn record(&self, level: RecordLevel, message: &str) {
        // A poisoned lock only means another test thread panicked mid-push.
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push(RecordedEntry {
            level,
            message: message.to_string(),
        });
    }
}
