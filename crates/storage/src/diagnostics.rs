//! Where non-fatal decode problems are reported
//!
//! The mapper and the reader never log on their own; they report to the sink
//! handed to them with each request.

use crate::error::MappingError;
use std::sync::Mutex;

pub trait Diagnostics: Send + Sync {
    /// A sub-element of a row (one column or one list entry) was left out
    fn warn(&self, column: &str, message: &str);

    /// A whole row was rejected
    fn row_dropped(&self, error: &MappingError);
}

/// Forwards to `tracing` at warn level, inside whatever span is current
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn warn(&self, column: &str, message: &str) {
        tracing::warn!(column, "{}", message);
    }

    fn row_dropped(&self, error: &MappingError) {
        tracing::warn!(error = %error, "Failed to convert record");
    }
}

/// Keeps every report in memory
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    warnings: Mutex<Vec<String>>,
    dropped: Mutex<Vec<MappingError>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// `"<column>: <message>"` for every warning so far
    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    pub fn dropped(&self) -> Vec<MappingError> {
        self.dropped.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn warn(&self, column: &str, message: &str) {
        if let Ok(mut warnings) = self.warnings.lock() {
            warnings.push(format!("{}: {}", column, message));
        }
    }

    fn row_dropped(&self, error: &MappingError) {
        if let Ok(mut dropped) = self.dropped.lock() {
            dropped.push(error.clone());
        }
    }
}
