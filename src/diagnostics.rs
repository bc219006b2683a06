//! Recoverable diagnostics.
//!
//! Anything that degrades output without invalidating it lands here: unknown
//! properties, unparseable values, overfull lines, missing images. The sink is
//! a plain collector passed by mutable reference through the pipeline, so the
//! core holds no global logging state and two concurrent documents never share
//! a channel.

use serde::Serialize;

/// How bad a diagnostic is. `Warning` means a default or placeholder was
/// substituted; `Info` is advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

/// One recoverable event observed during layout.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable machine-readable code, e.g. `unknown-property`.
    pub code: &'static str,
    pub message: String,
}

/// Collector for diagnostics, threaded through every pipeline stage.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    records: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, code: &'static str, message: impl Into<String>) {
        self.records.push(Diagnostic {
            severity: Severity::Info,
            code,
            message: message.into(),
        });
    }

    pub fn warn(&mut self, code: &'static str, message: impl Into<String>) {
        self.records.push(Diagnostic {
            severity: Severity::Warning,
            code,
            message: message.into(),
        });
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True if any record with the given code was emitted.
    pub fn has(&self, code: &str) -> bool {
        self.records.iter().any(|d| d.code == code)
    }

    pub fn into_records(self) -> Vec<Diagnostic> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_collects_in_order() {
        let mut sink = DiagnosticSink::new();
        sink.warn("unknown-property", "no such property 'colour'");
        sink.info("skipped-element", "skipping fo:unknown");
        assert_eq!(sink.records().len(), 2);
        assert_eq!(sink.records()[0].code, "unknown-property");
        assert!(sink.has("skipped-element"));
        assert!(!sink.has("overfull-line"));
    }
}
