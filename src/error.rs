//! Structured error types for the layout pipeline.
//!
//! Two categories exist: recoverable diagnostics (see [`crate::diagnostics`])
//! which never abort layout, and the fatal errors defined here. Fatal errors
//! carry enough context to tell a malformed document apart from a resource
//! breach or a missing service.

use thiserror::Error;

/// The fatal error type returned by all public layout entry points.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// The document violates a structural invariant that refinement could
    /// not repair (e.g. a table-row outside any table, a page-sequence
    /// naming an unknown master).
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// A configured resource guard was breached.
    #[error("limit exceeded: {guard} (limit {limit})")]
    LimitExceeded {
        /// Name of the guard, e.g. `max-pages`.
        guard: &'static str,
        limit: u64,
    },

    /// The document requests behavior this core does not implement and
    /// strict mode forbids degrading.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// A required external service failed or is absent.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The XML input adapter could not produce an FO tree.
    #[error("failed to parse input: {source}\n  Hint: {hint}")]
    Parse {
        #[source]
        source: quick_xml::Error,
        hint: String,
    },
}

impl From<quick_xml::Error> for LayoutError {
    fn from(source: quick_xml::Error) -> Self {
        let hint = "Check that the input is well-formed XML in the XSL-FO namespace.".to_string();
        LayoutError::Parse { source, hint }
    }
}
