//! User-facing diagnostics accumulated during a session.
//!
//! Every entry names the task and the scope it concerns and is also emitted
//! through `tracing`.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use tdt_types::Scope;

/// Text of the missing-prerequisite diagnostic.
pub const MISSING_COMPONENTS: &str = "necessary components are missing";

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Something was skipped or degraded
    Warning,
}

/// One diagnostic message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Task that produced it (e.g. `"network"`)
    pub task: String,
    /// Window or task scope
    pub scope: Scope,
    /// Message text
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
        };
        write!(f, "[{}] {} {}: {}", level, self.task, self.scope, self.message)
    }
}

/// Accumulated diagnostics of a session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an informational message.
    pub fn info(&mut self, task: &str, scope: Scope, message: impl Into<String>) {
        let message = message.into();
        info!(task, scope = %scope, "{}", message);
        self.entries.push(Diagnostic {
            severity: Severity::Info,
            task: task.to_string(),
            scope,
            message,
        });
    }

    /// Record a warning.
    pub fn warn(&mut self, task: &str, scope: Scope, message: impl Into<String>) {
        let message = message.into();
        warn!(task, scope = %scope, "{}", message);
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            task: task.to_string(),
            scope,
            message,
        });
    }

    /// Record a missing prerequisite.
    pub fn missing_components(&mut self, task: &str, scope: Scope, detail: &str) {
        self.warn(task, scope, format!("{}: {}", MISSING_COMPONENTS, detail));
    }

    /// Entries in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Warnings only.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Whether any entry of `task` contains `text`.
    pub fn contains(&self, task: &str, text: &str) -> bool {
        self.entries
            .iter()
            .any(|d| d.task == task && d.message.contains(text))
    }

    /// Take every entry, leaving the accumulator empty.
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_with_context() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.info("network", Scope::AllDates, "12 documents added");
        diagnostics.missing_components("facets", Scope::AllDates, "no informative vertices");

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.warnings().count(), 1);
        assert!(diagnostics.contains("facets", MISSING_COMPONENTS));
        assert!(!diagnostics.contains("network", MISSING_COMPONENTS));

        let text = diagnostics.iter().nth(1).unwrap().to_string();
        assert_eq!(
            text,
            "[warning] facets AllDates: necessary components are missing: no informative vertices"
        );
    }

    #[test]
    fn test_drain() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn("traversal", Scope::AllDates, "bad file");
        assert_eq!(diagnostics.drain().len(), 1);
        assert!(diagnostics.is_empty());
    }
}
