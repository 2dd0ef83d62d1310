//! Compilation report
//!
//! Failures are local to a cell: they are recorded here and compilation
//! continues with the remaining cells.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnresolvedPath,
    UnresolvedJoinKey,
    UnlinkedFeatureType,
    UnknownType,
    UnsupportedFunction,
    Configuration,
    Ordering,
    DependencyFailed,
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::UnresolvedPath => "unresolved path",
            FailureKind::UnresolvedJoinKey => "unresolved join key",
            FailureKind::UnlinkedFeatureType => "unlinked feature type",
            FailureKind::UnknownType => "unknown type",
            FailureKind::UnsupportedFunction => "unsupported function",
            FailureKind::Configuration => "configuration",
            FailureKind::Ordering => "ordering",
            FailureKind::DependencyFailed => "dependency failed",
            FailureKind::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

/// A cell that failed to compile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CellFailure {
    pub cell_id: String,
    pub function: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Result summary of one compilation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompileReport {
    /// No cell failed
    pub success: bool,

    /// Ids of cells compiled without error, in processing order
    pub compiled_cells: Vec<String>,

    pub failures: Vec<CellFailure>,

    /// Non-fatal diagnostics (e.g. CRS fallback)
    #[serde(default)]
    pub warnings: Vec<String>,

    /// Fingerprint of the produced document
    pub document_hash: String,

    #[serde(with = "chrono::serde::ts_seconds")]
    #[schemars(with = "String")]
    pub compiled_at: DateTime<Utc>,
}

impl CompileReport {
    pub fn new() -> Self {
        Self {
            success: true,
            compiled_cells: vec![],
            failures: vec![],
            warnings: vec![],
            document_hash: String::new(),
            compiled_at: Utc::now(),
        }
    }

    pub fn record_failure(&mut self, failure: CellFailure) {
        self.success = false;
        self.failures.push(failure);
    }

    pub fn failure(&self, cell_id: &str) -> Option<&CellFailure> {
        self.failures.iter().find(|f| f.cell_id == cell_id)
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Human-readable summary
    pub fn to_report(&self) -> String {
        let mut out = String::new();
        out.push_str("Compilation Report\n");
        out.push_str("==================\n\n");
        out.push_str(&format!(
            "Status: {}\n",
            if self.success { "OK" } else { "FAILED" }
        ));
        out.push_str(&format!("Compiled cells: {}\n", self.compiled_cells.len()));
        out.push_str(&format!("Failed cells: {}\n", self.failures.len()));
        if !self.document_hash.is_empty() {
            out.push_str(&format!("Document: {}\n", self.document_hash));
        }

        if !self.failures.is_empty() {
            out.push_str("\nFailures:\n");
            for failure in &self.failures {
                out.push_str(&format!(
                    "  [{}] {} ({}): {}\n",
                    failure.kind, failure.cell_id, failure.function, failure.message
                ));
            }
        }

        if !self.warnings.is_empty() {
            out.push_str("\nWarnings:\n");
            for warning in &self.warnings {
                out.push_str(&format!("  - {}\n", warning));
            }
        }

        out
    }
}

impl Default for CompileReport {
    fn default() -> Self {
        Self::new()
    }
}
