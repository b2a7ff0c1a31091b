//! Diagnostics: problems found while linking resources.
//!
//! None of these abort a build. A dangling `export * from "./missing"` or an
//! `export = X` with no matching `X` is skipped, reported here, and the
//! rest of the graph is processed as usual.

use std::sync::Arc;

use crate::base::{FileId, TextRange};

// ============================================================================
// DIAGNOSTIC TYPES
// ============================================================================

/// A warning with location. Linking never produces errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// The file containing the offending statement.
    pub file: FileId,
    /// Byte range of the statement.
    pub range: TextRange,
    /// Stable code, see [`codes`].
    pub code: Option<Arc<str>>,
    pub message: Arc<str>,
}

impl Diagnostic {
    pub fn warning(file: FileId, range: TextRange, message: impl Into<Arc<str>>) -> Self {
        Self {
            file,
            range,
            code: None,
            message: message.into(),
        }
    }

    /// Set the error code.
    pub fn with_code(mut self, code: impl Into<Arc<str>>) -> Self {
        self.code = Some(code.into());
        self
    }
}

// ============================================================================
// DIAGNOSTIC CODES
// ============================================================================

pub mod codes {
    /// `export ... from` names a module that is not in the index.
    pub const DANGLING_REFERENCE: &str = "W0001";
    /// `export = X` where nothing named `X` is declared.
    pub const UNRESOLVED_ASSIGNMENT: &str = "W0002";
}

// ============================================================================
// DIAGNOSTIC COLLECTOR
// ============================================================================

#[derive(Clone, Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn dangling_reference(&mut self, file: FileId, range: TextRange, from: &str) {
        tracing::debug!(%file, from, "skipping re-export of unknown module");
        self.add(
            Diagnostic::warning(file, range, format!("cannot resolve module '{from}'"))
                .with_code(codes::DANGLING_REFERENCE),
        );
    }

    pub fn unresolved_assignment(&mut self, file: FileId, range: TextRange, name: &str) {
        tracing::debug!(%file, name, "export assignment matches no declaration");
        self.add(
            Diagnostic::warning(file, range, format!("'{name}' is not declared in this scope"))
                .with_code(codes::UNRESOLVED_ASSIGNMENT),
        );
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Take all diagnostics, leaving the collector empty.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Move every diagnostic of `other` into this collector.
    pub fn extend(&mut self, other: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(other);
    }
}
