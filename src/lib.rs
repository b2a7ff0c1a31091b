//! # tsresolve-base
//!
//! Index of the exported symbols of a TypeScript source tree, answering
//! "which modules can I import this name from?".
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! ide      → AnalysisHost, IndexCoordinator, import candidates
//!   ↓
//! project  → Discovery, source providers, parallel parsing
//!   ↓
//! hir      → Resources, export propagation, reverse symbol index
//!   ↓
//! syntax   → Lexer + declaration/export parser
//!   ↓
//! base     → Primitives (FileId, TextRange, LineIndex)
//! ```

// ============================================================================
// FOUNDATION
// ============================================================================

/// Foundation types: FileId, TextRange, LineIndex
pub mod base;

/// Source parser: declarations, imports and export edges of one file
pub mod syntax;

// ============================================================================
// RESOLUTION
// ============================================================================

/// Resource graph, export propagation and the reverse symbol index
pub mod hir;

/// Project discovery and file loading
pub mod project;

/// Analysis host and background index coordinator
pub mod ide;

// Re-export foundation types
pub use base::{FileId, LineCol, LineIndex, TextRange, TextSize};
