//! Foundation types shared by every layer of the index.
//!
//! - [`FileId`] - Stable handle for an indexed source file
//! - [`TextRange`], [`TextSize`] - Byte ranges of declarations and exports
//! - [`LineCol`], [`LineIndex`] - Offset to editor position conversion
//!
//! This module has NO dependencies on other tsresolve modules.

mod file_id;
mod span;

pub use file_id::FileId;
pub use span::{LineCol, LineIndex, TextRange, TextSize};

// Re-export text-size types for convenience
pub use text_size;
