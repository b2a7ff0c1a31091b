//! Project files: discovery, reading and parallel parsing.

mod config;
mod file_loader;
mod workspace_loader;

pub use config::{DEFAULT_IGNORE_PATTERNS, IndexConfig};
pub use file_loader::{
    DiskSource, LoadError, LoadedFile, MemorySource, SourceProvider, is_source_file,
    load_and_parse,
};
pub use workspace_loader::{DiscoverError, ParseBatch, WorkspaceLoader, discover_files};
