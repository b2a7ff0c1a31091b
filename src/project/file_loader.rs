//! Reading and parsing single source files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::base::FileId;
use crate::syntax::{self, ParseError, SourceFile};

/// Where file text comes from.
///
/// The index only ever reads through this trait, so an editor can serve
/// unsaved buffers and tests can run without touching the disk.
pub trait SourceProvider: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Arc<str>>;
}

/// Reads files from the filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiskSource;

impl SourceProvider for DiskSource {
    fn read(&self, path: &Path) -> io::Result<Arc<str>> {
        fs::read_to_string(path).map(Arc::from)
    }
}

/// In-memory file contents keyed by path.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: RwLock<IndexMap<PathBuf, Arc<str>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, text: impl Into<Arc<str>>) {
        self.files.write().insert(path.into(), text.into());
    }

    pub fn remove(&self, path: &Path) -> Option<Arc<str>> {
        self.files.write().shift_remove(path)
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.read().keys().cloned().collect()
    }
}

impl SourceProvider for MemorySource {
    fn read(&self, path: &Path) -> io::Result<Arc<str>> {
        self.files.read().get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not loaded", path.display()),
            )
        })
    }
}

/// A file that could not be added to the index.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse { path: PathBuf, source: ParseError },
}

impl LoadError {
    pub fn path(&self) -> &Path {
        match self {
            LoadError::Io { path, .. } | LoadError::Parse { path, .. } => path,
        }
    }
}

/// A parsed file together with the text it was parsed from.
#[derive(Clone, Debug)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub file: FileId,
    pub text: Arc<str>,
    pub source: SourceFile,
}

/// Read `path` through `provider` and parse it.
pub fn load_and_parse(
    provider: &dyn SourceProvider,
    path: &Path,
    file: FileId,
) -> Result<LoadedFile, LoadError> {
    let text = provider.read(path).map_err(|source| LoadError::Io {
        path: path.to_owned(),
        source,
    })?;
    let source = syntax::parse(file, path, &text).map_err(|source| LoadError::Parse {
        path: path.to_owned(),
        source,
    })?;

    Ok(LoadedFile {
        path: path.to_owned(),
        file,
        text,
        source,
    })
}

/// Whether discovery should pick up `path`.
///
/// `.ts` and `.tsx` sources anywhere; inside `node_modules` only
/// declaration files.
pub fn is_source_file(path: &Path, in_node_modules: bool) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    if in_node_modules {
        name.ends_with(".d.ts")
    } else {
        name.ends_with(".ts") || name.ends_with(".tsx")
    }
}
