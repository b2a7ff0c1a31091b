//! File set management for tracking source files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::base::{FileId, LineIndex};

/// Manages the mapping between file paths and FileIds.
///
/// IDs are stable for the lifetime of the set, so a path that is deleted
/// and later recreated keeps its ID.
#[derive(Debug, Default)]
pub struct FileSet {
    inner: RwLock<FileSetInner>,
}

#[derive(Debug, Default)]
struct FileSetInner {
    path_to_id: IndexMap<PathBuf, FileId>,
    id_to_path: IndexMap<FileId, PathBuf>,
    next_id: u32,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a FileId for a path.
    pub fn file_id(&self, path: &Path) -> FileId {
        {
            let inner = self.inner.read();
            if let Some(&id) = inner.path_to_id.get(path) {
                return id;
            }
        }

        let mut inner = self.inner.write();
        if let Some(&id) = inner.path_to_id.get(path) {
            return id;
        }

        let id = FileId::new(inner.next_id);
        inner.next_id += 1;
        inner.path_to_id.insert(path.to_owned(), id);
        inner.id_to_path.insert(id, path.to_owned());
        id
    }

    /// Look up a path without assigning an ID.
    pub fn lookup(&self, path: &Path) -> Option<FileId> {
        self.inner.read().path_to_id.get(path).copied()
    }

    pub fn path(&self, file: FileId) -> Option<PathBuf> {
        self.inner.read().id_to_path.get(&file).cloned()
    }

    /// Forget every path and ID. IDs restart from zero.
    pub fn clear(&self) {
        *self.inner.write() = FileSetInner::default();
    }

    pub fn len(&self) -> usize {
        self.inner.read().path_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where one indexed file lives and the line table of the text it was
/// parsed from.
#[derive(Debug)]
pub struct FileText {
    pub path: PathBuf,
    pub line_index: LineIndex,
}

/// Line tables of the files in one committed snapshot.
///
/// Never mutated once published: a new build copies the map, edits the
/// copy and publishes it next to its index, so ranges from an index are
/// always mapped through the line tables they were parsed with.
#[derive(Clone, Debug, Default)]
pub struct SourceTexts {
    files: FxHashMap<FileId, Arc<FileText>>,
}

impl SourceTexts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: FileId, path: PathBuf, text: &str) {
        let line_index = LineIndex::new(text);
        self.files.insert(file, Arc::new(FileText { path, line_index }));
    }

    pub fn remove(&mut self, file: FileId) -> Option<Arc<FileText>> {
        self.files.remove(&file)
    }

    pub fn get(&self, file: FileId) -> Option<&FileText> {
        self.files.get(&file).map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
