//! The live per-file snapshot every propagation pass starts from.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::syntax::SourceFile;

/// Pristine parse results keyed by file path.
///
/// Propagation consumes a copy of these files, so the snapshot itself is
/// never mutated by a pass; updates replace whole entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceRoot {
    files: IndexMap<PathBuf, Arc<SourceFile>>,
}

impl SourceRoot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for the file's path.
    ///
    /// The old entry is removed before the new one is inserted, so a
    /// replaced file never contributes stale declarations.
    pub fn insert(&mut self, file: SourceFile) -> Option<Arc<SourceFile>> {
        let old = self.files.shift_remove(&file.path);
        self.files.insert(file.path.clone(), Arc::new(file));
        old
    }

    pub fn remove(&mut self, path: &Path) -> Option<Arc<SourceFile>> {
        self.files.shift_remove(path)
    }

    pub fn get(&self, path: &Path) -> Option<&Arc<SourceFile>> {
        self.files.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> + '_ {
        self.files.values().map(|file| file.as_ref())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::FileId;
    use crate::syntax::parse;

    fn source(path: &str, text: &str) -> SourceFile {
        parse(FileId::new(0), Path::new(path), text).unwrap()
    }

    #[test]
    fn test_source_root_replace() {
        let mut root = SourceRoot::new();
        root.insert(source("/p/a.ts", "export class A {}"));
        let old = root.insert(source("/p/a.ts", "export class B {}"));

        assert_eq!(root.len(), 1);
        assert_eq!(old.unwrap().declarations()[0].name(), "A");
        assert_eq!(root.get(Path::new("/p/a.ts")).unwrap().declarations()[0].name(), "B");
    }

    #[test]
    fn test_source_root_remove() {
        let mut root = SourceRoot::new();
        root.insert(source("/p/a.ts", "export class A {}"));
        let removed = root.remove(Path::new("/p/a.ts"));
        assert_eq!(removed.unwrap().declarations()[0].name(), "A");
        assert!(root.get(Path::new("/p/a.ts")).is_none());
        assert!(root.is_empty());
    }
}
