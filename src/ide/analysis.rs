//! Analysis host: the single writer that owns the live snapshot.
//!
//! Every build is split into a `prepare` step, which reads the host and
//! produces a [`PreparedBuild`], and a `commit` step, which swaps it in.
//! Only `commit` mutates the host, so a prepared build that turns out to
//! be stale is simply dropped.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;

use super::candidates::{ImportCandidate, import_candidates};
use crate::base::FileId;
use crate::hir::{
    DeclarationInfo, Diagnostic, DiagnosticCollector, FileSet, ResourceGraph, SourceRoot,
    SourceTexts, SymbolIndex, build_graph, canonical_key, changed_keys, dependency_keys, propagate,
    provided_keys,
};
use crate::project::{
    DiscoverError, IndexConfig, LoadedFile, ParseBatch, SourceProvider, WorkspaceLoader,
};

// ============================================================================
// EVENTS & OUTCOMES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileChangeKind {
    Created,
    Changed,
    Deleted,
}

/// A filesystem change reported by the host editor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileChangeKind,
}

impl FileEvent {
    pub fn new(path: impl Into<PathBuf>, kind: FileChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(path, FileChangeKind::Created)
    }

    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self::new(path, FileChangeKind::Changed)
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self::new(path, FileChangeKind::Deleted)
    }
}

/// Files touched by a batch of change events.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeltaSet {
    /// Changed files and every file that transitively re-exports from them.
    pub reparse: IndexSet<PathBuf>,
    /// Deleted files.
    pub removed: IndexSet<PathBuf>,
}

impl DeltaSet {
    pub fn is_empty(&self) -> bool {
        self.reparse.is_empty() && self.removed.is_empty()
    }
}

/// Summary of a committed build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Files in the live snapshot after the build.
    pub files: usize,
    /// Files parsed by this build.
    pub parsed: usize,
    /// Files that could not be read or parsed.
    pub failed: Vec<PathBuf>,
    /// Distinct names in the published index.
    pub symbols: usize,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("all {count} files in the batch failed to load")]
    AllFilesFailed { count: usize },

    #[error("build was cancelled")]
    Cancelled,

    #[error("build panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Discover(#[from] DiscoverError),
}

/// A finished build that has not been committed yet.
#[derive(Debug)]
pub struct PreparedBuild {
    snapshot: SourceRoot,
    graph: ResourceGraph,
    index: Arc<SymbolIndex>,
    texts: Arc<SourceTexts>,
    outcome: BuildOutcome,
}

impl PreparedBuild {
    pub fn outcome(&self) -> &BuildOutcome {
        &self.outcome
    }

    pub fn index(&self) -> &Arc<SymbolIndex> {
        &self.index
    }
}

// ============================================================================
// HOST
// ============================================================================

/// Owns the live snapshot, the last propagated graph and the published
/// index with the line tables of the texts it was built from.
pub struct AnalysisHost {
    loader: WorkspaceLoader,
    files: FileSet,
    snapshot: SourceRoot,
    graph: Option<ResourceGraph>,
    index: Option<Arc<SymbolIndex>>,
    texts: Arc<SourceTexts>,
    diagnostics: Vec<Diagnostic>,
}

impl AnalysisHost {
    pub fn new(config: IndexConfig) -> Self {
        Self::with_loader(WorkspaceLoader::new(config))
    }

    pub fn with_provider(config: IndexConfig, provider: Arc<dyn SourceProvider>) -> Self {
        Self::with_loader(WorkspaceLoader::with_provider(config, provider))
    }

    pub fn with_loader(loader: WorkspaceLoader) -> Self {
        Self {
            loader,
            files: FileSet::new(),
            snapshot: SourceRoot::new(),
            graph: None,
            index: None,
            texts: Arc::default(),
            diagnostics: Vec::new(),
        }
    }

    pub fn loader(&self) -> &WorkspaceLoader {
        &self.loader
    }

    pub fn root(&self) -> &Path {
        self.loader.root()
    }

    pub fn files(&self) -> &FileSet {
        &self.files
    }

    pub fn snapshot(&self) -> &SourceRoot {
        &self.snapshot
    }

    /// Diagnostics of the last committed build.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn index_ready(&self) -> bool {
        self.index.is_some()
    }

    pub fn index(&self) -> Option<Arc<SymbolIndex>> {
        self.index.clone()
    }

    /// Read-only view of the published index.
    pub fn analysis(&self) -> Analysis {
        Analysis::new(self.index.clone(), Arc::clone(&self.texts))
    }

    /// Drop the snapshot, the index and every known file.
    pub fn reset(&mut self) {
        self.snapshot.clear();
        self.graph = None;
        self.index = None;
        self.texts = Arc::default();
        self.diagnostics.clear();
        self.files.clear();
    }

    /// Index exactly `paths`, replacing the live snapshot.
    pub fn build_index(
        &mut self,
        paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<BuildOutcome, BuildError> {
        let prepared = self.prepare_build(paths, cancel)?;
        Ok(self.commit(prepared))
    }

    /// Discover the project's files and index them.
    pub fn build_workspace(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<BuildOutcome, BuildError> {
        let paths = self.loader.discover()?;
        self.build_index(&paths, cancel)
    }

    /// Re-index the files affected by `events`.
    pub fn apply_changes(
        &mut self,
        events: &[FileEvent],
        cancel: &CancellationToken,
    ) -> Result<BuildOutcome, BuildError> {
        let prepared = self.prepare_changes(events, cancel)?;
        Ok(self.commit(prepared))
    }

    pub fn prepare_build(
        &self,
        paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<PreparedBuild, BuildError> {
        let batch = self.parse(paths, cancel)?;

        let mut build = PendingBuild::new(SourceRoot::new());
        build.absorb(batch);
        if build.is_total_failure() {
            return Err(BuildError::AllFilesFailed {
                count: build.failed.len(),
            });
        }
        Ok(self.finish(build, false))
    }

    pub fn prepare_changes(
        &self,
        events: &[FileEvent],
        cancel: &CancellationToken,
    ) -> Result<PreparedBuild, BuildError> {
        let mut reach = Reachability::new(&self.snapshot, self.root());
        let mut delta = reach.delta(events);
        tracing::debug!(
            reparse = delta.reparse.len(),
            removed = delta.removed.len(),
            "computed delta"
        );

        let mut build = PendingBuild::new(self.snapshot.clone());
        for path in &delta.removed {
            build.snapshot.remove(path);
            build.dropped.push(path.clone());
        }

        let mut pending: Vec<PathBuf> = delta.reparse.iter().cloned().collect();
        while !pending.is_empty() {
            let batch = self.parse(&pending, cancel)?;
            // Typings may now declare modules they did not declare before.
            let keys: Vec<SmolStr> = batch
                .files
                .iter()
                .flat_map(|file| provided_keys(&file.source, self.root()))
                .collect();
            build.absorb(batch);
            pending = reach.expand(keys, &mut delta);
        }

        if build.is_total_failure() {
            return Err(BuildError::AllFilesFailed {
                count: build.failed.len(),
            });
        }
        Ok(self.finish(build, true))
    }

    /// Swap a prepared build in and publish its index.
    pub fn commit(&mut self, prepared: PreparedBuild) -> BuildOutcome {
        self.snapshot = prepared.snapshot;
        self.graph = Some(prepared.graph);
        self.index = Some(prepared.index);
        self.texts = prepared.texts;
        self.diagnostics = prepared.outcome.diagnostics.clone();

        let outcome = prepared.outcome;
        tracing::info!(
            files = outcome.files,
            parsed = outcome.parsed,
            failed = outcome.failed.len(),
            symbols = outcome.symbols,
            diagnostics = outcome.diagnostics.len(),
            "index committed"
        );
        outcome
    }

    /// Files a batch of events would re-parse or remove.
    ///
    /// Later events for the same path override earlier ones.
    pub fn delta_files(&self, events: &[FileEvent]) -> DeltaSet {
        Reachability::new(&self.snapshot, self.root()).delta(events)
    }

    fn parse(
        &self,
        paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<ParseBatch, BuildError> {
        self.loader
            .parse_files(paths, &self.files, cancel)
            .ok_or(BuildError::Cancelled)
    }

    /// Propagate over the complete new snapshot and derive its index.
    fn finish(&self, build: PendingBuild, incremental: bool) -> PreparedBuild {
        let mut collector = DiagnosticCollector::new();
        let mut graph = build_graph(build.snapshot.iter(), self.root(), &mut collector);
        collector.extend(propagate(&mut graph));

        let index = match (&self.graph, &self.index) {
            (Some(previous), Some(index)) if incremental => {
                let changed = changed_keys(previous, &graph);
                tracing::debug!(keys = changed.len(), "refreshing index");
                let mut index = SymbolIndex::clone(index);
                index.refresh(&graph, &changed);
                index
            }
            _ => SymbolIndex::build(&graph),
        };

        // Published line tables are never edited in place.
        let mut texts = if incremental {
            SourceTexts::clone(&self.texts)
        } else {
            SourceTexts::new()
        };
        for path in &build.dropped {
            if let Some(file) = self.files.lookup(path) {
                texts.remove(file);
            }
        }
        let parsed = build.loaded.len();
        for (file, path, text) in build.loaded {
            texts.insert(file, path, &text);
        }

        let outcome = BuildOutcome {
            files: build.snapshot.len(),
            parsed,
            failed: build.failed,
            symbols: index.len(),
            diagnostics: collector.take(),
        };
        PreparedBuild {
            snapshot: build.snapshot,
            graph,
            index: Arc::new(index),
            texts: Arc::new(texts),
            outcome,
        }
    }
}

/// Snapshot being assembled by a prepare step.
struct PendingBuild {
    snapshot: SourceRoot,
    loaded: Vec<(FileId, PathBuf, Arc<str>)>,
    /// Paths that left the snapshot.
    dropped: Vec<PathBuf>,
    failed: Vec<PathBuf>,
}

impl PendingBuild {
    fn new(snapshot: SourceRoot) -> Self {
        Self {
            snapshot,
            loaded: Vec::new(),
            dropped: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Delete-then-insert every parsed file; failed files leave the snapshot.
    fn absorb(&mut self, batch: ParseBatch) {
        for failure in batch.failures {
            let path = failure.path().to_path_buf();
            self.snapshot.remove(&path);
            self.dropped.push(path.clone());
            self.failed.push(path);
        }
        for LoadedFile {
            path,
            file,
            text,
            source,
        } in batch.files
        {
            self.snapshot.insert(source);
            self.loaded.push((file, path, text));
        }
    }

    fn is_total_failure(&self) -> bool {
        self.loaded.is_empty() && !self.failed.is_empty()
    }
}

// ============================================================================
// DELTA
// ============================================================================

/// Reverse re-export reachability over the live snapshot.
struct Reachability<'a> {
    snapshot: &'a SourceRoot,
    root: &'a Path,
    /// Key → files that re-export from it.
    dependents: FxHashMap<SmolStr, Vec<&'a Path>>,
    seen: FxHashSet<SmolStr>,
}

impl<'a> Reachability<'a> {
    fn new(snapshot: &'a SourceRoot, root: &'a Path) -> Self {
        let mut dependents: FxHashMap<SmolStr, Vec<&'a Path>> = FxHashMap::default();
        for file in snapshot.iter() {
            for key in dependency_keys(file, root) {
                dependents.entry(key).or_default().push(file.path.as_path());
            }
        }
        Self {
            snapshot,
            root,
            dependents,
            seen: FxHashSet::default(),
        }
    }

    /// Keys `path` supplied before the change.
    fn keys_of(&self, path: &Path) -> Vec<SmolStr> {
        match self.snapshot.get(path) {
            Some(file) => provided_keys(file, self.root),
            None => canonical_key(path, self.root).into_iter().collect(),
        }
    }

    fn delta(&mut self, events: &[FileEvent]) -> DeltaSet {
        let mut latest: IndexMap<&Path, FileChangeKind> = IndexMap::new();
        for event in events {
            latest.insert(event.path.as_path(), event.kind);
        }

        let mut delta = DeltaSet::default();
        let mut seeds = Vec::new();
        for (path, kind) in latest {
            seeds.extend(self.keys_of(path));
            match kind {
                FileChangeKind::Deleted => {
                    delta.removed.insert(path.to_path_buf());
                }
                FileChangeKind::Created | FileChangeKind::Changed => {
                    delta.reparse.insert(path.to_path_buf());
                }
            }
        }
        self.expand(seeds, &mut delta);
        delta
    }

    /// Add every file that transitively re-exports from `seeds`; returns
    /// the files newly added to `delta.reparse`.
    fn expand(&mut self, seeds: Vec<SmolStr>, delta: &mut DeltaSet) -> Vec<PathBuf> {
        let mut added = Vec::new();
        let mut queue = VecDeque::from(seeds);

        while let Some(key) = queue.pop_front() {
            if !self.seen.insert(key.clone()) {
                continue;
            }
            let Some(paths) = self.dependents.get(&key) else {
                continue;
            };
            for &path in paths {
                if delta.removed.contains(path) || !delta.reparse.insert(path.to_path_buf()) {
                    continue;
                }
                added.push(path.to_path_buf());
                queue.extend(self.keys_of(path));
            }
        }
        added
    }
}

// ============================================================================
// ANALYSIS
// ============================================================================

/// An immutable view of one published index.
#[derive(Clone, Debug, Default)]
pub struct Analysis {
    index: Option<Arc<SymbolIndex>>,
    texts: Arc<SourceTexts>,
}

impl Analysis {
    pub(crate) fn new(index: Option<Arc<SymbolIndex>>, texts: Arc<SourceTexts>) -> Self {
        Self { index, texts }
    }

    pub fn index_ready(&self) -> bool {
        self.index.is_some()
    }

    pub fn index(&self) -> Option<&SymbolIndex> {
        self.index.as_deref()
    }

    /// Modules that can supply `name`; empty when unknown or not ready.
    pub fn query(&self, name: &str) -> &[DeclarationInfo] {
        match self.index.as_deref() {
            Some(index) => index.query(name),
            None => &[],
        }
    }

    pub fn declaration_infos(&self) -> Vec<&DeclarationInfo> {
        self.index
            .as_deref()
            .map(SymbolIndex::declaration_infos)
            .unwrap_or_default()
    }

    pub fn import_candidates(&self, name: &str) -> Vec<ImportCandidate> {
        match self.index.as_deref() {
            Some(index) => import_candidates(index, &self.texts, name),
            None => Vec::new(),
        }
    }
}
