use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::config::IndexConfig;
use super::file_loader::{self, DiskSource, LoadError, LoadedFile, SourceProvider};
use crate::hir::FileSet;

const NODE_MODULES: &str = "node_modules";

#[derive(Debug, thiserror::Error)]
pub enum DiscoverError {
    #[error("project root {} is not a directory", .0.display())]
    RootNotFound(PathBuf),

    #[error("invalid ignore pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        source: globset::Error,
    },
}

/// Result of parsing one batch of files.
#[derive(Debug, Default)]
pub struct ParseBatch {
    pub files: Vec<LoadedFile>,
    pub failures: Vec<LoadError>,
}

/// Finds and parses the files of a project.
pub struct WorkspaceLoader {
    config: IndexConfig,
    provider: Arc<dyn SourceProvider>,
}

impl WorkspaceLoader {
    pub fn new(config: IndexConfig) -> Self {
        Self::with_provider(config, Arc::new(DiskSource))
    }

    pub fn with_provider(config: IndexConfig, provider: Arc<dyn SourceProvider>) -> Self {
        Self { config, provider }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn provider(&self) -> &Arc<dyn SourceProvider> {
        &self.provider
    }

    /// Walk the project root for indexable files.
    pub fn discover(&self) -> Result<Vec<PathBuf>, DiscoverError> {
        discover_files(&self.config)
    }

    /// Parse `paths` in parallel.
    ///
    /// File ids are assigned up front in path order. Returns `None` when
    /// `cancel` fires before the batch is complete.
    pub fn parse_files(
        &self,
        paths: &[PathBuf],
        files: &FileSet,
        cancel: &CancellationToken,
    ) -> Option<ParseBatch> {
        let work: Vec<_> = paths.iter().map(|path| (path, files.file_id(path))).collect();

        let results: Vec<Option<Result<LoadedFile, LoadError>>> = work
            .par_iter()
            .map(|(path, file)| {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(file_loader::load_and_parse(
                    self.provider.as_ref(),
                    path,
                    *file,
                ))
            })
            .collect();

        if cancel.is_cancelled() {
            tracing::debug!(files = paths.len(), "parse batch cancelled");
            return None;
        }

        let mut batch = ParseBatch::default();
        for result in results.into_iter().flatten() {
            match result {
                Ok(file) => batch.files.push(file),
                Err(err) => {
                    tracing::warn!(path = %err.path().display(), error = %err, "skipping file");
                    batch.failures.push(err);
                }
            }
        }
        Some(batch)
    }
}

/// Collect the `.ts`/`.tsx` files under `config.root`, plus `.d.ts` files
/// inside `node_modules`, skipping anything an ignore pattern matches.
///
/// Paths are returned sorted.
pub fn discover_files(config: &IndexConfig) -> Result<Vec<PathBuf>, DiscoverError> {
    let root = &config.root;
    if !root.is_dir() {
        return Err(DiscoverError::RootNotFound(root.clone()));
    }
    let ignored = build_ignore_set(&config.ignore_patterns)?;
    let is_ignored = |path: &Path| {
        path.strip_prefix(root)
            .ok()
            .filter(|relative| !relative.as_os_str().is_empty())
            .is_some_and(|relative| ignored.is_match(relative))
    };

    let mut paths = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_ignored(entry.path()))
        .filter_map(|entry| entry.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let in_node_modules = path
            .strip_prefix(root)
            .is_ok_and(|relative| relative.components().any(|c| c.as_os_str() == NODE_MODULES));
        if file_loader::is_source_file(path, in_node_modules) {
            paths.push(path.to_path_buf());
        }
    }

    paths.sort();
    paths.dedup();
    tracing::debug!(root = %root.display(), files = paths.len(), "discovered files");
    Ok(paths)
}

fn build_ignore_set(patterns: &[String]) -> Result<GlobSet, DiscoverError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.trim().trim_end_matches('/');
        if pattern.is_empty() {
            continue;
        }
        let expanded = if is_bare_name(pattern) {
            vec![format!("**/{pattern}"), format!("**/{pattern}/**")]
        } else {
            vec![pattern.to_string()]
        };
        for glob in expanded {
            let glob = Glob::new(&glob).map_err(|source| DiscoverError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
            builder.add(glob);
        }
    }
    builder
        .build()
        .map_err(|source| DiscoverError::InvalidPattern {
            pattern: patterns.join(", "),
            source,
        })
}

fn is_bare_name(pattern: &str) -> bool {
    !pattern.contains(['/', '*', '?', '[', '{'])
}
