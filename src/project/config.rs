use std::path::PathBuf;

/// Directory names skipped by discovery unless overridden.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &["build", "out", "dist"];

/// Settings the index is built with.
///
/// Read-only to the index; the embedding layer owns loading and merging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexConfig {
    /// Project root. Project files are keyed relative to it.
    pub root: PathBuf,
    /// Globs matched against root-relative paths. A bare name such as
    /// `dist` ignores every directory or file with that name.
    pub ignore_patterns: Vec<String>,
}

impl IndexConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|pattern| pattern.to_string())
                .collect(),
        }
    }
}
