//! IDE-facing surface: the analysis host, the background coordinator and
//! import candidates.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::PathBuf;
//! use tokio_util::sync::CancellationToken;
//! use tsresolve::ide::AnalysisHost;
//! use tsresolve::project::IndexConfig;
//!
//! let mut host = AnalysisHost::new(IndexConfig::new("/work/app"));
//! host.build_index(&[PathBuf::from("/work/app/src/a.ts")], &CancellationToken::new())?;
//!
//! let analysis = host.analysis();
//! for info in analysis.query("Foo") {
//!     println!("import {{ Foo }} from '{}'", info.from);
//! }
//! # Ok::<(), tsresolve::ide::BuildError>(())
//! ```

mod analysis;
mod candidates;
mod coordinator;

pub use analysis::{
    Analysis, AnalysisHost, BuildError, BuildOutcome, DeltaSet, FileChangeKind, FileEvent,
    PreparedBuild,
};
pub use candidates::{ImportCandidate, import_candidates};
pub use coordinator::{IndexCoordinator, IndexEvent, IndexState};
