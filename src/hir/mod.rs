//! Resolution model: resources, export propagation and the reverse index.
//!
//! One pass runs leaf to root:
//!
//! ```text
//! [SourceFile]  --resolve::build_graph-->  ResourceGraph
//! ResourceGraph --propagate::propagate-->  ResourceGraph (declarations moved)
//! ResourceGraph --SymbolIndex::build---->  SymbolIndex
//! ```
//!
//! [`SourceRoot`] holds the pristine parse results between passes,
//! [`FileSet`] assigns their IDs and [`SourceTexts`] keeps the line tables
//! a published index maps its ranges through.

mod diagnostics;
mod ids;
mod index;
mod input;
mod propagate;
mod resolve;
mod resource;
mod source;

pub use diagnostics::{Diagnostic, DiagnosticCollector, codes};
pub use ids::{DeclId, ResourceId};
pub use index::{DeclarationInfo, SymbolIndex, changed_keys, module_from};
pub use input::SourceRoot;
pub use propagate::propagate;
pub use resolve::{
    ResourceClass, build_graph, canonical_key, classify, dependency_keys, library_name,
    namespace_alias, normalize, project_key, provided_keys, resolve_specifier,
};
pub use resource::{
    Export, ExportKind, ExportedEntity, Resource, ResourceGraph, ResourceKind, index_key,
};
pub use source::{FileSet, FileText, SourceTexts};
