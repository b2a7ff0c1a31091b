//! Export propagation.
//!
//! Moves declaration handles along export edges so that every declaration
//! ends up in the resource it should be imported from. A resource is
//! processed at most once per pass; targets are processed before the
//! resources that re-export them.

use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use super::diagnostics::{Diagnostic, DiagnosticCollector};
use super::ids::{DeclId, ResourceId};
use super::resource::{Export, ExportKind, ExportedEntity, ResourceGraph};
use crate::syntax::Specifier;

/// Run one propagation pass over `graph`.
///
/// Never fails: dangling edges are skipped and reported.
pub fn propagate(graph: &mut ResourceGraph) -> Vec<Diagnostic> {
    retain_exported(graph);

    let order: Vec<ResourceId> = graph
        .processing_order()
        .into_iter()
        .map(|(_, id)| id)
        .collect();

    let mut pass = Pass {
        graph,
        visited: FxHashSet::default(),
        diagnostics: DiagnosticCollector::new(),
    };
    for id in order {
        pass.process(id);
    }

    tracing::debug!(
        resources = pass.visited.len(),
        diagnostics = pass.diagnostics.diagnostics().len(),
        "propagation finished"
    );
    pass.diagnostics.take()
}

/// Drop every declaration that is not exported, in every resource.
fn retain_exported(graph: &mut ResourceGraph) {
    for id in graph.resource_ids() {
        let kept: Vec<DeclId> = graph
            .resource(id)
            .declarations
            .iter()
            .copied()
            .filter(|&decl| is_exported(graph, decl))
            .collect();
        graph.resource_mut(id).declarations = kept;
    }
}

fn is_exported(graph: &ResourceGraph, decl: DeclId) -> bool {
    let decl = graph.declaration(decl);
    decl.is_exportable() && decl.is_exported()
}

struct Pass<'g> {
    graph: &'g mut ResourceGraph,
    visited: FxHashSet<ResourceId>,
    diagnostics: DiagnosticCollector,
}

impl Pass<'_> {
    fn process(&mut self, id: ResourceId) {
        if !self.visited.insert(id) {
            return;
        }

        let exports = self.graph.resource(id).exports.clone();
        for export in &exports {
            match &export.kind {
                ExportKind::AllFrom { from, target } => {
                    if let Some(source) = self.resolve_target(id, export, from, target.as_ref()) {
                        self.process(source);
                        self.move_all(source, id);
                    }
                }
                ExportKind::NamedFrom {
                    from,
                    target,
                    specifiers,
                } => {
                    if let Some(source) = self.resolve_target(id, export, from, target.as_ref()) {
                        self.process(source);
                        self.move_named(source, id, specifiers);
                    }
                }
                ExportKind::Assigned { exported, .. } => {
                    for entity in exported {
                        if let ExportedEntity::Resource(source) = *entity {
                            self.process(source);
                        }
                    }
                    self.move_assigned(id, exported);
                }
            }
        }
    }

    /// Target of a `from` edge, or `None` for a self re-export or a
    /// dangling edge.
    fn resolve_target(
        &mut self,
        id: ResourceId,
        export: &Export,
        from: &SmolStr,
        target: Option<&SmolStr>,
    ) -> Option<ResourceId> {
        let Some(source) = target.and_then(|key| self.graph.lookup(key)) else {
            self.diagnostics
                .dangling_reference(export.file, export.range, from);
            return None;
        };
        (source != id).then_some(source)
    }

    fn move_all(&mut self, source: ResourceId, target: ResourceId) {
        let moved = std::mem::take(&mut self.graph.resource_mut(source).declarations);
        self.graph.resource_mut(target).declarations.extend(moved);
    }

    fn move_named(&mut self, source: ResourceId, target: ResourceId, specifiers: &[Specifier]) {
        let declarations = std::mem::take(&mut self.graph.resource_mut(source).declarations);
        let mut kept = Vec::with_capacity(declarations.len());
        let mut moved = Vec::new();

        for decl in declarations {
            let name = self.graph.declaration(decl).name();
            match specifiers.iter().find(|spec| &spec.specifier == name) {
                Some(spec) => {
                    if let Some(alias) = &spec.alias {
                        self.graph.declaration_mut(decl).set_name(alias.clone());
                    }
                    moved.push(decl);
                }
                None => kept.push(decl),
            }
        }

        self.graph.resource_mut(source).declarations = kept;
        self.graph.resource_mut(target).declarations.extend(moved);
    }

    fn move_assigned(&mut self, target: ResourceId, exported: &[ExportedEntity]) {
        for entity in exported {
            match *entity {
                ExportedEntity::Declaration(decl) => {
                    self.graph.declaration_mut(decl).set_exported(true);
                    let declarations = &mut self.graph.resource_mut(target).declarations;
                    if !declarations.contains(&decl) {
                        declarations.push(decl);
                    }
                }
                ExportedEntity::Resource(source) if source != target => {
                    let declarations =
                        std::mem::take(&mut self.graph.resource_mut(source).declarations);
                    let moved: Vec<DeclId> = declarations
                        .into_iter()
                        .filter(|&decl| is_exported(self.graph, decl))
                        .collect();
                    self.graph.resource_mut(target).declarations.extend(moved);
                }
                ExportedEntity::Resource(_) => {}
            }
        }
    }
}
