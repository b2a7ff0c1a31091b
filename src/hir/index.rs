//! Reverse symbol index: name → modules that can supply it.
//!
//! Built from a propagated [`ResourceGraph`]. Every entry records the
//! declaration and the module specifier (`from`) an import statement would
//! use. Entries for one name are kept in key order and deduplicated by
//! declaration kind and `from`.

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use super::ids::ResourceId;
use super::resolve::namespace_alias;
use super::resource::ResourceGraph;
use crate::syntax::{Declaration, ModuleDeclaration};

/// One way to import a name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclarationInfo {
    pub declaration: Declaration,
    /// Module specifier to import from (`/src/a`, `lodash`).
    pub from: SmolStr,
    /// Canonical key of the resource that supplied the entry.
    pub(crate) key: SmolStr,
}

/// The reverse index.
///
/// Cheap to share behind an `Arc`; a new index is built (or refreshed from
/// a copy) for every change and then published whole.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolIndex {
    by_name: FxHashMap<SmolStr, Vec<DeclarationInfo>>,
    /// `from` → names it supplies.
    by_module: FxHashMap<SmolStr, FxHashSet<SmolStr>>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from a propagated graph.
    pub fn build(graph: &ResourceGraph) -> Self {
        let mut index = Self::new();
        for (key, id) in graph.sorted_keys() {
            for (name, info) in contributions(graph, key, id) {
                index.insert(name, info);
            }
        }
        index
    }

    /// Re-derive the entries supplied by `changed_keys`.
    ///
    /// Entries of every affected `from` are dropped and rebuilt from all
    /// resources that supply that `from`, so the result equals a full
    /// [`build`](Self::build) of `graph`.
    pub fn refresh(&mut self, graph: &ResourceGraph, changed_keys: &[SmolStr]) {
        if changed_keys.is_empty() {
            return;
        }

        let mut affected: FxHashSet<SmolStr> = FxHashSet::default();
        for key in changed_keys {
            affected.insert(module_from(key));
            affected.insert(key.clone());
        }

        let mut touched: FxHashSet<SmolStr> = FxHashSet::default();
        for from in &affected {
            let Some(names) = self.by_module.remove(from) else {
                continue;
            };
            for name in names {
                if let Some(entries) = self.by_name.get_mut(&name) {
                    entries.retain(|info| &info.from != from);
                    if entries.is_empty() {
                        self.by_name.remove(&name);
                    }
                }
                touched.insert(name);
            }
        }

        for (key, id) in graph.sorted_keys() {
            for (name, info) in contributions(graph, key, id) {
                if affected.contains(&info.from) {
                    touched.insert(name.clone());
                    self.insert(name, info);
                }
            }
        }

        for name in &touched {
            if let Some(entries) = self.by_name.get_mut(name) {
                entries.sort_by(|a, b| a.key.cmp(&b.key));
            }
        }

        tracing::debug!(
            keys = changed_keys.len(),
            names = touched.len(),
            "refreshed symbol index"
        );
    }

    fn insert(&mut self, name: SmolStr, info: DeclarationInfo) {
        let entries = self.by_name.entry(name.clone()).or_default();
        let kind = info.declaration.kind();
        if entries
            .iter()
            .any(|existing| existing.declaration.kind() == kind && existing.from == info.from)
        {
            return;
        }

        self.by_module
            .entry(info.from.clone())
            .or_default()
            .insert(name);
        entries.push(info);
    }

    /// Every way to import `name`; empty when the name is unknown.
    pub fn query(&self, name: &str) -> &[DeclarationInfo] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All entries, names in sorted order.
    pub fn declaration_infos(&self) -> Vec<&DeclarationInfo> {
        self.names()
            .into_iter()
            .flat_map(|name| self.query(name))
            .collect()
    }

    /// Indexed names in sorted order.
    pub fn names(&self) -> Vec<&SmolStr> {
        let mut names: Vec<_> = self.by_name.keys().collect();
        names.sort_unstable();
        names
    }

    /// Names supplied by a module, sorted.
    pub fn names_from(&self, from: &str) -> Vec<&SmolStr> {
        let mut names: Vec<_> = self
            .by_module
            .get(from)
            .map(|names| names.iter().collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// `from` for declarations supplied by `key`: the key without a trailing
/// `/index`, or `/` when nothing is left.
pub fn module_from(key: &str) -> SmolStr {
    let stripped = if key == "index" {
        ""
    } else {
        key.strip_suffix("/index").unwrap_or(key)
    };
    if stripped.is_empty() {
        SmolStr::new_static("/")
    } else {
        SmolStr::new(stripped)
    }
}

/// Index entries one resource supplies, with the name each is filed under.
///
/// A named resource files its module declaration under its own name; the
/// declaration itself carries the namespace alias.
fn contributions(
    graph: &ResourceGraph,
    key: &SmolStr,
    id: ResourceId,
) -> Vec<(SmolStr, DeclarationInfo)> {
    let resource = graph.resource(id);
    let mut infos = Vec::with_capacity(resource.declarations.len() + 1);

    if let Some(name) = resource.kind.name() {
        infos.push((name.clone(), DeclarationInfo {
            declaration: Declaration::Module(ModuleDeclaration {
                name: namespace_alias(name),
                range: resource.range,
                file: resource.file,
            }),
            from: name.clone(),
            key: key.clone(),
        }));
    }

    let from = module_from(key);
    infos.extend(graph.declarations_of(id).map(|decl| {
        let info = DeclarationInfo {
            declaration: decl.clone(),
            from: from.clone(),
            key: key.clone(),
        };
        (decl.name().clone(), info)
    }));
    infos
}

/// Keys whose index contributions differ between two propagated graphs.
pub fn changed_keys(previous: &ResourceGraph, current: &ResourceGraph) -> Vec<SmolStr> {
    let surface = |graph: &ResourceGraph| -> FxHashMap<SmolStr, Vec<(SmolStr, DeclarationInfo)>> {
        graph
            .keys()
            .map(|(key, id)| (key.clone(), contributions(graph, key, id)))
            .collect()
    };
    let before = surface(previous);
    let after = surface(current);

    let mut changed: Vec<SmolStr> = after
        .iter()
        .filter(|(key, infos)| before.get(*key) != Some(*infos))
        .map(|(key, _)| key.clone())
        .collect();
    changed.extend(
        before
            .keys()
            .filter(|key| !after.contains_key(*key))
            .cloned(),
    );
    changed.sort_unstable();
    changed
}
