//! Resources and the per-pass arena that owns them.
//!
//! A [`ResourceGraph`] is built fresh for every propagation pass. It owns
//! every declaration and every resource of the pass; resources refer to
//! their declarations by [`DeclId`], and the canonical-key map refers to
//! resources by [`ResourceId`].

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use smol_str::SmolStr;

use super::ids::{DeclId, ResourceId};
use crate::base::{FileId, TextRange};
use crate::syntax::{Declaration, Specifier};

// ============================================================================
// RESOURCES
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    /// A parsed source file.
    File { path: PathBuf },
    /// `declare module "name" { ... }`
    Module { name: SmolStr },
    /// `namespace Name { ... }`
    Namespace { name: SmolStr },
}

impl ResourceKind {
    /// Name of a named resource; files have none.
    pub fn name(&self) -> Option<&SmolStr> {
        match self {
            ResourceKind::File { .. } => None,
            ResourceKind::Module { name } | ResourceKind::Namespace { name } => Some(name),
        }
    }

    pub fn is_named(&self) -> bool {
        self.name().is_some()
    }
}

/// Something an `export = X` statement refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExportedEntity {
    Declaration(DeclId),
    Resource(ResourceId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportKind {
    /// `export * from "from"`; `target` is the canonical key `from` resolves to.
    AllFrom {
        from: SmolStr,
        target: Option<SmolStr>,
    },
    /// `export { a as b } from "from"`.
    NamedFrom {
        from: SmolStr,
        target: Option<SmolStr>,
        specifiers: Vec<Specifier>,
    },
    /// `export = name`, bound to everything named `name` in the same body.
    Assigned {
        name: SmolStr,
        exported: Vec<ExportedEntity>,
    },
}

/// An export edge, with the statement it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Export {
    pub kind: ExportKind,
    pub file: FileId,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
    pub kind: ResourceKind,
    /// File the resource was declared in.
    pub file: FileId,
    pub range: TextRange,
    /// Declarations this resource currently supplies, in order.
    pub declarations: Vec<DeclId>,
    pub exports: Vec<Export>,
    /// Nested named resources (`namespace`, `declare module`).
    pub resources: Vec<ResourceId>,
}

impl Resource {
    pub fn new(kind: ResourceKind, file: FileId, range: TextRange) -> Self {
        Self {
            kind,
            file,
            range,
            declarations: Vec::new(),
            exports: Vec::new(),
            resources: Vec::new(),
        }
    }
}

// ============================================================================
// GRAPH
// ============================================================================

/// Arena of one propagation pass plus the canonical-key map.
#[derive(Clone, Debug)]
pub struct ResourceGraph {
    root: PathBuf,
    declarations: Vec<Declaration>,
    resources: Vec<Resource>,
    keys: IndexMap<SmolStr, ResourceId>,
}

impl ResourceGraph {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            declarations: Vec::new(),
            resources: Vec::new(),
            keys: IndexMap::new(),
        }
    }

    /// Project root used to key project files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn alloc_declaration(&mut self, declaration: Declaration) -> DeclId {
        let id = DeclId::new(self.declarations.len() as u32);
        self.declarations.push(declaration);
        id
    }

    pub fn alloc_resource(&mut self, resource: Resource) -> ResourceId {
        let id = ResourceId::new(self.resources.len() as u32);
        self.resources.push(resource);
        id
    }

    pub fn declaration(&self, id: DeclId) -> &Declaration {
        &self.declarations[id.index()]
    }

    pub fn declaration_mut(&mut self, id: DeclId) -> &mut Declaration {
        &mut self.declarations[id.index()]
    }

    pub fn resource(&self, id: ResourceId) -> &Resource {
        &self.resources[id.index()]
    }

    pub fn resource_mut(&mut self, id: ResourceId) -> &mut Resource {
        &mut self.resources[id.index()]
    }

    /// Every resource in the arena, including nested ones without a key.
    pub fn resource_ids(&self) -> impl Iterator<Item = ResourceId> + use<> {
        (0..self.resources.len() as u32).map(ResourceId::new)
    }

    /// Declarations currently supplied by a resource.
    pub fn declarations_of(&self, id: ResourceId) -> impl Iterator<Item = &Declaration> + '_ {
        self.resource(id)
            .declarations
            .iter()
            .map(|&decl| self.declaration(decl))
    }

    /// Insert a resource under its canonical key.
    ///
    /// When the key is already taken, the new resource is merged into the
    /// existing one: its declarations, exports and nested resources are
    /// appended in order.
    pub fn insert(&mut self, key: SmolStr, id: ResourceId) {
        match self.keys.get(&key).copied() {
            Some(existing) if existing != id => {
                tracing::debug!(%key, "merging resources with the same key");
                self.merge(existing, id);
            }
            Some(_) => {}
            None => {
                self.keys.insert(key, id);
            }
        }
    }

    fn merge(&mut self, into: ResourceId, from: ResourceId) {
        let source = self.resource_mut(from);
        let declarations = std::mem::take(&mut source.declarations);
        let exports = std::mem::take(&mut source.exports);
        let resources = std::mem::take(&mut source.resources);

        let target = self.resource_mut(into);
        target.declarations.extend(declarations);
        target.exports.extend(exports);
        target.resources.extend(resources);
    }

    pub fn get(&self, key: &str) -> Option<ResourceId> {
        self.keys.get(key).copied()
    }

    /// Look up a resolved key, falling back to the directory index
    /// (`<key>/index`).
    pub fn lookup(&self, key: &str) -> Option<ResourceId> {
        self.get(key).or_else(|| self.get(&index_key(key)))
    }

    pub fn keys(&self) -> impl Iterator<Item = (&SmolStr, ResourceId)> + '_ {
        self.keys.iter().map(|(key, &id)| (key, id))
    }

    /// Keys in lexicographic order.
    pub fn sorted_keys(&self) -> Vec<(&SmolStr, ResourceId)> {
        let mut keys: Vec<_> = self.keys().collect();
        keys.sort_unstable_by(|a, b| a.0.cmp(b.0));
        keys
    }

    /// Keys in propagation order: longest first, ties lexicographic.
    pub fn processing_order(&self) -> Vec<(&SmolStr, ResourceId)> {
        let mut keys: Vec<_> = self.keys().collect();
        keys.sort_unstable_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));
        keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// `<key>/index`, the key of a directory's index file.
pub fn index_key(key: &str) -> SmolStr {
    if key.ends_with('/') {
        SmolStr::from(format!("{key}index"))
    } else {
        SmolStr::from(format!("{key}/index"))
    }
}
