//! Parsed shape of a source file.
//!
//! The parser does not build a full syntax tree. It records what the index
//! needs: declarations with their ranges, import statements, export edges,
//! and nested `namespace`/`declare module` bodies.

use std::fmt;
use std::path::PathBuf;

use smol_str::SmolStr;

use crate::base::{FileId, TextRange};

// ============================================================================
// DECLARATIONS
// ============================================================================

/// Flat kind tag used for display and index deduplication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeclarationKind {
    Class,
    Interface,
    Enum,
    TypeAlias,
    Namespace,
    Function,
    Variable,
    Const,
    Module,
}

impl DeclarationKind {
    /// Human readable label.
    pub fn display(&self) -> &'static str {
        match self {
            DeclarationKind::Class => "class",
            DeclarationKind::Interface => "interface",
            DeclarationKind::Enum => "enum",
            DeclarationKind::TypeAlias => "type alias",
            DeclarationKind::Namespace => "namespace",
            DeclarationKind::Function => "function",
            DeclarationKind::Variable => "variable",
            DeclarationKind::Const => "const",
            DeclarationKind::Module => "module",
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

/// Declarations without a type annotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExportableKind {
    Class,
    Interface,
    Enum,
    TypeAlias,
    Namespace,
}

/// Declarations that may carry a type annotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypedKind {
    Function,
    Variable,
    Const,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportableDeclaration {
    pub kind: ExportableKind,
    pub name: SmolStr,
    pub is_exported: bool,
    pub range: TextRange,
    pub file: FileId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypedExportableDeclaration {
    pub kind: TypedKind,
    pub name: SmolStr,
    pub is_exported: bool,
    pub range: TextRange,
    pub file: FileId,
    /// Variable type or function return type, as written.
    pub type_annotation: Option<SmolStr>,
}

/// Synthetic declaration standing for "import the whole module".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleDeclaration {
    /// Namespace alias used in `import * as <name> from ...`.
    pub name: SmolStr,
    pub range: TextRange,
    pub file: FileId,
}

/// A declaration found in a source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Declaration {
    Exportable(ExportableDeclaration),
    TypedExportable(TypedExportableDeclaration),
    Module(ModuleDeclaration),
}

impl Declaration {
    pub fn name(&self) -> &SmolStr {
        match self {
            Declaration::Exportable(decl) => &decl.name,
            Declaration::TypedExportable(decl) => &decl.name,
            Declaration::Module(decl) => &decl.name,
        }
    }

    pub fn set_name(&mut self, name: SmolStr) {
        match self {
            Declaration::Exportable(decl) => decl.name = name,
            Declaration::TypedExportable(decl) => decl.name = name,
            Declaration::Module(decl) => decl.name = name,
        }
    }

    pub fn kind(&self) -> DeclarationKind {
        match self {
            Declaration::Exportable(decl) => match decl.kind {
                ExportableKind::Class => DeclarationKind::Class,
                ExportableKind::Interface => DeclarationKind::Interface,
                ExportableKind::Enum => DeclarationKind::Enum,
                ExportableKind::TypeAlias => DeclarationKind::TypeAlias,
                ExportableKind::Namespace => DeclarationKind::Namespace,
            },
            Declaration::TypedExportable(decl) => match decl.kind {
                TypedKind::Function => DeclarationKind::Function,
                TypedKind::Variable => DeclarationKind::Variable,
                TypedKind::Const => DeclarationKind::Const,
            },
            Declaration::Module(_) => DeclarationKind::Module,
        }
    }

    /// Whether the declaration is marked as exported.
    ///
    /// Module declarations are synthetic and never carry the flag.
    pub fn is_exported(&self) -> bool {
        match self {
            Declaration::Exportable(decl) => decl.is_exported,
            Declaration::TypedExportable(decl) => decl.is_exported,
            Declaration::Module(_) => false,
        }
    }

    pub fn set_exported(&mut self, exported: bool) {
        match self {
            Declaration::Exportable(decl) => decl.is_exported = exported,
            Declaration::TypedExportable(decl) => decl.is_exported = exported,
            Declaration::Module(_) => {}
        }
    }

    /// Only these declarations take part in propagation.
    pub fn is_exportable(&self) -> bool {
        !matches!(self, Declaration::Module(_))
    }

    pub fn range(&self) -> TextRange {
        match self {
            Declaration::Exportable(decl) => decl.range,
            Declaration::TypedExportable(decl) => decl.range,
            Declaration::Module(decl) => decl.range,
        }
    }

    pub fn file(&self) -> FileId {
        match self {
            Declaration::Exportable(decl) => decl.file,
            Declaration::TypedExportable(decl) => decl.file,
            Declaration::Module(decl) => decl.file,
        }
    }

    pub fn type_annotation(&self) -> Option<&str> {
        match self {
            Declaration::TypedExportable(decl) => decl.type_annotation.as_deref(),
            _ => None,
        }
    }
}

// ============================================================================
// IMPORTS & EXPORTS
// ============================================================================

/// `{specifier as alias}` in an export or import list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Specifier {
    pub specifier: SmolStr,
    pub alias: Option<SmolStr>,
}

impl Specifier {
    pub fn new(specifier: impl Into<SmolStr>) -> Self {
        Self {
            specifier: specifier.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<SmolStr>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The name visible to importers.
    pub fn exported_name(&self) -> &SmolStr {
        self.alias.as_ref().unwrap_or(&self.specifier)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportKind {
    /// `import "polyfill";`
    SideEffect,
    /// `import {a, b as c} from "x";`, optionally with a default binding.
    Named {
        default: Option<SmolStr>,
        specifiers: Vec<Specifier>,
    },
    /// `import * as ns from "x";`, optionally with a default binding.
    Namespace {
        default: Option<SmolStr>,
        alias: SmolStr,
    },
    /// `import x from "x";`
    Default(SmolStr),
    /// `import x = require("x");`
    External(SmolStr),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Import {
    pub kind: ImportKind,
    pub from: SmolStr,
    pub type_only: bool,
    pub range: TextRange,
}

/// An export edge as written in the source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportStatement {
    /// `export * from "x";`
    AllFrom { from: SmolStr, range: TextRange },
    /// `export {a, b as c} from "x";`
    NamedFrom {
        from: SmolStr,
        specifiers: Vec<Specifier>,
        range: TextRange,
    },
    /// `export = name;`
    Assigned { name: SmolStr, range: TextRange },
}

impl ExportStatement {
    /// Module specifier for `from` exports.
    pub fn from(&self) -> Option<&SmolStr> {
        match self {
            ExportStatement::AllFrom { from, .. } | ExportStatement::NamedFrom { from, .. } => {
                Some(from)
            }
            ExportStatement::Assigned { .. } => None,
        }
    }

    pub fn range(&self) -> TextRange {
        match self {
            ExportStatement::AllFrom { range, .. }
            | ExportStatement::NamedFrom { range, .. }
            | ExportStatement::Assigned { range, .. } => *range,
        }
    }
}

// ============================================================================
// BODIES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NamedBodyKind {
    /// `declare module "name" { ... }`
    Module,
    /// `namespace Name { ... }` / `module Name { ... }`
    Namespace,
}

/// The declarations and exports of one file or one nested body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Body {
    pub declarations: Vec<Declaration>,
    pub exports: Vec<ExportStatement>,
    pub named: Vec<NamedBody>,
}

impl Body {
    /// Every `from` specifier in this body and its nested bodies.
    pub fn reexport_specifiers(&self) -> Vec<&SmolStr> {
        let mut out: Vec<&SmolStr> = self.exports.iter().filter_map(ExportStatement::from).collect();
        for named in &self.named {
            out.extend(named.body.reexport_specifiers());
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty() && self.exports.is_empty() && self.named.is_empty()
    }
}

/// A nested `namespace` or ambient `declare module` block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedBody {
    pub kind: NamedBodyKind,
    pub name: SmolStr,
    pub range: TextRange,
    pub body: Body,
}

/// The parse result for one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    pub file: FileId,
    pub path: PathBuf,
    pub imports: Vec<Import>,
    pub body: Body,
}

impl SourceFile {
    pub fn declarations(&self) -> &[Declaration] {
        &self.body.declarations
    }

    pub fn exports(&self) -> &[ExportStatement] {
        &self.body.exports
    }

    /// Top-level named bodies (`declare module`, `namespace`).
    pub fn named_bodies(&self) -> &[NamedBody] {
        &self.body.named
    }
}
