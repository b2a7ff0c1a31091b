//! Resource resolution: canonical keys and graph loading.
//!
//! Every parsed file becomes one or more resources in the Resources map:
//!
//! - project files are keyed by their root-relative path (`/src/a`),
//! - library declaration files under `node_modules` by their library name
//!   (`lodash`, `@angular/core`),
//! - typings files contribute one resource per `declare module`/`namespace`
//!   they contain, keyed by that name. Typings that declare the same name
//!   merge into one resource.
//!
//! Export specifiers are resolved against the same keys, relative to the
//! file that contains them.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use smol_str::SmolStr;

use super::diagnostics::DiagnosticCollector;
use super::ids::{DeclId, ResourceId};
use super::resource::{
    Export, ExportKind, ExportedEntity, Resource, ResourceGraph, ResourceKind, index_key,
};
use crate::base::TextRange;
use crate::syntax::{Body, ExportStatement, NamedBody, NamedBodyKind, SourceFile};

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    /// Application source inside the project root.
    Project,
    /// Global typings (`typings/`, `node_modules/@types/`).
    Typings,
    /// A library's declaration files under `node_modules`.
    Library,
}

const NODE_MODULES: &str = "node_modules";

pub fn classify(path: &Path) -> ResourceClass {
    let segments = segments(path);
    let typings = segments.iter().any(|s| s == "typings")
        || segments
            .windows(2)
            .any(|pair| pair[0] == NODE_MODULES && pair[1] == "@types");

    if typings {
        ResourceClass::Typings
    } else if segments.iter().any(|s| s == NODE_MODULES) {
        ResourceClass::Library
    } else {
        ResourceClass::Project
    }
}

/// Library name of a file below `node_modules`.
///
/// ```text
/// node_modules/lodash/index.d.ts          → lodash
/// node_modules/@angular/core/index.d.ts   → @angular/core
/// node_modules/moment/moment.d.ts         → moment
/// node_modules/a/node_modules/b/index.ts  → b
/// ```
pub fn library_name(path: &Path) -> Option<SmolStr> {
    let segments = segments(path);
    let last = segments.iter().rposition(|s| s == NODE_MODULES)?;
    let joined = segments[last + 1..].join("/");
    let rest = strip_source_extension(&joined);
    if rest.is_empty() {
        return None;
    }

    let first = rest.split('/').next().unwrap_or(rest);
    let name = rest
        .strip_suffix("/index")
        .or_else(|| rest.strip_suffix(format!("/{first}").as_str()))
        .filter(|name| !name.is_empty())
        .unwrap_or(rest);
    Some(SmolStr::new(name))
}

/// `/` + the root-relative path without its extension.
pub fn project_key(path: &Path, root: &Path) -> Option<SmolStr> {
    let relative = path.strip_prefix(root).ok()?;
    let joined = segments(relative).join("/");
    Some(SmolStr::from(format!("/{}", strip_source_extension(&joined))))
}

/// Key a single-resource file is inserted under. Typings have none; their
/// keys come from the modules they declare.
pub fn canonical_key(path: &Path, root: &Path) -> Option<SmolStr> {
    match classify(path) {
        ResourceClass::Project => project_key(path, root),
        ResourceClass::Library => library_name(path),
        ResourceClass::Typings => None,
    }
}

/// Every key a parsed file contributes to the Resources map.
pub fn provided_keys(file: &SourceFile, root: &Path) -> Vec<SmolStr> {
    match classify(&file.path) {
        ResourceClass::Typings => file.named_bodies().iter().map(|n| n.name.clone()).collect(),
        _ => canonical_key(&file.path, root).into_iter().collect(),
    }
}

/// Keys a file re-exports from, including the directory-index form of each.
pub fn dependency_keys(file: &SourceFile, root: &Path) -> Vec<SmolStr> {
    let mut keys = Vec::new();
    for specifier in file.body.reexport_specifiers() {
        if let Some(key) = resolve_specifier(&file.path, specifier, root) {
            keys.push(index_key(&key));
            keys.push(key);
        }
    }
    keys
}

// ============================================================================
// SPECIFIERS
// ============================================================================

/// Resolve a module specifier written in `owner` to a canonical key.
///
/// Relative specifiers are joined to the owner's directory. Bare
/// specifiers name a library or ambient module and are keys as written.
/// Callers fall back to [`index_key`] when the result is not present.
pub fn resolve_specifier(owner: &Path, specifier: &str, root: &Path) -> Option<SmolStr> {
    if is_relative(specifier) {
        let dir = owner.parent()?;
        let joined = normalize(&dir.join(strip_script_extension(specifier)));
        return if segments(&joined).iter().any(|s| s == NODE_MODULES) {
            library_name(&joined)
        } else {
            project_key(&joined, root)
        };
    }
    if specifier.starts_with('/') {
        return None;
    }

    let key = specifier.trim_end_matches('/');
    (!key.is_empty()).then(|| SmolStr::new(key))
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Lexically normalize `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if out.file_name().is_some() {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Namespace alias for a named resource: `some-lib` → `someLib`,
/// `@scope/pkg` → `scopePkg`.
pub fn namespace_alias(name: &str) -> SmolStr {
    let mut alias = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == '$' {
            if upper && !alias.is_empty() {
                alias.extend(ch.to_uppercase());
            } else {
                alias.push(ch);
            }
            upper = false;
        } else {
            upper = true;
        }
    }
    SmolStr::from(alias)
}

fn strip_source_extension(path: &str) -> &str {
    [".d.ts", ".d.tsx", ".tsx", ".ts"]
        .iter()
        .find_map(|ext| path.strip_suffix(ext))
        .unwrap_or(path)
}

/// Specifiers may name the emitted `.js` file of a TypeScript source.
fn strip_script_extension(specifier: &str) -> &str {
    [".d.ts", ".tsx", ".ts", ".jsx", ".js"]
        .iter()
        .find_map(|ext| specifier.strip_suffix(ext))
        .unwrap_or(specifier)
}

fn segments(path: &Path) -> Vec<Cow<'_, str>> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy()),
            _ => None,
        })
        .collect()
}

// ============================================================================
// GRAPH LOADING
// ============================================================================

/// Build the Resources map of one pass from parsed files.
///
/// Files are loaded in path order, so resources merged under one key keep a
/// deterministic declaration order. `export = X` is bound here, to every
/// declaration and nested resource named `X` in the same body.
pub fn build_graph<'a>(
    files: impl IntoIterator<Item = &'a SourceFile>,
    root: &Path,
    diagnostics: &mut DiagnosticCollector,
) -> ResourceGraph {
    let mut files: Vec<&SourceFile> = files.into_iter().collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let mut loader = GraphLoader {
        graph: ResourceGraph::new(root),
        root,
        diagnostics,
    };

    for file in files {
        match classify(&file.path) {
            ResourceClass::Typings => {
                for (name, id) in loader.load_named_bodies(file.named_bodies(), file) {
                    loader.graph.insert(name, id);
                }
            }
            _ => {
                let Some(key) = canonical_key(&file.path, root) else {
                    tracing::debug!(path = %file.path.display(), "file is outside the project root");
                    continue;
                };
                let kind = ResourceKind::File {
                    path: file.path.clone(),
                };
                let id = loader.load_body(kind, TextRange::default(), &file.body, file);
                loader.graph.insert(key, id);
            }
        }
    }

    loader.graph
}

struct GraphLoader<'a> {
    graph: ResourceGraph,
    root: &'a Path,
    diagnostics: &'a mut DiagnosticCollector,
}

impl GraphLoader<'_> {
    fn load_body(
        &mut self,
        kind: ResourceKind,
        range: TextRange,
        body: &Body,
        file: &SourceFile,
    ) -> ResourceId {
        let declarations: Vec<DeclId> = body
            .declarations
            .iter()
            .map(|decl| self.graph.alloc_declaration(decl.clone()))
            .collect();
        let nested = self.load_named_bodies(&body.named, file);
        let exports = body
            .exports
            .iter()
            .map(|stmt| self.load_export(stmt, file, &declarations, &nested))
            .collect();

        let mut resource = Resource::new(kind, file.file, range);
        resource.declarations = declarations;
        resource.exports = exports;
        resource.resources = nested.into_iter().map(|(_, id)| id).collect();
        self.graph.alloc_resource(resource)
    }

    fn load_named_bodies(
        &mut self,
        named: &[NamedBody],
        file: &SourceFile,
    ) -> Vec<(SmolStr, ResourceId)> {
        named
            .iter()
            .map(|named| {
                let kind = match named.kind {
                    NamedBodyKind::Module => ResourceKind::Module {
                        name: named.name.clone(),
                    },
                    NamedBodyKind::Namespace => ResourceKind::Namespace {
                        name: named.name.clone(),
                    },
                };
                let id = self.load_body(kind, named.range, &named.body, file);
                (named.name.clone(), id)
            })
            .collect()
    }

    fn load_export(
        &mut self,
        stmt: &ExportStatement,
        file: &SourceFile,
        declarations: &[DeclId],
        nested: &[(SmolStr, ResourceId)],
    ) -> Export {
        let kind = match stmt {
            ExportStatement::AllFrom { from, .. } => ExportKind::AllFrom {
                from: from.clone(),
                target: resolve_specifier(&file.path, from, self.root),
            },
            ExportStatement::NamedFrom {
                from, specifiers, ..
            } => ExportKind::NamedFrom {
                from: from.clone(),
                target: resolve_specifier(&file.path, from, self.root),
                specifiers: specifiers.clone(),
            },
            ExportStatement::Assigned { name, range } => {
                let mut exported: Vec<ExportedEntity> = declarations
                    .iter()
                    .copied()
                    .filter(|&decl| self.graph.declaration(decl).name() == name)
                    .map(ExportedEntity::Declaration)
                    .collect();
                exported.extend(
                    nested
                        .iter()
                        .filter(|(nested_name, _)| nested_name == name)
                        .map(|(_, id)| ExportedEntity::Resource(*id)),
                );
                if exported.is_empty() {
                    self.diagnostics.unresolved_assignment(file.file, *range, name);
                }
                ExportKind::Assigned {
                    name: name.clone(),
                    exported,
                }
            }
        };

        Export {
            kind,
            file: file.file,
            range: stmt.range(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::FileId;
    use crate::syntax::parse;
    use rstest::rstest;

    const ROOT: &str = "/project";

    fn source(path: &str, text: &str) -> SourceFile {
        parse(FileId::new(0), Path::new(path), text).unwrap()
    }

    #[rstest]
    #[case("/project/src/a.ts", ResourceClass::Project)]
    #[case("/project/src/typings-helper.ts", ResourceClass::Project)]
    #[case("/project/typings/globals/index.d.ts", ResourceClass::Typings)]
    #[case("/project/node_modules/@types/node/index.d.ts", ResourceClass::Typings)]
    #[case("/project/node_modules/lodash/index.d.ts", ResourceClass::Library)]
    fn test_classify(#[case] path: &str, #[case] expected: ResourceClass) {
        assert_eq!(classify(Path::new(path)), expected);
    }

    #[rstest]
    #[case("/project/node_modules/lodash/index.d.ts", "lodash")]
    #[case("/project/node_modules/@angular/core/index.d.ts", "@angular/core")]
    #[case("/project/node_modules/moment/moment.d.ts", "moment")]
    #[case("/project/node_modules/lodash/fp.d.ts", "lodash/fp")]
    #[case("/project/node_modules/reindex/lib.d.ts", "reindex/lib")]
    #[case("/project/node_modules/dom/types.d.ts", "dom/types")]
    #[case("/project/node_modules/a/node_modules/b/index.d.ts", "b")]
    fn test_library_name(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(library_name(Path::new(path)).as_deref(), Some(expected));
    }

    #[rstest]
    #[case("/project/src/a.ts", Some("/src/a"))]
    #[case("/project/src/view.tsx", Some("/src/view"))]
    #[case("/project/index.ts", Some("/index"))]
    #[case("/project/src/a.d.ts", Some("/src/a"))]
    #[case("/elsewhere/a.ts", None)]
    fn test_project_key(#[case] path: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            project_key(Path::new(path), Path::new(ROOT)).as_deref(),
            expected
        );
    }

    #[rstest]
    #[case("/project/src/b.ts", "./a", Some("/src/a"))]
    #[case("/project/src/b.ts", "../lib/c.js", Some("/lib/c"))]
    #[case("/project/src/b.ts", "..", Some("/"))]
    #[case("/project/src/b.ts", "lodash", Some("lodash"))]
    #[case("/project/src/b.ts", "@scope/pkg", Some("@scope/pkg"))]
    #[case("/project/src/b.ts", "../node_modules/moment/moment", Some("moment"))]
    #[case("/project/src/b.ts", "../../outside", None)]
    #[case("/project/src/b.ts", "/abs/path", None)]
    fn test_resolve_specifier(
        #[case] owner: &str,
        #[case] specifier: &str,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(
            resolve_specifier(Path::new(owner), specifier, Path::new(ROOT)).as_deref(),
            expected
        );
    }

    #[rstest]
    #[case("lodash", "lodash")]
    #[case("some-lib", "someLib")]
    #[case("@scope/pkg", "scopePkg")]
    #[case("socket.io-client", "socketIoClient")]
    fn test_namespace_alias(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(namespace_alias(name), expected);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/project/src/../lib/./a")),
            PathBuf::from("/project/lib/a")
        );
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn test_build_graph_keys() {
        let files = [
            source("/project/src/a.ts", "export class A {}"),
            source("/project/node_modules/lodash/index.d.ts", "export declare function map(): void;"),
            source(
                "/project/typings/globals.d.ts",
                "declare module 'fs' { function readFile(): void; }\ndeclare namespace NodeJS { interface Global {} }",
            ),
        ];
        let mut diagnostics = DiagnosticCollector::new();
        let graph = build_graph(&files, Path::new(ROOT), &mut diagnostics);

        let keys: Vec<&str> = graph
            .sorted_keys()
            .into_iter()
            .map(|(key, _)| key.as_str())
            .collect();
        assert_eq!(keys, vec!["/src/a", "NodeJS", "fs", "lodash"]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_typings_with_same_module_merge() {
        let files = [
            source("/project/typings/a.d.ts", "declare module 'x' { class A {} }"),
            source("/project/typings/b.d.ts", "declare module 'x' { class B {} }"),
        ];
        let mut diagnostics = DiagnosticCollector::new();
        let graph = build_graph(&files, Path::new(ROOT), &mut diagnostics);

        let x = graph.get("x").unwrap();
        let names: Vec<_> = graph.declarations_of(x).map(|d| d.name().as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_export_assignment_binding() {
        let files = [source(
            "/project/typings/lib.d.ts",
            "declare module 'lib' {\n  namespace lib { class Inner {} }\n  export = lib;\n}\ndeclare module 'broken' { export = nothing; }",
        )];
        let mut diagnostics = DiagnosticCollector::new();
        let graph = build_graph(&files, Path::new(ROOT), &mut diagnostics);

        let lib = graph.resource(graph.get("lib").unwrap());
        match &lib.exports[0].kind {
            ExportKind::Assigned { exported, .. } => {
                assert_eq!(exported.len(), 2);
                assert!(matches!(exported[0], ExportedEntity::Declaration(_)));
                assert!(matches!(exported[1], ExportedEntity::Resource(_)));
            }
            other => panic!("unexpected export {other:?}"),
        }
        assert_eq!(diagnostics.diagnostics().len(), 1);
    }

    #[test]
    fn test_dependency_keys() {
        let file = source(
            "/project/src/b.ts",
            "export * from './a';\nexport { X } from './dir';",
        );
        let keys = dependency_keys(&file, Path::new(ROOT));
        assert_eq!(keys, vec!["/src/a/index", "/src/a", "/src/dir/index", "/src/dir"]);
    }
}
