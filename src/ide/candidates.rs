//! Import candidates: index entries resolved to editor positions.

use std::path::PathBuf;

use smol_str::SmolStr;

use crate::base::{FileId, LineCol, TextRange};
use crate::hir::{SourceTexts, SymbolIndex};
use crate::syntax::DeclarationKind;

/// One module an identifier can be imported from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportCandidate {
    pub name: SmolStr,
    pub kind: DeclarationKind,
    /// Module specifier for the import statement.
    pub from: SmolStr,
    /// File the declaration was written in.
    pub file: FileId,
    pub path: PathBuf,
    pub range: TextRange,
    pub start: LineCol,
    pub end: LineCol,
    pub type_annotation: Option<SmolStr>,
}

/// Import candidates for `name`, in index order.
///
/// Positions come from `texts`, which must be the snapshot `index` was
/// built from. Entries whose declaring file it lacks are skipped.
pub fn import_candidates(
    index: &SymbolIndex,
    texts: &SourceTexts,
    name: &str,
) -> Vec<ImportCandidate> {
    index
        .query(name)
        .iter()
        .filter_map(|info| {
            let decl = &info.declaration;
            let file = decl.file();
            let source = texts.get(file)?;
            let (start, end) = source.line_index.range(decl.range());

            Some(ImportCandidate {
                name: SmolStr::new(name),
                kind: decl.kind(),
                from: info.from.clone(),
                file,
                path: source.path.clone(),
                range: decl.range(),
                start,
                end,
                type_annotation: decl.type_annotation().map(SmolStr::new),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{DiagnosticCollector, build_graph, propagate};
    use crate::syntax::parse;
    use std::path::Path;

    #[test]
    fn test_candidates_point_at_declaring_file() {
        let (a, b) = (FileId::new(0), FileId::new(1));
        let a_text = "// header\nexport const answer: number = 42;";
        let b_text = "export * from './a';";
        let mut texts = SourceTexts::new();
        texts.insert(a, PathBuf::from("/p/src/a.ts"), a_text);
        texts.insert(b, PathBuf::from("/p/src/b.ts"), b_text);

        let parsed = [
            parse(a, Path::new("/p/src/a.ts"), a_text).unwrap(),
            parse(b, Path::new("/p/src/b.ts"), b_text).unwrap(),
        ];
        let mut graph = build_graph(&parsed, Path::new("/p"), &mut DiagnosticCollector::new());
        propagate(&mut graph);
        let index = SymbolIndex::build(&graph);

        let candidates = import_candidates(&index, &texts, "answer");
        assert_eq!(candidates.len(), 1);
        let candidate = &candidates[0];
        assert_eq!(candidate.from, "/src/b");
        assert_eq!(candidate.file, a);
        assert_eq!(candidate.path, PathBuf::from("/p/src/a.ts"));
        assert_eq!(candidate.start.line, 1);
        assert_eq!(candidate.type_annotation.as_deref(), Some("number"));
    }

    #[test]
    fn test_unknown_name_has_no_candidates() {
        assert!(import_candidates(&SymbolIndex::new(), &SourceTexts::new(), "Nope").is_empty());
    }
}
