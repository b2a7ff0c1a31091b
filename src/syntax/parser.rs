//! Statement-level parser for TypeScript and declaration files.
//!
//! The parser walks top-level statements (and the bodies of namespaces and
//! ambient modules) and skips everything else by delimiter matching. It
//! never looks inside function or class bodies.

use std::path::Path;

use smol_str::SmolStr;

use super::error::ParseError;
use super::lexer::{Token, TokenKind, tokenize};
use super::tree::{
    Body, Declaration, ExportStatement, ExportableDeclaration, ExportableKind, Import, ImportKind,
    NamedBody, NamedBodyKind, SourceFile, Specifier, TypedExportableDeclaration, TypedKind,
};
use crate::base::{FileId, TextRange, TextSize};

/// Parse one file into its declarations, imports and export edges.
pub fn parse(file: FileId, path: &Path, text: &str) -> Result<SourceFile, ParseError> {
    let mut parser = Parser::new(file, text);
    let body = parser.parse_body(false, None)?;

    Ok(SourceFile {
        file,
        path: path.to_path_buf(),
        imports: parser.imports,
        body,
    })
}

/// `export {a as b}` without a `from` clause, applied when its body closes.
type LocalExport = (Specifier, TextRange);

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    cursor: usize,
    file: FileId,
    imports: Vec<Import>,
}

impl<'a> Parser<'a> {
    fn new(file: FileId, text: &'a str) -> Self {
        Self {
            text,
            tokens: tokenize(text),
            cursor: 0,
            file,
            imports: Vec::new(),
        }
    }

    // ========================================================================
    // BODIES & STATEMENTS
    // ========================================================================

    /// Parse statements until end of input, or until the `}` matching `open`.
    fn parse_body(&mut self, ambient: bool, open: Option<TextSize>) -> Result<Body, ParseError> {
        let mut body = Body::default();
        let mut local_exports = Vec::new();

        loop {
            match self.kind() {
                TokenKind::Eof => {
                    if let Some(offset) = open {
                        return Err(ParseError::UnclosedDelimiter {
                            delimiter: '{',
                            offset: offset.into(),
                        });
                    }
                    break;
                }
                TokenKind::RBrace => {
                    if open.is_none() {
                        return Err(self.unbalanced());
                    }
                    self.bump();
                    break;
                }
                TokenKind::Semi => {
                    self.bump();
                }
                _ => self.parse_statement(&mut body, &mut local_exports, ambient)?,
            }
        }

        self.apply_local_exports(&mut body, local_exports);
        Ok(body)
    }

    fn parse_statement(
        &mut self,
        body: &mut Body,
        local_exports: &mut Vec<LocalExport>,
        ambient: bool,
    ) -> Result<(), ParseError> {
        if self.kind() == TokenKind::Error {
            return Err(ParseError::InvalidToken {
                offset: self.offset(),
            });
        }
        self.skip_decorators()?;

        let start = self.current().range.start();
        if self.at_word("import") && !matches!(self.nth_kind(1), TokenKind::LParen | TokenKind::Dot)
        {
            return self.parse_import(start);
        }
        if !self.at_word("export") {
            return self.parse_declaration(body, start, ambient, ambient);
        }

        self.bump();
        match self.kind() {
            TokenKind::Star => return self.parse_export_all(body, start),
            TokenKind::LBrace => return self.parse_export_list(body, local_exports, start),
            TokenKind::Eq => return self.parse_export_assignment(body, start),
            _ => {}
        }

        // `export type { A } from "x"` / `export type * from "x"`
        if self.at_word("type") && matches!(self.nth_kind(1), TokenKind::LBrace | TokenKind::Star) {
            self.bump();
            return if self.kind() == TokenKind::Star {
                self.parse_export_all(body, start)
            } else {
                self.parse_export_list(body, local_exports, start)
            };
        }

        // `export as namespace X;` and `export import A = B.C;`
        if self.at_word("as") || self.at_word("import") {
            return self.skip_rest();
        }

        if self.at_word("default") {
            self.bump();
            if !self.at_declaration_start() {
                if self.kind() == TokenKind::Ident && self.ends_statement_at(1) {
                    let name = self.bump_text();
                    let range = self.range_from(start);
                    local_exports.push((Specifier::new(name).with_alias("default"), range));
                }
                return self.skip_rest();
            }
        }

        self.parse_declaration(body, start, true, ambient)
    }

    fn parse_declaration(
        &mut self,
        body: &mut Body,
        start: TextSize,
        exported: bool,
        ambient: bool,
    ) -> Result<(), ParseError> {
        let head = self.cursor;
        self.skip_decorators()?;

        let mut declare = false;
        loop {
            if self.at_word("declare")
                && self.nth_kind(1) == TokenKind::Ident
                && !self.nth(1).newline_before
            {
                self.bump();
                declare = true;
            } else if self.at_word("abstract") && self.nth_word(1, "class") {
                self.bump();
            } else if self.at_word("async")
                && self.nth_word(1, "function")
                && !self.nth(1).newline_before
            {
                self.bump();
            } else {
                break;
            }
        }

        let next = *self.nth(1);
        match self.word() {
            Some("class") => self.parse_class_like(body, start, exported, ExportableKind::Class),
            Some("interface") => {
                self.parse_class_like(body, start, exported, ExportableKind::Interface)
            }
            Some("enum") => self.parse_class_like(body, start, exported, ExportableKind::Enum),
            Some("const") if self.nth_word(1, "enum") => {
                self.bump();
                self.parse_class_like(body, start, exported, ExportableKind::Enum)
            }
            Some("type") if next.kind == TokenKind::Ident && !next.newline_before => {
                self.parse_type_alias(body, start, exported)
            }
            Some("function") => self.parse_function(body, start, exported),
            Some("const" | "let" | "var")
                if matches!(
                    next.kind,
                    TokenKind::Ident | TokenKind::LBrace | TokenKind::LBracket
                ) =>
            {
                self.parse_variables(body, start, exported)
            }
            Some("namespace" | "module")
                if matches!(next.kind, TokenKind::Ident | TokenKind::String)
                    && !next.newline_before =>
            {
                self.parse_named_body(body, start, exported, ambient || declare)
            }
            Some("global") if declare && next.kind == TokenKind::LBrace => {
                self.bump();
                self.skip_balanced()
            }
            _ => self.skip_statement_from(self.cursor > head),
        }
    }

    fn parse_class_like(
        &mut self,
        body: &mut Body,
        start: TextSize,
        exported: bool,
        kind: ExportableKind,
    ) -> Result<(), ParseError> {
        self.bump();
        let name = if self.kind() == TokenKind::Ident
            && !self.at_word("extends")
            && !self.at_word("implements")
        {
            Some(self.bump_text())
        } else {
            None
        };

        self.skip_to_block()?;
        if self.kind() == TokenKind::LBrace {
            self.skip_balanced()?;
        }

        if let Some(name) = name {
            body.declarations.push(Declaration::Exportable(ExportableDeclaration {
                kind,
                name,
                is_exported: exported,
                range: self.range_from(start),
                file: self.file,
            }));
        }
        Ok(())
    }

    fn parse_type_alias(
        &mut self,
        body: &mut Body,
        start: TextSize,
        exported: bool,
    ) -> Result<(), ParseError> {
        self.bump();
        let name = self.bump_text();
        if self.kind() == TokenKind::Lt {
            self.skip_angle()?;
        }
        if self.eat(TokenKind::Eq) {
            self.scan_type(&[TokenKind::Semi])?;
        }
        self.eat(TokenKind::Semi);

        body.declarations.push(Declaration::Exportable(ExportableDeclaration {
            kind: ExportableKind::TypeAlias,
            name,
            is_exported: exported,
            range: self.range_from(start),
            file: self.file,
        }));
        Ok(())
    }

    fn parse_function(
        &mut self,
        body: &mut Body,
        start: TextSize,
        exported: bool,
    ) -> Result<(), ParseError> {
        self.bump();
        self.eat(TokenKind::Star);
        let name = (self.kind() == TokenKind::Ident).then(|| self.bump_text());
        if self.kind() == TokenKind::Lt {
            self.skip_angle()?;
        }
        if self.kind() != TokenKind::LParen {
            return self.skip_rest();
        }
        self.skip_balanced()?;

        let return_type = if self.eat(TokenKind::Colon) {
            self.scan_type(&[TokenKind::LBrace, TokenKind::Semi])?
        } else {
            None
        };
        if self.kind() == TokenKind::LBrace {
            self.skip_balanced()?;
        } else {
            self.eat(TokenKind::Semi);
        }

        if let Some(name) = name {
            body.declarations
                .push(Declaration::TypedExportable(TypedExportableDeclaration {
                    kind: TypedKind::Function,
                    name,
                    is_exported: exported,
                    range: self.range_from(start),
                    file: self.file,
                    type_annotation: return_type,
                }));
        }
        Ok(())
    }

    fn parse_variables(
        &mut self,
        body: &mut Body,
        start: TextSize,
        exported: bool,
    ) -> Result<(), ParseError> {
        let kind = if self.bump_text() == "const" {
            TypedKind::Const
        } else {
            TypedKind::Variable
        };

        let mut declarator_start = start;
        loop {
            let names = match self.kind() {
                TokenKind::Ident => vec![self.bump_text()],
                TokenKind::LBrace | TokenKind::LBracket => self.binding_pattern_names()?,
                _ => return Err(self.expected("binding name")),
            };
            if self.kind() == TokenKind::Punct && self.current_text() == "!" {
                self.bump();
            }
            let type_annotation = if self.eat(TokenKind::Colon) {
                self.scan_type(&[TokenKind::Eq, TokenKind::Comma, TokenKind::Semi])?
            } else {
                None
            };
            if self.eat(TokenKind::Eq) {
                self.skip_expression(&[TokenKind::Comma, TokenKind::Semi])?;
            }

            let range = self.range_from(declarator_start);
            for name in names {
                body.declarations
                    .push(Declaration::TypedExportable(TypedExportableDeclaration {
                        kind,
                        name,
                        is_exported: exported,
                        range,
                        file: self.file,
                        type_annotation: type_annotation.clone(),
                    }));
            }

            if !self.eat(TokenKind::Comma) {
                break;
            }
            declarator_start = self.current().range.start();
        }
        self.eat(TokenKind::Semi);
        Ok(())
    }

    /// `namespace A.B { }`, `module A { }`, `declare module "x" { }`.
    fn parse_named_body(
        &mut self,
        body: &mut Body,
        start: TextSize,
        exported: bool,
        ambient: bool,
    ) -> Result<(), ParseError> {
        self.bump();

        if self.kind() == TokenKind::String {
            let name = self.expect_string()?;
            let inner = self.parse_optional_block(true)?;
            body.named.push(NamedBody {
                kind: NamedBodyKind::Module,
                name,
                range: self.range_from(start),
                body: inner,
            });
            return Ok(());
        }

        let mut segments = vec![self.bump_text()];
        while self.kind() == TokenKind::Dot && self.nth_kind(1) == TokenKind::Ident {
            self.bump();
            segments.push(self.bump_text());
        }
        let mut inner = self.parse_optional_block(ambient)?;
        let range = self.range_from(start);

        // `namespace A.B` declares `B` as an exported member of `A`.
        for segment in segments[1..].iter().rev() {
            let mut wrapper = Body::default();
            wrapper.declarations.push(self.namespace_declaration(segment, true, range));
            wrapper.named.push(NamedBody {
                kind: NamedBodyKind::Namespace,
                name: segment.clone(),
                range,
                body: inner,
            });
            inner = wrapper;
        }

        body.declarations
            .push(self.namespace_declaration(&segments[0], exported, range));
        body.named.push(NamedBody {
            kind: NamedBodyKind::Namespace,
            name: segments[0].clone(),
            range,
            body: inner,
        });
        Ok(())
    }

    fn parse_optional_block(&mut self, ambient: bool) -> Result<Body, ParseError> {
        if self.kind() == TokenKind::LBrace {
            let open = self.bump().range.start();
            self.parse_body(ambient, Some(open))
        } else {
            self.eat(TokenKind::Semi);
            Ok(Body::default())
        }
    }

    fn namespace_declaration(&self, name: &SmolStr, exported: bool, range: TextRange) -> Declaration {
        Declaration::Exportable(ExportableDeclaration {
            kind: ExportableKind::Namespace,
            name: name.clone(),
            is_exported: exported,
            range,
            file: self.file,
        })
    }

    // ========================================================================
    // IMPORTS & EXPORTS
    // ========================================================================

    fn parse_import(&mut self, start: TextSize) -> Result<(), ParseError> {
        self.bump();

        let mut type_only = false;
        if self.at_word("type") {
            let next = self.nth_kind(1);
            if matches!(next, TokenKind::LBrace | TokenKind::Star)
                || (next == TokenKind::Ident && !self.nth_word(1, "from"))
            {
                self.bump();
                type_only = true;
            }
        }

        if self.kind() == TokenKind::String {
            let from = self.expect_string()?;
            self.finish_module_clause()?;
            self.push_import(ImportKind::SideEffect, from, type_only, start);
            return Ok(());
        }

        let mut default = None;
        if self.kind() == TokenKind::Ident {
            let name = self.bump_text();
            if self.eat(TokenKind::Eq) {
                if self.at_word("require") && self.nth_kind(1) == TokenKind::LParen {
                    self.bump();
                    self.bump();
                    let from = self.expect_string()?;
                    self.expect(TokenKind::RParen, "`)`")?;
                    self.eat(TokenKind::Semi);
                    self.push_import(ImportKind::External(name), from, type_only, start);
                    return Ok(());
                }
                return self.skip_rest();
            }
            if !self.eat(TokenKind::Comma) {
                let from = self.expect_from()?;
                self.finish_module_clause()?;
                self.push_import(ImportKind::Default(name), from, type_only, start);
                return Ok(());
            }
            default = Some(name);
        }

        let kind = match self.kind() {
            TokenKind::Star => {
                self.bump();
                if !self.eat_word("as") {
                    return Err(self.expected("`as`"));
                }
                let alias = self.expect_ident("namespace alias")?;
                ImportKind::Namespace { default, alias }
            }
            TokenKind::LBrace => ImportKind::Named {
                default,
                specifiers: self.parse_specifier_list()?,
            },
            _ => return Err(self.expected("import clause")),
        };
        let from = self.expect_from()?;
        self.finish_module_clause()?;
        self.push_import(kind, from, type_only, start);
        Ok(())
    }

    fn push_import(&mut self, kind: ImportKind, from: SmolStr, type_only: bool, start: TextSize) {
        let range = self.range_from(start);
        self.imports.push(Import {
            kind,
            from,
            type_only,
            range,
        });
    }

    fn parse_export_all(&mut self, body: &mut Body, start: TextSize) -> Result<(), ParseError> {
        self.bump();
        if self.eat_word("as") {
            // `export * as ns from "x"` does not re-export members.
            self.module_export_name()?;
            self.expect_from()?;
            return self.finish_module_clause();
        }

        let from = self.expect_from()?;
        self.finish_module_clause()?;
        body.exports.push(ExportStatement::AllFrom {
            from,
            range: self.range_from(start),
        });
        Ok(())
    }

    fn parse_export_list(
        &mut self,
        body: &mut Body,
        local_exports: &mut Vec<LocalExport>,
        start: TextSize,
    ) -> Result<(), ParseError> {
        let specifiers = self.parse_specifier_list()?;

        if self.at_word("from") {
            let from = self.expect_from()?;
            self.finish_module_clause()?;
            body.exports.push(ExportStatement::NamedFrom {
                from,
                specifiers,
                range: self.range_from(start),
            });
        } else {
            self.eat(TokenKind::Semi);
            let range = self.range_from(start);
            local_exports.extend(specifiers.into_iter().map(|spec| (spec, range)));
        }
        Ok(())
    }

    fn parse_export_assignment(&mut self, body: &mut Body, start: TextSize) -> Result<(), ParseError> {
        self.bump();
        if self.kind() != TokenKind::Ident {
            return self.skip_rest();
        }

        let name = self.bump_text();
        self.skip_rest()?;
        body.exports.push(ExportStatement::Assigned {
            name,
            range: self.range_from(start),
        });
        Ok(())
    }

    fn parse_specifier_list(&mut self) -> Result<Vec<Specifier>, ParseError> {
        let open = self.expect(TokenKind::LBrace, "`{`")?.range.start();
        let mut specifiers = Vec::new();

        loop {
            match self.kind() {
                TokenKind::RBrace => {
                    self.bump();
                    return Ok(specifiers);
                }
                TokenKind::Eof => {
                    return Err(ParseError::UnclosedDelimiter {
                        delimiter: '{',
                        offset: open.into(),
                    });
                }
                _ => {}
            }

            if self.at_word("type")
                && matches!(self.nth_kind(1), TokenKind::Ident | TokenKind::String)
                && !self.nth_word(1, "as")
            {
                self.bump();
            }
            let mut specifier = Specifier::new(self.module_export_name()?);
            if self.eat_word("as") {
                specifier = specifier.with_alias(self.module_export_name()?);
            }
            specifiers.push(specifier);

            if !self.eat(TokenKind::Comma) && self.kind() != TokenKind::RBrace {
                return Err(match self.kind() {
                    TokenKind::Eof => ParseError::UnclosedDelimiter {
                        delimiter: '{',
                        offset: open.into(),
                    },
                    _ => self.expected("`,` or `}`"),
                });
            }
        }
    }

    fn module_export_name(&mut self) -> Result<SmolStr, ParseError> {
        match self.kind() {
            TokenKind::Ident => Ok(self.bump_text()),
            TokenKind::String => self.expect_string(),
            _ => Err(self.expected("export specifier")),
        }
    }

    fn expect_from(&mut self) -> Result<SmolStr, ParseError> {
        if !self.eat_word("from") {
            return Err(self.expected("`from`"));
        }
        if self.kind() != TokenKind::String {
            return Err(self.expected("module specifier string"));
        }
        self.expect_string()
    }

    /// Import attributes (`with { type: "json" }`) and the trailing `;`.
    fn finish_module_clause(&mut self) -> Result<(), ParseError> {
        if (self.at_word("with") || self.at_word("assert"))
            && self.nth_kind(1) == TokenKind::LBrace
            && !self.current().newline_before
        {
            self.bump();
            self.skip_balanced()?;
        }
        self.eat(TokenKind::Semi);
        Ok(())
    }

    fn apply_local_exports(&self, body: &mut Body, local_exports: Vec<LocalExport>) {
        for (spec, range) in local_exports {
            let mut matched = false;
            for decl in body
                .declarations
                .iter_mut()
                .filter(|decl| decl.name() == &spec.specifier)
            {
                decl.set_exported(true);
                if let Some(alias) = spec.alias.as_ref().filter(|alias| *alias != "default") {
                    decl.set_name(alias.clone());
                }
                matched = true;
            }
            if matched {
                continue;
            }

            // `import {A} from "./a"; export {A};` re-exports the import.
            if let Some((from, imported)) = self.imported_binding(&spec.specifier) {
                let mut reexport = Specifier::new(imported);
                if reexport.specifier != *spec.exported_name() {
                    reexport.alias = Some(spec.exported_name().clone());
                }
                body.exports.push(ExportStatement::NamedFrom {
                    from,
                    specifiers: vec![reexport],
                    range,
                });
            }
        }
    }

    /// `(module, imported name)` of a named import bound as `local`.
    fn imported_binding(&self, local: &str) -> Option<(SmolStr, SmolStr)> {
        self.imports.iter().find_map(|import| match &import.kind {
            ImportKind::Named { specifiers, .. } => specifiers
                .iter()
                .find(|spec| spec.exported_name() == local)
                .map(|spec| (import.from.clone(), spec.specifier.clone())),
            _ => None,
        })
    }

    // ========================================================================
    // SKIPPING
    // ========================================================================

    fn skip_decorators(&mut self) -> Result<(), ParseError> {
        while self.kind() == TokenKind::At && self.nth_kind(1) == TokenKind::Ident {
            self.bump();
            self.bump();
            while self.kind() == TokenKind::Dot && self.nth_kind(1) == TokenKind::Ident {
                self.bump();
                self.bump();
            }
            if self.kind() == TokenKind::LParen {
                self.skip_balanced()?;
            }
        }
        Ok(())
    }

    /// Skip the remainder of a statement whose head was already consumed.
    fn skip_rest(&mut self) -> Result<(), ParseError> {
        self.skip_statement_from(true)
    }

    fn skip_statement_from(&mut self, mut consumed: bool) -> Result<(), ParseError> {
        loop {
            let token = *self.current();
            match token.kind {
                TokenKind::Eof | TokenKind::RBrace => return Ok(()),
                TokenKind::Semi => {
                    self.bump();
                    return Ok(());
                }
                TokenKind::RParen | TokenKind::RBracket => return Err(self.unbalanced()),
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => {
                    self.skip_balanced()?;
                    consumed = true;
                    if token.kind == TokenKind::LBrace
                        && self.current().newline_before
                        && self.kind() == TokenKind::Ident
                        && !matches!(self.word(), Some("else" | "catch" | "finally" | "while"))
                    {
                        return Ok(());
                    }
                }
                _ => {
                    if consumed && token.newline_before && self.at_statement_keyword() {
                        return Ok(());
                    }
                    self.bump();
                    consumed = true;
                }
            }
        }
    }

    /// Skip an initializer up to one of `stops` at nesting depth zero.
    fn skip_expression(&mut self, stops: &[TokenKind]) -> Result<(), ParseError> {
        let mut consumed = false;
        loop {
            let token = *self.current();
            if stops.contains(&token.kind) {
                return Ok(());
            }
            match token.kind {
                TokenKind::Eof
                | TokenKind::Semi
                | TokenKind::RBrace
                | TokenKind::RParen
                | TokenKind::RBracket => return Ok(()),
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => {
                    self.skip_balanced()?;
                }
                _ => {
                    if consumed && token.newline_before && self.at_statement_keyword() {
                        return Ok(());
                    }
                    self.bump();
                }
            }
            consumed = true;
        }
    }

    /// Skip a type and return its source text, whitespace-normalized.
    fn scan_type(&mut self, stops: &[TokenKind]) -> Result<Option<SmolStr>, ParseError> {
        let first = self.cursor;
        let mut angle = 0usize;
        let mut prev: Option<Token> = None;

        loop {
            let token = *self.current();
            if angle == 0
                && stops.contains(&token.kind)
                && !(token.kind == TokenKind::LBrace && self.is_type_position(prev))
            {
                break;
            }
            match token.kind {
                TokenKind::Eof
                | TokenKind::Semi
                | TokenKind::RBrace
                | TokenKind::RParen
                | TokenKind::RBracket => break,
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => {
                    self.skip_balanced()?;
                }
                TokenKind::Lt => {
                    angle += 1;
                    self.bump();
                }
                TokenKind::Gt => {
                    angle = angle.saturating_sub(1);
                    self.bump();
                }
                _ => {
                    if prev.is_some()
                        && angle == 0
                        && token.newline_before
                        && self.at_statement_keyword()
                    {
                        break;
                    }
                    self.bump();
                }
            }
            prev = Some(token);
        }

        if self.cursor == first {
            return Ok(None);
        }
        let range = TextRange::new(self.tokens[first].range.start(), self.prev_end());
        let text = self.slice(range).split_whitespace().collect::<Vec<_>>().join(" ");
        Ok(Some(SmolStr::new(text)))
    }

    /// Whether a `{` after `prev` opens an object type rather than a body.
    fn is_type_position(&self, prev: Option<Token>) -> bool {
        let Some(prev) = prev else {
            return true;
        };
        match prev.kind {
            TokenKind::Colon
            | TokenKind::Arrow
            | TokenKind::Lt
            | TokenKind::Comma
            | TokenKind::Eq
            | TokenKind::Question
            | TokenKind::LParen => true,
            TokenKind::Punct => matches!(self.slice(prev.range), "|" | "&"),
            TokenKind::Ident => matches!(
                self.slice(prev.range),
                "keyof" | "typeof" | "readonly" | "extends"
            ),
            _ => false,
        }
    }

    /// Skip generics and heritage clauses up to a body `{`.
    fn skip_to_block(&mut self) -> Result<(), ParseError> {
        let mut angle = 0usize;
        loop {
            match self.kind() {
                TokenKind::LBrace if angle == 0 => return Ok(()),
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => {
                    self.skip_balanced()?;
                }
                TokenKind::Semi | TokenKind::Eof | TokenKind::RBrace => return Ok(()),
                TokenKind::RParen | TokenKind::RBracket => return Err(self.unbalanced()),
                TokenKind::Lt => {
                    angle += 1;
                    self.bump();
                }
                TokenKind::Gt => {
                    angle = angle.saturating_sub(1);
                    self.bump();
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn skip_angle(&mut self) -> Result<(), ParseError> {
        let mut angle = 0usize;
        loop {
            match self.kind() {
                TokenKind::Lt => {
                    angle += 1;
                    self.bump();
                }
                TokenKind::Gt => {
                    self.bump();
                    angle = angle.saturating_sub(1);
                    if angle == 0 {
                        return Ok(());
                    }
                }
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => {
                    self.skip_balanced()?;
                }
                TokenKind::Eof
                | TokenKind::Semi
                | TokenKind::RBrace
                | TokenKind::RParen
                | TokenKind::RBracket => return Ok(()),
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Skip from an opening delimiter past its matching close.
    fn skip_balanced(&mut self) -> Result<(), ParseError> {
        if !self.kind().is_open_delimiter() {
            return Ok(());
        }

        let mut stack: Vec<Token> = Vec::new();
        loop {
            let token = self.bump();
            match token.kind {
                kind if kind.is_open_delimiter() => stack.push(token),
                kind if kind.is_close_delimiter() => {
                    let matches = stack
                        .pop()
                        .and_then(|open| open.kind.closing())
                        .is_some_and(|closing| closing == kind);
                    if !matches {
                        return Err(ParseError::UnbalancedDelimiter {
                            delimiter: kind.delimiter_char(),
                            offset: token.range.start().into(),
                        });
                    }
                    if stack.is_empty() {
                        return Ok(());
                    }
                }
                TokenKind::Eof => {
                    let open = stack.last().copied().unwrap_or(token);
                    return Err(ParseError::UnclosedDelimiter {
                        delimiter: open.kind.delimiter_char(),
                        offset: open.range.start().into(),
                    });
                }
                _ => {}
            }
        }
    }

    fn binding_pattern_names(&mut self) -> Result<Vec<SmolStr>, ParseError> {
        let first = self.cursor;
        self.skip_balanced()?;
        let tokens = &self.tokens[first..self.cursor];

        let names = tokens
            .iter()
            .enumerate()
            .filter(|(i, token)| {
                let next = tokens.get(i + 1).map(|t| t.kind);
                let prev = i.checked_sub(1).map(|j| tokens[j].kind);
                token.kind == TokenKind::Ident
                    && matches!(
                        next,
                        Some(
                            TokenKind::Comma
                                | TokenKind::RBrace
                                | TokenKind::RBracket
                                | TokenKind::Eq
                        )
                    )
                    && prev != Some(TokenKind::Eq)
            })
            .map(|(_, token)| SmolStr::new(self.slice(token.range)))
            .collect();
        Ok(names)
    }

    // ========================================================================
    // TOKEN HELPERS
    // ========================================================================

    fn at_statement_keyword(&self) -> bool {
        if self.kind() == TokenKind::At {
            return true;
        }
        let next = self.nth(1);
        let same_line = !next.newline_before;
        match self.word() {
            Some("export" | "class" | "interface" | "enum" | "function" | "const" | "var") => true,
            Some("import") => !matches!(next.kind, TokenKind::LParen | TokenKind::Dot),
            Some("let") => matches!(
                next.kind,
                TokenKind::Ident | TokenKind::LBrace | TokenKind::LBracket
            ),
            Some("type" | "declare" | "abstract") => next.kind == TokenKind::Ident && same_line,
            Some("namespace" | "module") => {
                matches!(next.kind, TokenKind::Ident | TokenKind::String) && same_line
            }
            Some("async") => self.nth_word(1, "function") && same_line,
            _ => false,
        }
    }

    fn at_declaration_start(&self) -> bool {
        match self.word() {
            Some("class" | "interface" | "function" | "enum") => true,
            Some("abstract") => self.nth_word(1, "class"),
            Some("async") => self.nth_word(1, "function"),
            _ => false,
        }
    }

    /// Whether the token `n` ahead ends the current statement.
    fn ends_statement_at(&self, n: usize) -> bool {
        let token = self.nth(n);
        token.newline_before
            || matches!(
                token.kind,
                TokenKind::Semi | TokenKind::Eof | TokenKind::RBrace
            )
    }

    fn current(&self) -> &Token {
        self.nth(0)
    }

    fn nth(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.cursor + n).min(last)]
    }

    fn kind(&self) -> TokenKind {
        self.current().kind
    }

    fn nth_kind(&self, n: usize) -> TokenKind {
        self.nth(n).kind
    }

    fn slice(&self, range: TextRange) -> &'a str {
        let text = self.text;
        &text[range]
    }

    fn current_text(&self) -> &'a str {
        self.slice(self.current().range)
    }

    fn word(&self) -> Option<&'a str> {
        (self.kind() == TokenKind::Ident).then(|| self.current_text())
    }

    fn at_word(&self, word: &str) -> bool {
        self.word() == Some(word)
    }

    fn nth_word(&self, n: usize, word: &str) -> bool {
        let token = self.nth(n);
        token.kind == TokenKind::Ident && self.slice(token.range) == word
    }

    fn bump(&mut self) -> Token {
        let token = *self.current();
        if token.kind != TokenKind::Eof {
            self.cursor += 1;
        }
        token
    }

    fn bump_text(&mut self) -> SmolStr {
        let token = self.bump();
        SmolStr::new(self.slice(token.range))
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.kind() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.at_word(word) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<Token, ParseError> {
        if self.kind() == kind {
            Ok(self.bump())
        } else {
            Err(self.expected(expected))
        }
    }

    fn expect_ident(&mut self, expected: &'static str) -> Result<SmolStr, ParseError> {
        if self.kind() == TokenKind::Ident {
            Ok(self.bump_text())
        } else {
            Err(self.expected(expected))
        }
    }

    fn expect_string(&mut self) -> Result<SmolStr, ParseError> {
        let token = self.expect(TokenKind::String, "string literal")?;
        let raw = self.slice(token.range);
        Ok(SmolStr::new(&raw[1..raw.len() - 1]))
    }

    fn offset(&self) -> u32 {
        self.current().range.start().into()
    }

    fn prev_end(&self) -> TextSize {
        match self.cursor.checked_sub(1) {
            Some(prev) => self.tokens[prev].range.end(),
            None => TextSize::from(0),
        }
    }

    fn range_from(&self, start: TextSize) -> TextRange {
        TextRange::new(start, self.prev_end().max(start))
    }

    fn expected(&self, expected: &'static str) -> ParseError {
        ParseError::Expected {
            expected,
            offset: self.offset(),
        }
    }

    fn unbalanced(&self) -> ParseError {
        let token = self.current();
        ParseError::UnbalancedDelimiter {
            delimiter: token.kind.delimiter_char(),
            offset: token.range.start().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::tree::DeclarationKind;

    fn parse_ok(text: &str) -> SourceFile {
        parse(FileId::new(0), Path::new("/project/src/test.ts"), text).unwrap()
    }

    fn names(file: &SourceFile) -> Vec<(&str, DeclarationKind, bool)> {
        file.declarations()
            .iter()
            .map(|d| (d.name().as_str(), d.kind(), d.is_exported()))
            .collect()
    }

    #[test]
    fn test_basic_declarations() {
        let file = parse_ok(
            r#"
            export class Foo<T> extends Base<T> implements Bar { method() { return 1; } }
            class Hidden {}
            export interface Shape { area(): number }
            export abstract class Animal {}
            export enum Color { Red, Green }
            export const enum Flags { A = 1 }
            export type Id = string | number;
            export function run(a: string): Promise<void> { }
            export async function load() {}
            "#,
        );

        assert_eq!(
            names(&file),
            vec![
                ("Foo", DeclarationKind::Class, true),
                ("Hidden", DeclarationKind::Class, false),
                ("Shape", DeclarationKind::Interface, true),
                ("Animal", DeclarationKind::Class, true),
                ("Color", DeclarationKind::Enum, true),
                ("Flags", DeclarationKind::Enum, true),
                ("Id", DeclarationKind::TypeAlias, true),
                ("run", DeclarationKind::Function, true),
                ("load", DeclarationKind::Function, true),
            ]
        );
        assert_eq!(file.declarations()[7].type_annotation(), Some("Promise<void>"));
    }

    #[test]
    fn test_declaration_range_covers_statement() {
        let text = "// lead\nexport class Foo {}\n";
        let file = parse_ok(text);
        let range = file.declarations()[0].range();

        assert_eq!(&text[range], "export class Foo {}");
    }

    #[test]
    fn test_variables_and_types() {
        let file = parse_ok(
            r#"
            export const a = 1, b: Map<string, number> = new Map();
            export let { c, d: renamed, e = fallback } = source;
            var hidden = () => { return '{'; };
            export declare const version: string;
            "#,
        );

        assert_eq!(
            names(&file),
            vec![
                ("a", DeclarationKind::Const, true),
                ("b", DeclarationKind::Const, true),
                ("c", DeclarationKind::Variable, true),
                ("renamed", DeclarationKind::Variable, true),
                ("e", DeclarationKind::Variable, true),
                ("hidden", DeclarationKind::Variable, false),
                ("version", DeclarationKind::Const, true),
            ]
        );
        assert_eq!(file.declarations()[1].type_annotation(), Some("Map<string, number>"));
        assert_eq!(file.declarations()[6].type_annotation(), Some("string"));
    }

    #[test]
    fn test_statements_without_semicolons() {
        let file = parse_ok(
            "export const a = compute()\nexport const b = {\n  x: 1\n}\nexport function c() {}\n",
        );
        let found: Vec<_> = names(&file).into_iter().map(|(n, _, _)| n).collect();
        assert_eq!(found, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_reexport_statements() {
        let file = parse_ok(
            r#"
            export * from './a';
            export { Foo as Bar, Baz } from "./b";
            export type { Shape } from './shapes';
            export * as ns from './ignored';
            "#,
        );

        assert_eq!(file.exports().len(), 3);
        assert!(matches!(&file.exports()[0], ExportStatement::AllFrom { from, .. } if from == "./a"));
        match &file.exports()[1] {
            ExportStatement::NamedFrom { from, specifiers, .. } => {
                assert_eq!(from, "./b");
                assert_eq!(
                    specifiers,
                    &vec![Specifier::new("Foo").with_alias("Bar"), Specifier::new("Baz")]
                );
            }
            other => panic!("unexpected export {other:?}"),
        }
        assert!(file.declarations().is_empty());
    }

    #[test]
    fn test_local_export_list() {
        let file = parse_ok(
            r#"
            import { Remote as R } from './remote';
            class Local {}
            function helper() {}
            export { Local, helper as util, R };
            "#,
        );

        assert_eq!(
            names(&file),
            vec![
                ("Local", DeclarationKind::Class, true),
                ("util", DeclarationKind::Function, true),
            ]
        );
        match &file.exports()[0] {
            ExportStatement::NamedFrom { from, specifiers, .. } => {
                assert_eq!(from, "./remote");
                assert_eq!(specifiers, &vec![Specifier::new("Remote").with_alias("R")]);
            }
            other => panic!("unexpected export {other:?}"),
        }
    }

    #[test]
    fn test_export_default() {
        let file = parse_ok(
            r#"
            export default class Widget {}
            function factory() {}
            export default factory;
            "#,
        );
        assert_eq!(
            names(&file),
            vec![
                ("Widget", DeclarationKind::Class, true),
                ("factory", DeclarationKind::Function, true),
            ]
        );
    }

    #[test]
    fn test_ambient_module_exports_implicitly() {
        let file = parse_ok(
            r#"
            declare module "some-lib" {
                function helper(): void;
                class Thing {}
                export = Thing;
            }
            declare module "shorthand";
            "#,
        );

        let modules = file.named_bodies();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].kind, NamedBodyKind::Module);
        assert_eq!(modules[0].name, "some-lib");
        assert!(modules[0].body.declarations.iter().all(|d| d.is_exported()));
        assert!(matches!(
            &modules[0].body.exports[0],
            ExportStatement::Assigned { name, .. } if name == "Thing"
        ));
        assert!(modules[1].body.is_empty());
    }

    #[test]
    fn test_namespace_members_need_export() {
        let file = parse_ok(
            r#"
            export namespace Outer.Inner {
                export class Visible {}
                class Invisible {}
            }
            "#,
        );

        assert_eq!(names(&file), vec![("Outer", DeclarationKind::Namespace, true)]);
        let outer = &file.named_bodies()[0];
        assert_eq!(outer.name, "Outer");
        let inner = &outer.body.named[0];
        assert_eq!(inner.name, "Inner");
        assert_eq!(
            inner
                .body
                .declarations
                .iter()
                .map(|d| (d.name().as_str(), d.is_exported()))
                .collect::<Vec<_>>(),
            vec![("Visible", true), ("Invisible", false)]
        );
    }

    #[test]
    fn test_imports() {
        let file = parse_ok(
            r#"
            import 'reflect-metadata';
            import React, { useState as useS } from "react";
            import * as path from 'path';
            import type { Config } from './config';
            import fs = require('fs');
            import data from './data.json' with { type: 'json' };
            const lazy = import('./lazy');
            "#,
        );

        let kinds: Vec<_> = file.imports.iter().map(|i| (&i.kind, i.from.as_str())).collect();
        assert_eq!(kinds.len(), 6);
        assert_eq!(kinds[0], (&ImportKind::SideEffect, "reflect-metadata"));
        assert_eq!(
            kinds[1],
            (
                &ImportKind::Named {
                    default: Some("React".into()),
                    specifiers: vec![Specifier::new("useState").with_alias("useS")],
                },
                "react"
            )
        );
        assert_eq!(
            kinds[2],
            (
                &ImportKind::Namespace {
                    default: None,
                    alias: "path".into()
                },
                "path"
            )
        );
        assert!(file.imports[3].type_only);
        assert_eq!(kinds[4], (&ImportKind::External("fs".into()), "fs"));
        assert_eq!(kinds[5], (&ImportKind::Default("data".into()), "./data.json"));
    }

    #[test]
    fn test_zero_exports_is_not_an_error() {
        let file = parse_ok("const x = 1;\nconsole.log(x);\n");
        assert!(file.exports().is_empty());
        assert_eq!(names(&file), vec![("x", DeclarationKind::Const, false)]);
    }

    #[test]
    fn test_decorated_class() {
        let file = parse_ok("@Component({ selector: 'app' })\nexport class AppComponent {}\n");
        assert_eq!(names(&file), vec![("AppComponent", DeclarationKind::Class, true)]);
    }

    #[test]
    fn test_regex_in_body_is_tolerated() {
        let file = parse_ok("export function quote(s: string) { return s.replace(/'/g, ''); }\n");
        assert_eq!(names(&file), vec![("quote", DeclarationKind::Function, true)]);
    }

    #[test]
    fn test_regex_delimiters_in_function_body() {
        let file = parse_ok(
            r"export function strip(s: string) { return s.replace(/\{/g, '').split(/[)\]]/); }
export class Keep {}
",
        );
        assert_eq!(
            names(&file),
            vec![
                ("strip", DeclarationKind::Function, true),
                ("Keep", DeclarationKind::Class, true),
            ]
        );
    }

    #[test]
    fn test_regex_delimiters_at_top_level() {
        let file = parse_ok(
            r"const open = /\(/;
const list = [/\[/, /}/];
/[{(]/.test(open.source);
export class Keep {}
",
        );
        assert_eq!(
            names(&file),
            vec![
                ("open", DeclarationKind::Const, false),
                ("list", DeclarationKind::Const, false),
                ("Keep", DeclarationKind::Class, true),
            ]
        );
    }

    #[test]
    fn test_division_keeps_initializer_boundaries() {
        let file = parse_ok("export const half = (total) / 2;
export const ratio = a / b / c;
");
        assert_eq!(
            names(&file),
            vec![
                ("half", DeclarationKind::Const, true),
                ("ratio", DeclarationKind::Const, true),
            ]
        );
    }

    #[test]
    fn test_unclosed_block_is_error() {
        let err = parse(FileId::new(0), Path::new("a.ts"), "export class Foo {").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnclosedDelimiter {
                delimiter: '{',
                offset: 17
            }
        );
    }

    #[test]
    fn test_stray_closing_brace_is_error() {
        let err = parse(FileId::new(0), Path::new("a.ts"), "export const a = 1;\n}").unwrap_err();
        assert!(matches!(err, ParseError::UnbalancedDelimiter { delimiter: '}', .. }));
    }

    #[test]
    fn test_from_requires_string() {
        let err = parse(FileId::new(0), Path::new("a.ts"), "export * from foo;").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Expected {
                expected: "module specifier string",
                ..
            }
        ));
    }
}
