// Lexer and statement-level parser for TypeScript sources
mod error;
pub mod lexer;
mod parser;
mod tree;

pub use error::ParseError;
pub use parser::parse;
pub use tree::{
    Body, Declaration, DeclarationKind, ExportStatement, ExportableDeclaration, ExportableKind,
    Import, ImportKind, ModuleDeclaration, NamedBody, NamedBodyKind, SourceFile, Specifier,
    TypedExportableDeclaration, TypedKind,
};
