//! Token stream for TypeScript source text.
//!
//! Keywords are lexed as [`TokenKind::Ident`] and recognized by text in the
//! parser, since almost every TypeScript keyword that matters here
//! (`type`, `declare`, `module`, `namespace`, `from`, `as`) is contextual.

use logos::Logos;

use crate::base::{TextRange, TextSize};

#[derive(Logos, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f\u{000B}]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum TokenKind {
    #[regex(r"[A-Za-z_$\u{80}-\u{10FFFF}][A-Za-z0-9_$\u{80}-\u{10FFFF}]*")]
    Ident,

    #[regex(r#""([^"\\\n]|\\.|\\\n)*""#)]
    #[regex(r#"'([^'\\\n]|\\.|\\\n)*'"#)]
    String,

    #[regex(r"`([^`\\]|\\.|\\\n)*`")]
    Template,

    #[regex(r"[0-9][0-9A-Za-z_.]*")]
    Number,

    /// `/body/flags`; produced by [`tokenize`] from a `/` in operand
    /// position, never by the derived lexer itself.
    Regex,

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,
    #[token(":")]
    Colon,
    #[token("?")]
    Question,
    #[token("=")]
    Eq,
    #[token("=>")]
    Arrow,
    #[token("*")]
    Star,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("@")]
    At,
    #[regex(r"[+\-/%&|^!~#\\]")]
    Punct,

    /// Input no pattern matched (stray quote, unterminated regex).
    Error,
    Eof,
}

impl TokenKind {
    pub fn is_open_delimiter(self) -> bool {
        matches!(self, TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket)
    }

    pub fn is_close_delimiter(self) -> bool {
        matches!(self, TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket)
    }

    /// The closing delimiter matching an opening one.
    pub fn closing(self) -> Option<TokenKind> {
        match self {
            TokenKind::LBrace => Some(TokenKind::RBrace),
            TokenKind::LParen => Some(TokenKind::RParen),
            TokenKind::LBracket => Some(TokenKind::RBracket),
            _ => None,
        }
    }

    pub fn delimiter_char(self) -> char {
        match self {
            TokenKind::LBrace => '{',
            TokenKind::RBrace => '}',
            TokenKind::LParen => '(',
            TokenKind::RParen => ')',
            TokenKind::LBracket => '[',
            TokenKind::RBracket => ']',
            _ => '?',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
    /// A line break (possibly inside a comment) separates this token from
    /// the previous one.
    pub newline_before: bool,
}

/// Lex `text` into tokens, always terminated by a single [`TokenKind::Eof`].
pub fn tokenize(text: &str) -> Vec<Token> {
    let bom = if text.starts_with('\u{FEFF}') { '\u{FEFF}'.len_utf8() } else { 0 };
    let mut lexer = TokenKind::lexer(&text[bom..]);
    let mut tokens = Vec::new();
    let mut prev_end = bom;

    while let Some(result) = lexer.next() {
        let mut kind = result.unwrap_or(TokenKind::Error);
        if kind == TokenKind::Punct
            && lexer.slice() == "/"
            && regex_allowed(tokens.last(), text)
        {
            if let Some(len) = regex_body_len(lexer.remainder()) {
                lexer.bump(len);
                kind = TokenKind::Regex;
            }
        }
        let span = lexer.span();
        let (start, end) = (span.start + bom, span.end + bom);
        tokens.push(Token {
            kind,
            range: range(start, end),
            newline_before: text[prev_end..start].contains('\n'),
        });
        prev_end = end;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        range: range(text.len(), text.len()),
        newline_before: text[prev_end..].contains('\n'),
    });
    tokens
}

/// Keywords after which a `/` starts an operand.
const REGEX_PRECEDING_WORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

/// Whether a `/` following `prev` begins a regex literal rather than a
/// division. `<` is excluded so TSX closing tags stay punctuation.
fn regex_allowed(prev: Option<&Token>, text: &str) -> bool {
    let Some(prev) = prev else {
        return true;
    };
    match prev.kind {
        TokenKind::Ident => {
            let word = &text[usize::from(prev.range.start())..usize::from(prev.range.end())];
            REGEX_PRECEDING_WORDS.contains(&word)
        }
        TokenKind::Number
        | TokenKind::String
        | TokenKind::Template
        | TokenKind::Regex
        | TokenKind::RParen
        | TokenKind::RBracket
        | TokenKind::Dot
        | TokenKind::Lt
        | TokenKind::Error
        | TokenKind::Eof => false,
        _ => true,
    }
}

/// Length of a regex literal's remainder after its opening `/`: the body
/// up to the closing unescaped `/` outside a class, plus the flags. `None`
/// when a line ends first.
fn regex_body_len(rest: &str) -> Option<usize> {
    let mut chars = rest.char_indices();
    let mut in_class = false;
    let body_end = loop {
        let (i, c) = chars.next()?;
        match c {
            '\\' => match chars.next() {
                Some((_, '\n' | '\r')) | None => return None,
                Some(_) => {}
            },
            '/' if !in_class => break i + 1,
            '[' => in_class = true,
            ']' if in_class => in_class = false,
            '\n' | '\r' => return None,
            _ => {}
        }
    };
    let flags = rest[body_end..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
        .unwrap_or(rest.len() - body_end);
    Some(body_end + flags)
}

fn range(start: usize, end: usize) -> TextRange {
    TextRange::new(TextSize::from(start as u32), TextSize::from(end as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_export_all_tokens() {
        assert_eq!(
            kinds("export * from './a';"),
            vec![
                TokenKind::Ident,
                TokenKind::Star,
                TokenKind::Ident,
                TokenKind::String,
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("/* a { */ class // }\nFoo"),
            vec![TokenKind::Ident, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn test_newline_before() {
        let tokens = tokenize("const a = 1\nexport /* x\n */ b");
        let flags: Vec<bool> = tokens.iter().map(|t| t.newline_before).collect();
        assert_eq!(flags, vec![false, false, false, false, true, true, false]);
    }

    #[test]
    fn test_arrow_and_ellipsis() {
        assert_eq!(
            kinds("(...a) => a"),
            vec![
                TokenKind::LParen,
                TokenKind::Ellipsis,
                TokenKind::Ident,
                TokenKind::RParen,
                TokenKind::Arrow,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_template_hides_braces() {
        assert_eq!(
            kinds("`${a} }`"),
            vec![TokenKind::Template, TokenKind::Eof]
        );
    }

    #[test]
    fn test_stray_quote_is_error_token() {
        let tokens = kinds("a ' b");
        assert!(tokens.contains(&TokenKind::Error));
        assert_eq!(tokens.last(), Some(&TokenKind::Eof));
    }

    #[test]
    fn test_regex_hides_delimiters() {
        assert_eq!(
            kinds(r"const re = /\(/g;"),
            vec![
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::Regex,
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("f(/[)/]+{/i)"),
            vec![
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::Regex,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_regex_range_includes_flags() {
        let tokens = tokenize("return /a/gi.test(x)");
        assert_eq!(tokens[1].kind, TokenKind::Regex);
        assert_eq!(tokens[1].range, TextRange::new(TextSize::from(7), TextSize::from(12)));
        assert_eq!(tokens[2].kind, TokenKind::Dot);
    }

    #[test]
    fn test_division_is_not_regex() {
        assert_eq!(
            kinds("(a) / b / (c)"),
            vec![
                TokenKind::LParen,
                TokenKind::Ident,
                TokenKind::RParen,
                TokenKind::Punct,
                TokenKind::Ident,
                TokenKind::Punct,
                TokenKind::LParen,
                TokenKind::Ident,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_regex_stays_punct() {
        let tokens = kinds("x = /(\n");
        assert_eq!(tokens[2], TokenKind::Punct);
        assert_eq!(tokens[3], TokenKind::LParen);
    }

    #[test]
    fn test_byte_order_mark_offsets() {
        let tokens = tokenize("\u{FEFF}class");
        assert_eq!(tokens[0].range, TextRange::new(TextSize::from(3), TextSize::from(8)));
    }
}
