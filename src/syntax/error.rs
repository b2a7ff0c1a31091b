use crate::base::TextSize;

/// Unrecoverable syntax in a single file.
///
/// A file that fails to parse contributes no declarations or exports to
/// the index; the rest of the build carries on.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unrecognized input at byte {offset}")]
    InvalidToken { offset: u32 },

    #[error("unclosed `{delimiter}` opened at byte {offset}")]
    UnclosedDelimiter { delimiter: char, offset: u32 },

    #[error("unexpected `{delimiter}` at byte {offset}")]
    UnbalancedDelimiter { delimiter: char, offset: u32 },

    #[error("expected {expected} at byte {offset}")]
    Expected { expected: &'static str, offset: u32 },
}

impl ParseError {
    pub fn offset(&self) -> TextSize {
        let offset = match self {
            ParseError::InvalidToken { offset }
            | ParseError::UnclosedDelimiter { offset, .. }
            | ParseError::UnbalancedDelimiter { offset, .. }
            | ParseError::Expected { offset, .. } => *offset,
        };
        TextSize::from(offset)
    }
}
