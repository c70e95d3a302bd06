// Parser errors: malformed tuples/VALUES bodies and unusable INSERT headers.

use std::fmt;
use thiserror::Error;

// Bytes of context kept on each side of the offending offset.
const SNIPPET_RADIUS: usize = 24;

/// What went wrong while scanning a tuple or a VALUES body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedKind {
    /// The tuple text does not start with `(` and end with `)`.
    NotParenthesized,
    /// A quoted span was still open at the end of the input.
    UnterminatedQuote(char),
    /// A `)` appeared at the top level with no tuple open.
    UnbalancedClose,
    /// A tuple `(` was never closed.
    UnclosedTuple,
    /// A character that is neither a tuple nor a separator appeared between tuples.
    UnexpectedText(char),
}

impl fmt::Display for MalformedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedKind::NotParenthesized => write!(f, "tuple is not wrapped in parentheses"),
            MalformedKind::UnterminatedQuote(q) => write!(f, "unterminated {} quoted span", q),
            MalformedKind::UnbalancedClose => write!(f, "unbalanced ')'"),
            MalformedKind::UnclosedTuple => write!(f, "'(' is never closed"),
            MalformedKind::UnexpectedText(c) => write!(f, "unexpected {:?} between tuples", c),
        }
    }
}

/// Malformed tuple input, located by byte offset into the scanned text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed tuple at byte {offset}: {kind} (near `{snippet}`)")]
pub struct MalformedTupleError {
    pub kind: MalformedKind,
    /// Byte offset into the text handed to the parser or splitter.
    pub offset: usize,
    /// Text surrounding `offset`, cut on char boundaries.
    pub snippet: String,
}

impl MalformedTupleError {
    pub(crate) fn new(kind: MalformedKind, input: &str, offset: usize) -> Self {
        Self {
            kind,
            offset,
            snippet: snippet_around(input, offset),
        }
    }

    /// Shift the offset when the scanned text was a slice of a larger input.
    pub fn with_base(mut self, base: usize) -> Self {
        self.offset += base;
        self
    }
}

/// Why an INSERT statement header could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatementError {
    #[error("not an INSERT statement")]
    NotInsert,

    #[error("missing table name")]
    MissingTable,

    #[error("malformed column list")]
    InvalidColumnList,

    #[error("no VALUES clause")]
    MissingValues,
}

pub(crate) fn snippet_around(input: &str, offset: usize) -> String {
    let mut start = offset.saturating_sub(SNIPPET_RADIUS);
    while !input.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = offset.saturating_add(SNIPPET_RADIUS).min(input.len());
    while !input.is_char_boundary(end) {
        end += 1;
    }
    input[start..end].replace(['\n', '\r'], " ")
}
