// Parser module: tuple fields, VALUES splitting, INSERT headers and schema columns.

pub mod error;
pub mod insert;
pub mod schema;
pub mod split;
pub mod tuple;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use error::{MalformedKind, MalformedTupleError, StatementError};
pub use split::{split_tuples, tuple_spans};
pub use tuple::parse_tuple;

/// One scalar value of a tuple.
///
/// Every non-null value is kept as text; converting to numbers or dates is
/// left to whoever knows the destination column's type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Field {
    Null,
    Text(String),
}

impl Field {
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::Null => None,
            Field::Text(s) => Some(s),
        }
    }
}

impl From<Option<String>> for Field {
    fn from(value: Option<String>) -> Self {
        value.map_or(Field::Null, Field::Text)
    }
}

impl From<Field> for Option<String> {
    fn from(field: Field) -> Self {
        match field {
            Field::Null => None,
            Field::Text(s) => Some(s),
        }
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Text(value.to_string())
    }
}

// Renders the field as a SQL literal: bare NULL, or a single-quoted string
// using the backslash escapes parse_tuple understands.
impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Field::Null => return f.write_str("NULL"),
            Field::Text(s) => s,
        };
        f.write_str("'")?;
        for c in s.chars() {
            match c {
                '\\' => f.write_str("\\\\")?,
                '\'' => f.write_str("\\'")?,
                '\0' => f.write_str("\\0")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                '\u{1a}' => f.write_str("\\Z")?,
                c => write!(f, "{}", c)?,
            }
        }
        f.write_str("'")
    }
}

/// Render fields back into a `(...)` tuple accepted by [`parse_tuple`].
pub fn render_tuple(fields: &[Field]) -> String {
    let parts: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
    format!("({})", parts.join(","))
}

// Quote/escape tracking shared by the splitter and the statement accumulator.
// Doubled quotes need no special case here: they close and immediately reopen.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct QuoteState {
    quote: Option<char>,
    escape_next: bool,
}

impl QuoteState {
    // Feed one character. Returns true when it is structural, i.e. outside
    // any quoted span and not itself a quote.
    pub(crate) fn step(&mut self, c: char) -> bool {
        if let Some(q) = self.quote {
            if self.escape_next {
                self.escape_next = false;
            } else if c == '\\' {
                self.escape_next = true;
            } else if c == q {
                self.quote = None;
            }
            return false;
        }
        if c == '\'' || c == '"' {
            self.quote = Some(c);
            return false;
        }
        true
    }

    pub(crate) fn open_quote(&self) -> Option<char> {
        self.quote
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_display() {
        assert_eq!(Field::Null.to_string(), "NULL");
        assert_eq!(Field::from("NULL").to_string(), "'NULL'");
        assert_eq!(Field::from("it's").to_string(), r"'it\'s'");
        assert_eq!(Field::from("a\\b\nc").to_string(), r"'a\\b\nc'");
    }

    #[test]
    fn test_field_serde_as_option() {
        let fields = vec![Field::from("x"), Field::Null];
        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(json, r#"["x",null]"#);
        let back: Vec<Field> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fields);
    }

    #[test]
    fn test_render_tuple() {
        let fields = vec![Field::from("1"), Field::Null, Field::from("a,b")];
        assert_eq!(render_tuple(&fields), "('1',NULL,'a,b')");
        assert_eq!(render_tuple(&[]), "()");
    }

    #[test]
    fn test_quote_state_tracks_escapes() {
        let mut state = QuoteState::default();
        let structural: Vec<bool> = r"'a\'b',".chars().map(|c| state.step(c)).collect();
        assert_eq!(structural, vec![false, false, false, false, false, false, true]);
        assert_eq!(state.open_quote(), None);
    }

    #[test]
    fn test_quote_state_backslash_outside_quotes_is_plain() {
        let mut state = QuoteState::default();
        assert!(state.step('\\'));
        assert!(!state.step('"'));
        assert_eq!(state.open_quote(), Some('"'));
    }
}
