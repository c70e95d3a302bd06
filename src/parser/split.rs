// Split a VALUES body "(...),(...),...;" into its raw tuples while respecting quotes.

use crate::parser::error::{MalformedKind, MalformedTupleError};
use crate::parser::QuoteState;
use std::ops::Range;

/// Split the body of a multi-row `VALUES` clause into raw tuple slices.
///
/// Each returned slice is a balanced `(...)` span, still wrapped in its
/// parentheses, ready for [`parse_tuple`](crate::parser::parse_tuple).
/// Separating commas and whitespace are dropped, and a single trailing `;`
/// is accepted. Unquoted parentheses inside a tuple nest, so `POINT(1,2)`
/// stays part of its tuple.
pub fn split_tuples(values: &str) -> Result<Vec<&str>, MalformedTupleError> {
    Ok(tuple_spans(values)?
        .into_iter()
        .map(|span| &values[span])
        .collect())
}

/// Like [`split_tuples`], but returns the byte range of each tuple in `values`.
pub fn tuple_spans(values: &str) -> Result<Vec<Range<usize>>, MalformedTupleError> {
    let mut tuples = Vec::new();
    let mut state = QuoteState::default();
    let mut quote_at = 0usize;
    // End offset and char of the span closed by the previous char.
    let mut closed: Option<(usize, char)> = None;
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut terminated = false;

    for (i, c) in values.char_indices() {
        let was_quoted = state.open_quote();
        if !state.step(c) {
            if depth == 0 {
                return Err(unexpected(values, c, i));
            }
            match (was_quoted, state.open_quote()) {
                // A doubled quote reopens the same span.
                (None, Some(q)) if closed != Some((i, q)) => quote_at = i,
                (Some(q), None) => {
                    closed = Some((i + q.len_utf8(), q));
                    continue;
                }
                _ => {}
            }
            closed = None;
            continue;
        }
        closed = None;
        if terminated && !c.is_whitespace() {
            return Err(unexpected(values, c, i));
        }

        match c {
            '(' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            ')' => {
                if depth == 0 {
                    return Err(MalformedTupleError::new(
                        MalformedKind::UnbalancedClose,
                        values,
                        i,
                    ));
                }
                depth -= 1;
                if depth == 0 {
                    tuples.push(start..i + 1);
                }
            }
            _ if depth > 0 => {}
            ';' => terminated = true,
            ',' => {}
            c if c.is_whitespace() => {}
            c => return Err(unexpected(values, c, i)),
        }
    }

    if let Some(q) = state.open_quote() {
        return Err(MalformedTupleError::new(
            MalformedKind::UnterminatedQuote(q),
            values,
            quote_at,
        ));
    }
    if depth > 0 {
        return Err(MalformedTupleError::new(
            MalformedKind::UnclosedTuple,
            values,
            start,
        ));
    }
    Ok(tuples)
}

fn unexpected(values: &str, c: char, offset: usize) -> MalformedTupleError {
    MalformedTupleError::new(MalformedKind::UnexpectedText(c), values, offset)
}
