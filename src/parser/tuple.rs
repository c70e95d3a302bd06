// Tuple parser: one "(v1, v2, ...)" value list into its fields.
// Single pass over the characters; the outer parentheses are the only
// structural ones, everything else is split on unquoted commas.

use crate::parser::error::{MalformedKind, MalformedTupleError};
use crate::parser::Field;
use std::mem;

/// Parse one parenthesized tuple into its fields.
///
/// Quoted spans may use `'` or `"`. Inside a span a backslash escapes the
/// next character (MySQL escapes such as `\n` and `\0` are decoded) and the
/// opening quote doubled stands for itself. The bare token `NULL` becomes
/// [`Field::Null`]; everything else is text with unquoted surrounding
/// whitespace trimmed.
///
/// The number of fields is always the number of unquoted commas plus one.
pub fn parse_tuple(raw: &str) -> Result<Vec<Field>, MalformedTupleError> {
    let lead = raw.len() - raw.trim_start().len();
    let trimmed = raw.trim();
    if trimmed.len() < 2 || !trimmed.starts_with('(') || !trimmed.ends_with(')') {
        return Err(MalformedTupleError::new(
            MalformedKind::NotParenthesized,
            raw,
            lead,
        ));
    }
    let base = lead + 1;
    let inner = &trimmed[1..trimmed.len() - 1];

    let mut fields = Vec::new();
    let mut acc = FieldBuf::default();
    // Opening quote character and its offset within `inner`.
    let mut quote: Option<(char, usize)> = None;
    let mut chars = inner.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let Some((q, _)) = quote else {
            match c {
                '\'' | '"' => {
                    quote = Some((c, i));
                    acc.quoted = true;
                }
                ',' => fields.push(acc.finish()),
                _ => acc.push_plain(c),
            }
            continue;
        };

        if c == '\\' {
            // A trailing backslash leaves the span open; reported below.
            if let Some((_, escaped)) = chars.next() {
                acc.push_quoted(unescape(escaped));
            }
        } else if c == q {
            if chars.next_if(|&(_, n)| n == q).is_some() {
                acc.push_quoted(q);
            } else {
                quote = None;
                acc.close_quote();
            }
        } else {
            acc.push_quoted(c);
        }
    }

    if let Some((q, at)) = quote {
        return Err(MalformedTupleError::new(
            MalformedKind::UnterminatedQuote(q),
            raw,
            base + at,
        ));
    }
    fields.push(acc.finish());
    Ok(fields)
}

fn unescape(c: char) -> char {
    match c {
        '0' => '\0',
        'b' => '\u{8}',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'Z' => '\u{1a}',
        other => other,
    }
}

// Accumulator for the field being scanned. `keep` is the length of text up
// to the end of the last quoted content: trailing trim never cuts below it.
#[derive(Default)]
struct FieldBuf {
    text: String,
    quoted: bool,
    keep: usize,
}

impl FieldBuf {
    fn push_plain(&mut self, c: char) {
        if c.is_whitespace() && self.text.is_empty() && !self.quoted {
            return;
        }
        self.text.push(c);
    }

    fn push_quoted(&mut self, c: char) {
        self.text.push(c);
        self.keep = self.text.len();
    }

    fn close_quote(&mut self) {
        self.keep = self.text.len();
    }

    fn finish(&mut self) -> Field {
        let mut text = mem::take(&mut self.text);
        let quoted = mem::take(&mut self.quoted);
        let keep = mem::take(&mut self.keep);
        let len = keep.max(text.trim_end().len());
        text.truncate(len);
        if !quoted && text == "NULL" {
            Field::Null
        } else {
            Field::Text(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::render_tuple;

    fn text(s: &str) -> Field {
        Field::Text(s.to_string())
    }

    #[test]
    fn test_comma_inside_quotes() {
        assert_eq!(parse_tuple("('a,b','c')").unwrap(), vec![text("a,b"), text("c")]);
    }

    #[test]
    fn test_null_and_numeric() {
        assert_eq!(
            parse_tuple("(1,NULL,'x')").unwrap(),
            vec![text("1"), Field::Null, text("x")]
        );
    }

    #[test]
    fn test_doubled_quote_escape() {
        assert_eq!(
            parse_tuple("('it''s', 'ok')").unwrap(),
            vec![text("it's"), text("ok")]
        );
        assert_eq!(
            parse_tuple(r#"("say ""hi""")"#).unwrap(),
            vec![text(r#"say "hi""#)]
        );
    }

    #[test]
    fn test_backslash_escapes() {
        assert_eq!(
            parse_tuple(r"('it\'s','a\\b','line\nbreak','tab\there','\%')").unwrap(),
            vec![
                text("it's"),
                text("a\\b"),
                text("line\nbreak"),
                text("tab\there"),
                text("%"),
            ]
        );
        assert_eq!(parse_tuple(r"('\0\Z')").unwrap(), vec![text("\0\u{1a}")]);
    }

    #[test]
    fn test_backslash_outside_quotes_is_literal() {
        assert_eq!(parse_tuple(r"(a\b)").unwrap(), vec![text(r"a\b")]);
    }

    #[test]
    fn test_other_quote_style_is_literal() {
        assert_eq!(
            parse_tuple(r#"('say "hi"', "it's")"#).unwrap(),
            vec![text(r#"say "hi""#), text("it's")]
        );
    }

    #[test]
    fn test_parentheses_inside_quotes() {
        assert_eq!(
            parse_tuple("('f(x)', ')(')").unwrap(),
            vec![text("f(x)"), text(")(")]
        );
    }

    #[test]
    fn test_unterminated_quote() {
        let err = parse_tuple("('unterminated, 'x')").unwrap_err();
        assert_eq!(err.kind, MalformedKind::UnterminatedQuote('\''));
        assert_eq!(err.offset, 18);
    }

    #[test]
    fn test_trailing_backslash_is_unterminated() {
        let err = parse_tuple(r"('abc\)").unwrap_err();
        assert_eq!(err.kind, MalformedKind::UnterminatedQuote('\''));
        assert_eq!(err.offset, 1);
    }

    #[test]
    fn test_not_parenthesized() {
        for raw in ["'a','b'", "(", "", "('a'", "  'a')"] {
            let err = parse_tuple(raw).unwrap_err();
            assert_eq!(err.kind, MalformedKind::NotParenthesized, "input {:?}", raw);
        }
    }

    #[test]
    fn test_surrounding_whitespace_accepted() {
        let err = parse_tuple("  (x  ").unwrap_err();
        assert_eq!(err.offset, 2);
        assert_eq!(parse_tuple("  ( 1 , 2 )\n").unwrap(), vec![text("1"), text("2")]);
    }

    #[test]
    fn test_quoted_whitespace_survives() {
        assert_eq!(
            parse_tuple("(  ' a ' ,   b   )").unwrap(),
            vec![text(" a "), text("b")]
        );
    }

    #[test]
    fn test_quoted_null_is_text() {
        assert_eq!(
            parse_tuple("('NULL', null, NULL)").unwrap(),
            vec![text("NULL"), text("null"), Field::Null]
        );
    }

    #[test]
    fn test_empty_fields() {
        assert_eq!(parse_tuple("()").unwrap(), vec![text("")]);
        assert_eq!(parse_tuple("(1,)").unwrap(), vec![text("1"), text("")]);
        assert_eq!(parse_tuple("('',,'')").unwrap(), vec![text(""), text(""), text("")]);
    }

    #[test]
    fn test_field_count_matches_unquoted_commas() {
        let cases = [
            "(1,2,3)",
            "('a,b,c',\"d,e\",f)",
            "('x''y,z', NULL, 'q')",
            r"('a\',b', c)",
        ];
        for raw in cases {
            let fields = parse_tuple(raw).unwrap();
            let mut state = crate::parser::QuoteState::default();
            let inner = &raw[1..raw.len() - 1];
            let commas = inner.chars().filter(|&c| state.step(c) && c == ',').count();
            assert_eq!(fields.len(), commas + 1, "input {:?}", raw);
        }
    }

    #[test]
    fn test_utf8_content() {
        assert_eq!(
            parse_tuple("('Maladie de Gaucher – type 1', 'ß')").unwrap(),
            vec![text("Maladie de Gaucher – type 1"), text("ß")]
        );
    }

    #[test]
    fn test_render_then_parse_round_trip() {
        let fields = vec![
            text("a,b"),
            Field::Null,
            text("it's \"quoted\""),
            text("NULL"),
            text(" padded "),
            text("back\\slash"),
            text("(paren)"),
            text(""),
            text("multi\nline\r\0\u{1a}"),
        ];
        let rendered = render_tuple(&fields);
        assert_eq!(parse_tuple(&rendered).unwrap(), fields);
    }
}
