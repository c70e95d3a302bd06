// INSERT parsing: accumulate statements from dump lines and read their headers.
// Headers are read with a small cursor instead of a SQL grammar, and the text is
// never whitespace-normalized since that would corrupt quoted values.

use crate::parser::error::StatementError;
use crate::parser::QuoteState;
use std::mem;

/// Header of one INSERT statement plus its still unsplit VALUES body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement<'a> {
    pub table: String,
    /// Explicit column list; empty when the statement relies on table order.
    pub columns: Vec<String>,
    /// Everything after the VALUES keyword, trailing `;` included.
    pub values: &'a str,
    /// Byte offset of `values` within the statement text.
    pub values_offset: usize,
}

impl<'a> InsertStatement<'a> {
    /// Parse `INSERT [modifiers] [INTO] table [(cols)] VALUES ...` or the
    /// `REPLACE` form.
    pub fn parse(sql: &'a str) -> Result<Self, StatementError> {
        let mut cur = Cursor { src: sql, pos: 0 };
        cur.skip_ws();
        let modifiers: &[&str] = if cur.eat_keyword("INSERT") {
            &["LOW_PRIORITY", "DELAYED", "HIGH_PRIORITY", "IGNORE"]
        } else if cur.eat_keyword("REPLACE") {
            &["LOW_PRIORITY", "DELAYED"]
        } else {
            return Err(StatementError::NotInsert);
        };
        cur.skip_ws();
        for m in modifiers {
            if cur.eat_keyword(m) {
                cur.skip_ws();
            }
        }
        if cur.eat_keyword("INTO") {
            cur.skip_ws();
        }

        let mut table = cur.identifier().ok_or(StatementError::MissingTable)?;
        // Keep only the last part of db.table.
        while cur.eat_char('.') {
            table = cur.identifier().ok_or(StatementError::MissingTable)?;
        }
        cur.skip_ws();

        let mut columns = Vec::new();
        if cur.eat_char('(') {
            columns = cur.column_list()?;
            cur.skip_ws();
        }

        if !(cur.eat_keyword("VALUES") || cur.eat_keyword("VALUE")) {
            return Err(StatementError::MissingValues);
        }

        Ok(Self {
            table,
            columns,
            values: &sql[cur.pos..],
            values_offset: cur.pos,
        })
    }
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat_char(&mut self, c: char) -> bool {
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    // Case-insensitive keyword followed by a word boundary.
    fn eat_keyword(&mut self, kw: &str) -> bool {
        let rest = self.rest();
        let Some(head) = rest.get(..kw.len()) else {
            return false;
        };
        if !head.eq_ignore_ascii_case(kw) {
            return false;
        }
        if rest[kw.len()..].chars().next().is_some_and(is_word_char) {
            return false;
        }
        self.pos += kw.len();
        true
    }

    // Bare, back-ticked or double-quoted identifier. A doubled closing
    // character inside a quoted identifier stands for itself.
    fn identifier(&mut self) -> Option<String> {
        let rest = self.rest();
        let open = rest.chars().next()?;
        if open == '`' || open == '"' {
            let mut name = String::new();
            let mut chars = rest.char_indices().skip(1).peekable();
            while let Some((i, c)) = chars.next() {
                if c == open {
                    if chars.next_if(|&(_, n)| n == open).is_some() {
                        name.push(open);
                        continue;
                    }
                    self.pos += i + 1;
                    return (!name.is_empty()).then_some(name);
                }
                name.push(c);
            }
            return None;
        }
        let len: usize = rest
            .chars()
            .take_while(|&c| is_word_char(c) || c == '$')
            .map(char::len_utf8)
            .sum();
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(rest[..len].to_string())
    }

    // Called just past the opening parenthesis.
    fn column_list(&mut self) -> Result<Vec<String>, StatementError> {
        let mut columns = Vec::new();
        self.skip_ws();
        if self.eat_char(')') {
            return Ok(columns);
        }
        loop {
            self.skip_ws();
            let col = self.identifier().ok_or(StatementError::InvalidColumnList)?;
            columns.push(col);
            self.skip_ws();
            if self.eat_char(',') {
                continue;
            }
            if self.eat_char(')') {
                return Ok(columns);
            }
            return Err(StatementError::InvalidColumnList);
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A complete statement cut out of the line stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatement {
    /// 1-based line where the statement starts.
    pub line: usize,
    pub text: String,
}

/// Tracks INSERT statements across lines.
///
/// A statement starts on a line beginning with `INSERT` or `REPLACE` and ends
/// at a `;` outside quotes and parentheses; quoting state carries over line
/// breaks, so values containing newlines or semicolons are kept whole.
///
/// A line that starts a new INSERT outside any quoted span also ends the open
/// statement, even without its `;`, so one unclosed `(` costs only its own
/// statement.
#[derive(Debug, Default)]
pub struct StatementAccumulator {
    buffer: String,
    state: QuoteState,
    paren_depth: usize,
    in_insert: bool,
    start_line: usize,
    line_no: usize,
    statements_processed: usize,
}

impl StatementAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (with or without its newline) and return every statement
    /// it completes.
    pub fn push_line(&mut self, line: &str) -> Vec<RawStatement> {
        self.line_no += 1;
        let mut results = Vec::new();
        if self.in_insert && self.state.open_quote().is_none() && starts_insert(line) {
            // The open statement never terminated; hand it over as is.
            results.push(self.take());
        }
        let mut rest = line;
        while !rest.is_empty() {
            if !self.in_insert {
                if !starts_insert(rest) {
                    break;
                }
                self.begin();
            }
            match self.scan(rest) {
                Some(end) => {
                    self.buffer.push_str(&rest[..end]);
                    results.push(self.take());
                    rest = &rest[end..];
                }
                None => {
                    self.buffer.push_str(rest);
                    break;
                }
            }
        }
        results
    }

    /// Flush a statement left open at end of input (best effort).
    pub fn finish(&mut self) -> Option<RawStatement> {
        if self.in_insert && !self.buffer.trim().is_empty() {
            return Some(self.take());
        }
        self.in_insert = false;
        None
    }

    pub fn statements_processed(&self) -> usize {
        self.statements_processed
    }

    fn begin(&mut self) {
        self.buffer.clear();
        self.state = QuoteState::default();
        self.paren_depth = 0;
        self.in_insert = true;
        self.start_line = self.line_no;
    }

    // Scan characters to keep track of quotes and parenthesis depth. Returns
    // the byte index just past the terminating semicolon, if any.
    fn scan(&mut self, s: &str) -> Option<usize> {
        for (i, c) in s.char_indices() {
            if !self.state.step(c) {
                continue;
            }
            match c {
                '(' => self.paren_depth += 1,
                ')' => self.paren_depth = self.paren_depth.saturating_sub(1),
                ';' if self.paren_depth == 0 => return Some(i + 1),
                _ => {}
            }
        }
        None
    }

    fn take(&mut self) -> RawStatement {
        self.in_insert = false;
        self.statements_processed += 1;
        RawStatement {
            line: self.start_line,
            text: mem::take(&mut self.buffer),
        }
    }
}

fn starts_insert(line: &str) -> bool {
    let mut cur = Cursor {
        src: line.trim_start(),
        pos: 0,
    };
    cur.eat_keyword("INSERT") || cur.eat_keyword("REPLACE")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backticked_with_columns() {
        let sql = "INSERT INTO `disorder` (`id`, `orpha_code`, `name`) VALUES (1,'58','Alexander disease');";
        let stmt = InsertStatement::parse(sql).unwrap();
        assert_eq!(stmt.table, "disorder");
        assert_eq!(stmt.columns, vec!["id", "orpha_code", "name"]);
        assert_eq!(stmt.values, " (1,'58','Alexander disease');");
        assert_eq!(&sql[stmt.values_offset..], stmt.values);
    }

    #[test]
    fn test_parse_without_columns() {
        let stmt = InsertStatement::parse("insert into gene values (1,'ABCD1')").unwrap();
        assert_eq!(stmt.table, "gene");
        assert!(stmt.columns.is_empty());
        assert_eq!(stmt.values, " (1,'ABCD1')");
    }

    #[test]
    fn test_parse_schema_qualified_and_modifiers() {
        let stmt =
            InsertStatement::parse("  INSERT IGNORE INTO `orpha`.`hpo_term` VALUES ('HP:0000001')")
                .unwrap();
        assert_eq!(stmt.table, "hpo_term");

        let stmt = InsertStatement::parse("REPLACE INTO \"drug\"(\"id\") VALUE (7)").unwrap();
        assert_eq!(stmt.table, "drug");
        assert_eq!(stmt.columns, vec!["id"]);
        assert_eq!(stmt.values, " (7)");
    }

    #[test]
    fn test_parse_values_keyword_boundary() {
        // A column named "values_count" must not be mistaken for the keyword.
        let stmt =
            InsertStatement::parse("INSERT INTO t (values_count) VALUES(3)").unwrap();
        assert_eq!(stmt.columns, vec!["values_count"]);
        assert_eq!(stmt.values, "(3)");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            InsertStatement::parse("SELECT 1").unwrap_err(),
            StatementError::NotInsert
        );
        assert_eq!(
            InsertStatement::parse("INSERTINTO t VALUES (1)").unwrap_err(),
            StatementError::NotInsert
        );
        assert_eq!(
            InsertStatement::parse("INSERT INTO (a) VALUES (1)").unwrap_err(),
            StatementError::MissingTable
        );
        assert_eq!(
            InsertStatement::parse("INSERT INTO t (a, VALUES (1)").unwrap_err(),
            StatementError::InvalidColumnList
        );
        assert_eq!(
            InsertStatement::parse("INSERT INTO t (a) SELECT 1").unwrap_err(),
            StatementError::MissingValues
        );
    }

    #[test]
    fn test_accumulator_single_line() {
        let mut acc = StatementAccumulator::new();
        assert!(acc.push_line("-- MySQL dump\n").is_empty());
        let out = acc.push_line("INSERT INTO `t` VALUES (1,'a'),(2,'b');\n");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].line, 2);
        assert_eq!(out[0].text, "INSERT INTO `t` VALUES (1,'a'),(2,'b');");
        assert_eq!(acc.statements_processed(), 1);
    }

    #[test]
    fn test_accumulator_multi_line_and_quoted_semicolon() {
        let mut acc = StatementAccumulator::new();
        assert!(acc.push_line("INSERT INTO t VALUES (1,'a;\n").is_empty());
        assert!(acc.push_line("still quoted);'),\n").is_empty());
        let out = acc.push_line("(2,'b');\n");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].line, 1);
        assert_eq!(
            out[0].text,
            "INSERT INTO t VALUES (1,'a;\nstill quoted);'),\n(2,'b');"
        );
    }

    #[test]
    fn test_accumulator_two_statements_one_line() {
        let mut acc = StatementAccumulator::new();
        let out = acc.push_line("INSERT INTO a VALUES (1); insert into b VALUES (2);");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "INSERT INTO a VALUES (1);");
        assert_eq!(out[1].text, " insert into b VALUES (2);");
    }

    #[test]
    fn test_accumulator_escaped_quote_across_lines() {
        let mut acc = StatementAccumulator::new();
        assert!(acc.push_line(r"INSERT INTO t VALUES ('it\'s").is_empty());
        let out = acc.push_line("');");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_accumulator_finish_flushes_unterminated() {
        let mut acc = StatementAccumulator::new();
        acc.push_line("INSERT INTO t VALUES ('open\n");
        let stmt = acc.finish().unwrap();
        assert_eq!(stmt.text, "INSERT INTO t VALUES ('open\n");
        assert!(acc.finish().is_none());
    }

    #[test]
    fn test_accumulator_unclosed_paren_ends_at_next_insert() {
        let mut acc = StatementAccumulator::new();
        assert!(acc.push_line("INSERT INTO gene VALUES (1,'a'),(2;\n").is_empty());
        let out = acc.push_line("INSERT INTO gene VALUES (3,'x');\n");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].line, 1);
        assert_eq!(out[0].text, "INSERT INTO gene VALUES (1,'a'),(2;\n");
        assert_eq!(out[1].line, 2);
        assert_eq!(out[1].text, "INSERT INTO gene VALUES (3,'x');");
        assert_eq!(acc.statements_processed(), 2);
    }

    #[test]
    fn test_accumulator_missing_semicolon_ends_at_next_insert() {
        let mut acc = StatementAccumulator::new();
        assert!(acc.push_line("INSERT INTO gene VALUES (1,'a')\n").is_empty());
        let out = acc.push_line("INSERT INTO gene VALUES (2,'b');\n");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "INSERT INTO gene VALUES (1,'a')\n");
    }

    #[test]
    fn test_accumulator_insert_text_inside_quotes_continues() {
        let mut acc = StatementAccumulator::new();
        assert!(acc.push_line("INSERT INTO note VALUES (1,'first line\n").is_empty());
        let out = acc.push_line("INSERT INTO is quoted text');\n");
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].text,
            "INSERT INTO note VALUES (1,'first line\nINSERT INTO is quoted text');"
        );
    }

    #[test]
    fn test_accumulator_extra_close_paren_does_not_go_negative() {
        let mut acc = StatementAccumulator::new();
        let out = acc.push_line("INSERT INTO t VALUES (1));\n");
        assert_eq!(out.len(), 1);
        // Depth is back at zero, so the next statement terminates normally.
        let out = acc.push_line("INSERT INTO t VALUES (2);\n");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "INSERT INTO t VALUES (2);");
    }

    #[test]
    fn test_accumulator_ignores_other_statements() {
        let mut acc = StatementAccumulator::new();
        for line in [
            "CREATE TABLE `t` (\n",
            "  `id` int NOT NULL\n",
            ");\n",
            "LOCK TABLES `t` WRITE;\n",
        ] {
            assert!(acc.push_line(line).is_empty());
        }
        assert!(acc.finish().is_none());
        assert_eq!(acc.statements_processed(), 0);
    }
}
