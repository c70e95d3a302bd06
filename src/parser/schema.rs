// Schema parser: extracts column lists from CREATE TABLE blocks.
// Used when INSERT statements omit their column names. Favors speed over
// perfect SQL parsing: one column definition per back-ticked line.

use crate::logger;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::{self, BufRead};

/// Column names per table, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    tables: BTreeMap<String, Vec<String>>,
}

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: impl Into<String>, columns: Vec<String>) {
        self.tables.insert(table.into(), columns);
    }

    /// Columns of `table`, falling back to a case-insensitive name match.
    /// When several tables differ only in case, the first in byte order wins.
    pub fn lookup(&self, table: &str) -> Option<&[String]> {
        if let Some(cols) = self.tables.get(table) {
            return Some(cols);
        }
        self.tables
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(table))
            .map(|(_, cols)| cols.as_slice())
    }

    /// Merge `other` into self; tables present in both take `other`'s columns.
    pub fn extend(&mut self, other: ColumnMap) {
        self.tables.extend(other.tables);
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

pub struct SchemaParser {
    create_table_re: Regex,
    column_line_re: Regex,
}

impl SchemaParser {
    // Build regexes once for reuse.
    pub fn new() -> Self {
        let create_table_re = Regex::new(
            r"(?i)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:`?[^`\s(]+`?\.)?`?([^`\s(]+)`?",
        )
        .expect("valid create table regex");
        let column_line_re = Regex::new(r"^\s*`([^`]+)`\s+\w+").expect("valid column regex");
        Self {
            create_table_re,
            column_line_re,
        }
    }

    /// Parse column lists for each table defined in the dump.
    pub fn parse_columns<R: BufRead>(&self, mut reader: R) -> io::Result<ColumnMap> {
        let mut columns_map = ColumnMap::new();
        let mut current_table = String::new();
        let mut in_create = false;
        let mut columns = Vec::new();
        let mut tables_processed = 0usize;

        let mut line = String::new();
        while reader.read_line(&mut line)? > 0 {
            if let Some(table) = self
                .create_table_re
                .captures(&line)
                .and_then(|cap| cap.get(1))
            {
                current_table = table.as_str().to_string();
                in_create = true;
                columns.clear();
                logger::debug(&format!(
                    "ParseColumns: Found CREATE TABLE for {}",
                    current_table
                ));
            } else if in_create {
                let trimmed = line.trim();
                if let Some(col) = self.column_line_re.captures(&line).and_then(|m| m.get(1)) {
                    columns.push(col.as_str().to_string());
                }
                // Skip key/constraint lines; the block ends with ");" or ") ENGINE=...;".
                if trimmed.starts_with(')') && trimmed.ends_with(';') {
                    if !columns.is_empty() {
                        logger::debug(&format!(
                            "ParseColumns: Table {} has {} columns",
                            current_table,
                            columns.len()
                        ));
                        columns_map.insert(current_table.clone(), std::mem::take(&mut columns));
                    }
                    tables_processed += 1;
                    in_create = false;
                    current_table.clear();
                }
            }

            line.clear();
        }

        logger::debug(&format!(
            "ParseColumns: Processed {} tables, extracted columns for {}",
            tables_processed,
            columns_map.len()
        ));

        Ok(columns_map)
    }
}

impl Default for SchemaParser {
    fn default() -> Self {
        Self::new()
    }
}
