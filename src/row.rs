// Rows: a parsed tuple bound to its table's column list, and typed decoding.

use crate::parser::Field;
use serde::Serialize;
use std::str::FromStr;
use thiserror::Error;

/// One tuple aligned with the column names of its table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub table: String,
    pub columns: Vec<String>,
    pub fields: Vec<Field>,
}

/// Why a row could not be decoded into a typed record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowDecodeError {
    #[error("missing column `{0}`")]
    MissingColumn(String),

    #[error("column `{0}` is NULL")]
    UnexpectedNull(String),

    #[error("column `{column}`: invalid value {value:?}: {reason}")]
    InvalidValue {
        column: String,
        value: String,
        reason: String,
    },
}

/// Explicit row shape, decoded from the fields of a [`Row`].
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self, RowDecodeError>;
}

impl Row {
    /// Field for `column`, matched case-insensitively.
    pub fn get(&self, column: &str) -> Option<&Field> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.fields.get(i))
    }

    /// Non-null text of `column`.
    pub fn text(&self, column: &str) -> Result<&str, RowDecodeError> {
        self.text_opt(column)?
            .ok_or_else(|| RowDecodeError::UnexpectedNull(column.to_string()))
    }

    /// Text of `column`, `None` when NULL.
    pub fn text_opt(&self, column: &str) -> Result<Option<&str>, RowDecodeError> {
        self.get(column)
            .map(Field::as_str)
            .ok_or_else(|| RowDecodeError::MissingColumn(column.to_string()))
    }

    /// Non-null `column` converted with `FromStr`.
    pub fn parse<T>(&self, column: &str) -> Result<T, RowDecodeError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.parse_opt(column)?
            .ok_or_else(|| RowDecodeError::UnexpectedNull(column.to_string()))
    }

    /// `column` converted with `FromStr`, `None` when NULL.
    pub fn parse_opt<T>(&self, column: &str) -> Result<Option<T>, RowDecodeError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(value) = self.text_opt(column)? else {
            return Ok(None);
        };
        value
            .parse()
            .map(Some)
            .map_err(|e: T::Err| RowDecodeError::InvalidValue {
                column: column.to_string(),
                value: value.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn decode<T: FromRow>(&self) -> Result<T, RowDecodeError> {
        T::from_row(self)
    }
}
