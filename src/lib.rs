//! Split and parse the `VALUES` tuples of MySQL-style `INSERT` dumps.
//!
//! The core is [`parser::parse_tuple`], which turns one `(v1, v2, ...)` tuple
//! into [`parser::Field`]s, and [`parser::split_tuples`], which cuts a
//! multi-row `VALUES` body into tuples. Both are pure and can run on any
//! number of threads. [`ingest::Ingestor`] drives them over whole dump files.

pub mod ingest;
pub mod logger;
pub mod parser;
pub mod progress;
pub mod row;
pub mod sink;

pub use parser::{parse_tuple, render_tuple, split_tuples, Field, MalformedTupleError};
pub use row::{FromRow, Row, RowDecodeError};
