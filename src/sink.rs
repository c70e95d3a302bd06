// Row sinks: where ingested rows go. The caller builds the sink and hands it
// to the ingestor, which calls finish() on every exit path.

use crate::row::Row;
use std::collections::BTreeMap;
use std::io::{self, BufWriter, Write};

pub trait RowSink {
    fn write_row(&mut self, row: &Row) -> io::Result<()>;

    /// Flush buffered rows. May be called more than once.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes one JSON object per row.
pub struct JsonLinesSink<W: Write> {
    out: BufWriter<W>,
    rows: u64,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
            rows: 0,
        }
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> io::Result<W> {
        self.out.into_inner().map_err(|e| e.into_error())
    }
}

impl<W: Write> RowSink for JsonLinesSink<W> {
    fn write_row(&mut self, row: &Row) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, row)?;
        self.out.write_all(b"\n")?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Counts rows per table and discards them; used for dry runs.
#[derive(Debug, Default)]
pub struct CountingSink {
    pub per_table: BTreeMap<String, u64>,
}

impl CountingSink {
    pub fn total(&self) -> u64 {
        self.per_table.values().sum()
    }
}

impl RowSink for CountingSink {
    fn write_row(&mut self, row: &Row) -> io::Result<()> {
        *self.per_table.entry(row.table.clone()).or_default() += 1;
        Ok(())
    }
}
