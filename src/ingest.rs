// Ingestion driver: stream a dump, cut it into INSERT statements, split and
// parse their tuples in parallel, and hand rows to the sink in order.

use crate::logger;
use crate::parser::insert::{InsertStatement, RawStatement, StatementAccumulator};
use crate::parser::schema::ColumnMap;
use crate::parser::{parse_tuple, tuple_spans, Field, MalformedTupleError};
use crate::row::Row;
use crate::sink::RowSink;
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::io::{self, BufRead};
use thiserror::Error;

const DEFAULT_MAX_ISSUES: usize = 100;
const STATEMENT_SNIPPET_LEN: usize = 48;

/// What to do when a tuple or statement cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Record the problem and keep going.
    #[default]
    Skip,
    /// Stop at the first problem.
    Abort,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub policy: ErrorPolicy,
    /// Issues kept per file; counts stay exact past the cap.
    pub max_issues: usize,
    /// Parser threads (0 = num CPU).
    pub workers: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            policy: ErrorPolicy::Skip,
            max_issues: DEFAULT_MAX_ISSUES,
            workers: 0,
        }
    }
}

/// One skipped statement or tuple, located well enough to fix the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// 1-based line where the statement starts.
    pub line: usize,
    /// Index of the tuple within its statement, when the problem is tuple-level.
    pub tuple: Option<usize>,
    /// Byte offset within the statement text.
    pub offset: Option<usize>,
    pub message: String,
    pub snippet: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.line)?;
        if let Some(t) = self.tuple {
            write!(f, ", tuple {}", t)?;
        }
        if let Some(o) = self.offset {
            write!(f, ", byte {}", o)?;
        }
        write!(f, ": {} (near `{}`)", self.message, self.snippet)
    }
}

/// Per-file outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub label: String,
    pub statements: usize,
    pub statements_skipped: usize,
    pub tuples_parsed: u64,
    pub tuples_skipped: u64,
    pub issues: Vec<Issue>,
    /// Issues dropped once `max_issues` was reached.
    pub issues_dropped: usize,
    /// Why the file stopped early, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Failures that stop a file. The ones raised mid-stream carry the counts
/// gathered up to that point.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{}: read failed after {} tuples: {source}", report.label, report.tuples_parsed)]
    Interrupted {
        source: io::Error,
        report: Box<FileReport>,
    },

    #[error("{}: aborted at {issue}", report.label)]
    Aborted {
        issue: Issue,
        report: Box<FileReport>,
    },

    #[error("failed to build parser pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl IngestError {
    /// Partial report of the file that was being ingested, if any.
    pub fn report(&self) -> Option<&FileReport> {
        match self {
            IngestError::Interrupted { report, .. } | IngestError::Aborted { report, .. } => {
                Some(&**report)
            }
            IngestError::Io(_) | IngestError::Pool(_) => None,
        }
    }
}

// Why a stream stopped; turned into an IngestError once the report is final.
enum Stop {
    Io(io::Error),
    Abort(Issue),
}

impl From<io::Error> for Stop {
    fn from(e: io::Error) -> Self {
        Stop::Io(e)
    }
}

pub struct Ingestor {
    columns: ColumnMap,
    options: IngestOptions,
    pool: rayon::ThreadPool,
}

impl Ingestor {
    pub fn new(columns: ColumnMap, options: IngestOptions) -> Result<Self, IngestError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .build()?;
        Ok(Self {
            columns,
            options,
            pool,
        })
    }

    /// Ingest one dump. The sink is finished on every exit path, including
    /// aborts and I/O errors, and a failure mid-stream still returns the
    /// counts so far inside the error.
    pub fn ingest<R, S>(
        &self,
        label: &str,
        reader: R,
        sink: &mut S,
        bar: Option<&ProgressBar>,
    ) -> Result<FileReport, IngestError>
    where
        R: BufRead,
        S: RowSink + ?Sized,
    {
        let mut report = FileReport {
            label: label.to_string(),
            ..FileReport::default()
        };
        let result = self.ingest_stream(&mut report, reader, sink, bar);
        let finished = sink.finish();
        if let Some(b) = bar {
            b.finish();
        }
        match result.and(finished.map_err(Stop::Io)) {
            Ok(()) => Ok(report),
            Err(Stop::Abort(issue)) => Err(IngestError::Aborted {
                issue,
                report: Box::new(report),
            }),
            Err(Stop::Io(source)) => Err(IngestError::Interrupted {
                source,
                report: Box::new(report),
            }),
        }
    }

    fn ingest_stream<R, S>(
        &self,
        report: &mut FileReport,
        mut reader: R,
        sink: &mut S,
        bar: Option<&ProgressBar>,
    ) -> Result<(), Stop>
    where
        R: BufRead,
        S: RowSink + ?Sized,
    {
        let label = report.label.clone();
        logger::debug(&format!("Ingest: Reading {}", label));
        let mut acc = StatementAccumulator::new();
        let mut bytes_read: u64 = 0;
        let mut last_logged: u64 = 0;

        let mut line = String::new();
        while reader.read_line(&mut line)? > 0 {
            let line_len = line.len() as u64;
            bytes_read += line_len;
            if let Some(b) = bar {
                b.inc(line_len);
            } else if logger::is_debug() && bytes_read - last_logged > 100 * 1024 * 1024 {
                logger::debug(&format!("Ingest: {} bytes read for {}", bytes_read, label));
                last_logged = bytes_read;
            }

            for stmt in acc.push_line(&line) {
                self.process_statement(&stmt, report, sink)?;
            }
            line.clear();
        }

        // Flush any pending statement at EOF.
        if let Some(stmt) = acc.finish() {
            logger::debug(&format!(
                "Ingest: {} ends inside a statement started at line {}",
                label, stmt.line
            ));
            self.process_statement(&stmt, report, sink)?;
        }

        logger::debug(&format!(
            "Ingest: {} statements, {} tuples parsed, {} skipped in {}",
            acc.statements_processed(),
            report.tuples_parsed,
            report.tuples_skipped,
            label
        ));
        Ok(())
    }

    fn process_statement<S>(
        &self,
        stmt: &RawStatement,
        report: &mut FileReport,
        sink: &mut S,
    ) -> Result<(), Stop>
    where
        S: RowSink + ?Sized,
    {
        report.statements += 1;
        let header = match InsertStatement::parse(&stmt.text) {
            Ok(h) => h,
            Err(e) => {
                let issue = statement_issue(stmt, e.to_string());
                return self.skip_statement(report, issue);
            }
        };

        let columns: Vec<String> = if !header.columns.is_empty() {
            header.columns.clone()
        } else if let Some(cols) = self.columns.lookup(&header.table) {
            cols.to_vec()
        } else {
            let issue = statement_issue(
                stmt,
                format!("no columns known for table {}", header.table),
            );
            return self.skip_statement(report, issue);
        };

        let spans = match tuple_spans(header.values) {
            Ok(spans) => spans,
            Err(e) => {
                let issue = malformed_issue(stmt, None, e.with_base(header.values_offset));
                return self.skip_statement(report, issue);
            }
        };
        logger::debug(&format!(
            "Ingest: {} has {} tuples (line {})",
            header.table,
            spans.len(),
            stmt.line
        ));

        // Parsing has no ordering dependency; collect keeps tuple order.
        let parsed: Vec<Result<Vec<Field>, MalformedTupleError>> = self.pool.install(|| {
            spans
                .par_iter()
                .map(|span| parse_tuple(&header.values[span.clone()]))
                .collect()
        });

        for (index, (span, result)) in spans.iter().zip(parsed).enumerate() {
            let base = header.values_offset + span.start;
            match result {
                Ok(fields) if fields.len() == columns.len() => {
                    sink.write_row(&Row {
                        table: header.table.clone(),
                        columns: columns.clone(),
                        fields,
                    })?;
                    report.tuples_parsed += 1;
                }
                Ok(fields) => {
                    let issue = Issue {
                        line: stmt.line,
                        tuple: Some(index),
                        offset: Some(base),
                        message: format!(
                            "expected {} fields for {}, got {}",
                            columns.len(),
                            header.table,
                            fields.len()
                        ),
                        snippet: short(&header.values[span.clone()]),
                    };
                    self.skip_tuple(report, issue)?;
                }
                Err(e) => {
                    let issue = malformed_issue(stmt, Some(index), e.with_base(base));
                    self.skip_tuple(report, issue)?;
                }
            }
        }
        Ok(())
    }

    fn skip_statement(&self, report: &mut FileReport, issue: Issue) -> Result<(), Stop> {
        report.statements_skipped += 1;
        self.record(report, issue)
    }

    fn skip_tuple(&self, report: &mut FileReport, issue: Issue) -> Result<(), Stop> {
        report.tuples_skipped += 1;
        self.record(report, issue)
    }

    fn record(&self, report: &mut FileReport, issue: Issue) -> Result<(), Stop> {
        if self.options.policy == ErrorPolicy::Abort {
            return Err(Stop::Abort(issue));
        }
        logger::debug(&format!("Ingest: {}: skipped {}", report.label, issue));
        if report.issues.len() < self.options.max_issues {
            report.issues.push(issue);
        } else {
            report.issues_dropped += 1;
        }
        Ok(())
    }
}

fn statement_issue(stmt: &RawStatement, message: String) -> Issue {
    Issue {
        line: stmt.line,
        tuple: None,
        offset: None,
        message,
        snippet: short(stmt.text.trim_start()),
    }
}

fn malformed_issue(stmt: &RawStatement, tuple: Option<usize>, e: MalformedTupleError) -> Issue {
    Issue {
        line: stmt.line,
        tuple,
        offset: Some(e.offset),
        message: e.kind.to_string(),
        snippet: e.snippet,
    }
}

fn short(text: &str) -> String {
    let mut end = text.len().min(STATEMENT_SNIPPET_LEN);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].replace(['\n', '\r'], " ")
}
