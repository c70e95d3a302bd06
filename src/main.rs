// dumptuples: parse the INSERT tuples of one or more SQL dumps into JSON-lines
// rows and report, per file, how many tuples were parsed and skipped.

use clap::{CommandFactory, Parser};
use dumptuples::ingest::{ErrorPolicy, FileReport, IngestError, IngestOptions, Ingestor};
use dumptuples::logger;
use dumptuples::parser::schema::{ColumnMap, SchemaParser};
use dumptuples::progress::ProgressManager;
use dumptuples::sink::{CountingSink, JsonLinesSink, RowSink};
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::time::Instant;

// Issues printed per file in the summary; the JSON report has all kept issues.
const SUMMARY_ISSUES: usize = 10;

// Command-line flags and positional arguments.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Enable debug logging (disables progress bars).
    #[arg(long)]
    debug: bool,

    /// Stop at the first malformed tuple instead of skipping it.
    #[arg(long)]
    fail_fast: bool,

    /// Read CREATE TABLE column lists from this file too (wins over the dumps).
    #[arg(long)]
    schema: Option<String>,

    /// Output JSON-lines file. If omitted, rows go to stdout.
    #[arg(long, short)]
    output: Option<String>,

    /// Only count rows per table; write no rows.
    #[arg(long)]
    count_only: bool,

    /// Write the per-file reports as JSON to this file.
    #[arg(long)]
    report_json: Option<String>,

    /// Issues kept per file.
    #[arg(long, default_value_t = 100)]
    max_issues: usize,

    /// Worker threads for the schema pre-pass and tuple parsing (0 = num CPU).
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Dump files to ingest.
    #[arg(required = true)]
    dumps: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let wall_start = Instant::now();
    if std::env::args().len() == 1 {
        Args::command().print_help()?;
        eprintln!();
        std::process::exit(1);
    }
    let args = Args::parse();
    logger::set_debug(args.debug);
    logger::debug(&format!("main: Ingesting {} dump(s)", args.dumps.len()));

    // The schema pre-pass runs on the global pool; the ingestor sizes its own
    // parser pool from the same flag.
    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()?;
    let columns = load_columns(&args)?;
    logger::debug(&format!("main: Column lists known for {} tables", columns.len()));

    let policy = if args.fail_fast {
        ErrorPolicy::Abort
    } else {
        ErrorPolicy::Skip
    };
    let ingestor = Ingestor::new(
        columns,
        IngestOptions {
            policy,
            max_issues: args.max_issues,
            workers: args.threads,
        },
    )?;

    // Progress bars are disabled in debug mode to avoid mangled output.
    let progress = ProgressManager::new(!args.debug);

    let mut counter = CountingSink::default();
    let mut writer = if args.count_only {
        None
    } else {
        let out: Box<dyn Write> = match &args.output {
            Some(path) => Box::new(File::create(path)?),
            None => Box::new(io::stdout()),
        };
        Some(JsonLinesSink::new(out))
    };

    let mut reports = Vec::new();
    let mut failed = false;
    for path in &args.dumps {
        let sink: &mut dyn RowSink = match writer.as_mut() {
            Some(w) => w,
            None => &mut counter,
        };
        match ingest_file(&ingestor, path, &progress, sink) {
            Ok(report) => reports.push(report),
            Err(e) => {
                logger::error(&format!("{}: {}", path, e));
                // Keep the counts gathered before the failure.
                let mut report = e.report().cloned().unwrap_or_else(|| FileReport {
                    label: path.clone(),
                    ..FileReport::default()
                });
                report.error = Some(e.to_string());
                reports.push(report);
                failed = true;
                if args.fail_fast {
                    break;
                }
            }
        }
    }

    if let Some(path) = &args.report_json {
        let json = serde_json::to_string_pretty(&reports)?;
        std::fs::write(path, json)?;
        logger::info(&format!("Wrote report to {}", path));
    }

    print_summary(&reports, args.count_only.then_some(&counter))?;
    logger::debug(&format!("Timing: total wall time {:?}", wall_start.elapsed()));

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

// Column lists from every dump (parsed in parallel), then the --schema file.
fn load_columns(args: &Args) -> Result<ColumnMap, Box<dyn std::error::Error + Send + Sync>> {
    let parser = SchemaParser::new();
    let maps: Vec<io::Result<ColumnMap>> = args
        .dumps
        .par_iter()
        .map(|path| parser.parse_columns(BufReader::new(File::open(path)?)))
        .collect();

    let mut columns = ColumnMap::new();
    for (path, map) in args.dumps.iter().zip(maps) {
        match map {
            Ok(map) => columns.extend(map),
            // The ingest pass reports unreadable files itself.
            Err(e) => logger::warn(&format!("{}: cannot read schema: {}", path, e)),
        }
    }
    if let Some(schema) = &args.schema {
        columns.extend(parser.parse_columns(BufReader::new(File::open(schema)?))?);
    }
    Ok(columns)
}

fn ingest_file(
    ingestor: &Ingestor,
    path: &str,
    progress: &ProgressManager,
    sink: &mut dyn RowSink,
) -> Result<FileReport, IngestError> {
    let started = Instant::now();
    let reader = BufReader::new(File::open(path)?);
    let bar = progress.new_file_bar(path, &format!("Parsing {}", basename(path)));
    let report = ingestor.ingest(path, reader, sink, bar.as_ref())?;
    logger::debug(&format!(
        "Timing: {} took {:?}",
        path,
        started.elapsed()
    ));
    if report.tuples_skipped > 0 || report.statements_skipped > 0 {
        logger::warn(&format!(
            "{}: skipped {} tuples and {} statements",
            path, report.tuples_skipped, report.statements_skipped
        ));
    }
    Ok(report)
}

fn print_summary(
    reports: &[FileReport],
    counts: Option<&CountingSink>,
) -> io::Result<()> {
    let sep = "=".repeat(60);
    let mut stderr = io::stderr();
    writeln!(stderr, "\n{}\nSUMMARY\n{}", sep, sep)?;
    for report in reports {
        writeln!(stderr, "{}", report.label)?;
        writeln!(stderr, "  Statements: {} ({} skipped)", report.statements, report.statements_skipped)?;
        writeln!(stderr, "  Parsed:     {}", report.tuples_parsed)?;
        writeln!(stderr, "  Skipped:    {}", report.tuples_skipped)?;
        if let Some(err) = &report.error {
            writeln!(stderr, "  Stopped:    {}", err)?;
        }
        for issue in report.issues.iter().take(SUMMARY_ISSUES) {
            writeln!(stderr, "    {}", issue)?;
        }
        let hidden = report.issues.len().saturating_sub(SUMMARY_ISSUES) + report.issues_dropped;
        if hidden > 0 {
            writeln!(stderr, "    ... {} more", hidden)?;
        }
    }
    if let Some(counts) = counts {
        writeln!(stderr, "{}", sep)?;
        for (table, n) in &counts.per_table {
            writeln!(stderr, "  {:<30} {}", table, n)?;
        }
        writeln!(stderr, "  {:<30} {}", "Total", counts.total())?;
    }
    writeln!(stderr, "{}", sep)?;
    Ok(())
}

fn basename(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}
