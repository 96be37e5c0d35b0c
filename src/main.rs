mod locate;
mod parser;
mod pdf;
mod writer;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use parser::{group_pages, scan_pages, GroupTable, PageSource, ScanReport};
use pdf::SourcePdf;
use writer::{GroupSink, PdfGroupWriter, OUTPUT_DIR};

/// Where the input PDF is looked for when none is given.
const SEARCH_DIR: &str = ".";

#[derive(Parser)]
#[command(
    name = "po_splitter",
    about = "Split a multi-invoice PDF into one PDF per purchase order and vendor"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Exit without waiting for Enter
    #[arg(long, global = true)]
    no_wait: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Group pages and write one PDF per group (default)
    Split {
        /// Input PDF (default: first *.pdf in the current folder)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Folder for the per-PO files
        #[arg(short, long, default_value = OUTPUT_DIR)]
        output: PathBuf,
    },
    /// Show groups and unmatched pages without writing anything
    Scan {
        /// Input PDF (default: first *.pdf in the current folder)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Split {
        input: None,
        output: PathBuf::from(OUTPUT_DIR),
    });

    match command {
        Commands::Split { input, output } => match split(input, Path::new(SEARCH_DIR), &output)? {
            Outcome::NoInputFound => println!("X No PDF file found in this folder."),
            Outcome::Done(summary) => {
                println!(
                    "\n Success. Check the '{}' folder for results.",
                    output.display()
                );
                summary.print();
            }
        },
        Commands::Scan { input, json } => match locate_input(input, Path::new(SEARCH_DIR))? {
            None => println!("X No PDF file found in this folder."),
            Some(path) => {
                if !json {
                    announce(&path);
                }
                let source = open_with_spinner(&path)?;
                let report = scan_pages(&source);
                if json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    print_report(&report);
                }
            }
        },
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    if !cli.no_wait && std::io::stdin().is_terminal() {
        wait_for_enter();
    }
    Ok(())
}

enum Outcome {
    NoInputFound,
    Done(Summary),
}

#[derive(Debug, PartialEq, Eq)]
struct Summary {
    groups: usize,
    pages_written: usize,
    pages_skipped: usize,
}

impl Summary {
    fn print(&self) {
        println!(
            "Wrote {} file(s) with {} page(s); {} page(s) had no PO/vendor.",
            self.groups, self.pages_written, self.pages_skipped,
        );
    }
}

/// Locate → group → write. Nothing is created when no input is found.
fn split(input: Option<PathBuf>, search_dir: &Path, output: &Path) -> Result<Outcome> {
    debug!("state: Locating");
    let Some(path) = locate_input(input, search_dir)? else {
        debug!("state: NoInputFound");
        return Ok(Outcome::NoInputFound);
    };

    announce(&path);

    debug!("state: Grouping");
    let source = open_with_spinner(&path)?;
    let table = group_pages(&source);

    debug!("state: Writing({})", table.len());
    let mut sink = PdfGroupWriter::new(&source, output)?;
    write_groups(&table, &mut sink)?;

    debug!("state: Done");
    Ok(Outcome::Done(summarize(&table, source.page_count())))
}

/// An explicit input wins; otherwise scan `search_dir`.
fn locate_input(input: Option<PathBuf>, search_dir: &Path) -> Result<Option<PathBuf>> {
    match input {
        Some(path) => Ok(Some(path)),
        None => locate::find_first_pdf(search_dir),
    }
}

fn announce(path: &Path) {
    let name = path.file_name().unwrap_or(path.as_os_str());
    println!("Found PDF: {}", name.to_string_lossy());
}

/// Text extraction runs over the whole file up front, so this is the slow part.
fn open_with_spinner(path: &Path) -> Result<SourcePdf> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message(format!("Reading {}", path.display()));
    pb.enable_steady_tick(Duration::from_millis(100));
    let source = SourcePdf::open(path);
    pb.finish_and_clear();
    source
}

/// One sink call per group, in table order. Stops at the first failure.
fn write_groups<W: GroupSink + ?Sized>(table: &GroupTable, sink: &mut W) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(table.len());
    for group in table {
        written.push(sink.write_group(&group.key, &group.pages)?);
    }
    Ok(written)
}

/// Every page not in a group was skipped.
fn summarize(table: &GroupTable, page_count: usize) -> Summary {
    let pages_written = table.page_total();
    Summary {
        groups: table.len(),
        pages_written,
        pages_skipped: page_count.saturating_sub(pages_written),
    }
}

fn print_report(report: &ScanReport) {
    println!(
        "{} page(s), {} group(s), {} skipped",
        report.page_count,
        report.groups.len(),
        report.skipped.len()
    );
    println!("{}", "-".repeat(60));
    if report.groups.is_empty() {
        println!("No pages with both a PO number and a vendor.");
    }
    for group in &report.groups {
        let pages: Vec<String> = group.pages.iter().map(|p| (p + 1).to_string()).collect();
        println!("{:<58} pages {}", truncate(&group.key.to_string(), 58), pages.join(", "));
    }
    if !report.skipped.is_empty() {
        println!("\n--- Skipped ---");
        for s in &report.skipped {
            println!("  page {}: {}", s.page + 1, s.reason);
        }
    }
}

fn wait_for_enter() {
    println!("\nPress Enter to close...");
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
