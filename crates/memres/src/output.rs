use colored::*;
use prettytable::{color, Attr, Cell, Row, Table};

use crate::backend::TrackingStats;
use crate::report::{ProbeOutcome, ProbeReport};

/// Output format for probe reports.
///
/// `MEMRES_JSON=1` (or `true`) forces [`Format::Json`] regardless of the
/// command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    #[default]
    Table,
    Json,
    JsonPretty,
}

impl Format {
    /// Applies the `MEMRES_JSON` override.
    pub fn with_env_override(self) -> Self {
        match std::env::var("MEMRES_JSON").as_deref() {
            Ok("1") | Ok("true") => Format::Json,
            _ => self,
        }
    }

    pub fn reporter(self) -> Box<dyn Reporter> {
        match self {
            Format::Table => Box::new(TableReporter),
            Format::Json => Box::new(JsonReporter),
            Format::JsonPretty => Box::new(JsonPrettyReporter),
        }
    }
}

/// Renders a [`ProbeReport`] somewhere.
///
/// # Examples
///
/// ```rust
/// use memres::output::Reporter;
/// use memres::report::ProbeReport;
/// use std::error::Error;
///
/// struct FailureCount;
///
/// impl Reporter for FailureCount {
///     fn report(&self, report: &ProbeReport) -> Result<(), Box<dyn Error>> {
///         println!("{} failed requests", report.failures());
///         Ok(())
///     }
/// }
/// ```
pub trait Reporter: Send + Sync {
    fn report(&self, report: &ProbeReport) -> Result<(), Box<dyn std::error::Error>>;
}

pub struct TableReporter;

impl Reporter for TableReporter {
    fn report(&self, report: &ProbeReport) -> Result<(), Box<dyn std::error::Error>> {
        println!(
            "{} {} (max alignment {})",
            "[memres]".blue().bold(),
            report.resource.yellow().bold(),
            report.max_alignment
        );

        if report.outcomes.is_empty() {
            println!("No probe requests. Pass one or more {}.", "BYTES:ALIGN".cyan().bold());
            return Ok(());
        }

        build_table(report).printstd();

        if report.overlaps > 0 {
            println!(
                "{} {} overlapping live blocks",
                "error:".red().bold(),
                report.overlaps
            );
        }
        if let Some(stats) = &report.tracking {
            print_tracking(stats);
        }
        Ok(())
    }
}

pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn report(&self, report: &ProbeReport) -> Result<(), Box<dyn std::error::Error>> {
        println!("{}", serde_json::to_string(report)?);
        Ok(())
    }
}

pub struct JsonPrettyReporter;

impl Reporter for JsonPrettyReporter {
    fn report(&self, report: &ProbeReport) -> Result<(), Box<dyn std::error::Error>> {
        println!("{}", serde_json::to_string_pretty(report)?);
        Ok(())
    }
}

const HEADERS: [&str; 6] = ["Request", "Resolved", "Chunks", "Address", "Aligned", "Result"];

pub(crate) fn build_table(report: &ProbeReport) -> Table {
    let use_colors = std::env::var("NO_COLOR").is_err();

    let mut table = Table::new();
    let header_cells: Vec<Cell> = HEADERS
        .iter()
        .map(|header| {
            if use_colors {
                Cell::new(header)
                    .with_style(Attr::Bold)
                    .with_style(Attr::ForegroundColor(color::CYAN))
            } else {
                Cell::new(header).with_style(Attr::Bold)
            }
        })
        .collect();
    table.add_row(Row::new(header_cells));

    for outcome in &report.outcomes {
        table.add_row(outcome_row(outcome, use_colors));
    }
    table
}

fn outcome_row(outcome: &ProbeOutcome, use_colors: bool) -> Row {
    let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());

    let result = match &outcome.error {
        None => Cell::new("ok"),
        Some(err) if use_colors => {
            Cell::new(err).with_style(Attr::ForegroundColor(color::RED))
        }
        Some(err) => Cell::new(err),
    };

    Row::new(vec![
        Cell::new(&format!(
            "{} @ {}",
            format_bytes(outcome.bytes as u64),
            outcome.requested_alignment
        )),
        Cell::new(&or_dash(outcome.resolved_alignment.map(|a| a.to_string()))),
        Cell::new(&or_dash(outcome.chunks.map(|c| c.to_string()))),
        Cell::new(&or_dash(outcome.address.map(|a| format!("{a:#x}")))),
        Cell::new(if outcome.aligned { "yes" } else { "no" }),
        result,
    ])
}

fn print_tracking(stats: &TrackingStats) {
    println!(
        "{} {} in {} blocks, {} freed in {} blocks, {} live, {} mismatches",
        "tracking:".green().bold(),
        format_bytes(stats.bytes_allocated),
        stats.blocks_allocated,
        format_bytes(stats.bytes_freed),
        stats.blocks_freed,
        stats.live_blocks,
        stats.mismatches
    );
}

/// Exact below 1 KiB, one decimal place in the largest binary unit above.
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1 << 10;
    const MIB: u64 = 1 << 20;
    const GIB: u64 = 1 << 30;

    let (scale, unit) = match bytes {
        b if b < KIB => return format!("{b} B"),
        b if b < MIB => (KIB, "KiB"),
        b if b < GIB => (MIB, "MiB"),
        _ => (GIB, "GiB"),
    };
    format!("{:.1} {unit}", bytes as f64 / scale as f64)
}
