use std::io::{self, Write};

use crossterm::style::Stylize;
use serde::Serialize;

use crate::app::{FetchResult, Phase, ProgressEvent, ProgressSink};
use crate::query::TableSummary;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    #[serde(flatten)]
    pub fetch: &'a FetchResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<&'a TableSummary>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(fetch: &FetchResult, table: Option<&TableSummary>) -> io::Result<()> {
        Self::print_json(&RunReport { fetch, table })
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Plain status lines on stdout, one per event.
pub struct StatusLines;

impl StatusLines {
    pub fn header(dataset: &str, split: &str, config: &str) {
        println!("{} {}", "Dataset:".dim(), dataset);
        println!("{} {}", "Split:".dim(), split);
        println!("{} {}", "Config:".dim(), config);
        println!();
    }

    pub fn summary(result: &FetchResult) {
        let skipped = result.skipped();
        if skipped > 0 {
            println!(
                "{}",
                format!("  {} already present, {} downloaded", skipped, result.downloaded()).dim()
            );
        }
    }

    pub fn table(summary: &TableSummary) {
        println!(
            "{} {} rows in view `{}`",
            "Table:".dim(),
            summary.row_count,
            summary.view
        );
        println!("{} {}", "Columns:".dim(), summary.columns.join(", "));
    }

    pub fn failure() {
        eprintln!();
        eprintln!("{}", "Download failed:".red().bold());
    }
}

impl ProgressSink for StatusLines {
    fn event(&self, event: ProgressEvent) {
        let elapsed = event
            .elapsed
            .map(|elapsed| format!(" ({:.1}s)", elapsed.as_secs_f64()))
            .unwrap_or_default();
        match event.phase {
            Phase::Done => println!("{} {}", "✔".green(), event.message.green()),
            _ => println!("{} {}{}", "›".dim(), event.message.as_str().dim(), elapsed.dim()),
        }
    }
}
