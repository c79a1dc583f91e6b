//! Export subcommand for the taskdeck CLI
//!
//! Writes the same workbooks the `/api/reports/export/*` endpoints serve,
//! reading the database directly.

use crate::export::ReportKind;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the export subcommand
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Which report to build
    #[arg(short, long, value_enum)]
    pub report: ReportKind,

    /// Output file path (default: tasks_report.xlsx / users_report.xlsx)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl ExportArgs {
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.report.file_name()))
    }
}
