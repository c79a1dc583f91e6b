//! CLI command definitions for taskdeck
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod export;

use clap::{Parser, Subcommand};
use export::ExportArgs;
use std::path::PathBuf;

/// Task management REST server and report tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Directory for uploaded images (overrides config)
    #[arg(long, global = true)]
    pub uploads_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default if no subcommand given)
    Serve,

    /// Write a spreadsheet report to disk
    Export(ExportArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ReportKind;

    #[test]
    fn defaults_to_serve_with_stderr_logging() {
        let cli = Cli::parse_from(["taskdeck"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.log, "2");
        assert!(!cli.verbose);
    }

    #[test]
    fn parses_export_with_global_overrides() {
        let cli = Cli::parse_from([
            "taskdeck",
            "export",
            "--report",
            "users",
            "--database",
            "/tmp/t.db",
        ]);
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/t.db")));
        match cli.command {
            Some(Command::Export(args)) => {
                assert_eq!(args.report, ReportKind::Users);
                assert_eq!(args.output_path(), PathBuf::from("users_report.xlsx"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
