// Command-line interface definitions

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{parse_timeout, ErrorStrategy, OutputFormat};

#[derive(Parser, Debug, Clone)]
#[command(name = "streetfines")]
#[command(about = "Total parking fines per street from a municipal infraction export")]
#[command(
    long_about = "Total parking fines per street from a municipal infraction export\n\nThe first line of the input is treated as a header and skipped. Every other\nline must hold eleven comma-separated fields; bad lines are dropped unless\n--on-error says otherwise.\n\nEXAMPLES:\n  streetfines tickets_2012.csv --top 20\n  zcat tickets.csv.gz | streetfines -F json -o fines.json\n  streetfines tickets.csv.zst --threads 0 --stats"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Input files (stdin if not specified, or use "-" to explicitly specify stdin)
    pub files: Vec<String>,

    /// Reader chunk size in bytes
    #[arg(long = "buffer-size", value_name = "BYTES", help_heading = "Pipeline Options")]
    pub buffer_size: Option<usize>,

    /// Worker threads (0 = one per CPU)
    #[arg(long, value_name = "N", help_heading = "Pipeline Options")]
    pub threads: Option<usize>,

    /// Rows per batch dispatched to a worker
    #[arg(long = "batch-size", value_name = "ROWS", help_heading = "Pipeline Options")]
    pub batch_size: Option<usize>,

    /// How long to wait for queued batches after the input ends (e.g. 600, 10m, 30s)
    #[arg(
        long = "shutdown-timeout",
        value_name = "DURATION",
        value_parser = parse_timeout,
        help_heading = "Pipeline Options"
    )]
    pub shutdown_timeout: Option<Duration>,

    /// What to do with malformed rows
    #[arg(long = "on-error", value_enum, help_heading = "Pipeline Options")]
    pub on_error: Option<ErrorStrategy>,

    /// Replace the built-in direction synonym table
    #[arg(long, value_name = "FILE", help_heading = "Address Options")]
    pub directions: Option<PathBuf>,

    /// Replace the built-in street suffix synonym table
    #[arg(long, value_name = "FILE", help_heading = "Address Options")]
    pub suffixes: Option<PathBuf>,

    /// Write the report to FILE instead of stdout
    #[arg(short = 'o', long, value_name = "FILE", help_heading = "Output Options")]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(
        short = 'F',
        long = "output-format",
        value_enum,
        default_value_t,
        help_heading = "Output Options"
    )]
    pub output_format: OutputFormat,

    /// Only report the N streets with the highest totals
    #[arg(long, value_name = "N", help_heading = "Output Options")]
    pub top: Option<usize>,

    /// Print run statistics to stderr
    #[arg(short = 's', long, help_heading = "Output Options")]
    pub stats: bool,

    /// Read defaults from this INI file instead of .streetfinesrc
    #[arg(long = "config-file", value_name = "FILE", help_heading = "Configuration")]
    pub config_file: Option<String>,

    /// Ignore .streetfinesrc and the user config file
    #[arg(long = "no-config", help_heading = "Configuration", conflicts_with = "config_file")]
    pub no_config: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, help_heading = "Logging")]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose", help_heading = "Logging")]
    pub quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    }
}
