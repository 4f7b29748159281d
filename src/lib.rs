//! Parking infraction ingestion.
//!
//! Streams a municipal parking-ticket export, normalizes each ticket's street
//! address and totals fines per street on a pool of worker threads.
//!
//! ```no_run
//! use std::fs::File;
//! use streetfines::{summarize_fines, PipelineConfig};
//!
//! let (counter, summary) = summarize_fines(File::open("tickets.csv")?, &PipelineConfig::default())?;
//! for (street, total) in counter.top(10) {
//!     println!("{}: {}", street, total);
//! }
//! eprintln!("{}", summary.stats.format_stats());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod address;
pub mod cli;
pub mod config;
pub mod config_file;
pub mod counter;
pub mod decompression;
pub mod error;
pub mod formatters;
pub mod handlers;
pub mod infraction;
pub mod parallel;
pub mod parsers;
pub mod platform;
pub mod readers;
pub mod stats;
pub mod synonyms;

use anyhow::Result;
use crossbeam_channel::Receiver;
use log::info;
use std::io::Read;
use std::sync::Arc;

pub use address::{Address, AddressData, AddressParser};
pub use cli::Cli;
pub use config::{ErrorStrategy, OutputFormat, PipelineConfig, StreetFinesConfig};
pub use counter::GroupCounter;
pub use error::{IngestError, IngestResult};
pub use handlers::{RecordHandler, SummarizeFinesByStreet, UNDEFINED_STREET};
pub use infraction::{Infraction, Location};
pub use parallel::{BatchWorkerRunner, RunSummary, RunnerState};
pub use parsers::{FieldSplitter, RecordParser};
pub use readers::ChunkedLineReader;
pub use stats::ProcessingStats;
pub use synonyms::{SynonymDictionary, SynonymGroup};

use platform::Ctrl;

/// Total fines per street over one export, with the built-in synonym tables.
pub fn summarize_fines<R: Read>(
    reader: R,
    config: &PipelineConfig,
) -> Result<(Arc<GroupCounter>, RunSummary)> {
    let counter = Arc::new(GroupCounter::new());
    let handler = Arc::new(SummarizeFinesByStreet::new(Arc::clone(&counter)));
    let summary = run_fines(reader, config, handler, None)?;
    Ok((counter, summary))
}

/// Feed one export through `handler`. A single worker runs on the calling
/// thread; otherwise the batch worker pool is used.
pub fn run_fines<R: Read>(
    reader: R,
    config: &PipelineConfig,
    handler: Arc<SummarizeFinesByStreet>,
    ctrl_rx: Option<Receiver<Ctrl>>,
) -> Result<RunSummary> {
    let lines = ChunkedLineReader::with_buffer_size(reader, config.buffer_size);

    let mut runner = BatchWorkerRunner::new(config.clone());
    if let Some(ctrl_rx) = ctrl_rx {
        runner = runner.with_ctrl(ctrl_rx);
    }
    if log::log_enabled!(log::Level::Info) {
        runner.on_progress(|row| info!("{} rows read", row));
    }
    runner.on_done(|rows| info!("done (row={})", rows));

    if config.pool_size == 1 {
        runner.run_sequential(lines, handler.as_ref())
    } else {
        runner.run(lines, handler)
    }
}
