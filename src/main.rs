use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::unbounded;
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

use streetfines::config_file::ConfigFile;
use streetfines::formatters::create_formatter;
use streetfines::platform::{ExitCode, SafeStdout, SignalHandler};
use streetfines::readers::open_input;
use streetfines::{
    run_fines, AddressParser, Cli, GroupCounter, ProcessingStats, StreetFinesConfig,
    SummarizeFinesByStreet,
};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level());

    match run(cli) {
        Ok(code) => code.exit(),
        Err(e) => {
            eprintln!("streetfines: error: {:#}", e);
            ExitCode::GeneralError.exit();
        }
    }
}

fn init_logging(level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let file_config = if cli.no_config {
        ConfigFile::default()
    } else {
        ConfigFile::load_with_custom_path(cli.config_file.as_deref())?
    };
    let config = StreetFinesConfig::from_cli(&cli, &file_config);
    if let Err(e) = config.pipeline.validate() {
        eprintln!("streetfines: {}", e);
        return Ok(ExitCode::InvalidUsage);
    }
    debug!("{:?}", config.pipeline);

    let parser = AddressParser::load(config.directions.as_deref(), config.suffixes.as_deref())
        .context("Failed to load synonym tables")?;

    let (ctrl_tx, ctrl_rx) = unbounded();
    let signal_handler = SignalHandler::new(ctrl_tx)?;

    let counter = Arc::new(GroupCounter::new());
    let handler = Arc::new(SummarizeFinesByStreet::with_parser(
        Arc::clone(&counter),
        parser,
    ));

    let inputs: Vec<Option<&str>> = if config.files.is_empty() {
        vec![None]
    } else {
        config.files.iter().map(|f| Some(f.as_str())).collect()
    };

    // Each file carries its own header, so each gets its own run.
    let mut stats = ProcessingStats::default();
    let mut interrupted = false;
    for input in inputs {
        let (reader, compression) = open_input(input)?;
        let name = input.unwrap_or("-");
        debug!("{}: {:?} input", name, compression);

        let summary = run_fines(
            reader,
            &config.pipeline,
            Arc::clone(&handler),
            Some(ctrl_rx.clone()),
        )
        .with_context(|| format!("Failed to process {}", name))?;
        stats.merge(&summary.stats);

        if summary.interrupted {
            interrupted = true;
            break;
        }
    }

    let mut entries = counter.sorted_by_total();
    if let Some(top) = config.output.top {
        entries.truncate(top);
    }

    let formatter = create_formatter(config.output.format);
    match &config.output.path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Cannot create output file '{}'", path.display()))?;
            let mut out = BufWriter::new(file);
            formatter.write_report(&entries, &mut out)?;
            out.flush()?;
        }
        None => {
            let mut out = BufWriter::new(SafeStdout::new());
            formatter.write_report(&entries, &mut out)?;
            out.flush()?;
        }
    }

    if config.output.stats {
        eprintln!("{}", stats.format_stats());
    }

    Ok(if interrupted || signal_handler.interrupted() {
        ExitCode::SignalInt
    } else {
        ExitCode::Success
    })
}
