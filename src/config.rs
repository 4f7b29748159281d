use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::config_file::ConfigFile;
use crate::error::{IngestError, IngestResult};
use crate::readers::DEFAULT_BUFFER_SIZE;

pub const DEFAULT_POOL_SIZE: usize = 4;
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_PROGRESS_EVERY: usize = 100_000;

/// What to do with a row that fails to split or has the wrong field count
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorStrategy {
    /// Drop the row silently
    #[default]
    Skip,
    /// Log the row at warn level and keep going
    Print,
    /// Stop the run on the first bad row
    Abort,
}

/// Report output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// One `STREET: total` line per street
    #[default]
    Default,
    Csv,
    Json,
}

/// Tuning for the read/dispatch/drain pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub buffer_size: usize,
    pub pool_size: usize,
    pub batch_size: usize,
    pub shutdown_timeout: Duration,
    /// Batches that may wait for a worker before the reader blocks.
    pub channel_capacity: usize,
    pub on_error: ErrorStrategy,
    /// Progress callback interval in rows; 0 or 1 reports every row.
    pub progress_every: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            pool_size: DEFAULT_POOL_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            channel_capacity: DEFAULT_POOL_SIZE * 2,
            on_error: ErrorStrategy::Skip,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

impl PipelineConfig {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Also resizes the channel to two pending batches per worker.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self.channel_capacity = pool_size.saturating_mul(2);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    pub fn with_on_error(mut self, on_error: ErrorStrategy) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn with_progress_every(mut self, progress_every: usize) -> Self {
        self.progress_every = progress_every;
        self
    }

    pub fn validate(&self) -> IngestResult<()> {
        let checks = [
            ("buffer_size", self.buffer_size),
            ("pool_size", self.pool_size),
            ("batch_size", self.batch_size),
            ("channel_capacity", self.channel_capacity),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(IngestError::Config(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }
}

/// Report configuration
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub path: Option<PathBuf>,
    pub top: Option<usize>,
    pub stats: bool,
}

/// Everything the binary needs for one run
#[derive(Debug, Clone, Default)]
pub struct StreetFinesConfig {
    /// Input files; empty means stdin.
    pub files: Vec<String>,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
    pub directions: Option<PathBuf>,
    pub suffixes: Option<PathBuf>,
}

impl StreetFinesConfig {
    /// Resolve CLI flags over config file values over built-in defaults.
    pub fn from_cli(cli: &crate::Cli, file: &ConfigFile) -> Self {
        let defaults = PipelineConfig::default();

        let threads = cli
            .threads
            .or(file.threads)
            .unwrap_or(DEFAULT_POOL_SIZE);
        let pool_size = if threads == 0 {
            num_cpus::get()
        } else {
            threads
        };

        let pipeline = defaults
            .with_pool_size(pool_size)
            .with_buffer_size(
                cli.buffer_size
                    .or(file.buffer_size)
                    .unwrap_or(DEFAULT_BUFFER_SIZE),
            )
            .with_batch_size(
                cli.batch_size
                    .or(file.batch_size)
                    .unwrap_or(DEFAULT_BATCH_SIZE),
            )
            .with_shutdown_timeout(
                cli.shutdown_timeout
                    .or(file.shutdown_timeout)
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT),
            )
            .with_on_error(cli.on_error.or(file.on_error).unwrap_or_default());

        Self {
            files: cli.files.clone(),
            pipeline,
            output: OutputConfig {
                format: cli.output_format,
                path: cli.output.clone(),
                top: cli.top,
                stats: cli.stats,
            },
            directions: cli.directions.clone(),
            suffixes: cli.suffixes.clone(),
        }
    }
}

/// Parse a timeout given as bare seconds ("600") or a humantime string ("10m").
pub fn parse_timeout(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }
    humantime::parse_duration(value).map_err(|e| format!("invalid timeout '{}': {}", value, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cli;
    use clap::Parser;

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.buffer_size, 512 * 1024);
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(600));
        assert_eq!(config.channel_capacity, 8);
        assert_eq!(config.on_error, ErrorStrategy::Skip);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let err = PipelineConfig::default()
            .with_batch_size(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("batch_size must be positive"));

        assert!(PipelineConfig::default()
            .with_pool_size(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("600").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_timeout("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_timeout("250ms").unwrap(), Duration::from_millis(250));
        assert!(parse_timeout("soon").is_err());
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let file = ConfigFile {
            threads: Some(2),
            batch_size: Some(50),
            on_error: Some(ErrorStrategy::Print),
            ..Default::default()
        };
        let cli = Cli::parse_from(["streetfines", "--batch-size", "10", "tickets.csv"]);
        let config = StreetFinesConfig::from_cli(&cli, &file);

        assert_eq!(config.files, vec!["tickets.csv".to_string()]);
        assert_eq!(config.pipeline.batch_size, 10);
        assert_eq!(config.pipeline.pool_size, 2);
        assert_eq!(config.pipeline.channel_capacity, 4);
        assert_eq!(config.pipeline.on_error, ErrorStrategy::Print);
        assert_eq!(config.pipeline.buffer_size, DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_zero_threads_means_all_cpus() {
        let cli = Cli::parse_from(["streetfines", "--threads", "0"]);
        let config = StreetFinesConfig::from_cli(&cli, &ConfigFile::default());
        assert_eq!(config.pipeline.pool_size, num_cpus::get());
    }
}
