//! Type definitions for the batch worker runner
//!
//! Contains the units of work passed from the reader to the pool, the runner
//! state machine and the summary returned at the end of a run.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::config::ErrorStrategy;
use crate::parsers::RecordParser;
use crate::stats::{ProcessingStats, RunStats};

/// One input line with its row number (the header is row 0)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub row: usize,
    pub line: String,
}

/// Consecutive work units dispatched together as one job
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: u64,
    pub units: Vec<WorkUnit>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Lifecycle of a runner. Only `Reading` creates batches; `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Reading,
    Draining,
    Done,
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunnerState::Idle => "idle",
            RunnerState::Reading => "reading",
            RunnerState::Draining => "draining",
            RunnerState::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Data rows read, header excluded. Also passed to the done callback.
    pub rows: usize,
    pub stats: ProcessingStats,
    /// A shutdown request stopped the read loop early.
    pub interrupted: bool,
    /// The shutdown deadline elapsed before the pool drained.
    pub timed_out: bool,
}

/// State shared by the reader and every worker for one run
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub parser: RecordParser,
    pub on_error: ErrorStrategy,
    pub stats: Arc<RunStats>,
    /// Set on abort, immediate shutdown or deadline expiry. Batches received
    /// afterwards are dropped unprocessed.
    pub stop: Arc<AtomicBool>,
}
