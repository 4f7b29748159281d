//! Batch worker runner
//!
//! Contains the BatchWorkerRunner struct that wires the read loop to a fixed
//! pool of worker threads and drains it under a deadline.

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use log::{debug, info, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::PipelineConfig;
use crate::handlers::RecordHandler;
use crate::parsers::RecordParser;
use crate::platform::Ctrl;
use crate::stats::RunStats;

use super::batching::{read_loop, ProgressFn, ReadLoopConfig};
use super::types::{RunSummary, RunnerState, WorkerContext};
use super::worker::{process_batch, worker_thread};

type DoneFn = Box<dyn FnOnce(usize) + Send>;

/// Reads lines on the calling thread and fans batches out to a worker pool.
///
/// A runner performs exactly one run; afterwards it stays in
/// [`RunnerState::Done`] and further runs are rejected.
pub struct BatchWorkerRunner {
    config: PipelineConfig,
    parser: RecordParser,
    state: RunnerState,
    ctrl_rx: Option<Receiver<Ctrl>>,
    progress: Option<ProgressFn>,
    done: Option<DoneFn>,
}

impl BatchWorkerRunner {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            parser: RecordParser::default(),
            state: RunnerState::Idle,
            ctrl_rx: None,
            progress: None,
            done: None,
        }
    }

    pub fn with_parser(mut self, parser: RecordParser) -> Self {
        self.parser = parser;
        self
    }

    /// Listen for shutdown requests during the read loop.
    pub fn with_ctrl(mut self, ctrl_rx: Receiver<Ctrl>) -> Self {
        self.ctrl_rx = Some(ctrl_rx);
        self
    }

    /// Called from the reading thread with the current row, every
    /// `progress_every` rows.
    pub fn on_progress<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(usize) + Send + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Called once with the final row count after shutdown resolves, whether
    /// or not the run succeeded.
    pub fn on_done<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce(usize) + Send + 'static,
    {
        self.done = Some(Box::new(callback));
        self
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn begin(&mut self) -> Result<WorkerContext> {
        if self.state != RunnerState::Idle {
            bail!("runner already used (state: {})", self.state);
        }
        self.config.validate()?;
        self.state = RunnerState::Reading;
        Ok(WorkerContext {
            parser: self.parser.clone(),
            on_error: self.config.on_error,
            stats: Arc::new(RunStats::new()),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    fn finish(&mut self, rows: usize) {
        self.state = RunnerState::Done;
        if let Some(done) = self.done.take() {
            done(rows);
        }
    }

    /// Run the pipeline over `lines` with `pool_size` worker threads.
    ///
    /// Malformed rows follow the configured error strategy. Once the input is
    /// exhausted the runner waits up to `shutdown_timeout` for queued batches.
    /// Past that deadline no further row is admitted: rows never started are
    /// counted in [`ProcessingStats::rows_abandoned`](crate::stats::ProcessingStats)
    /// and the rows already inside the handler (at most one per worker) in
    /// `rows_in_flight`; those still reach the handler after this returns.
    ///
    /// The done callback runs on every path once the run has started.
    pub fn run<I, H>(&mut self, lines: I, handler: Arc<H>) -> Result<RunSummary>
    where
        I: IntoIterator<Item = io::Result<String>>,
        H: RecordHandler + ?Sized + 'static,
    {
        let ctx = self.begin()?;
        let result = self.run_pool(lines, handler, &ctx);
        self.finish(ctx.stats.rows_read());
        result
    }

    fn run_pool<I, H>(&mut self, lines: I, handler: Arc<H>, ctx: &WorkerContext) -> Result<RunSummary>
    where
        I: IntoIterator<Item = io::Result<String>>,
        H: RecordHandler + ?Sized + 'static,
    {
        let pool_size = self.config.pool_size;
        info!(
            "Starting run: {} workers, batch size {}, queue capacity {}, shutdown timeout {}",
            pool_size,
            self.config.batch_size,
            self.config.channel_capacity,
            humantime::format_duration(self.config.shutdown_timeout)
        );
        let start = Instant::now();

        let (batch_sender, batch_receiver) = bounded(self.config.channel_capacity);
        // Never sent on: it disconnects when the last worker exits.
        let (done_sender, done_receiver) = bounded::<()>(0);

        let mut worker_handles = Vec::with_capacity(pool_size);
        for worker_id in 0..pool_size {
            let batch_receiver = batch_receiver.clone();
            let handler = Arc::clone(&handler);
            let worker_ctx = ctx.clone();
            let done_sender = done_sender.clone();

            let handle = thread::Builder::new()
                .name(format!("worker-{}", worker_id))
                .spawn(move || {
                    worker_thread(worker_id, batch_receiver, handler, worker_ctx, done_sender)
                })
                .context("Failed to spawn worker thread")?;
            worker_handles.push(handle);
        }
        drop(batch_receiver);
        drop(done_sender);

        let (outcome, read_result) = read_loop(
            lines,
            ReadLoopConfig {
                batch_size: self.config.batch_size,
                ctx,
                ctrl_rx: self.ctrl_rx.as_ref(),
                progress: self.progress.as_mut(),
                progress_every: self.config.progress_every,
            },
            |batch| Ok(batch_sender.send(batch).is_ok()),
        );

        self.state = RunnerState::Draining;
        drop(batch_sender);
        let io_done = Instant::now();
        info!(
            "IO loop completed in {:.3} seconds ({} rows)",
            (io_done - start).as_secs_f64(),
            outcome.rows
        );

        if outcome.immediate {
            ctx.stop.store(true, Ordering::Release);
        }

        let drained = wait_for_pool(&done_receiver, self.config.shutdown_timeout);
        let mut worker_error = None;
        if drained {
            for (idx, handle) in worker_handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        worker_error.get_or_insert(e);
                    }
                    Err(_) => {
                        worker_error.get_or_insert(anyhow!("Worker thread {} panicked", idx));
                    }
                }
            }
        } else {
            ctx.stop.store(true, Ordering::Release);
            let admitted = ctx.stats.close_admission();
            warn!(
                "Shutdown timeout of {} elapsed; abandoning {} rows not yet started",
                humantime::format_duration(self.config.shutdown_timeout),
                ctx.stats.rows_read().saturating_sub(admitted)
            );
            // Workers cannot be killed. Detached, they finish the row in hand
            // and skip everything after it.
            drop(worker_handles);
        }
        let stats = ctx.stats.snapshot();

        info!(
            "Queue shut down after another {:.3} seconds",
            io_done.elapsed().as_secs_f64()
        );
        if drained && stats.rows_abandoned > 0 {
            debug!("{} rows skipped after stop", stats.rows_abandoned);
        }

        read_result?;
        if let Some(e) = worker_error {
            return Err(e);
        }

        Ok(RunSummary {
            rows: outcome.rows,
            stats,
            interrupted: outcome.interrupted,
            timed_out: !drained,
        })
    }

    /// Same contract as [`run`](Self::run), processed on the calling thread.
    /// Batches complete in read order and nothing is ever left in flight.
    pub fn run_sequential<I, H>(&mut self, lines: I, handler: &H) -> Result<RunSummary>
    where
        I: IntoIterator<Item = io::Result<String>>,
        H: RecordHandler + ?Sized,
    {
        let ctx = self.begin()?;
        info!(
            "Starting sequential run: batch size {}",
            self.config.batch_size
        );

        let (outcome, result) = read_loop(
            lines,
            ReadLoopConfig {
                batch_size: self.config.batch_size,
                ctx: &ctx,
                ctrl_rx: self.ctrl_rx.as_ref(),
                progress: self.progress.as_mut(),
                progress_every: self.config.progress_every,
            },
            |batch| {
                process_batch(&batch, handler, &ctx)?;
                Ok(true)
            },
        );

        self.state = RunnerState::Draining;
        self.finish(outcome.rows);
        result?;

        Ok(RunSummary {
            rows: outcome.rows,
            stats: ctx.stats.snapshot(),
            interrupted: outcome.interrupted,
            timed_out: false,
        })
    }
}

/// True if every worker exited before `timeout`.
fn wait_for_pool(done_receiver: &Receiver<()>, timeout: Duration) -> bool {
    let Some(deadline) = Instant::now().checked_add(timeout) else {
        // Effectively unbounded.
        let _ = done_receiver.recv();
        return true;
    };
    loop {
        match done_receiver.recv_deadline(deadline) {
            Err(RecvTimeoutError::Disconnected) => return true,
            Err(RecvTimeoutError::Timeout) => return false,
            Ok(()) => continue,
        }
    }
}
