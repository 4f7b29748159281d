//! Read loop: lines in, batches out.

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use log::{debug, info};
use std::io;
use std::sync::atomic::Ordering;

use crate::platform::Ctrl;

use super::types::{Batch, WorkUnit, WorkerContext};

pub(crate) type ProgressFn = Box<dyn FnMut(usize) + Send>;

/// Everything the read loop needs besides its line source and batch sink
pub(crate) struct ReadLoopConfig<'a> {
    pub batch_size: usize,
    pub ctx: &'a WorkerContext,
    pub ctrl_rx: Option<&'a Receiver<Ctrl>>,
    pub progress: Option<&'a mut ProgressFn>,
    pub progress_every: usize,
}

/// What the read loop saw before it stopped
#[derive(Debug, Default)]
pub(crate) struct ReadOutcome {
    /// Data rows read, header excluded.
    pub rows: usize,
    pub interrupted: bool,
    /// Shutdown asked to abandon queued work too.
    pub immediate: bool,
}

/// Discard the header, then group lines into batches of `batch_size` and hand
/// each one to `sink` as soon as it fills, plus any partial batch at the end.
///
/// `sink` returns `Ok(false)` when nothing can take further batches; an error
/// from it ends the loop. A read error is returned together with the rows
/// read so far, and the rows batched before it are still handed over.
pub(crate) fn read_loop<I, S>(
    lines: I,
    config: ReadLoopConfig<'_>,
    mut sink: S,
) -> (ReadOutcome, Result<()>)
where
    I: IntoIterator<Item = io::Result<String>>,
    S: FnMut(Batch) -> Result<bool>,
{
    let ReadLoopConfig {
        batch_size,
        ctx,
        ctrl_rx,
        mut progress,
        progress_every,
    } = config;

    let mut outcome = ReadOutcome::default();
    let mut lines = lines.into_iter();

    match lines.next() {
        None => return (outcome, Ok(())),
        Some(Err(e)) => return (outcome, Err(e).context("Failed to read header line")),
        Some(Ok(header)) => debug!("discarding header: {}", header),
    }

    let mut batch_id = 0u64;
    let mut current = Vec::with_capacity(batch_size);

    let mut result = (|| -> Result<()> {
        for (idx, line) in lines.enumerate() {
            let row = idx + 1;

            if let Some(ctrl_rx) = ctrl_rx {
                while let Ok(msg) = ctrl_rx.try_recv() {
                    match msg {
                        Ctrl::Shutdown { immediate } => {
                            info!("Shutdown requested after {} rows", outcome.rows);
                            outcome.interrupted = true;
                            outcome.immediate |= immediate;
                        }
                        Ctrl::PrintStats => {
                            eprintln!("{}", ctx.stats.progress_snapshot().format_stats());
                        }
                    }
                }
                if outcome.interrupted {
                    break;
                }
            }
            if ctx.stop.load(Ordering::Acquire) {
                debug!("read loop stopping at row {}", row);
                break;
            }

            let line = line.with_context(|| format!("Failed to read row {}", row))?;
            current.push(WorkUnit { row, line });
            outcome.rows = row;
            ctx.stats.add_row_read();

            if let Some(progress) = progress.as_deref_mut() {
                if progress_every <= 1 || row % progress_every == 0 {
                    progress(row);
                }
            }

            if current.len() >= batch_size {
                let units = std::mem::replace(&mut current, Vec::with_capacity(batch_size));
                if !dispatch(&mut sink, ctx, &mut batch_id, units)? {
                    debug!("batch sink closed; stopping read loop");
                    return Ok(());
                }
            }
        }
        Ok(())
    })();

    if current.is_empty() {
        return (outcome, result);
    }
    if outcome.immediate || ctx.stop.load(Ordering::Acquire) {
        // Read but never dispatched: these show up as abandoned.
        debug!("discarding partial batch of {} rows", current.len());
    } else if let Err(e) = dispatch(&mut sink, ctx, &mut batch_id, current) {
        if result.is_ok() {
            result = Err(e);
        }
    }

    (outcome, result)
}

fn dispatch<S>(
    sink: &mut S,
    ctx: &WorkerContext,
    batch_id: &mut u64,
    units: Vec<WorkUnit>,
) -> Result<bool>
where
    S: FnMut(Batch) -> Result<bool>,
{
    let batch = Batch {
        id: *batch_id,
        units,
    };
    *batch_id += 1;

    debug!("dispatching batch {} ({} rows)", batch.id, batch.len());
    ctx.stats.add_batch_dispatched(batch.len());
    sink(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ErrorStrategy;
    use crate::parsers::RecordParser;
    use crate::stats::RunStats;
    use anyhow::anyhow;
    use crossbeam_channel::unbounded;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn context() -> WorkerContext {
        WorkerContext {
            parser: RecordParser::default(),
            on_error: ErrorStrategy::Skip,
            stats: Arc::new(RunStats::new()),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    fn config(ctx: &WorkerContext, batch_size: usize) -> ReadLoopConfig<'_> {
        ReadLoopConfig {
            batch_size,
            ctx,
            ctrl_rx: None,
            progress: None,
            progress_every: 0,
        }
    }

    fn source(lines: &[&str]) -> Vec<io::Result<String>> {
        lines.iter().map(|l| Ok(l.to_string())).collect()
    }

    #[test]
    fn test_header_discarded_and_rows_numbered_from_one() {
        let ctx = context();
        let mut batches = Vec::new();
        let (outcome, result) = read_loop(
            source(&["header", "a", "b", "c"]),
            config(&ctx, 2),
            |batch| {
                batches.push(batch);
                Ok(true)
            },
        );
        result.unwrap();

        assert_eq!(outcome.rows, 3);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].units[0], WorkUnit { row: 1, line: "a".into() });
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1].units, vec![WorkUnit { row: 3, line: "c".into() }]);
        assert_eq!(batches[1].id, 1);
        assert_eq!(ctx.stats.rows_dispatched(), 3);
    }

    #[test]
    fn test_header_only_source() {
        let ctx = context();
        let mut calls = 0;
        let (outcome, result) = read_loop(source(&["header"]), config(&ctx, 10), |_| {
            calls += 1;
            Ok(true)
        });
        result.unwrap();
        assert_eq!(outcome.rows, 0);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_empty_source() {
        let ctx = context();
        let (outcome, result) = read_loop(Vec::new(), config(&ctx, 10), |_| Ok(true));
        result.unwrap();
        assert_eq!(outcome.rows, 0);
    }

    #[test]
    fn test_shutdown_stops_reading() {
        let ctx = context();
        let (ctrl_tx, ctrl_rx) = unbounded();
        ctrl_tx.send(Ctrl::Shutdown { immediate: false }).unwrap();

        let mut calls = 0;
        let (outcome, result) = read_loop(
            source(&["header", "a", "b"]),
            ReadLoopConfig {
                ctrl_rx: Some(&ctrl_rx),
                ..config(&ctx, 10)
            },
            |_| {
                calls += 1;
                Ok(true)
            },
        );
        result.unwrap();
        assert!(outcome.interrupted);
        assert!(!outcome.immediate);
        assert_eq!(outcome.rows, 0);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_immediate_shutdown_abandons_partial_batch() {
        let ctx = context();
        let (ctrl_tx, ctrl_rx) = unbounded();
        let mut progress: ProgressFn = Box::new(move |row| {
            if row == 2 {
                ctrl_tx.send(Ctrl::Shutdown { immediate: true }).unwrap();
            }
        });

        let mut calls = 0;
        let (outcome, result) = read_loop(
            source(&["header", "a", "b", "c", "d"]),
            ReadLoopConfig {
                ctrl_rx: Some(&ctrl_rx),
                progress: Some(&mut progress),
                progress_every: 1,
                ..config(&ctx, 10)
            },
            |_| {
                calls += 1;
                Ok(true)
            },
        );
        result.unwrap();

        assert!(outcome.immediate);
        assert_eq!(outcome.rows, 2);
        assert_eq!(calls, 0);
        let stats = ctx.stats.snapshot();
        assert_eq!(stats.rows_abandoned, 2);
        assert_eq!(stats.rows_read, stats.records_handled + stats.rows_dropped());
    }

    #[test]
    fn test_closed_sink_stops_reading() {
        let ctx = context();
        let (outcome, result) =
            read_loop(source(&["h", "a", "b", "c"]), config(&ctx, 1), |_| Ok(false));
        result.unwrap();
        assert_eq!(outcome.rows, 1);
    }

    #[test]
    fn test_sink_error_ends_loop() {
        let ctx = context();
        let (outcome, result) = read_loop(source(&["h", "a", "b"]), config(&ctx, 1), |_| {
            Err(anyhow!("aborted"))
        });
        assert_eq!(result.unwrap_err().to_string(), "aborted");
        assert_eq!(outcome.rows, 1);
    }

    #[test]
    fn test_progress_interval() {
        let ctx = context();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut progress: ProgressFn = Box::new(move |row| sink.lock().unwrap().push(row));

        let (_, result) = read_loop(
            source(&["h", "1", "2", "3", "4", "5"]),
            ReadLoopConfig {
                progress: Some(&mut progress),
                progress_every: 2,
                ..config(&ctx, 100)
            },
            |_| Ok(true),
        );
        result.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![2, 4]);
    }

    #[test]
    fn test_read_error_keeps_rows_read_so_far() {
        let ctx = context();
        let lines = vec![
            Ok("h".to_string()),
            Ok("a".to_string()),
            Err(io::Error::new(io::ErrorKind::Other, "disk gone")),
            Ok("never".to_string()),
        ];
        let mut handed_over = 0;
        let (outcome, result) = read_loop(lines, config(&ctx, 10), |batch| {
            handed_over += batch.len();
            Ok(true)
        });
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to read row 2"));
        assert_eq!(outcome.rows, 1);
        assert_eq!(handed_over, 1);
    }
}
