//! Worker side of the runner: batch in, parsed records out to the handler.

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::config::ErrorStrategy;
use crate::error::IngestError;
use crate::handlers::RecordHandler;

use super::types::{Batch, WorkUnit, WorkerContext};

/// Pull batches until the channel closes.
///
/// `_done` is never sent on. Dropping it when the thread exits (normally or
/// by unwinding) is how the runner learns the pool has drained.
pub(crate) fn worker_thread<H>(
    worker_id: usize,
    batch_receiver: Receiver<Batch>,
    handler: Arc<H>,
    ctx: WorkerContext,
    _done: Sender<()>,
) -> Result<()>
where
    H: RecordHandler + ?Sized,
{
    let mut processed = 0usize;
    while let Ok(batch) = batch_receiver.recv() {
        if ctx.stop.load(Ordering::Acquire) {
            debug!(
                "worker {} dropping batch {} ({} rows) after stop",
                worker_id,
                batch.id,
                batch.len()
            );
            continue;
        }
        process_batch(&batch, handler.as_ref(), &ctx)?;
        processed += 1;
    }
    debug!("worker {} exiting after {} batches", worker_id, processed);
    Ok(())
}

/// Units run in read order. A row error ends the batch only under
/// [`ErrorStrategy::Abort`].
///
/// Each unit is admitted before it is parsed; once the runner closes
/// admission the rest of the batch is skipped and counts as abandoned.
pub(crate) fn process_batch<H>(batch: &Batch, handler: &H, ctx: &WorkerContext) -> Result<()>
where
    H: RecordHandler + ?Sized,
{
    for (idx, unit) in batch.units.iter().enumerate() {
        if !ctx.stats.try_admit_row() {
            debug!(
                "batch {}: admission closed, skipping {} rows from row {}",
                batch.id,
                batch.len() - idx,
                unit.row
            );
            break;
        }
        process_unit(unit, handler, ctx)?;
    }
    Ok(())
}

pub(crate) fn process_unit<H>(unit: &WorkUnit, handler: &H, ctx: &WorkerContext) -> Result<()>
where
    H: RecordHandler + ?Sized,
{
    let err = match ctx.parser.parse_line(&unit.line, unit.row) {
        Ok(record) => {
            handler.handle(&record, unit.row);
            ctx.stats.add_record_handled();
            return Ok(());
        }
        Err(err) => err,
    };

    match err {
        IngestError::MalformedLine { .. } => ctx.stats.add_malformed_line(),
        IngestError::MalformedRecord { .. } => ctx.stats.add_malformed_record(),
        _ => {}
    }

    match ctx.on_error {
        ErrorStrategy::Skip => Ok(()),
        ErrorStrategy::Print => {
            warn!("Skipping row {}: {}", unit.row, err);
            Ok(())
        }
        ErrorStrategy::Abort => {
            ctx.stop.store(true, Ordering::Release);
            Err(anyhow::Error::new(err).context(format!("Aborting at row {}", unit.row)))
        }
    }
}
