//! Batch worker runner
//!
//! One thread reads and batches lines; a fixed pool of workers parses each
//! batch and feeds records to a [`RecordHandler`](crate::handlers::RecordHandler).
//! The bounded batch channel between them is the only backpressure: a full
//! queue blocks the reader until a worker frees a slot.
//!
//! - `types`: work units, batches, runner state, run summary
//! - `batching`: the read loop
//! - `worker`: worker threads and per-row processing
//! - `processor`: the `BatchWorkerRunner` that ties them together

mod batching;
mod processor;
mod types;
mod worker;

pub use processor::BatchWorkerRunner;
pub use types::{Batch, RunSummary, RunnerState, WorkUnit};
