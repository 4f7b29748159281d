use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// High bit of `rows_admitted`: set once no further row may start.
const ADMISSION_CLOSED: usize = 1 << (usize::BITS - 1);

/// Counters shared by the reader and every worker during a run.
///
/// Every row read ends up in exactly one bucket: handled, malformed,
/// abandoned (read but never admitted to a worker) or in flight (admitted
/// before admission closed, not finished yet).
#[derive(Debug)]
pub struct RunStats {
    rows_read: AtomicUsize,
    batches_dispatched: AtomicUsize,
    rows_dispatched: AtomicUsize,
    rows_admitted: AtomicUsize,
    records_handled: AtomicUsize,
    malformed_lines: AtomicUsize,
    malformed_records: AtomicUsize,
    start_time: Instant,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            rows_read: AtomicUsize::new(0),
            batches_dispatched: AtomicUsize::new(0),
            rows_dispatched: AtomicUsize::new(0),
            rows_admitted: AtomicUsize::new(0),
            records_handled: AtomicUsize::new(0),
            malformed_lines: AtomicUsize::new(0),
            malformed_records: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn add_row_read(&self) {
        self.rows_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_batch_dispatched(&self, rows: usize) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        self.rows_dispatched.fetch_add(rows, Ordering::Relaxed);
    }

    /// Claim one row for processing. False once admission is closed; the
    /// row must then be skipped.
    pub fn try_admit_row(&self) -> bool {
        let mut current = self.rows_admitted.load(Ordering::Acquire);
        loop {
            if current & ADMISSION_CLOSED != 0 {
                return false;
            }
            match self.rows_admitted.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Refuse every later [`try_admit_row`](Self::try_admit_row). Returns the
    /// number of rows admitted before the gate closed.
    pub fn close_admission(&self) -> usize {
        self.rows_admitted.fetch_or(ADMISSION_CLOSED, Ordering::AcqRel) & !ADMISSION_CLOSED
    }

    pub fn add_record_handled(&self) {
        self.records_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_malformed_line(&self) {
        self.malformed_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_malformed_record(&self) {
        self.malformed_records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read.load(Ordering::Relaxed)
    }

    pub fn rows_dispatched(&self) -> usize {
        self.rows_dispatched.load(Ordering::Relaxed)
    }

    pub fn rows_admitted(&self) -> usize {
        self.rows_admitted.load(Ordering::Acquire) & !ADMISSION_CLOSED
    }

    /// Freeze the counters.
    ///
    /// Only exact once admission is closed or every worker has exited;
    /// before that, rows not yet admitted show up as abandoned.
    pub fn snapshot(&self) -> ProcessingStats {
        let rows_read = self.rows_read.load(Ordering::Acquire);
        let admitted = self.rows_admitted();
        let records_handled = self.records_handled.load(Ordering::Acquire);
        let malformed_lines = self.malformed_lines.load(Ordering::Acquire);
        let malformed_records = self.malformed_records.load(Ordering::Acquire);
        let finished = records_handled + malformed_lines + malformed_records;

        ProcessingStats {
            rows_read,
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            records_handled,
            malformed_lines,
            malformed_records,
            rows_abandoned: rows_read.saturating_sub(admitted),
            rows_in_flight: admitted.saturating_sub(finished),
            processing_time: self.start_time.elapsed(),
        }
    }
}

impl RunStats {
    /// Mid-run view: rows not finished yet are reported as in flight
    /// rather than abandoned.
    pub fn progress_snapshot(&self) -> ProcessingStats {
        let mut stats = self.snapshot();
        stats.rows_in_flight += stats.rows_abandoned;
        stats.rows_abandoned = 0;
        stats
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    pub rows_read: usize,
    pub batches_dispatched: usize,
    pub records_handled: usize,
    pub malformed_lines: usize,
    pub malformed_records: usize,
    /// Read but never handed to the handler.
    pub rows_abandoned: usize,
    /// Still being processed by a detached worker when the run returned.
    /// These rows reach the handler after the fact.
    pub rows_in_flight: usize,
    pub processing_time: Duration,
}

impl ProcessingStats {
    /// Rows that never reached the handler.
    pub fn rows_dropped(&self) -> usize {
        self.malformed_lines + self.malformed_records + self.rows_abandoned
    }

    /// Fold another run's counters into this one (one run per input file).
    pub fn merge(&mut self, other: &ProcessingStats) {
        self.rows_read += other.rows_read;
        self.batches_dispatched += other.batches_dispatched;
        self.records_handled += other.records_handled;
        self.malformed_lines += other.malformed_lines;
        self.malformed_records += other.malformed_records;
        self.rows_abandoned += other.rows_abandoned;
        self.rows_in_flight += other.rows_in_flight;
        self.processing_time += other.processing_time;
    }

    pub fn format_stats(&self) -> String {
        let mut output = format!(
            "Rows processed: {} total, {} handled",
            self.rows_read, self.records_handled
        );

        if self.malformed_lines > 0 {
            output.push_str(&format!(", {} malformed lines", self.malformed_lines));
        }

        if self.malformed_records > 0 {
            output.push_str(&format!(", {} malformed records", self.malformed_records));
        }

        if self.rows_abandoned > 0 {
            output.push_str(&format!(", {} abandoned", self.rows_abandoned));
        }

        if self.rows_in_flight > 0 {
            output.push_str(&format!(", {} in flight", self.rows_in_flight));
        }

        output.push_str(&format!(", {} batches", self.batches_dispatched));

        let processing_time_ms = self.processing_time.as_millis();
        output.push_str(&format!(" in {}ms", processing_time_ms));

        if processing_time_ms > 0 && self.rows_read > 0 {
            let rows_per_sec = (self.rows_read as f64 * 1000.0) / processing_time_ms as f64;
            output.push_str(&format!(" ({:.0} rows/s)", rows_per_sec));
        }

        output
    }
}
