//! Process-level plumbing for the binary: exit codes, signal handling and a
//! stdout that tolerates a closed pipe.

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use std::io::{self, Write};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Exit statuses of the `streetfines` binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidUsage = 2,
    /// 128 + SIGINT
    SignalInt = 130,
    /// 128 + SIGPIPE
    SignalPipe = 141,
    /// 128 + SIGTERM
    SignalTerm = 143,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn exit(self) -> ! {
        process::exit(self.code())
    }
}

/// Control messages from the signal thread to the read loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ctrl {
    /// Stop reading. `immediate` also abandons batches already queued.
    Shutdown { immediate: bool },
    PrintStats,
}

/// Counts shutdown signals and turns each one into a [`Ctrl`] message.
///
/// The first request drains queued batches; any later one is immediate.
#[derive(Debug, Clone, Default)]
pub struct ShutdownRequests {
    count: Arc<AtomicUsize>,
}

impl ShutdownRequests {
    pub fn record(&self) -> Ctrl {
        let previous = self.count.fetch_add(1, Ordering::AcqRel);
        Ctrl::Shutdown {
            immediate: previous > 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

/// Owns the signal-watching thread.
///
/// SIGINT/SIGTERM ask the current run to stop reading; a second one exits
/// the process right away. On unix SIGUSR1 prints a stats line on stderr.
pub struct SignalHandler {
    requests: ShutdownRequests,
    _handle: thread::JoinHandle<()>,
}

impl SignalHandler {
    pub fn new(ctrl_sender: Sender<Ctrl>) -> Result<Self> {
        let requests = ShutdownRequests::default();
        let handle = spawn_watcher(ctrl_sender, requests.clone())
            .context("Failed to install signal handlers")?;
        Ok(Self {
            requests,
            _handle: handle,
        })
    }

    /// Whether a shutdown signal has arrived.
    pub fn interrupted(&self) -> bool {
        self.requests.count() > 0
    }
}

#[cfg(unix)]
fn spawn_watcher(
    sender: Sender<Ctrl>,
    requests: ShutdownRequests,
) -> Result<thread::JoinHandle<()>> {
    use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGUSR1])?;
    let handle = thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for sig in signals.forever() {
                if sig == SIGUSR1 {
                    let _ = sender.send(Ctrl::PrintStats);
                    continue;
                }

                let request = requests.record();
                if request == (Ctrl::Shutdown { immediate: true }) {
                    if sig == SIGTERM {
                        ExitCode::SignalTerm.exit();
                    }
                    ExitCode::SignalInt.exit();
                }
                log::warn!("Interrupted; finishing queued batches (signal again to quit now)");
                let _ = sender.send(request);
            }
        })?;
    Ok(handle)
}

#[cfg(windows)]
fn spawn_watcher(
    sender: Sender<Ctrl>,
    requests: ShutdownRequests,
) -> Result<thread::JoinHandle<()>> {
    use signal_hook::consts::SIGINT;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    let raised = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&raised))?;
    let handle = thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || loop {
            thread::sleep(Duration::from_millis(100));
            if !raised.swap(false, Ordering::AcqRel) {
                continue;
            }
            let request = requests.record();
            if request == (Ctrl::Shutdown { immediate: true }) {
                ExitCode::SignalInt.exit();
            }
            let _ = sender.send(request);
        })?;
    Ok(handle)
}

/// Stdout that exits with [`ExitCode::SignalPipe`] once the reading end of a
/// pipe has gone away, e.g. `streetfines tickets.csv | head`.
pub struct SafeStdout {
    stdout: io::Stdout,
}

impl SafeStdout {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }
}

impl Default for SafeStdout {
    fn default() -> Self {
        Self::new()
    }
}

fn is_broken_pipe(e: &io::Error) -> bool {
    // ERROR_BROKEN_PIPE and ERROR_NO_DATA on Windows
    e.kind() == io::ErrorKind::BrokenPipe
        || (cfg!(windows) && matches!(e.raw_os_error(), Some(109) | Some(232)))
}

fn exit_on_broken_pipe<T>(result: io::Result<T>) -> io::Result<T> {
    match result {
        Err(e) if is_broken_pipe(&e) => ExitCode::SignalPipe.exit(),
        other => other,
    }
}

impl Write for SafeStdout {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        exit_on_broken_pipe(self.stdout.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        exit_on_broken_pipe(self.stdout.flush())
    }
}
