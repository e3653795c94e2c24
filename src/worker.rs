use crate::metrics::Stopwatch;
use crate::{Message, RowBuffer};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// What a worker did during its run, frozen before the thread returns.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSummary {
    /// Elements written or read.
    pub total: u64,
    /// Absolute position of the last element touched, -1 if none.
    pub last_index: i64,
    /// Time between worker start and exit.
    pub elapsed: Duration,
}

/// A producer thread.
///
/// Runs from construction: repeatedly claims a row, fills its `columns`
/// elements with values carrying their absolute positions, and commits.
/// Exits once stopped (the claim returns the sentinel, or the worker's own
/// flag is observed at a loop or column boundary).
pub struct Producer<M: Message> {
    buffer: Arc<RowBuffer<M>>,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<WorkerSummary>,
}

impl<M: Message> Producer<M> {
    pub fn spawn(buffer: Arc<RowBuffer<M>>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let buffer = Arc::clone(&buffer);
            let stop = Arc::clone(&stop);
            thread::spawn(move || produce_loop(&buffer, &stop))
        };
        Self {
            buffer,
            stop,
            handle,
        }
    }

    /// Flags this worker to stop and stops the buffer, releasing any
    /// claimant blocked in a CAS loop. Called from another thread.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.buffer.stop();
    }

    /// Waits for the thread to exit and returns its statistics.
    pub fn join(self) -> thread::Result<WorkerSummary> {
        self.handle.join()
    }
}

/// A consumer thread.
///
/// Repeatedly claims a full row, verifies every element, blanks it to the
/// index-0 value for debug inspection, and commits. Verification always
/// checks slot identity (the element at absolute position `x` reports
/// index `x`); the monotonic-order check is enabled only for runs with at
/// most one producer and one consumer, where it is meaningful.
///
/// A verification failure is a defect in the buffer: the worker prints a
/// `VERIFY-FAIL:` diagnostic to stdout and terminates the process with a
/// non-zero exit code.
pub struct Consumer<M: Message> {
    buffer: Arc<RowBuffer<M>>,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<WorkerSummary>,
}

impl<M: Message> Consumer<M> {
    pub fn spawn(buffer: Arc<RowBuffer<M>>, name: impl Into<String>, strict_order: bool) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let buffer = Arc::clone(&buffer);
            let stop = Arc::clone(&stop);
            let name = name.into();
            thread::spawn(move || consume_loop(&buffer, &stop, strict_order, &name))
        };
        Self {
            buffer,
            stop,
            handle,
        }
    }

    /// Flags this worker to stop and stops the buffer. Called from another
    /// thread.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.buffer.stop();
    }

    /// Waits for the thread to exit and returns its statistics.
    pub fn join(self) -> thread::Result<WorkerSummary> {
        self.handle.join()
    }
}

fn produce_loop<M: Message>(buffer: &RowBuffer<M>, stop: &AtomicBool) -> WorkerSummary {
    let watch = Stopwatch::start();
    let mut total = 0u64;
    let mut last_index = -1i64;

    while !stop.load(Ordering::Relaxed) {
        let Some(mut row) = buffer.claim_producer() else {
            break;
        };
        let abs = row.abs();
        let columns = row.columns() as u64;
        for (col, slot) in row.as_mut_slice().iter_mut().enumerate() {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let index = abs * columns + col as u64;
            *slot = M::from_index(index);
            last_index = index as i64;
            total += 1;
        }
        // Committed even when the stop flag cut the column loop short; the
        // row must not stay in Writing.
        row.commit();
    }

    WorkerSummary {
        total,
        last_index,
        elapsed: watch.elapsed(),
    }
}

fn consume_loop<M: Message>(
    buffer: &RowBuffer<M>,
    stop: &AtomicBool,
    strict_order: bool,
    name: &str,
) -> WorkerSummary {
    let watch = Stopwatch::start();
    let mut total = 0u64;
    let mut last_index = -1i64;
    let mut prev_index = -1i64;

    while !stop.load(Ordering::Relaxed) {
        let Some(mut row) = buffer.claim_consumer() else {
            break;
        };
        if buffer.is_stopped() {
            // The claim raced the stop-time force release; from here on
            // slot states and contents are undefined, so the row must not
            // be verified or counted.
            drop(row);
            break;
        }
        let abs = row.abs();
        let loc = row.loc();
        let columns = row.columns() as u64;
        for (col, slot) in row.as_mut_slice().iter_mut().enumerate() {
            if stop.load(Ordering::Relaxed) || buffer.is_stopped() {
                break;
            }
            let index = (abs * columns + col as u64) as i64;
            let seen = slot.index() as i64;
            if strict_order && seen < prev_index {
                verify_fail(
                    name,
                    &format!("row {loc} col {col}: value {seen} after {prev_index}, consumed in wrong sequence"),
                );
            }
            if seen != index {
                verify_fail(
                    name,
                    &format!("row {loc} col {col}: value reports index {seen}, expected absolute position {index}"),
                );
            }
            *slot = M::from_index(0);
            prev_index = seen;
            last_index = index;
            total += 1;
        }
        row.commit();
    }

    WorkerSummary {
        total,
        last_index,
        elapsed: watch.elapsed(),
    }
}

fn verify_fail(name: &str, message: &str) -> ! {
    println!("VERIFY-FAIL: {name}: {message}");
    process::exit(2);
}
