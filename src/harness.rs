use crate::buffer::ShapeError;
use crate::{Consumer, Message, Producer, RowBuffer, RunConfig};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Error types for harness runs.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A producer or consumer thread panicked during the run.
    #[error("worker thread panicked")]
    WorkerPanicked,
    /// The buffer is still shared after the workers were joined, so it
    /// cannot be reconfigured for the next shape.
    #[error("buffer still shared between runs; cannot reconfigure")]
    BufferShared,
    /// The swept shape did not multiply out to the capacity.
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Aggregated statistics of one timed run over one (rows, columns) shape.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub rows: usize,
    pub columns: usize,
    /// Wall-clock window the workers were given before being stopped.
    pub window: Duration,
    /// Elements written, summed over producers.
    pub total_produced: u64,
    /// Elements read and verified, summed over consumers.
    pub total_consumed: u64,
    /// Highest absolute position any producer wrote, -1 if none.
    pub last_produced: i64,
    /// Highest absolute position any consumer read, -1 if none.
    pub last_consumed: i64,
    /// Producer run time, summed over producers.
    pub producer_elapsed: Duration,
    /// Consumer run time, summed over consumers.
    pub consumer_elapsed: Duration,
}

impl RunSummary {
    fn new(rows: usize, columns: usize, window: Duration) -> Self {
        Self {
            rows,
            columns,
            window,
            total_produced: 0,
            total_consumed: 0,
            last_produced: -1,
            last_consumed: -1,
            producer_elapsed: Duration::ZERO,
            consumer_elapsed: Duration::ZERO,
        }
    }

    /// Producer-side cost per message in microseconds.
    pub fn micros_per_message(&self) -> f64 {
        if self.total_produced == 0 {
            return f64::INFINITY;
        }
        self.producer_elapsed.as_secs_f64() * 1e6 / self.total_produced as f64
    }

    /// The reported figure: `100 * microseconds per message`.
    pub fn scaled_micros_per_message(&self) -> f64 {
        100.0 * self.micros_per_message()
    }
}

/// Runs one timed window over the buffer's current shape.
///
/// Spawns the workers, sleeps for `window`, stops everything, joins, and
/// aggregates the worker statistics. The buffer must have been freshly
/// [`reset`](RowBuffer::reset) and shaped. The consumers run the
/// monotonic-order verifier only when there is at most one producer and
/// one consumer.
pub fn run_once<M: Message>(
    buffer: &Arc<RowBuffer<M>>,
    num_producers: usize,
    num_consumers: usize,
    window: Duration,
) -> Result<RunSummary, HarnessError> {
    let strict_order = num_producers <= 1 && num_consumers <= 1;

    let producers: Vec<Producer<M>> = (0..num_producers)
        .map(|_| Producer::spawn(Arc::clone(buffer)))
        .collect();
    let consumers: Vec<Consumer<M>> = (0..num_consumers)
        .map(|i| Consumer::spawn(Arc::clone(buffer), format!("cons {i}"), strict_order))
        .collect();

    thread::sleep(window);

    for producer in &producers {
        producer.stop();
    }
    for consumer in &consumers {
        consumer.stop();
    }

    let mut summary = RunSummary::new(buffer.rows(), buffer.columns(), window);
    for consumer in consumers {
        let worker = consumer.join().map_err(|_| HarnessError::WorkerPanicked)?;
        summary.total_consumed += worker.total;
        summary.consumer_elapsed += worker.elapsed;
        summary.last_consumed = summary.last_consumed.max(worker.last_index);
    }
    for producer in producers {
        let worker = producer.join().map_err(|_| HarnessError::WorkerPanicked)?;
        summary.total_produced += worker.total;
        summary.producer_elapsed += worker.elapsed;
        summary.last_produced = summary.last_produced.max(worker.last_index);
    }

    Ok(summary)
}

/// Sweeps the row-width progression over one buffer, reporting each shape.
///
/// For every width the buffer is reset and reshaped to
/// `(capacity / width, width)`, run for the configured window, stopped and
/// joined; `report` is called with the finished shape's summary.
pub fn sweep<M, F>(config: &RunConfig, mut report: F) -> Result<(), HarnessError>
where
    M: Message,
    F: FnMut(&RunSummary),
{
    let mut buffer = Arc::new(RowBuffer::<M>::new(config.capacity));

    for columns in column_widths(config.capacity) {
        let rows = config.capacity / columns;
        {
            // All workers were joined by the previous iteration, so this
            // is the only handle left.
            let buffer = Arc::get_mut(&mut buffer).ok_or(HarnessError::BufferShared)?;
            buffer.reset();
            buffer.set_rows_columns(rows, columns)?;
        }
        let summary = run_once(&buffer, config.num_producers, config.num_consumers, config.window)?;
        report(&summary);
    }

    Ok(())
}

/// The swept row widths: each power of ten up to the capacity, plus its
/// half from 10 upward - 1, 5, 10, 50, 100, 500, ... Widths that do not
/// divide the capacity are skipped so every shape keeps
/// `rows * columns == capacity`.
pub fn column_widths(capacity: usize) -> Vec<usize> {
    let mut widths = Vec::new();
    let mut cols = 1usize;
    while cols <= capacity {
        if cols >= 10 {
            let half = cols / 2;
            if capacity % half == 0 {
                widths.push(half);
            }
        }
        if capacity % cols == 0 {
            widths.push(cols);
        }
        match cols.checked_mul(10) {
            Some(next) => cols = next,
            None => break,
        }
    }
    widths
}
