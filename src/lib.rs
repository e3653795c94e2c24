//! rowmpmc - Bounded MPMC Ring Buffer with Row-Granular Synchronization
//!
//! A fixed-capacity multi-producer multi-consumer ring buffer that hands
//! over an entire row of elements per synchronized claim. A producer wins
//! one CAS on a row's status, fills the row's `columns` elements with no
//! further coordination, and releases; a consumer does the same on the
//! read side. Widening the rows amortizes the atomic handoff across more
//! payload, trading a status word per row for throughput.
//!
//! # Key Features
//!
//! - Four-state per-row FSM as the single synchronization primitive
//! - ABA-safe consumer claims via a slot→abs witness map
//! - Reconfigurable (rows, columns) split over one fixed allocation
//! - Cooperative stop that unblocks claimants stuck in CAS loops
//! - A harness that sweeps row widths and reports per-message cost
//!
//! # Example
//!
//! ```
//! use rowmpmc::{Message, RowBuffer, SeqMessage};
//!
//! let mut buffer = RowBuffer::<SeqMessage>::new(8);
//! buffer.set_rows_columns(4, 2).unwrap();
//!
//! // Producer side: claim a row, fill it, commit.
//! let mut row = buffer.claim_producer().unwrap();
//! let abs = row.abs();
//! let columns = row.columns() as u64;
//! for (col, slot) in row.as_mut_slice().iter_mut().enumerate() {
//!     *slot = SeqMessage::from_index(abs * columns + col as u64);
//! }
//! row.commit();
//!
//! // Consumer side: the claimed row is guaranteed to carry the pass it
//! // was claimed for.
//! let row = buffer.claim_consumer().unwrap();
//! assert_eq!(row.abs(), 0);
//! assert_eq!(row.as_slice()[1].index(), 1);
//! row.commit();
//! ```

mod backoff;
mod buffer;
mod claim;
mod config;
mod harness;
mod invariants;
mod message;
mod metrics;
mod status;
mod worker;

pub use backoff::Backoff;
pub use buffer::{RowBuffer, ShapeError};
pub use claim::{ReadRow, WriteRow};
pub use config::RunConfig;
pub use harness::{column_widths, run_once, sweep, HarnessError, RunSummary};
pub use message::{Message, SeqMessage, TextMessage};
pub use metrics::{Metrics, MetricsSnapshot, Stopwatch};
pub use status::RowState;
pub use worker::{Consumer, Producer, WorkerSummary};
