use crate::claim::{ReadRow, WriteRow};
use crate::invariants::{
    debug_assert_cursor_serialized, debug_assert_row_bounds, debug_assert_shape,
};
use crate::status::{AtomicRowState, RowState};
use crate::{Backoff, Message, Metrics, MetricsSnapshot};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use thiserror::Error;

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// This MPMC ring buffer synchronizes at row granularity: a row of `columns`
// elements changes hands in one status transition, and the elements inside
// a claimed row are touched with no atomics at all.
//
// ## Row FSM (the single synchronization primitive)
//
// Each row has a status atom cycling through
// ReadyForWrite → Writing → ReadyForRead → Reading → ReadyForWrite.
// Claims are CAS transitions (acquire on success, relaxed on failure);
// releases are plain stores with release ordering. A row in Writing or
// Reading is owned by exactly one worker.
//
// ## Cursors
//
// `prod_loc` and `cons_loc` are unbounded u64 passes; the ring index is
// `pass % rows`. Every claimant of pass `a` computes the same row, so the
// FSM serializes them: only the CAS winner advances the cursor, with a
// plain release store (asserted in debug builds; if that assertion ever
// fired the store would have to become a CAS).
//
// ## ABA on the consumer side
//
// Ring index k aliases every pass congruent to k modulo `rows`. A consumer
// pinned to pass `a` can win the Reading CAS only after `a` was already
// consumed at k and a producer refilled k for `a + rows`. The slot→abs map,
// written under the producer's row ownership and released together with the
// payload, is the witness: a consumer that claims k for `a` but finds a
// different map entry rolls the row back to ReadyForRead and re-competes at
// the current cursor.
//
// ## Ordering protocol
//
// **Producer:** CAS status (Acquire) → store map entry (Release) → advance
// `prod_loc` (Release, must not pass the map store) → write payload →
// store status ReadyForRead (Release, publishes payload and map entry).
//
// **Consumer:** CAS status (Acquire, synchronizes with the producer's
// release) → load map entry (Acquire) → advance `cons_loc` (Release) →
// read payload → store status ReadyForWrite (Release).
//
// =============================================================================

/// Slot map entry meaning "no pass recorded".
const UNSET: i64 = -1;

/// Requested geometry does not multiply out to the buffer capacity.
///
/// The buffer is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{rows} rows x {columns} columns != buffer capacity {capacity}")]
pub struct ShapeError {
    pub rows: usize,
    pub columns: usize,
    pub capacity: usize,
}

/// Bounded MPMC ring buffer handing over full rows of elements.
///
/// Capacity is fixed at construction; the split into `rows` rows of
/// `columns` elements is reconfigurable between runs as long as the
/// product stays equal to the capacity. Producers and consumers claim an
/// entire row through one CAS on the row's status and then write or read
/// its elements without further coordination, amortizing the handoff cost
/// across the row.
///
/// `reset` and `set_rows_columns` take `&mut self`: reconfiguration is a
/// single-threaded operation between runs, enforced by the borrow checker
/// (the harness reaches them through `Arc::get_mut` after joining its
/// workers).
pub struct RowBuffer<M: Message> {
    // === PRODUCER HOT === (128-byte aligned)
    /// Next pass to claim for writing.
    prod_loc: CacheAligned<AtomicU64>,

    // === CONSUMER HOT === (128-byte aligned)
    /// Next pass to claim for reading.
    cons_loc: CacheAligned<AtomicU64>,

    // === COLD STATE ===
    /// Cooperative stop flag, polled by every claim iteration.
    stop: AtomicBool,
    /// Counters (relaxed; statistical only).
    metrics: Metrics,

    // === GEOMETRY === (mutated only between runs, via &mut self)
    rows: usize,
    columns: usize,
    capacity: usize,

    // === DATA ===
    /// Payload storage, logically `rows x columns`. A row's elements are
    /// accessed only by the worker holding its Writing or Reading claim.
    buf: UnsafeCell<Box<[M]>>,
    /// Per-row status atoms. Sized to the full capacity so reconfiguring
    /// the geometry never reallocates; only the first `rows` entries are
    /// live for the current shape.
    status: Box<[AtomicRowState]>,
    /// Slot→abs map: which pass currently lives in each row. Sized like
    /// `status`, for the same reason.
    slot_to_abs: Box<[AtomicI64]>,
}

// SAFETY: the row FSM partitions `buf` so that a row's elements are only
// touched by the single worker holding its claim; everything else in the
// struct is atomics or immutable-between-runs geometry.
unsafe impl<M: Message> Send for RowBuffer<M> {}
unsafe impl<M: Message> Sync for RowBuffer<M> {}

impl<M: Message> RowBuffer<M> {
    /// Creates a buffer of `capacity` elements, shaped as `capacity` rows
    /// of one element each until [`set_rows_columns`](Self::set_rows_columns)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be non-zero");

        Self {
            prod_loc: CacheAligned::new(AtomicU64::new(0)),
            cons_loc: CacheAligned::new(AtomicU64::new(0)),
            stop: AtomicBool::new(false),
            metrics: Metrics::new(),
            rows: capacity,
            columns: 1,
            capacity,
            buf: UnsafeCell::new(vec![M::default(); capacity].into_boxed_slice()),
            status: (0..capacity)
                .map(|_| AtomicRowState::new(RowState::ReadyForWrite))
                .collect(),
            slot_to_abs: (0..capacity).map(|_| AtomicI64::new(UNSET)).collect(),
        }
    }

    // ---------------------------------------------------------------------
    // GEOMETRY & STATUS
    // ---------------------------------------------------------------------

    /// Number of rows in the current shape (the ring size).
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Elements per row in the current shape.
    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Total element capacity, `rows * columns` for every legal shape.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current producer cursor (next pass to write).
    #[inline]
    pub fn prod_cursor(&self) -> u64 {
        self.prod_loc.load(Ordering::Acquire)
    }

    /// Current consumer cursor (next pass to read).
    #[inline]
    pub fn cons_cursor(&self) -> u64 {
        self.cons_loc.load(Ordering::Acquire)
    }

    /// True once [`stop`](Self::stop) has been called.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Snapshot of the buffer counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Current FSM state of row `loc`. Racy by nature; after a stop the
    /// states are undefined until the next [`reset`](Self::reset).
    pub fn row_state(&self, loc: usize) -> RowState {
        debug_assert_row_bounds!(loc, self.rows);
        self.status[loc].load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn map_entry(&self, loc: usize) -> i64 {
        self.slot_to_abs[loc].load(Ordering::Acquire)
    }

    /// Reshapes the buffer into `rows` rows of `columns` elements.
    ///
    /// Cheap: the same storage is reused, no reallocation. Call between
    /// runs only, after a [`reset`](Self::reset).
    pub fn set_rows_columns(&mut self, rows: usize, columns: usize) -> Result<(), ShapeError> {
        if rows.checked_mul(columns) != Some(self.capacity) {
            return Err(ShapeError {
                rows,
                columns,
                capacity: self.capacity,
            });
        }
        self.rows = rows;
        self.columns = columns;
        debug_assert_shape!(self.rows, self.columns, self.capacity);
        Ok(())
    }

    /// Returns the buffer to its initial state: cursors at zero, every row
    /// `ReadyForWrite`, map entries unset, stop flag cleared, counters
    /// zeroed. Typically paired with
    /// [`set_rows_columns`](Self::set_rows_columns) between runs.
    pub fn reset(&mut self) {
        self.prod_loc.store(0, Ordering::Relaxed);
        self.cons_loc.store(0, Ordering::Relaxed);
        self.release_all_locks();
        self.metrics.reset();
        self.stop.store(false, Ordering::Relaxed);
    }

    // ---------------------------------------------------------------------
    // STOP
    // ---------------------------------------------------------------------

    /// Requests cooperative shutdown. Idempotent.
    ///
    /// Sets the stop flag, then force-releases every row so claimants
    /// blocked in their CAS loops observe the flag and return the stopped
    /// sentinel instead of spinning on a row that will never turn over.
    /// Workers still holding a row may be re-raced by the force release;
    /// the run is ending, so slot states and payload contents are
    /// undefined after this call until the next [`reset`](Self::reset).
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.release_all_locks();
    }

    fn release_all_locks(&self) {
        // The full arrays, not just the current rows: a later reshape may
        // widen the ring back over entries an earlier shape dirtied.
        for loc in 0..self.capacity {
            self.status[loc].store(RowState::ReadyForWrite, Ordering::Release);
            self.slot_to_abs[loc].store(UNSET, Ordering::Release);
        }
    }

    // ---------------------------------------------------------------------
    // PRODUCER PROTOCOL
    // ---------------------------------------------------------------------

    /// Claims the next row for writing. Blocks until a row is available or
    /// the buffer is stopped; `None` is the stopped sentinel.
    ///
    /// The returned guard owns the row exclusively; the caller fills all
    /// `columns` elements and calls [`WriteRow::commit`] to hand the row to
    /// the consumer side.
    pub fn claim_producer(&self) -> Option<WriteRow<'_, M>> {
        let mut backoff = Backoff::new();
        let mut abs = self.prod_loc.load(Ordering::Acquire);
        let mut loc = self.ring_index(abs);
        loop {
            if self.is_stopped() {
                return None;
            }
            if self.status[loc].try_transition(RowState::ReadyForWrite, RowState::Writing) {
                break;
            }
            self.metrics.add_claim_retries(1);
            backoff.snooze();
            // Another producer may have advanced the cursor while we waited.
            abs = self.prod_loc.load(Ordering::Acquire);
            loc = self.ring_index(abs);
        }

        // The winning CAS serializes producers through row `loc`, so the
        // cursor cannot have moved since the load above.
        debug_assert_cursor_serialized!(
            "prod_loc",
            self.prod_loc.load(Ordering::Relaxed),
            abs,
            self.is_stopped()
        );

        // Record which pass this row now carries, before the cursor store
        // lets the next producer move on. Published to consumers by the
        // release in `release_producer`.
        self.slot_to_abs[loc].store(abs as i64, Ordering::Release);
        self.prod_loc.store(abs + 1, Ordering::Release);

        Some(WriteRow::new(self, loc, abs))
    }

    /// Hands row `loc` to the consumer side after all its elements were
    /// written. The release publishes the payload and the map entry to the
    /// consumer whose claim CAS acquires this store.
    pub fn release_producer(&self, loc: usize) {
        debug_assert_row_bounds!(loc, self.rows);
        self.status[loc].store(RowState::ReadyForRead, Ordering::Release);
        self.metrics.add_rows_written(1);
    }

    // ---------------------------------------------------------------------
    // CONSUMER PROTOCOL
    // ---------------------------------------------------------------------

    /// Claims the next row for reading. Blocks until a full row is
    /// available or the buffer is stopped; `None` is the stopped sentinel.
    ///
    /// The guard's row is guaranteed to hold the elements produced for the
    /// guard's pass - a claim that lost the aliasing race against a
    /// refilled row is rolled back internally and re-competes.
    pub fn claim_consumer(&self) -> Option<ReadRow<'_, M>> {
        self.claim_consumer_from(self.cons_loc.load(Ordering::Acquire))
    }

    /// Claim loop pinned to an initial pass.
    ///
    /// Split out from [`claim_consumer`](Self::claim_consumer) so the
    /// stale-claim path can be driven deterministically from tests.
    pub(crate) fn claim_consumer_from(&self, mut abs: u64) -> Option<ReadRow<'_, M>> {
        let mut backoff = Backoff::new();
        loop {
            let mut loc = self.ring_index(abs);
            loop {
                if self.is_stopped() {
                    return None;
                }
                if self.status[loc].try_transition(RowState::ReadyForRead, RowState::Reading) {
                    break;
                }
                self.metrics.add_claim_retries(1);
                backoff.snooze();
                // Another consumer may have advanced the cursor while we
                // waited; re-pin to the current pass.
                abs = self.cons_loc.load(Ordering::Acquire);
                loc = self.ring_index(abs);
            }

            if self.slot_to_abs[loc].load(Ordering::Acquire) == abs as i64 {
                // Valid claim; same serialization argument as the producer.
                debug_assert_cursor_serialized!(
                    "cons_loc",
                    self.cons_loc.load(Ordering::Relaxed),
                    abs,
                    self.is_stopped()
                );
                self.cons_loc.store(abs + 1, Ordering::Release);
                return Some(ReadRow::new(self, loc, abs));
            }

            // Stale claim: pass `abs` was already consumed at this row and a
            // producer has refilled it for a later pass. Hand the row back
            // so a consumer pinned to the new pass (possibly this one, next
            // iteration) can take it.
            self.metrics.add_stale_rollbacks(1);
            self.status[loc].store(RowState::ReadyForRead, Ordering::Release);
            abs = self.cons_loc.load(Ordering::Acquire);
        }
    }

    /// Hands row `loc` back to the producer side after all its elements
    /// were read.
    pub fn release_consumer(&self, loc: usize) {
        debug_assert_row_bounds!(loc, self.rows);
        self.status[loc].store(RowState::ReadyForWrite, Ordering::Release);
        self.metrics.add_rows_read(1);
    }

    // ---------------------------------------------------------------------
    // ROW ACCESS
    // ---------------------------------------------------------------------

    /// The elements of row `loc`.
    ///
    /// # Safety
    ///
    /// The caller must hold the `Writing` or `Reading` claim on `loc`; the
    /// slice is valid only until the corresponding release. Prefer the
    /// [`WriteRow`]/[`ReadRow`] guards, which encode this contract.
    pub unsafe fn row(&self, loc: usize) -> &[M] {
        debug_assert_row_bounds!(loc, self.rows);
        let start = loc * self.columns;
        // SAFETY: per the caller contract, no other thread touches
        // [start, start + columns) until the row is released.
        let buf = &*self.buf.get();
        &buf[start..start + self.columns]
    }

    /// The elements of row `loc`, mutably.
    ///
    /// # Safety
    ///
    /// Same contract as [`row`](Self::row).
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn row_mut(&self, loc: usize) -> &mut [M] {
        debug_assert_row_bounds!(loc, self.rows);
        let start = loc * self.columns;
        // SAFETY: per the caller contract, this worker is the only one
        // touching [start, start + columns) until the row is released.
        let buf = &mut *self.buf.get();
        &mut buf[start..start + self.columns]
    }

    #[inline]
    fn ring_index(&self, abs: u64) -> usize {
        (abs % self.rows as u64) as usize
    }
}

// ---------------------------------------------------------------------
// HELPER: 128-byte cache-aligned wrapper
// ---------------------------------------------------------------------

/// Wrapper type that ensures 128-byte alignment to prevent prefetcher-induced
/// false sharing on Intel/AMD CPUs (which may prefetch adjacent cache lines).
#[repr(align(128))]
struct CacheAligned<T> {
    value: T,
}

impl<T> CacheAligned<T> {
    const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> std::ops::Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}
