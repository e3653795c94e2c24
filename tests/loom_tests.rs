//! Loom-based concurrency tests for the row claim protocol.
//!
//! Run with: `cargo test --features loom --test loom_tests --release`
//!
//! Loom exhaustively explores thread interleavings. The model below is a
//! deliberately small inline rendition of the row FSM - status CAS, the
//! slot→abs witness map, and cursor advance - so the state space stays
//! tractable for exhaustive search.

#![cfg(feature = "loom")]

use loom::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};
use loom::sync::Arc;
use loom::thread;
use std::cell::UnsafeCell;

const READY_FOR_WRITE: u8 = 0;
const WRITING: u8 = 1;
const READY_FOR_READ: u8 = 2;
const READING: u8 = 3;

const ROWS: usize = 2;

/// Simplified row buffer for loom testing: 2 rows x 1 column of u64.
struct LoomRowBuffer {
    status: [AtomicU8; ROWS],
    slot_to_abs: [AtomicI64; ROWS],
    prod_loc: AtomicU64,
    cons_loc: AtomicU64,
    buf: UnsafeCell<[u64; ROWS]>,
}

unsafe impl Send for LoomRowBuffer {}
unsafe impl Sync for LoomRowBuffer {}

impl LoomRowBuffer {
    fn new() -> Self {
        Self {
            status: [AtomicU8::new(READY_FOR_WRITE), AtomicU8::new(READY_FOR_WRITE)],
            slot_to_abs: [AtomicI64::new(-1), AtomicI64::new(-1)],
            prod_loc: AtomicU64::new(0),
            cons_loc: AtomicU64::new(0),
            buf: UnsafeCell::new([0; ROWS]),
        }
    }

    /// Single producer claim attempt at the current cursor; writes the
    /// pass number as the payload and publishes. Returns false when the
    /// target row is not writable right now.
    fn try_produce(&self) -> bool {
        let abs = self.prod_loc.load(Ordering::Acquire);
        let loc = (abs as usize) % ROWS;
        if self.status[loc]
            .compare_exchange(READY_FOR_WRITE, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }
        self.slot_to_abs[loc].store(abs as i64, Ordering::Release);
        self.prod_loc.store(abs + 1, Ordering::Release);
        // SAFETY: this thread owns row `loc` while its status is WRITING.
        unsafe {
            (*self.buf.get())[loc] = abs;
        }
        self.status[loc].store(READY_FOR_READ, Ordering::Release);
        true
    }

    /// Single consumer claim attempt pinned to `abs`. Returns the payload
    /// read for a valid claim, `Err(true)` for a stale claim that was
    /// rolled back, `Err(false)` when the row was not readable.
    fn try_consume_at(&self, abs: u64) -> Result<u64, bool> {
        let loc = (abs as usize) % ROWS;
        if self.status[loc]
            .compare_exchange(READY_FOR_READ, READING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(false);
        }
        if self.slot_to_abs[loc].load(Ordering::Acquire) != abs as i64 {
            // Stale: the row was refilled for a later pass.
            self.status[loc].store(READY_FOR_READ, Ordering::Release);
            return Err(true);
        }
        self.cons_loc.store(abs + 1, Ordering::Release);
        // SAFETY: this thread owns row `loc` while its status is READING.
        let value = unsafe { (*self.buf.get())[loc] };
        self.status[loc].store(READY_FOR_WRITE, Ordering::Release);
        Ok(value)
    }
}

/// Every valid consumer claim observes the payload produced for exactly
/// the pass it was pinned to, no matter how claims interleave.
#[test]
fn loom_slot_identity_under_competing_consumers() {
    loom::model(|| {
        let buffer = Arc::new(LoomRowBuffer::new());

        // Pre-fill both rows (passes 0 and 1) before the race begins.
        assert!(buffer.try_produce());
        assert!(buffer.try_produce());

        let consumer_a = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                let mut seen = Vec::new();
                // Pin to the cursor current at each attempt, like the real
                // claim loop after a failed CAS.
                for _ in 0..3 {
                    let abs = buffer.cons_loc.load(Ordering::Acquire);
                    match buffer.try_consume_at(abs) {
                        Ok(value) => {
                            assert_eq!(value, abs, "consumed pass {abs} but read {value}");
                            seen.push(value);
                        }
                        Err(_) => thread::yield_now(),
                    }
                }
                seen
            })
        };

        let consumer_b = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                let abs = buffer.cons_loc.load(Ordering::Acquire);
                if let Ok(value) = buffer.try_consume_at(abs) {
                    assert_eq!(value, abs, "consumed pass {abs} but read {value}");
                }
            })
        };

        consumer_a.join().unwrap();
        consumer_b.join().unwrap();
    });
}

/// The witness map forces a consumer pinned to an already-consumed pass
/// onto the rollback path instead of handing it the refilled payload.
#[test]
fn loom_stale_claim_rolls_back() {
    loom::model(|| {
        let buffer = Arc::new(LoomRowBuffer::new());

        // Pass 0 produced and consumed; row 0 is free again.
        assert!(buffer.try_produce());
        assert_eq!(buffer.try_consume_at(0), Ok(0));

        // A producer refills row 0 for pass 2 while a consumer still
        // pinned to pass 0 races it.
        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                // Pass 1 goes to row 1, pass 2 re-uses row 0.
                assert!(buffer.try_produce());
                assert!(buffer.try_produce());
            })
        };

        let stale_consumer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                // The claim CAS can only succeed after row 0 was refilled
                // for pass 2, and then the map must force a rollback - the
                // stale pass must never be handed a payload.
                if let Ok(value) = buffer.try_consume_at(0) {
                    panic!("stale pass 0 returned payload {value}");
                }
            })
        };

        producer.join().unwrap();
        stale_consumer.join().unwrap();

        // Whether the stale consumer lost the CAS or rolled back, pass 1
        // is still intact for a correctly pinned consumer.
        assert_eq!(buffer.try_consume_at(1), Ok(1));
    });
}

/// Producer and consumer make progress through aliased rows without ever
/// violating slot identity.
#[test]
fn loom_spsc_through_aliased_rows() {
    loom::model(|| {
        let buffer = Arc::new(LoomRowBuffer::new());

        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                // Three passes over a two-row ring: pass 2 re-uses row 0.
                let mut produced = 0;
                for _ in 0..6 {
                    if buffer.try_produce() {
                        produced += 1;
                    }
                    if produced == 3 {
                        break;
                    }
                    thread::yield_now();
                }
                produced
            })
        };

        let consumer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                let mut consumed = 0;
                for _ in 0..6 {
                    let abs = buffer.cons_loc.load(Ordering::Acquire);
                    if let Ok(value) = buffer.try_consume_at(abs) {
                        assert_eq!(value, abs);
                        consumed += 1;
                    }
                    if consumed == 3 {
                        break;
                    }
                    thread::yield_now();
                }
                consumed
            })
        };

        let produced = producer.join().unwrap();
        let consumed = consumer.join().unwrap();
        assert!(consumed <= produced);
    });
}
