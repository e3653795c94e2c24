//! Debug assertion macros for the buffer's documented invariants.
//!
//! Active only in debug builds, zero overhead in release builds.

// =============================================================================
// Shape: rows x columns == capacity
// =============================================================================

/// Assert that a (rows, columns) pair multiplies out to the capacity.
///
/// Used in: `RowBuffer::new()`, `set_rows_columns()`
macro_rules! debug_assert_shape {
    ($rows:expr, $columns:expr, $capacity:expr) => {
        debug_assert!(
            $rows * $columns == $capacity,
            "shape violated: {} rows x {} columns != {} elements",
            $rows,
            $columns,
            $capacity
        )
    };
}

// =============================================================================
// Row bounds: every ring index stays below the configured row count
// =============================================================================

/// Assert that a ring index addresses an existing row.
///
/// Used in: row accessors and release operations
macro_rules! debug_assert_row_bounds {
    ($loc:expr, $rows:expr) => {
        debug_assert!(
            $loc < $rows,
            "row index {} out of bounds for {} rows",
            $loc,
            $rows
        )
    };
}

// =============================================================================
// Cursor serialization: only a CAS winner advances a cursor
// =============================================================================

/// Assert that the cursor did not move between the claim's load and the
/// winning CAS. All claimants of the same pass funnel through one row, so
/// the winner advances the cursor with a plain store; this assertion is
/// the explicit check that the store never races another advance. If it
/// ever fires outside a stop, the store must become a CAS. Exempt once
/// the buffer is stopped: the stop-time force release can re-race a claim
/// and slot state is undefined from then on.
///
/// Used in: `claim_producer()`, `claim_consumer_from()`
macro_rules! debug_assert_cursor_serialized {
    ($name:literal, $observed:expr, $claimed:expr, $stopped:expr) => {
        debug_assert!(
            $stopped || $observed == $claimed,
            "{} advanced concurrently: cursor at {}, claim won for {}",
            $name,
            $observed,
            $claimed
        )
    };
}

// =============================================================================
// Map ownership: a claimed row keeps its absolute index until released
// =============================================================================

/// Assert that the slot→abs entry still names the pass the claim was made
/// for. The entry is written under the producer's row ownership and must
/// not change while any worker holds the row. Exempt once the buffer is
/// stopped: the force release wipes the map under live claims.
///
/// Used in: `WriteRow::commit()`, `ReadRow::commit()`
macro_rules! debug_assert_map_owned {
    ($entry:expr, $abs:expr, $stopped:expr) => {
        debug_assert!(
            $stopped || $entry == $abs as i64,
            "slot map rewritten under a live claim: entry {}, claimed pass {}",
            $entry,
            $abs
        )
    };
}

pub(crate) use debug_assert_cursor_serialized;
pub(crate) use debug_assert_map_owned;
pub(crate) use debug_assert_row_bounds;
pub(crate) use debug_assert_shape;
