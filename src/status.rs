use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a row in the ring.
///
/// Every row cycles through the same four states; there is no terminal
/// state. The only legal transitions are:
///
/// - `ReadyForWrite → Writing` (producer claim, CAS)
/// - `Writing → ReadyForRead` (producer release)
/// - `ReadyForRead → Reading` (consumer claim, CAS)
/// - `Reading → ReadyForWrite` (consumer release)
/// - `Reading → ReadyForRead` (consumer rollback after a stale claim)
///
/// While a row is `Writing` or `Reading` exactly one worker owns it and
/// touches its elements without further synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RowState {
    /// Empty, available to a producer. Initial state of every row.
    ReadyForWrite = 0,
    /// Exclusively owned by one producer.
    Writing = 1,
    /// Full, available to a consumer.
    ReadyForRead = 2,
    /// Exclusively owned by one consumer.
    Reading = 3,
}

impl RowState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RowState::ReadyForWrite,
            1 => RowState::Writing,
            2 => RowState::ReadyForRead,
            3 => RowState::Reading,
            other => unreachable!("invalid row state {other}"),
        }
    }
}

/// A row state stored in an `AtomicU8`.
#[derive(Debug)]
pub(crate) struct AtomicRowState(AtomicU8);

impl AtomicRowState {
    pub(crate) fn new(state: RowState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub(crate) fn load(&self, order: Ordering) -> RowState {
        RowState::from_u8(self.0.load(order))
    }

    #[inline]
    pub(crate) fn store(&self, state: RowState, order: Ordering) {
        self.0.store(state as u8, order);
    }

    /// Attempts the `from → to` transition.
    ///
    /// Acquire on success so the claiming worker sees everything published
    /// by the releasing store it synchronizes with; relaxed on failure, a
    /// failed claim carries no data.
    #[inline]
    pub(crate) fn try_transition(&self, from: RowState, to: RowState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_cycle() {
        let status = AtomicRowState::new(RowState::ReadyForWrite);

        assert!(status.try_transition(RowState::ReadyForWrite, RowState::Writing));
        status.store(RowState::ReadyForRead, Ordering::Release);
        assert!(status.try_transition(RowState::ReadyForRead, RowState::Reading));
        status.store(RowState::ReadyForWrite, Ordering::Release);

        assert_eq!(status.load(Ordering::Acquire), RowState::ReadyForWrite);
    }

    #[test]
    fn test_claim_fails_unless_in_source_state() {
        let status = AtomicRowState::new(RowState::ReadyForWrite);

        // A consumer cannot claim an empty row.
        assert!(!status.try_transition(RowState::ReadyForRead, RowState::Reading));
        assert_eq!(status.load(Ordering::Acquire), RowState::ReadyForWrite);

        // A second producer cannot claim a row that is being written.
        assert!(status.try_transition(RowState::ReadyForWrite, RowState::Writing));
        assert!(!status.try_transition(RowState::ReadyForWrite, RowState::Writing));
    }

    #[test]
    fn test_rollback_reopens_row_for_readers() {
        let status = AtomicRowState::new(RowState::ReadyForRead);

        assert!(status.try_transition(RowState::ReadyForRead, RowState::Reading));
        // Stale claim: hand the row back.
        status.store(RowState::ReadyForRead, Ordering::Release);
        assert!(status.try_transition(RowState::ReadyForRead, RowState::Reading));
    }
}
