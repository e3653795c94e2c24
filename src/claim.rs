use crate::buffer::RowBuffer;
use crate::invariants::debug_assert_map_owned;
use crate::Message;

/// A row claimed for writing.
///
/// Returned by [`RowBuffer::claim_producer`]; carries the ring index and
/// the pass the row was claimed for, and exposes the row's elements as a
/// slice. The slice is valid only while the guard lives; [`commit`]
/// performs the `Writing → ReadyForRead` release, publishing the written
/// elements to the consumer side.
///
/// Dropping the guard without committing leaves the row claimed - other
/// workers will never see it turn over. That is only acceptable while the
/// buffer is being stopped (`stop()` force-releases every row).
///
/// [`commit`]: WriteRow::commit
pub struct WriteRow<'a, M: Message> {
    buffer: &'a RowBuffer<M>,
    loc: usize,
    abs: u64,
}

impl<'a, M: Message> WriteRow<'a, M> {
    pub(crate) fn new(buffer: &'a RowBuffer<M>, loc: usize, abs: u64) -> Self {
        Self { buffer, loc, abs }
    }

    /// Ring index of the claimed row.
    #[inline]
    pub fn loc(&self) -> usize {
        self.loc
    }

    /// The pass this row was claimed for; the element at column `j` is the
    /// absolute position `abs * columns + j`.
    #[inline]
    pub fn abs(&self) -> u64 {
        self.abs
    }

    /// Elements per row.
    #[inline]
    pub fn columns(&self) -> usize {
        self.buffer.columns()
    }

    /// The claimed row's elements, for writing.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [M] {
        // SAFETY: this guard holds the Writing claim on `loc`; the FSM
        // keeps every other worker away from the row until commit().
        unsafe { self.buffer.row_mut(self.loc) }
    }

    /// Releases the row to the consumer side.
    pub fn commit(self) {
        debug_assert_map_owned!(
            self.buffer.map_entry(self.loc),
            self.abs,
            self.buffer.is_stopped()
        );
        self.buffer.release_producer(self.loc);
    }
}

/// A row claimed for reading.
///
/// Returned by [`RowBuffer::claim_consumer`]; the elements are guaranteed
/// to be the ones produced for [`abs`](ReadRow::abs). [`commit`]
/// performs the `Reading → ReadyForWrite` release, handing the row back to
/// the producer side.
///
/// [`commit`]: ReadRow::commit
pub struct ReadRow<'a, M: Message> {
    buffer: &'a RowBuffer<M>,
    loc: usize,
    abs: u64,
}

impl<'a, M: Message> ReadRow<'a, M> {
    pub(crate) fn new(buffer: &'a RowBuffer<M>, loc: usize, abs: u64) -> Self {
        Self { buffer, loc, abs }
    }

    /// Ring index of the claimed row.
    #[inline]
    pub fn loc(&self) -> usize {
        self.loc
    }

    /// The pass this row was claimed for.
    #[inline]
    pub fn abs(&self) -> u64 {
        self.abs
    }

    /// Elements per row.
    #[inline]
    pub fn columns(&self) -> usize {
        self.buffer.columns()
    }

    /// The claimed row's elements.
    #[inline]
    pub fn as_slice(&self) -> &[M] {
        // SAFETY: this guard holds the Reading claim on `loc`.
        unsafe { self.buffer.row(self.loc) }
    }

    /// The claimed row's elements, mutably. Consumers use this to blank
    /// consumed elements for debug inspection.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [M] {
        // SAFETY: this guard holds the Reading claim on `loc`.
        unsafe { self.buffer.row_mut(self.loc) }
    }

    /// Hands the row back to the producer side.
    pub fn commit(self) {
        debug_assert_map_owned!(
            self.buffer.map_entry(self.loc),
            self.abs,
            self.buffer.is_stopped()
        );
        self.buffer.release_consumer(self.loc);
    }
}
