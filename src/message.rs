use std::cmp::Ordering;

/// Payload stored in the buffer.
///
/// The buffer itself never inspects values; the index view exists for the
/// workers' verifier, which checks that the value consumed at absolute
/// element position `x` was in fact produced for `x`. Implementations must
/// round-trip: `Self::from_index(i).index() == i`.
pub trait Message: Clone + Default + PartialEq + Send + 'static {
    /// Builds the value the producer writes at absolute element position
    /// `index`.
    fn from_index(index: u64) -> Self;

    /// The absolute element position this value was produced for.
    fn index(&self) -> u64;
}

/// Numeric identity payload: the value is its own index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeqMessage(u64);

impl SeqMessage {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl Message for SeqMessage {
    #[inline]
    fn from_index(index: u64) -> Self {
        Self(index)
    }

    #[inline]
    fn index(&self) -> u64 {
        self.0
    }
}

/// Decimal-text payload: `"255903"` is the value produced for index 255903.
///
/// The index is kept alongside the text so the verifier does not re-parse
/// on every element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    text: String,
    index: u64,
}

impl TextMessage {
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Default for TextMessage {
    fn default() -> Self {
        Self::from_index(0)
    }
}

impl Message for TextMessage {
    fn from_index(index: u64) -> Self {
        Self {
            text: index.to_string(),
            index,
        }
    }

    #[inline]
    fn index(&self) -> u64 {
        self.index
    }
}

// Ordering over the index, like the numeric payload.
impl PartialOrd for TextMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TextMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}
