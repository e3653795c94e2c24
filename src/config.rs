use std::time::Duration;

/// Configuration for a row-width sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Number of producer workers per run.
    pub num_producers: usize,
    /// Number of consumer workers per run.
    pub num_consumers: usize,
    /// Total element capacity; every swept shape satisfies
    /// `rows * columns == capacity`.
    pub capacity: usize,
    /// Wall-clock window each shape runs for before being stopped.
    pub window: Duration,
}

impl RunConfig {
    /// Configuration with the given worker counts and default geometry.
    pub fn new(num_producers: usize, num_consumers: usize) -> Self {
        Self {
            num_producers,
            num_consumers,
            ..Self::default()
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_producers: 2,
            num_consumers: 2,
            capacity: 1_000_000,
            window: Duration::from_secs(5),
        }
    }
}
