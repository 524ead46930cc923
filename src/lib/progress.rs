//! Periodic progress logging.

use log::info;

/// Default number of records between progress messages.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1_000_000;

/// Logs a message each time a running count crosses a multiple of the interval.
///
/// # Example
/// ```
/// use cfdedup_lib::progress::ProgressTracker;
///
/// let mut tracker = ProgressTracker::new("Read records").with_interval(100);
/// for _ in 0..250 {
///     tracker.add(1); // logs at 100 and 200
/// }
/// tracker.finish(); // logs "Read records 250 (complete)"
/// assert_eq!(tracker.count(), 250);
/// ```
#[derive(Debug)]
pub struct ProgressTracker {
    message: String,
    interval: u64,
    count: u64,
}

impl ProgressTracker {
    /// Creates a tracker logging every [`DEFAULT_PROGRESS_INTERVAL`] items.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), interval: DEFAULT_PROGRESS_INTERVAL, count: 0 }
    }

    /// Sets the logging interval; zero is treated as one.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Adds to the count, logging once per interval boundary crossed.
    pub fn add(&mut self, additional: u64) {
        let previous = self.count;
        self.count += additional;
        for milestone in (previous / self.interval + 1)..=(self.count / self.interval) {
            info!("{} {}", self.message, crate::logging::format_count(milestone * self.interval));
        }
    }

    /// Logs the final count unless it was just logged as a milestone.
    pub fn finish(&self) {
        if self.count > 0 && !self.count.is_multiple_of(self.interval) {
            info!("{} {} (complete)", self.message, crate::logging::format_count(self.count));
        }
    }

    /// Items counted so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }
}
