//! Sliding window of recent request outcomes
//!
//! Holds the effective status of the last `capacity` requests in arrival order
//! and derives the upstream error rate from them.

use std::collections::VecDeque;

/// Lowest status counted as an error
pub const ERROR_STATUS_FLOOR: i64 = 500;

/// Bounded FIFO buffer of effective statuses
///
/// The window never holds more than `capacity` outcomes; once full, every push
/// evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    outcomes: VecDeque<i64>,
    capacity: usize,
}

impl SlidingWindow {
    /// Create an empty window
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of outcomes to keep (values below 1 are raised to 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an outcome, evicting the oldest one if the window is full
    pub fn push(&mut self, outcome: i64) {
        self.outcomes.push_back(outcome);
        while self.outcomes.len() > self.capacity {
            self.outcomes.pop_front();
        }
    }

    /// Number of outcomes counted as errors (status >= 500)
    pub fn error_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|&&outcome| outcome >= ERROR_STATUS_FLOOR)
            .count()
    }

    /// Percentage of errors in the window, `0.0` when empty
    pub fn error_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        100.0 * self.error_count() as f64 / self.outcomes.len() as f64
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Outcomes from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &i64> {
        self.outcomes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window() {
        let window = SlidingWindow::new(10);
        assert!(window.is_empty());
        assert_eq!(window.len(), 0);
        assert_eq!(window.error_rate(), 0.0);
        assert_eq!(window.error_count(), 0);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let mut window = SlidingWindow::new(0);
        assert_eq!(window.capacity(), 1);
        window.push(200);
        window.push(500);
        assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![500]);
    }

    #[test]
    fn test_eviction_is_fifo() {
        let mut window = SlidingWindow::new(3);
        for outcome in [200, 201, 202, 203, 204] {
            window.push(outcome);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![202, 203, 204]);
    }

    #[test]
    fn test_error_rate_all_success() {
        let mut window = SlidingWindow::new(10);
        for outcome in [200, 301, 404, 499] {
            window.push(outcome);
        }
        assert_eq!(window.error_rate(), 0.0);
    }

    #[test]
    fn test_error_rate_mixed() {
        let mut window = SlidingWindow::new(4);
        window.push(200);
        window.push(500);
        window.push(502);
        window.push(200);
        assert_eq!(window.error_count(), 2);
        assert_eq!(window.error_rate(), 50.0);

        // evicts the leading 200
        window.push(503);
        assert_eq!(window.error_count(), 3);
        assert_eq!(window.error_rate(), 75.0);
    }

    #[test]
    fn test_zero_status_is_not_an_error() {
        let mut window = SlidingWindow::new(2);
        window.push(0);
        window.push(0);
        assert_eq!(window.error_rate(), 0.0);
    }
}
