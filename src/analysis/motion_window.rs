// src/analysis/motion_window.rs
//
// Bounded history windows feeding the gesture classifier.

use super::robust_stats::{consistent_sign, median};
use std::collections::VecDeque;

/// Last `capacity` flow samples of one axis
#[derive(Debug, Clone)]
pub struct FlowWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl FlowWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Median of the window, 0 when empty
    pub fn median(&self) -> f32 {
        let values: Vec<f32> = self.samples.iter().copied().collect();
        median(&values)
    }

    pub fn consistent(&self, min_count: usize) -> bool {
        consistent_sign(&self.samples, min_count)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Timestamped samples within a sliding time window.
///
/// Entries older than `window_ms` relative to the newest push are evicted;
/// `capacity` caps memory if timestamps stall.
#[derive(Debug, Clone)]
pub struct PathWindow {
    samples: VecDeque<(f64, f32)>,
    window_ms: f64,
    capacity: usize,
}

impl PathWindow {
    pub fn new(window_ms: f64, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            window_ms,
            capacity,
        }
    }

    pub fn push(&mut self, timestamp_ms: f64, value: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back((timestamp_ms, value));
        while let Some(&(t, _)) = self.samples.front() {
            if timestamp_ms - t > self.window_ms {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Sum of the strictly positive samples still in the window
    pub fn positive_sum(&self) -> f32 {
        self.samples
            .iter()
            .map(|&(_, v)| v)
            .filter(|v| *v > 0.0)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_window_keeps_last_four() {
        let mut w = FlowWindow::new(4);
        for v in [100.0, 1.0, 2.0, 3.0, 4.0] {
            w.push(v);
        }
        assert_eq!(w.len(), 4);
        assert_eq!(w.median(), 2.5);
        assert!(w.consistent(4));
        w.push(-1.0);
        assert!(!w.consistent(4));
    }

    #[test]
    fn test_path_window_evicts_by_time() {
        let mut w = PathWindow::new(250.0, 24);
        w.push(0.0, 1.0);
        w.push(100.0, -2.0);
        w.push(200.0, 0.5);
        assert_eq!(w.positive_sum(), 1.5);
        // 0 ms sample is now 260 ms old
        w.push(260.0, 0.25);
        assert_eq!(w.len(), 3);
        assert_eq!(w.positive_sum(), 0.75);
    }

    #[test]
    fn test_path_window_capacity_bound() {
        let mut w = PathWindow::new(10_000.0, 3);
        for i in 0..10 {
            w.push(i as f64, 1.0);
        }
        assert_eq!(w.len(), 3);
    }
}
