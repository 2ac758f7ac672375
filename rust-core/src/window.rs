//! Bounded motion history.
//!
//! A fixed-capacity FIFO of recent smoothed samples. Both the step detector
//! and the activity classifier read their statistics from here.
//!
//! Invariants:
//! - `len() <= capacity()` at all times
//! - iteration order == insertion order == time order

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SensingError};
use crate::types::HistoryEntry;

/// Configuration for the motion history window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Maximum number of entries. Typical: 25-40 (~0.5s at 60Hz).
    pub capacity: usize,

    /// Entries required before the classifier commits to a behavioral state.
    /// Statistics over fewer samples are not trusted. Typical: 10-12.
    pub min_fill: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            capacity: 30,
            min_fill: 10,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(SensingError::invalid("window.capacity", "must be at least 1"));
        }
        if self.min_fill == 0 || self.min_fill > self.capacity {
            return Err(SensingError::invalid(
                "window.min_fill",
                format!("must be in 1..={}, got {}", self.capacity, self.min_fill),
            ));
        }
        Ok(())
    }
}

/// Summary statistics of the magnitudes currently in the window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowStats {
    /// Number of entries the statistics were computed from.
    pub count: usize,
    /// Mean smoothed magnitude.
    pub mean: f32,
    /// Population standard deviation of the smoothed magnitude.
    pub std_dev: f32,
}

/// Fixed-capacity, time-ordered ring of history entries.
#[derive(Debug, Clone)]
pub struct MotionHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl MotionHistory {
    /// Create an empty history. A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest if the window is over capacity.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.entries.iter()
    }

    /// The most recent entry.
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Mean of the `mag` field (0 when empty).
    pub fn mean(&self) -> f32 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.entries.iter().map(|e| e.mag).sum::<f32>() / self.entries.len() as f32
    }

    /// Population standard deviation of the `mag` field (0 when empty).
    pub fn std_dev(&self) -> f32 {
        self.stats().std_dev
    }

    /// Count of entries whose magnitude exceeds `threshold`.
    pub fn count_above(&self, threshold: f32) -> usize {
        self.entries.iter().filter(|e| e.mag > threshold).count()
    }

    /// Compute mean and population std-dev in two passes.
    pub fn stats(&self) -> WindowStats {
        let n = self.entries.len();
        if n == 0 {
            return WindowStats::default();
        }

        let mean = self.mean();
        let mut sum_sq_dev = 0.0;
        for entry in &self.entries {
            let dev = entry.mag - mean;
            sum_sq_dev += dev * dev;
        }

        WindowStats {
            count: n,
            mean,
            std_dev: (sum_sq_dev / n as f32).sqrt(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
