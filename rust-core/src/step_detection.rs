//! Step detection over the motion history window.
//!
//! A step is counted when the newest smoothed magnitude crosses a peak
//! threshold, the refractory interval since the previous step has elapsed, and
//! the window shows enough variance to be a gait signal rather than a flat
//! offset (a phone lying on a washing machine has high magnitude but almost no
//! spread).
//!
//! Cadence is estimated from the intervals between recent steps and resets
//! when the user stops long enough.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SensingError};
use crate::window::MotionHistory;

/// How the peak threshold is derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PeakThreshold {
    /// Constant threshold in m/s².
    Fixed { value: f32 },
    /// `max(floor, std_dev * factor)`, tolerating different noise regimes.
    Adaptive { floor: f32, factor: f32 },
}

impl PeakThreshold {
    /// Resolve the threshold for a window with the given standard deviation.
    pub fn resolve(&self, std_dev: f32) -> f32 {
        match *self {
            PeakThreshold::Fixed { value } => value,
            PeakThreshold::Adaptive { floor, factor } => floor.max(std_dev * factor),
        }
    }
}

/// Configuration for step detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepDetectorConfig {
    pub peak_threshold: PeakThreshold,
    /// Minimum time between steps in milliseconds (prevents double-counting).
    pub refractory_ms: u64,
    /// Minimum window standard deviation for a peak to count.
    pub min_std_dev: f32,
    /// Gap after which cadence history is discarded (user stopped walking).
    pub max_step_interval_ms: u64,
}

impl Default for StepDetectorConfig {
    fn default() -> Self {
        Self {
            peak_threshold: PeakThreshold::Fixed { value: 1.5 },
            refractory_ms: 350,       // Max ~2.9 steps/sec
            min_std_dev: 0.5,
            max_step_interval_ms: 2000,
        }
    }
}

impl StepDetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.refractory_ms == 0 {
            return Err(SensingError::invalid("step.refractory_ms", "must be positive"));
        }
        if self.min_std_dev < 0.0 {
            return Err(SensingError::invalid("step.min_std_dev", "must not be negative"));
        }
        match self.peak_threshold {
            PeakThreshold::Fixed { value } if value <= 0.0 => Err(SensingError::invalid(
                "step.peak_threshold.value",
                "must be positive",
            )),
            PeakThreshold::Adaptive { floor, factor } if floor <= 0.0 || factor <= 0.0 => {
                Err(SensingError::invalid(
                    "step.peak_threshold",
                    "floor and factor must be positive",
                ))
            }
            _ => Ok(()),
        }
    }
}

/// A counted step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEvent {
    pub timestamp_ms: u64,
    /// Running step count including this one.
    pub step_number: u64,
    /// Smoothed magnitude that triggered the step.
    pub peak_magnitude: f32,
    /// Threshold in force at detection time.
    pub threshold: f32,
}

/// Peak detector with refractory period and variance gate.
pub struct StepDetector {
    config: StepDetectorConfig,
    total_steps: u64,
    last_peak_ms: Option<u64>,
    intervals: VecDeque<u64>,
    current_cadence_hz: f32,
}

impl StepDetector {
    const CADENCE_INTERVALS: usize = 8;

    pub fn new(config: StepDetectorConfig) -> Self {
        Self {
            config,
            total_steps: 0,
            last_peak_ms: None,
            intervals: VecDeque::with_capacity(Self::CADENCE_INTERVALS),
            current_cadence_hz: 0.0,
        }
    }

    /// Inspect the window after a new entry was pushed.
    ///
    /// `std_dev` is the window's population standard deviation, passed in so
    /// the statistics are computed once per sample.
    /// Non-finite magnitudes or deviations never count as a step.
    pub fn process(
        &mut self,
        history: &MotionHistory,
        std_dev: f32,
        now_ms: u64,
    ) -> Option<StepEvent> {
        let latest = history.latest()?;
        let threshold = self.config.peak_threshold.resolve(std_dev);

        if !(latest.mag.is_finite() && latest.mag > threshold) {
            return None;
        }
        if let Some(last) = self.last_peak_ms {
            if now_ms.saturating_sub(last) < self.config.refractory_ms {
                return None;
            }
        }
        if !(std_dev.is_finite() && std_dev > self.config.min_std_dev) {
            return None;
        }

        self.record_step(now_ms);

        debug!(
            step = self.total_steps,
            mag = latest.mag,
            threshold,
            "step counted"
        );

        Some(StepEvent {
            timestamp_ms: now_ms,
            step_number: self.total_steps,
            peak_magnitude: latest.mag,
            threshold,
        })
    }

    /// Get the total number of steps detected.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn last_peak_ms(&self) -> Option<u64> {
        self.last_peak_ms
    }

    /// Get the current estimated cadence in steps per second.
    pub fn current_cadence(&self) -> f32 {
        self.current_cadence_hz
    }

    /// Reset for a new session. The step count returns to zero.
    pub fn reset(&mut self) {
        self.total_steps = 0;
        self.last_peak_ms = None;
        self.intervals.clear();
        self.current_cadence_hz = 0.0;
    }

    // =========================================================================
    // PRIVATE METHODS
    // =========================================================================

    fn record_step(&mut self, now_ms: u64) {
        if let Some(last) = self.last_peak_ms {
            let interval = now_ms.saturating_sub(last);
            if interval > self.config.max_step_interval_ms {
                self.intervals.clear();
            } else {
                self.intervals.push_back(interval);
                if self.intervals.len() > Self::CADENCE_INTERVALS {
                    self.intervals.pop_front();
                }
            }
        }

        self.total_steps += 1;
        self.last_peak_ms = Some(now_ms);
        self.update_cadence();
    }

    fn update_cadence(&mut self) {
        if self.intervals.is_empty() {
            self.current_cadence_hz = 0.0;
            return;
        }

        let sum: u64 = self.intervals.iter().sum();
        let avg_interval_ms = sum as f32 / self.intervals.len() as f32;
        if avg_interval_ms > 0.0 {
            self.current_cadence_hz = 1000.0 / avg_interval_ms;
        }
    }
}

impl Default for StepDetector {
    fn default() -> Self {
        Self::new(StepDetectorConfig::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================
