//! Signal filtering and gravity separation.
//!
//! This module provides the low-level per-sample processing:
//! - Gravity vector estimation using incremental low-pass filtering
//! - Linear acceleration extraction (raw minus gravity)
//! - Exponential smoothing of the linear acceleration magnitude
//!
//! Design note: All filters use incremental updates (O(1) per sample).
//! No batch processing, no allocations in hot paths.
//!
//! The gravity filter is seeded with the first sample of a session instead of
//! a nominal "down" vector. Starting from a fixed vector makes the first second
//! of output a decaying spike whose size depends on how the phone is held, and
//! the classifier reads that spike as a jump.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Result, SensingError};
use crate::types::{sanitize_axis, LinearSample, RawSample};

/// Parameters for signal filtering.
///
/// Tuned for browser/phone motion events (~60Hz).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Retention factor of the gravity low-pass filter.
    /// `g = α·g + (1-α)·raw`. Range: (0.0, 1.0). Typical: 0.92-0.98.
    /// Higher = more stable, slower to follow device reorientation.
    pub gravity_alpha: f32,

    /// Weight of the newest magnitude in the intensity smoother.
    /// `s = β·mag + (1-β)·s`. Range: (0.0, 1.0). Typical: 0.15-0.2.
    pub magnitude_beta: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            gravity_alpha: 0.92,
            magnitude_beta: 0.2,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.gravity_alpha > 0.0 && self.gravity_alpha < 1.0) {
            return Err(SensingError::invalid(
                "filter.gravity_alpha",
                format!("must be in (0, 1), got {}", self.gravity_alpha),
            ));
        }
        if !(self.magnitude_beta > 0.0 && self.magnitude_beta < 1.0) {
            return Err(SensingError::invalid(
                "filter.magnitude_beta",
                format!("must be in (0, 1), got {}", self.magnitude_beta),
            ));
        }
        Ok(())
    }
}

/// Running per-axis gravity estimate.
///
/// Maintains incremental state for O(1) updates. No history buffer needed.
#[derive(Debug, Clone)]
pub struct GravitySeparator {
    /// Current estimated gravity vector [x, y, z] in m/s².
    gravity: [f32; 3],
    alpha: f32,
    initialized: bool,
}

impl GravitySeparator {
    pub fn new(alpha: f32) -> Self {
        Self {
            gravity: [0.0; 3],
            alpha,
            initialized: false,
        }
    }

    /// Update the estimate with a raw sample and return linear acceleration.
    ///
    /// The first sample after construction or `reset` becomes the estimate
    /// verbatim, so its linear output is exactly zero. Axes are clamped to
    /// the physical range first; non-finite axes count as zero.
    pub fn separate(&mut self, accel: [f32; 3]) -> LinearSample {
        let accel = accel.map(sanitize_axis);
        if !self.initialized {
            self.gravity = accel;
            self.initialized = true;
        } else {
            let alpha = self.alpha;
            for (g, raw) in self.gravity.iter_mut().zip(accel) {
                *g = alpha * *g + (1.0 - alpha) * raw;
            }
        }

        LinearSample::new(
            accel[0] - self.gravity[0],
            accel[1] - self.gravity[1],
            accel[2] - self.gravity[2],
        )
    }

    /// Get the current gravity estimate.
    pub fn gravity(&self) -> [f32; 3] {
        self.gravity
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Forget the estimate; the next sample re-seeds it.
    pub fn reset(&mut self) {
        self.gravity = [0.0; 3];
        self.initialized = false;
    }
}

/// Exponential smoother for the linear acceleration magnitude.
#[derive(Debug, Clone)]
pub struct MagnitudeSmoother {
    beta: f32,
    smoothed: f32,
}

impl MagnitudeSmoother {
    pub fn new(beta: f32) -> Self {
        Self {
            beta,
            smoothed: 0.0,
        }
    }

    /// Fold in a new linear sample and return the smoothed magnitude.
    ///
    /// A non-finite magnitude is skipped so it cannot stick in the average.
    pub fn update(&mut self, linear: &LinearSample) -> f32 {
        let mag = linear.magnitude();
        if !mag.is_finite() {
            return self.smoothed;
        }
        self.smoothed = self.beta * mag + (1.0 - self.beta) * self.smoothed;
        self.smoothed
    }

    pub fn value(&self) -> f32 {
        self.smoothed
    }

    pub fn reset(&mut self) {
        self.smoothed = 0.0;
    }
}

/// Gravity separation followed by magnitude smoothing.
///
/// This is the hot-path component. Must be O(1) per sample with minimal overhead.
#[derive(Debug, Clone)]
pub struct SignalProcessor {
    gravity: GravitySeparator,
    smoother: MagnitudeSmoother,
}

impl SignalProcessor {
    /// Create a new signal processor with default configuration.
    pub fn new() -> Self {
        Self::with_config(&FilterConfig::default())
    }

    pub fn with_config(config: &FilterConfig) -> Self {
        Self {
            gravity: GravitySeparator::new(config.gravity_alpha),
            smoother: MagnitudeSmoother::new(config.magnitude_beta),
        }
    }

    /// Process a single raw sample.
    pub fn process_sample(&mut self, sample: &RawSample) -> ProcessedSample {
        let linear = self.gravity.separate(sample.accel);
        let smoothed_magnitude = self.smoother.update(&linear);

        trace!(
            t = sample.timestamp_ms,
            mag = smoothed_magnitude,
            "signal processed"
        );

        ProcessedSample {
            linear,
            smoothed_magnitude,
        }
    }

    /// Get the gravity separator for diagnostics.
    pub fn gravity_separator(&self) -> &GravitySeparator {
        &self.gravity
    }

    pub fn smoothed_magnitude(&self) -> f32 {
        self.smoother.value()
    }

    pub fn reset(&mut self) {
        self.gravity.reset();
        self.smoother.reset();
    }
}

impl Default for SignalProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// A raw sample after gravity separation and smoothing.
#[derive(Debug, Clone, Copy)]
pub struct ProcessedSample {
    /// Linear acceleration (gravity removed) in m/s².
    pub linear: LinearSample,
    /// Smoothed magnitude of linear acceleration in m/s².
    pub smoothed_magnitude: f32,
}
