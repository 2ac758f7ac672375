//! Activity classification from windowed statistics.
//!
//! Rule-based, evaluated in priority order (first match wins):
//! 1. Calibration gate: too few entries → `Calibrating`
//! 2. High-impact peaks in the window → `Jumping`
//! 3. Low mean and low spread → `AtRest`
//! 4. Ascending mean bands → `LightMovement` / `Walking` / `Running` / `StrenuousActivity`
//! 5. Anything else (non-finite statistics) → `LightMovement`
//!
//! Jumping is checked before the bands so a brief impact is not averaged into
//! `Running`. Band bounds must be strictly ascending, so exactly one band
//! matches any finite mean.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SensingError};
use crate::types::ActivityState;
use crate::window::{MotionHistory, WindowStats};

/// Thresholds for activity classification, all in m/s² of smoothed magnitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Magnitude above which an entry counts as a high-impact peak.
    pub jump_threshold: f32,
    /// High-impact entries required in the window to report `Jumping`.
    pub jump_min_peaks: usize,
    /// Mean below which the device may be at rest.
    pub rest_mean_max: f32,
    /// Standard deviation below which the device may be at rest.
    pub rest_std_max: f32,
    /// Upper bound (exclusive) of the light-movement band.
    pub light_mean_max: f32,
    /// Upper bound (exclusive) of the walking band.
    pub walking_mean_max: f32,
    /// Upper bound (exclusive) of the running band; above is strenuous.
    pub running_mean_max: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            jump_threshold: 10.0,
            jump_min_peaks: 1,
            rest_mean_max: 0.5,   // Sitting/still
            rest_std_max: 0.3,
            light_mean_max: 1.5,  // Fidgeting/typing/phone handling
            walking_mean_max: 4.0,
            running_mean_max: 8.0,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<()> {
        if self.jump_min_peaks == 0 {
            return Err(SensingError::invalid("classifier.jump_min_peaks", "must be at least 1"));
        }
        if self.rest_mean_max <= 0.0 || self.rest_std_max <= 0.0 {
            return Err(SensingError::invalid(
                "classifier.rest_mean_max",
                "rest cutoffs must be positive",
            ));
        }
        let bounds = [
            self.rest_mean_max,
            self.light_mean_max,
            self.walking_mean_max,
            self.running_mean_max,
            self.jump_threshold,
        ];
        if bounds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(SensingError::invalid(
                "classifier",
                format!("band bounds must be strictly ascending, got {:?}", bounds),
            ));
        }
        Ok(())
    }
}

/// Maps window statistics to an activity state.
#[derive(Debug, Clone)]
pub struct ActivityClassifier {
    config: ClassifierConfig,
    min_fill: usize,
}

impl ActivityClassifier {
    pub fn new(config: ClassifierConfig, min_fill: usize) -> Self {
        Self { config, min_fill }
    }

    /// Classify the current window.
    pub fn classify(&self, history: &MotionHistory, stats: &WindowStats) -> ActivityState {
        if history.len() < self.min_fill {
            return ActivityState::Calibrating;
        }
        let high_impact = history.count_above(self.config.jump_threshold);
        self.classify_stats(stats.mean, stats.std_dev, high_impact)
    }

    /// Tiered decision on raw statistics. Does not apply the calibration gate.
    pub fn classify_stats(
        &self,
        mean: f32,
        std_dev: f32,
        high_impact_count: usize,
    ) -> ActivityState {
        let c = &self.config;

        if high_impact_count >= c.jump_min_peaks {
            return ActivityState::Jumping;
        }
        if mean < c.rest_mean_max && std_dev < c.rest_std_max {
            return ActivityState::AtRest;
        }
        if mean < c.light_mean_max {
            ActivityState::LightMovement
        } else if mean < c.walking_mean_max {
            ActivityState::Walking
        } else if mean < c.running_mean_max {
            ActivityState::Running
        } else if mean >= c.running_mean_max {
            ActivityState::StrenuousActivity
        } else {
            ActivityState::LightMovement
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }
}
