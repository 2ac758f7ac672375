//! Tracker configuration.
//!
//! Bundles all sub-component configurations into a single package that can
//! be loaded from TOML. Every section is optional; missing values fall back
//! to the defaults tuned for ~60Hz phone motion events.
//!
//! ```toml
//! [filter]
//! gravity_alpha = 0.95
//!
//! [step.peak_threshold]
//! mode = "adaptive"
//! floor = 1.5
//! factor = 2.5
//!
//! [debounce]
//! stable_ms = 600
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::ClassifierConfig;
use crate::debounce::DebounceConfig;
use crate::error::{Result, SensingError};
use crate::signal::FilterConfig;
use crate::step_detection::StepDetectorConfig;
use crate::window::WindowConfig;

/// Configuration for one tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Gravity separation and magnitude smoothing.
    pub filter: FilterConfig,
    /// History window size and calibration gate.
    pub window: WindowConfig,
    /// Step peak detection.
    pub step: StepDetectorConfig,
    /// Activity band thresholds.
    pub classifier: ClassifierConfig,
    /// Dwell time before committing a new activity.
    pub debounce: DebounceConfig,
    /// Buffered readings between the sensor source and the session.
    pub reading_buffer: usize,
    /// Intensity (m/s²) shown as 100% by presentation code.
    pub intensity_full_scale: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            window: WindowConfig::default(),
            step: StepDetectorConfig::default(),
            classifier: ClassifierConfig::default(),
            debounce: DebounceConfig::default(),
            reading_buffer: 256,
            intensity_full_scale: 8.0,
        }
    }
}

impl TrackerConfig {
    /// Check every section for out-of-range or inconsistent values.
    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;
        self.window.validate()?;
        self.step.validate()?;
        self.classifier.validate()?;
        self.debounce.validate()?;
        if self.reading_buffer == 0 {
            return Err(SensingError::invalid("reading_buffer", "must be at least 1"));
        }
        if self.intensity_full_scale <= 0.0 {
            return Err(SensingError::invalid("intensity_full_scale", "must be positive"));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TrackerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!(?path, "Loaded tracker config");
        Ok(config)
    }
}
