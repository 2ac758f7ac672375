//! Per-session activity tracking pipeline.
//!
//! This module wires the processing stages together for one tracking
//! session. Data flows one way for every sample:
//!
//! 1. **Signal Processing**: gravity separation, magnitude smoothing
//! 2. **History Window**: push, evict, statistics
//! 3. **Step Detection**: peak + refractory + variance gate
//! 4. **Classification**: tiered bands over window statistics
//! 5. **Debounce**: dwell-time commit with escape hatch
//!
//! All session state lives in one owned [`ActivityTracker`]. There are no
//! globals, so independent sessions never share anything. Processing is O(C)
//! per sample for window capacity C, with no allocation after construction.

use tracing::{info, trace, warn};

use crate::classifier::ActivityClassifier;
use crate::config::TrackerConfig;
use crate::debounce::StateDebouncer;
use crate::error::Result;
use crate::signal::SignalProcessor;
use crate::step_detection::{StepDetector, StepEvent};
use crate::types::{ActivityState, HistoryEntry, LinearSample, MotionSnapshot, RawSample};
use crate::window::MotionHistory;

/// Everything produced by one processed sample.
#[derive(Debug, Clone, Copy)]
pub struct SampleOutcome {
    pub snapshot: MotionSnapshot,
    /// Raw classifier output before debouncing.
    pub candidate: ActivityState,
    pub step: Option<StepEvent>,
    /// True if the displayed activity changed on this sample.
    pub activity_changed: bool,
}

/// Owns all state of one tracking session.
pub struct ActivityTracker {
    config: TrackerConfig,

    // Processing stages
    signal: SignalProcessor,
    history: MotionHistory,
    steps: StepDetector,
    classifier: ActivityClassifier,
    debouncer: StateDebouncer,

    last_linear: LinearSample,
    last_timestamp_ms: u64,
    samples_processed: u64,
}

impl ActivityTracker {
    /// Creates a tracker in the `Initializing` state.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            signal: SignalProcessor::with_config(&config.filter),
            history: MotionHistory::new(config.window.capacity),
            steps: StepDetector::new(config.step.clone()),
            classifier: ActivityClassifier::new(config.classifier.clone(), config.window.min_fill),
            debouncer: StateDebouncer::new(config.debounce.clone()),
            config,
            last_linear: LinearSample::default(),
            last_timestamp_ms: 0,
            samples_processed: 0,
        })
    }

    /// Begin a session: reset all state and move to `Calibrating`.
    ///
    /// Calling this again restarts the session from scratch, including the
    /// step count and the gravity seed.
    pub fn begin(&mut self) {
        self.reset_state();
        self.debouncer.force(ActivityState::Calibrating);
        info!("tracking session started");
    }

    /// End the session in a terminal permission state.
    pub fn fail(&mut self, state: ActivityState) {
        self.reset_state();
        self.debouncer.force(state);
        warn!(state = %state, "tracking session failed");
    }

    /// Whether samples are currently accepted.
    pub fn is_active(&self) -> bool {
        let current = self.debouncer.current();
        !current.is_terminal() && current != ActivityState::Initializing
    }

    /// Process a single raw sample through the entire pipeline.
    ///
    /// Returns `None` if the session has not begun or has failed; such samples
    /// are dropped without touching any state.
    pub fn process_sample(&mut self, sample: &RawSample) -> Option<SampleOutcome> {
        if !self.is_active() {
            trace!(t = sample.timestamp_ms, "sample dropped, session inactive");
            return None;
        }
        let now_ms = sample.timestamp_ms;

        // Stage 1: Signal Processing
        let processed = self.signal.process_sample(sample);

        // Stage 2: History Window
        self.history.push(HistoryEntry::new(
            processed.smoothed_magnitude,
            now_ms,
            processed.linear,
        ));
        let stats = self.history.stats();

        // Stage 3: Step Detection
        let step = self.steps.process(&self.history, stats.std_dev, now_ms);

        // Stage 4: Classification
        let candidate = self.classifier.classify(&self.history, &stats);

        // Stage 5: Debounce
        let activity_changed = self.debouncer.observe(candidate, now_ms);

        self.last_linear = processed.linear;
        self.last_timestamp_ms = now_ms;
        self.samples_processed += 1;

        Some(SampleOutcome {
            snapshot: self.snapshot(),
            candidate,
            step,
            activity_changed,
        })
    }

    /// Current read-only view of the session.
    pub fn snapshot(&self) -> MotionSnapshot {
        MotionSnapshot {
            activity: self.debouncer.current(),
            step_count: self.steps.total_steps(),
            intensity: self.signal.smoothed_magnitude(),
            linear_acceleration: self.last_linear,
            timestamp_ms: self.last_timestamp_ms,
        }
    }

    pub fn activity(&self) -> ActivityState {
        self.debouncer.current()
    }

    pub fn step_count(&self) -> u64 {
        self.steps.total_steps()
    }

    /// Steps per second over recent steps (0 when idle).
    pub fn cadence_hz(&self) -> f32 {
        self.steps.current_cadence()
    }

    /// Returns the total sample count processed this session.
    pub fn samples_processed(&self) -> u64 {
        self.samples_processed
    }

    pub fn history(&self) -> &MotionHistory {
        &self.history
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn reset_state(&mut self) {
        self.signal.reset();
        self.history.clear();
        self.steps.reset();
        self.debouncer.reset();
        self.last_linear = LinearSample::default();
        self.last_timestamp_ms = 0;
        self.samples_processed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> ActivityTracker {
        ActivityTracker::new(TrackerConfig::default()).unwrap()
    }

    #[test]
    fn test_tracker_creation() {
        let tracker = tracker();
        assert_eq!(tracker.activity(), ActivityState::Initializing);
        assert_eq!(tracker.step_count(), 0);
        assert_eq!(tracker.samples_processed(), 0);
        assert!(!tracker.is_active());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = TrackerConfig::default();
        config.window.capacity = 0;
        assert!(ActivityTracker::new(config).is_err());
    }

    #[test]
    fn test_samples_ignored_before_begin() {
        let mut tracker = tracker();
        assert!(tracker.process_sample(&RawSample::new(0, [0.0, 0.0, 9.81])).is_none());
        assert_eq!(tracker.samples_processed(), 0);
    }

    #[test]
    fn test_first_sample_has_zero_linear_acceleration() {
        let mut tracker = tracker();
        tracker.begin();

        let outcome = tracker
            .process_sample(&RawSample::new(0, [1.2, -3.4, 8.7]))
            .unwrap();

        assert_eq!(outcome.snapshot.linear_acceleration, LinearSample::new(0.0, 0.0, 0.0));
        assert_eq!(outcome.snapshot.intensity, 0.0);
        assert_eq!(outcome.candidate, ActivityState::Calibrating);
    }

    #[test]
    fn test_failed_session_drops_samples() {
        let mut tracker = tracker();
        tracker.fail(ActivityState::PermissionDenied);

        for i in 0..20 {
            assert!(tracker.process_sample(&RawSample::new(i * 16, [0.0, 0.0, 9.81])).is_none());
        }
        assert_eq!(tracker.activity(), ActivityState::PermissionDenied);
        assert_eq!(tracker.step_count(), 0);
    }

    #[test]
    fn test_begin_resets_session() {
        let mut tracker = tracker();
        tracker.begin();
        for i in 0..40u64 {
            tracker.process_sample(&RawSample::new(i * 16, [0.0, 0.0, 9.81]));
        }
        assert_eq!(tracker.history().len(), 30);

        tracker.begin();
        assert_eq!(tracker.activity(), ActivityState::Calibrating);
        assert_eq!(tracker.history().len(), 0);
        assert_eq!(tracker.samples_processed(), 0);
        assert_eq!(tracker.snapshot(), MotionSnapshot::idle(ActivityState::Calibrating));
    }
}
