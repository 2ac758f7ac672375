//! Core data types for the activity sensing engine.
//!
//! This module defines the values that flow through the classification
//! pipeline: raw gravity-including samples coming in, linear acceleration and
//! windowed history in the middle, and the read-only snapshot going out.
//!
//! Design principle: Types should make intent obvious. If a concept exists,
//! it gets a type. Never pass raw tuples or untyped collections across boundaries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single raw accelerometer sample with gravity included.
///
/// This is the minimal input contract of the pipeline: three axes in m/s²
/// and a monotonic timestamp. It is transient and never retained beyond one
/// processing step.
///
/// Design note: We use f32 for on-device execution to save memory and battery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Monotonic timestamp in milliseconds. Required for temporal ordering.
    pub timestamp_ms: u64,

    /// Acceleration including gravity [x, y, z] in m/s².
    pub accel: [f32; 3],
}

impl RawSample {
    /// Creates a new raw sample.
    pub fn new(timestamp_ms: u64, accel: [f32; 3]) -> Self {
        Self {
            timestamp_ms,
            accel,
        }
    }

    /// Magnitude of the gravity-including vector in m/s².
    pub fn accel_magnitude(&self) -> f32 {
        magnitude(self.accel)
    }
}

/// A reading as delivered by the platform motion API.
///
/// Any axis may be missing (some browsers and devices omit values while the
/// sensor warms up). Missing values are treated as zero rather than rejected;
/// a dropped reading costs more than a slightly wrong one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceMotionReading {
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub z: Option<f32>,
    /// Platform timestamp, if the source provides one.
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
}

impl DeviceMotionReading {
    /// Reading with all three axes present and no platform timestamp.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
            timestamp_ms: None,
        }
    }

    /// Attach a platform timestamp.
    pub fn at(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// Convert to a raw sample. Missing or non-finite axes become zero and
    /// out-of-range axes are clamped to [`MAX_AXIS_ACCEL`].
    ///
    /// `fallback_ms` is used when the reading carries no timestamp of its own.
    pub fn to_raw(&self, fallback_ms: u64) -> RawSample {
        let axis = |v: Option<f32>| v.map_or(0.0, sanitize_axis);
        RawSample::new(
            self.timestamp_ms.unwrap_or(fallback_ms),
            [axis(self.x), axis(self.y), axis(self.z)],
        )
    }
}

/// Acceleration with the gravity estimate removed, in m/s².
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl LinearSample {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn from_array(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn as_array(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Euclidean norm of the linear acceleration vector.
    pub fn magnitude(&self) -> f32 {
        magnitude(self.as_array())
    }
}

/// One entry of the motion history window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryEntry {
    /// Smoothed magnitude at the time this entry was recorded (m/s²).
    pub mag: f32,
    /// Timestamp in milliseconds.
    pub time_ms: u64,
    /// Linear acceleration that produced this entry.
    pub linear: LinearSample,
}

impl HistoryEntry {
    pub fn new(mag: f32, time_ms: u64, linear: LinearSample) -> Self {
        Self {
            mag,
            time_ms,
            linear,
        }
    }
}

/// The displayed activity of a tracking session.
///
/// Exactly one state is current at any time. Behavioral states come out of
/// the classifier; `Initializing` and `Calibrating` describe session startup,
/// and the two permission states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    /// Session created, sensor not yet started.
    Initializing,
    /// Sensor running, not enough history to classify.
    Calibrating,
    /// Device is still.
    AtRest,
    /// Fidgeting, typing, handling the phone.
    LightMovement,
    Walking,
    Running,
    /// High-impact transient event.
    Jumping,
    StrenuousActivity,
    /// User refused motion sensor access. Terminal.
    PermissionDenied,
    /// The permission request itself failed. Terminal.
    PermissionError,
}

impl ActivityState {
    /// Human-readable label, as shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            ActivityState::Initializing => "Initializing...",
            ActivityState::Calibrating => "Calibrating",
            ActivityState::AtRest => "At Rest",
            ActivityState::LightMovement => "Light Movement",
            ActivityState::Walking => "Walking",
            ActivityState::Running => "Running",
            ActivityState::Jumping => "Jumping",
            ActivityState::StrenuousActivity => "Strenuous Activity",
            ActivityState::PermissionDenied => "Permission Denied",
            ActivityState::PermissionError => "Permission Error",
        }
    }

    /// Returns true for states produced by the classifier from motion data.
    pub fn is_behavioral(&self) -> bool {
        matches!(
            self,
            ActivityState::AtRest
                | ActivityState::LightMovement
                | ActivityState::Walking
                | ActivityState::Running
                | ActivityState::Jumping
                | ActivityState::StrenuousActivity
        )
    }

    /// Returns true for fast-onset states that bypass the dwell timer.
    pub fn is_escape(&self) -> bool {
        matches!(self, ActivityState::Jumping | ActivityState::Running)
    }

    /// Returns true once the session can no longer process samples.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActivityState::PermissionDenied | ActivityState::PermissionError
        )
    }

    /// Display grouping used by presentation code.
    pub fn tier(&self) -> ActivityTier {
        match self {
            ActivityState::AtRest => ActivityTier::Resting,
            ActivityState::Walking | ActivityState::LightMovement => ActivityTier::Moderate,
            ActivityState::Running | ActivityState::Jumping | ActivityState::StrenuousActivity => {
                ActivityTier::Vigorous
            }
            _ => ActivityTier::Neutral,
        }
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse grouping of activity states for styling and iconography.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityTier {
    Resting,
    Moderate,
    Vigorous,
    /// Startup and failure states.
    Neutral,
}

/// A candidate state waiting out the dwell interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransition {
    pub candidate: ActivityState,
    /// When the candidate was first seen (ms).
    pub since_ms: u64,
}

impl PendingTransition {
    pub fn new(candidate: ActivityState, since_ms: u64) -> Self {
        Self {
            candidate,
            since_ms,
        }
    }

    /// How long the candidate has been pending at `now_ms`.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.since_ms)
    }
}

/// Read-only view of a session, refreshed on every processed sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSnapshot {
    pub activity: ActivityState,
    pub step_count: u64,
    /// Smoothed linear acceleration magnitude (m/s²). Never negative.
    pub intensity: f32,
    pub linear_acceleration: LinearSample,
    /// Timestamp of the sample that produced this snapshot (0 before any sample).
    pub timestamp_ms: u64,
}

impl MotionSnapshot {
    /// Snapshot for a session that has processed nothing yet.
    pub fn idle(activity: ActivityState) -> Self {
        Self {
            activity,
            step_count: 0,
            intensity: 0.0,
            linear_acceleration: LinearSample::default(),
            timestamp_ms: 0,
        }
    }

    /// Intensity as a percentage of `full_scale`, capped at 100.
    pub fn intensity_percent(&self, full_scale: f32) -> f32 {
        if full_scale <= 0.0 {
            return 0.0;
        }
        ((self.intensity / full_scale) * 100.0).clamp(0.0, 100.0)
    }
}

impl Default for MotionSnapshot {
    fn default() -> Self {
        Self::idle(ActivityState::Initializing)
    }
}

/// Largest per-axis acceleration accepted by the pipeline (m/s², ~100 g).
///
/// Phone accelerometers saturate far below this. Anything larger is a sensor
/// fault, and squaring it would overflow f32 in the magnitude.
pub const MAX_AXIS_ACCEL: f32 = 1000.0;

/// Non-finite values become zero, finite ones are clamped to the physical range.
pub(crate) fn sanitize_axis(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(-MAX_AXIS_ACCEL, MAX_AXIS_ACCEL)
    } else {
        0.0
    }
}

/// Euclidean norm of a 3-vector.
pub(crate) fn magnitude(v: [f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}
