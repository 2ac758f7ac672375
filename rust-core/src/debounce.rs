//! Debounced activity state.
//!
//! A freshly classified candidate only becomes the displayed activity after it
//! has been seen continuously for the dwell interval. Fast-onset states
//! (`Jumping`, `Running`) skip the wait, otherwise a short burst would be over
//! before it was ever shown.
//!
//! The transition rule is a pure function of `(current, pending, candidate, now)`
//! so it can be tested without timers; [`StateDebouncer`] owns the state.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SensingError};
use crate::types::{ActivityState, PendingTransition};

/// Configuration for the state debouncer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Dwell time a candidate must persist before commit (ms). Typical: 500-700.
    pub stable_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self { stable_ms: 500 }
    }
}

impl DebounceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.stable_ms == 0 {
            return Err(SensingError::invalid("debounce.stable_ms", "must be positive"));
        }
        Ok(())
    }
}

/// Result of applying one candidate to the debouncer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceStep {
    pub current: ActivityState,
    pub pending: Option<PendingTransition>,
    /// True when `current` changed on this step.
    pub committed: bool,
}

/// Pure transition rule.
///
/// 1. candidate == current → clear pending
/// 2. escape candidate → commit immediately
/// 3. no pending, or pending for a different candidate → start timing
/// 4. same candidate pending for at least `stable_ms` → commit
pub fn debounce(
    current: ActivityState,
    pending: Option<PendingTransition>,
    candidate: ActivityState,
    now_ms: u64,
    stable_ms: u64,
) -> DebounceStep {
    if candidate == current {
        return DebounceStep {
            current,
            pending: None,
            committed: false,
        };
    }

    if candidate.is_escape() {
        return DebounceStep {
            current: candidate,
            pending: None,
            committed: true,
        };
    }

    match pending {
        Some(p) if p.candidate == candidate => {
            if p.elapsed_ms(now_ms) >= stable_ms {
                DebounceStep {
                    current: candidate,
                    pending: None,
                    committed: true,
                }
            } else {
                DebounceStep {
                    current,
                    pending: Some(p),
                    committed: false,
                }
            }
        }
        _ => DebounceStep {
            current,
            pending: Some(PendingTransition::new(candidate, now_ms)),
            committed: false,
        },
    }
}

/// Owns the current activity and the pending transition for one session.
#[derive(Debug, Clone)]
pub struct StateDebouncer {
    config: DebounceConfig,
    current: ActivityState,
    pending: Option<PendingTransition>,
}

impl StateDebouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            current: ActivityState::Initializing,
            pending: None,
        }
    }

    /// Feed a classifier output. Returns true if the current state changed.
    pub fn observe(&mut self, candidate: ActivityState, now_ms: u64) -> bool {
        let previous = self.current;
        let pending_before = self.pending.map(|p| p.candidate);

        let step = debounce(self.current, self.pending, candidate, now_ms, self.config.stable_ms);
        self.current = step.current;
        self.pending = step.pending;

        if step.committed {
            info!(from = %previous, to = %self.current, t = now_ms, "activity changed");
        } else if self.pending.map(|p| p.candidate) != pending_before {
            debug!(candidate = %candidate, t = now_ms, "activity candidate pending");
        }
        step.committed
    }

    /// Set the current state directly, bypassing the dwell rule.
    ///
    /// Used for session lifecycle states (`Calibrating`, permission failures).
    pub fn force(&mut self, state: ActivityState) {
        self.current = state;
        self.pending = None;
    }

    pub fn current(&self) -> ActivityState {
        self.current
    }

    pub fn pending(&self) -> Option<PendingTransition> {
        self.pending
    }

    pub fn reset(&mut self) {
        self.force(ActivityState::Initializing);
    }
}
