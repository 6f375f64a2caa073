// src/analysis/state_machine.rs
//
// Confirmation and alert debounce, per person.
//
//   fusion fires  → streak += 1
//                   streak <  confirmation_frames → POTENTIAL_FALL
//                   streak >= confirmation_frames → FALLING, alert if armed
//   fusion quiet  → streak = 0, NORMAL, re-arm once alert_reset has elapsed
//
// An alert is "armed" when none is active, or the last one is older than
// alert_reset. No partial credit survives a quiet frame.

use super::person_state::PersonState;
use crate::types::FallStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub status: FallStatus,
    pub alert_triggered: bool,
    /// Confirmed this frame but held back by the debounce gate
    pub alert_suppressed: bool,
    /// The debounce gate opened again this frame
    pub rearmed: bool,
}

pub struct ConfirmationStateMachine {
    confirmation_frames: u32,
    alert_reset_ms: f64,
}

impl ConfirmationStateMachine {
    pub fn new(confirmation_frames: u32, alert_reset_seconds: f64) -> Self {
        Self {
            confirmation_frames,
            alert_reset_ms: alert_reset_seconds * 1000.0,
        }
    }

    pub fn step(&self, state: &mut PersonState, fused: bool, now_ms: f64) -> Transition {
        let transition = if fused {
            self.on_fused(state, now_ms)
        } else {
            self.on_quiet(state, now_ms)
        };
        state.last_status = transition.status;
        transition
    }

    fn on_fused(&self, state: &mut PersonState, now_ms: f64) -> Transition {
        state.fall_streak += 1;

        if state.fall_streak < self.confirmation_frames {
            return Transition {
                status: FallStatus::PotentialFall,
                alert_triggered: false,
                alert_suppressed: false,
                rearmed: false,
            };
        }

        let armed = !state.alert_active || self.reset_elapsed(state, now_ms);
        if armed {
            state.alert_active = true;
            state.last_alert_ms = Some(now_ms);
        }

        Transition {
            status: FallStatus::Falling,
            alert_triggered: armed,
            alert_suppressed: !armed,
            rearmed: false,
        }
    }

    fn on_quiet(&self, state: &mut PersonState, now_ms: f64) -> Transition {
        state.fall_streak = 0;

        let rearmed = state.alert_active && self.reset_elapsed(state, now_ms);
        if rearmed {
            state.alert_active = false;
        }

        Transition {
            status: FallStatus::Normal,
            alert_triggered: false,
            alert_suppressed: false,
            rearmed,
        }
    }

    fn reset_elapsed(&self, state: &PersonState, now_ms: f64) -> bool {
        state
            .last_alert_ms
            .map(|t| now_ms - t > self.alert_reset_ms)
            .unwrap_or(true)
    }
}
