// src/analysis/fall_engine.rs
//
// Per-camera fall decision engine. One call per tracked person per frame:
//
//   keypoints + bbox → FeatureSnapshot → PersonStore
//                    → (every N frames) VerticalVelocityTracker
//                    → Indicators → ConfirmationStateMachine
//                    → FrameDecision { status, alert_triggered }
//
// The engine holds configuration and the clock only. Person state lives in
// a PersonStore owned by the caller's camera context and passed in by
// reference.

use super::features::FeatureSnapshot;
use super::indicators::Indicators;
use super::person_state::PersonStore;
use super::state_machine::ConfirmationStateMachine;
use super::velocity_tracker::VerticalVelocityTracker;
use crate::pipeline::clock::Clock;
use crate::pipeline::event_bus::{EventSink, FallEvent};
use crate::types::{FallStatus, HeadInversionMode, PoseObservation};
use anyhow::{bail, ensure, Result};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Engine parameters. No `Default`; every value comes from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FallConfig {
    /// N: frames between velocity samples, also the bbox comparison distance
    pub frames_per_velocity: usize,
    /// M: velocity samples kept and required by the downward-motion check
    pub velocity_history_length: usize,
    pub default_fps: f32,
    /// Collapse when current bbox height < ratio * height N frames back
    pub height_drop_ratio: f32,
    /// Collapse when current bbox width > ratio * width N frames back
    pub width_increase_ratio: f32,
    /// Degrees
    pub bent_posture_angle: f32,
    /// Fractional body-height loss over 5 snapshots
    pub height_drop_kp: f32,
    pub head_inversion_threshold: f32,
    pub head_inversion_mode: HeadInversionMode,
    /// Pixels per second
    pub min_fall_speed: f32,
    pub confirmation_frames: u32,
    pub alert_reset_seconds: f64,
    pub bent_posture_in_fusion: bool,
}

impl FallConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.frames_per_velocity > 0,
            "frames_per_velocity must be at least 1"
        );
        // History holds N*M snapshots and the velocity window needs N+1 of them
        ensure!(
            self.velocity_history_length >= 2,
            "velocity_history_length must be at least 2, got {}",
            self.velocity_history_length
        );
        ensure_positive("default_fps", self.default_fps)?;
        ensure_positive("height_drop_ratio", self.height_drop_ratio)?;
        ensure_positive("width_increase_ratio", self.width_increase_ratio)?;
        ensure_positive("bent_posture_angle", self.bent_posture_angle)?;
        ensure_positive("height_drop_kp", self.height_drop_kp)?;
        ensure_positive("min_fall_speed", self.min_fall_speed)?;
        ensure!(
            self.head_inversion_threshold.is_finite(),
            "head_inversion_threshold must be finite"
        );
        if self.head_inversion_mode == HeadInversionMode::Threshold {
            ensure_positive("head_inversion_threshold", self.head_inversion_threshold)?;
        }
        ensure!(
            self.confirmation_frames > 0,
            "confirmation_frames must be at least 1"
        );
        ensure!(
            self.alert_reset_seconds.is_finite() && self.alert_reset_seconds > 0.0,
            "alert_reset_seconds must be positive, got {}",
            self.alert_reset_seconds
        );
        Ok(())
    }

    pub fn history_capacity(&self) -> usize {
        self.frames_per_velocity * self.velocity_history_length
    }

    /// Snapshots needed before any decision is made.
    pub fn min_history(&self) -> usize {
        self.frames_per_velocity + 1
    }

    /// Live fps when measurable, the configured default otherwise.
    pub fn effective_fps(&self, measured: f32) -> f32 {
        if measured.is_finite() && measured > 0.0 {
            measured
        } else {
            self.default_fps
        }
    }
}

fn ensure_positive(name: &str, value: f32) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "{} must be positive, got {}",
        name,
        value
    );
    Ok(())
}

// ============================================================================
// OUTPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FrameDecision {
    pub person_id: u32,
    pub status: FallStatus,
    /// True for at most one frame per debounce cycle
    pub alert_triggered: bool,
    pub alert_suppressed: bool,
    pub velocity_sample: Option<f32>,
    pub fall_streak: u32,
    /// None while history is still warming up
    pub indicators: Option<Indicators>,
}

impl FrameDecision {
    fn warming_up(person_id: u32) -> Self {
        Self {
            person_id,
            status: FallStatus::Normal,
            alert_triggered: false,
            alert_suppressed: false,
            velocity_sample: None,
            fall_streak: 0,
            indicators: None,
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct FallEngine<C: Clock> {
    config: FallConfig,
    clock: C,
    velocity: VerticalVelocityTracker,
    confirmation: ConfirmationStateMachine,
}

impl<C: Clock> FallEngine<C> {
    /// Fails on an invalid configuration; nothing is defaulted.
    pub fn new(config: FallConfig, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            velocity: VerticalVelocityTracker::new(config.frames_per_velocity),
            confirmation: ConfirmationStateMachine::new(
                config.confirmation_frames,
                config.alert_reset_seconds,
            ),
            config,
            clock,
        })
    }

    pub fn config(&self) -> &FallConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// A store sized for this engine's configuration.
    pub fn new_store(&self) -> PersonStore {
        PersonStore::new(
            self.config.history_capacity(),
            self.config.velocity_history_length,
        )
    }

    pub fn process(
        &self,
        store: &mut PersonStore,
        observation: &PoseObservation,
        fps: f32,
        sink: &mut dyn EventSink,
    ) -> Result<FrameDecision> {
        if !(fps.is_finite() && fps > 0.0) {
            bail!(
                "fps must be positive for person {}, got {}",
                observation.person_id,
                fps
            );
        }

        let person_id = observation.person_id;
        let now_ms = self.clock.now_ms();
        let snapshot = FeatureSnapshot::compute(&observation.keypoints, &observation.bbox);
        let state = store.observe(person_id, snapshot, now_ms);

        if state.history.len() < self.config.min_history() {
            state.last_status = FallStatus::Normal;
            return Ok(FrameDecision::warming_up(person_id));
        }

        let velocity_sample = self.velocity.update(state, fps);
        if let Some(velocity_px_s) = velocity_sample {
            sink.publish(FallEvent::VelocitySample {
                person_id,
                frame_count: state.frame_count,
                velocity_px_s,
            });
        }

        let indicators = Indicators::evaluate(state, &self.config);
        let include_bent = self.config.bent_posture_in_fusion;
        let fused = indicators.fused(include_bent);

        let previous_alert_ms = state.last_alert_ms;
        let transition = self.confirmation.step(state, fused, now_ms);

        match transition.status {
            FallStatus::PotentialFall => sink.publish(FallEvent::PotentialFall {
                person_id,
                fall_streak: state.fall_streak,
                indicators: indicators.fired(include_bent),
            }),
            FallStatus::Falling if transition.alert_triggered => {
                sink.publish(FallEvent::FallConfirmed {
                    person_id,
                    fall_streak: state.fall_streak,
                    indicators: indicators.fired(include_bent),
                    timestamp_ms: now_ms,
                })
            }
            _ => {}
        }
        if transition.alert_suppressed {
            sink.publish(FallEvent::AlertSuppressed {
                person_id,
                since_last_alert_ms: previous_alert_ms.map(|t| now_ms - t).unwrap_or(0.0),
            });
        }
        if transition.rearmed {
            sink.publish(FallEvent::AlertRearmed { person_id });
        }

        Ok(FrameDecision {
            person_id,
            status: transition.status,
            alert_triggered: transition.alert_triggered,
            alert_suppressed: transition.alert_suppressed,
            velocity_sample,
            fall_streak: state.fall_streak,
            indicators: Some(indicators),
        })
    }

    /// Remove persons whose last observation is older than `idle_ms`.
    pub fn evict_idle(
        &self,
        store: &mut PersonStore,
        idle_ms: f64,
        sink: &mut dyn EventSink,
    ) -> Vec<u32> {
        let evicted = store.evict_idle(self.clock.now_ms(), idle_ms);
        for &person_id in &evicted {
            sink.publish(FallEvent::PersonEvicted { person_id });
        }
        evicted
    }

    /// Explicit end-of-track notification from the tracker.
    pub fn end_track(&self, store: &mut PersonStore, person_id: u32, sink: &mut dyn EventSink) {
        if store.end_track(person_id).is_some() {
            sink.publish(FallEvent::PersonEvicted { person_id });
        }
    }
}
