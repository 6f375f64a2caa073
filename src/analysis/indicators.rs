// src/analysis/indicators.rs
//
// Independent fall indicators. Each one reads the person's state and
// nothing else; none of them mutate it.
//
//   rapid_downward    — sustained downward bbox-centre velocity (mandatory)
//   bbox_collapse     — bbox height dropped or width grew over N frames
//   rapid_height_loss — nose→ankle distance shrank over the last 5 snapshots
//   head_inversion    — nose below the ankle line
//   bent_posture      — mean torso angle over the last 5 snapshots

use super::fall_engine::FallConfig;
use super::person_state::PersonState;
use crate::types::HeadInversionMode;
use serde::Serialize;

/// Snapshots spanned by the keypoint height and posture checks.
const KEYPOINT_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Indicators {
    pub rapid_downward: bool,
    pub bbox_collapse: bool,
    pub rapid_height_loss: bool,
    pub head_inversion: bool,
    pub bent_posture: bool,
}

impl Indicators {
    pub fn evaluate(state: &PersonState, config: &FallConfig) -> Self {
        Self {
            rapid_downward: rapid_downward(
                state,
                config.velocity_history_length,
                config.min_fall_speed,
            ),
            bbox_collapse: bbox_collapse(
                state,
                config.frames_per_velocity,
                config.height_drop_ratio,
                config.width_increase_ratio,
            ),
            rapid_height_loss: rapid_height_loss(state, config.height_drop_kp),
            head_inversion: head_inversion(
                state,
                config.head_inversion_mode,
                config.head_inversion_threshold,
            ),
            bent_posture: bent_posture(state, config.bent_posture_angle),
        }
    }

    /// Any of the non-velocity indicators.
    pub fn other_hit(&self, include_bent_posture: bool) -> bool {
        self.bbox_collapse
            || self.rapid_height_loss
            || self.head_inversion
            || (include_bent_posture && self.bent_posture)
    }

    /// Velocity is mandatory: one point for it, one for any other indicator,
    /// and both are needed.
    pub fn fusion_score(&self, include_bent_posture: bool) -> u8 {
        u8::from(self.rapid_downward) + u8::from(self.other_hit(include_bent_posture))
    }

    pub fn fused(&self, include_bent_posture: bool) -> bool {
        self.fusion_score(include_bent_posture) >= 2
    }

    /// Names of the indicators that fired, for event payloads.
    pub fn fired(&self, include_bent_posture: bool) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.rapid_downward {
            names.push("rapid_downward");
        }
        if self.bbox_collapse {
            names.push("bbox_collapse");
        }
        if self.rapid_height_loss {
            names.push("rapid_height_loss");
        }
        if self.head_inversion {
            names.push("head_inversion");
        }
        if include_bent_posture && self.bent_posture {
            names.push("bent_posture");
        }
        names
    }
}

pub fn rapid_downward(state: &PersonState, window: usize, min_fall_speed: f32) -> bool {
    let samples = &state.velocity_history;
    // Insufficient evidence until the window is full
    if samples.len() < window || samples.len() < 2 {
        return false;
    }

    let recent: Vec<f32> = samples.iter().skip(samples.len() - window).copied().collect();
    if recent.len() < 2 || !recent.iter().all(|&v| v > 0.0) {
        return false;
    }

    let mean = recent.iter().sum::<f32>() / recent.len() as f32;
    let max = recent.iter().copied().fold(f32::MIN, f32::max);
    mean > min_fall_speed && max > min_fall_speed
}

pub fn bbox_collapse(
    state: &PersonState,
    frames_back: usize,
    height_drop_ratio: f32,
    width_increase_ratio: f32,
) -> bool {
    let (Some(prev), Some(curr)) = (state.snapshot_back(frames_back), state.latest()) else {
        return false;
    };
    curr.bbox_height < height_drop_ratio * prev.bbox_height
        || curr.bbox_width > width_increase_ratio * prev.bbox_width
}

pub fn rapid_height_loss(state: &PersonState, height_drop_kp: f32) -> bool {
    let (Some(earlier), Some(curr)) = (state.snapshot_back(KEYPOINT_WINDOW - 1), state.latest())
    else {
        return false;
    };
    let drop = (earlier.body_height - curr.body_height) / earlier.body_height.max(1.0);
    drop > height_drop_kp
}

pub fn head_inversion(state: &PersonState, mode: HeadInversionMode, threshold: f32) -> bool {
    let Some(curr) = state.latest() else {
        return false;
    };
    match mode {
        HeadInversionMode::ZeroCrossing => curr.head_vs_ankle > 0.0,
        HeadInversionMode::Threshold => curr.head_vs_ankle > threshold,
    }
}

pub fn bent_posture(state: &PersonState, bent_posture_angle: f32) -> bool {
    if state.history.len() < KEYPOINT_WINDOW {
        return false;
    }
    let sum: f32 = state
        .history
        .iter()
        .rev()
        .take(KEYPOINT_WINDOW)
        .map(|s| s.torso_angle)
        .sum();
    sum / KEYPOINT_WINDOW as f32 > bent_posture_angle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::FeatureSnapshot;

    fn snap() -> FeatureSnapshot {
        FeatureSnapshot {
            torso_angle: 5.0,
            body_height: 200.0,
            head_vs_ankle: -200.0,
            bbox_height: 220.0,
            bbox_width: 60.0,
            bbox_center_y: 200.0,
        }
    }

    fn state_with(snaps: &[FeatureSnapshot]) -> PersonState {
        let mut state = PersonState::new(15, 3, 0.0);
        for s in snaps {
            state.push_snapshot(*s);
            state.frame_count += 1;
        }
        state
    }

    fn state_with_velocities(vels: &[f32]) -> PersonState {
        let mut state = PersonState::new(15, 3, 0.0);
        for &v in vels {
            state.push_velocity(v);
        }
        state
    }

    #[test]
    fn test_rapid_downward_requires_full_window() {
        assert!(!rapid_downward(&state_with_velocities(&[80.0, 90.0]), 3, 50.0));
        assert!(rapid_downward(&state_with_velocities(&[80.0, 90.0, 75.0]), 3, 50.0));
    }

    #[test]
    fn test_rapid_downward_rejects_any_upward_sample() {
        assert!(!rapid_downward(&state_with_velocities(&[80.0, -5.0, 200.0]), 3, 50.0));
    }

    #[test]
    fn test_rapid_downward_oscillating_motion() {
        let state = state_with_velocities(&[120.0, -120.0, 120.0]);
        assert!(!rapid_downward(&state, 3, 50.0));
    }

    #[test]
    fn test_rapid_downward_needs_mean_above_speed() {
        // max above, mean below
        assert!(!rapid_downward(&state_with_velocities(&[10.0, 10.0, 100.0]), 3, 50.0));
    }

    #[test]
    fn test_bbox_collapse_on_height_drop() {
        let mut snaps = vec![snap(); 6];
        snaps[5].bbox_height = 100.0;
        let state = state_with(&snaps);
        assert!(bbox_collapse(&state, 5, 0.6, 1.4));
    }

    #[test]
    fn test_bbox_collapse_on_width_increase() {
        let mut snaps = vec![snap(); 6];
        snaps[5].bbox_width = 120.0;
        let state = state_with(&snaps);
        assert!(bbox_collapse(&state, 5, 0.6, 1.4));
    }

    #[test]
    fn test_bbox_collapse_compares_n_frames_back() {
        // Drop happened 6 frames ago; the N=5 comparison no longer sees it
        let mut snaps = vec![snap(); 7];
        for s in snaps.iter_mut().skip(1) {
            s.bbox_height = 100.0;
        }
        let state = state_with(&snaps);
        assert!(!bbox_collapse(&state, 5, 0.6, 1.4));
    }

    #[test]
    fn test_rapid_height_loss_needs_five_snapshots() {
        let mut snaps = vec![snap(); 4];
        snaps[3].body_height = 50.0;
        assert!(!rapid_height_loss(&state_with(&snaps), 0.3));

        let mut snaps = vec![snap(); 5];
        snaps[4].body_height = 100.0;
        assert!(rapid_height_loss(&state_with(&snaps), 0.3));
    }

    #[test]
    fn test_rapid_height_loss_small_drop() {
        let mut snaps = vec![snap(); 5];
        snaps[4].body_height = 180.0;
        assert!(!rapid_height_loss(&state_with(&snaps), 0.3));
    }

    #[test]
    fn test_head_inversion_modes() {
        let mut s = snap();
        s.head_vs_ankle = 5.0;
        let state = state_with(&[s]);

        assert!(head_inversion(&state, HeadInversionMode::ZeroCrossing, 20.0));
        assert!(!head_inversion(&state, HeadInversionMode::Threshold, 20.0));
        assert!(head_inversion(&state, HeadInversionMode::Threshold, 2.0));
    }

    #[test]
    fn test_bent_posture_mean_angle() {
        let mut snaps = vec![snap(); 5];
        for s in snaps.iter_mut() {
            s.torso_angle = 70.0;
        }
        assert!(bent_posture(&state_with(&snaps), 55.0));
        assert!(!bent_posture(&state_with(&snaps[..4]), 55.0));
    }

    #[test]
    fn test_fusion_requires_velocity() {
        let only_collapse = Indicators {
            bbox_collapse: true,
            head_inversion: true,
            ..Indicators::default()
        };
        assert_eq!(only_collapse.fusion_score(false), 1);
        assert!(!only_collapse.fused(false));

        let only_velocity = Indicators {
            rapid_downward: true,
            ..Indicators::default()
        };
        assert!(!only_velocity.fused(false));

        let both = Indicators {
            rapid_downward: true,
            rapid_height_loss: true,
            ..Indicators::default()
        };
        assert!(both.fused(false));
        assert_eq!(both.fired(false), vec!["rapid_downward", "rapid_height_loss"]);
    }

    #[test]
    fn test_bent_posture_only_counts_when_enabled() {
        let ind = Indicators {
            rapid_downward: true,
            bent_posture: true,
            ..Indicators::default()
        };
        assert!(!ind.fused(false));
        assert!(ind.fused(true));
    }
}
