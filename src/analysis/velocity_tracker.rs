// src/analysis/velocity_tracker.rs
//
// Windowed vertical velocity of the bbox centre. One sample every N frames,
// measured against the snapshot N frames back, so samples never overlap.

use super::person_state::PersonState;

pub struct VerticalVelocityTracker {
    frames_per_sample: usize,
}

impl VerticalVelocityTracker {
    pub fn new(frames_per_sample: usize) -> Self {
        Self { frames_per_sample }
    }

    /// Take a sample if this frame is on the cadence and enough history
    /// exists. Appends it to the person's velocity history and returns it.
    ///
    /// `fps` must be positive; the engine checks this before calling.
    pub fn update(&self, state: &mut PersonState, fps: f32) -> Option<f32> {
        let n = self.frames_per_sample;
        if state.frame_count % n as u64 != 0 || state.history.len() < n + 1 {
            return None;
        }

        let old_y = state.snapshot_back(n)?.bbox_center_y;
        let new_y = state.latest()?.bbox_center_y;

        let interval_s = n as f32 / fps;
        // Positive = downward, y grows toward the bottom of the image
        let velocity = (new_y - old_y) / interval_s;

        state.push_velocity(velocity);
        Some(velocity)
    }
}
