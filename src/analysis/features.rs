// src/analysis/features.rs
//
// Geometric snapshot of one person in one frame. Pure function of the
// keypoints and bounding box; nothing here looks at history.

use crate::types::{
    BBox, Keypoint, KP_LEFT_ANKLE, KP_LEFT_HIP, KP_LEFT_SHOULDER, KP_NOSE, KP_RIGHT_ANKLE,
    KP_RIGHT_HIP, KP_RIGHT_SHOULDER, NUM_KEYPOINTS,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSnapshot {
    /// Degrees between the shoulder→hip segment and vertical, in [0, 90]
    pub torso_angle: f32,
    /// Nose to ankle-midpoint distance
    pub body_height: f32,
    /// nose.y - ankle_mid.y; negative while standing, positive once the head is below the feet
    pub head_vs_ankle: f32,
    pub bbox_height: f32,
    pub bbox_width: f32,
    pub bbox_center_y: f32,
}

impl FeatureSnapshot {
    pub fn compute(keypoints: &[Keypoint; NUM_KEYPOINTS], bbox: &BBox) -> Self {
        let nose = keypoints[KP_NOSE];
        let shoulder_mid = midpoint(keypoints[KP_LEFT_SHOULDER], keypoints[KP_RIGHT_SHOULDER]);
        let hip_mid = midpoint(keypoints[KP_LEFT_HIP], keypoints[KP_RIGHT_HIP]);
        let ankle_mid = midpoint(keypoints[KP_LEFT_ANKLE], keypoints[KP_RIGHT_ANKLE]);

        let body_dx = nose.x - ankle_mid.0;
        let body_dy = nose.y - ankle_mid.1;

        Self {
            torso_angle: vertical_angle_deg(shoulder_mid, hip_mid),
            body_height: (body_dx * body_dx + body_dy * body_dy).sqrt(),
            head_vs_ankle: nose.y - ankle_mid.1,
            bbox_height: bbox.height(),
            bbox_width: bbox.width(),
            bbox_center_y: bbox.center_y(),
        }
    }
}

fn midpoint(a: Keypoint, b: Keypoint) -> (f32, f32) {
    ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// Angle of the segment p1→p2 from the vertical axis. Symmetric for
/// left/right lean and for segment direction.
fn vertical_angle_deg(p1: (f32, f32), p2: (f32, f32)) -> f32 {
    let dx = (p2.0 - p1.0).abs();
    let dy = (p2.1 - p1.1).abs();
    dx.atan2(dy).to_degrees()
}
