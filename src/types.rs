use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub params: ParamsConfig,
    pub thresholds: ThresholdsConfig,
    pub confirmation: ConfirmationConfig,
    pub tracking: TrackingConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamsConfig {
    /// Frames between two velocity samples (N)
    pub frames_per_velocity: usize,
    /// Velocity samples kept per person (M)
    pub velocity_history_length: usize,
    /// Used while the live frame rate is not yet measurable
    pub default_fps: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    pub bbox: BboxThresholds,
    pub keypoint: KeypointThresholds,
    pub posture: PostureThresholds,
    pub motion: MotionThresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BboxThresholds {
    pub height_drop_ratio: f32,
    pub width_increase_ratio: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeypointThresholds {
    pub bent_posture_angle: f32,
    pub height_drop: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostureThresholds {
    pub head_inversion_threshold: f32,
    #[serde(default)]
    pub head_inversion_mode: HeadInversionMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionThresholds {
    /// Pixels per second
    pub min_fall_speed: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    pub confirmation_frames: u32,
    pub alert_reset_seconds: f64,
    #[serde(default = "default_bent_posture_in_fusion")]
    pub bent_posture_in_fusion: bool,
}

fn default_bent_posture_in_fusion() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub idle_eviction_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub recordings_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub alerts_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Which boundary the head-inversion indicator tests `head_vs_ankle` against.
///
/// `ZeroCrossing` fires as soon as the nose drops below the ankle line and
/// ignores `head_inversion_threshold`. `Threshold` compares against the
/// configured value directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadInversionMode {
    #[default]
    ZeroCrossing,
    Threshold,
}

// ============================================================================
// PER-FRAME INPUT
// ============================================================================

/// Number of keypoints in the COCO body layout.
pub const NUM_KEYPOINTS: usize = 17;

pub const KP_NOSE: usize = 0;
pub const KP_LEFT_SHOULDER: usize = 5;
pub const KP_RIGHT_SHOULDER: usize = 6;
pub const KP_LEFT_HIP: usize = 11;
pub const KP_RIGHT_HIP: usize = 12;
pub const KP_LEFT_ANKLE: usize = 15;
pub const KP_RIGHT_ANKLE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            confidence: 1.0,
        }
    }
}

/// Axis-aligned box in pixel coordinates, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn center_y(&self) -> f32 {
        (self.y1 + self.y2) / 2.0
    }
}

/// One tracked person in one frame, as handed over by the pose tracker.
#[derive(Debug, Clone)]
pub struct PoseObservation {
    pub person_id: u32,
    pub keypoints: [Keypoint; NUM_KEYPOINTS],
    pub bbox: BBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FallStatus {
    #[default]
    Normal,
    PotentialFall,
    Falling,
}

impl FallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::PotentialFall => "POTENTIAL_FALL",
            Self::Falling => "FALLING",
        }
    }
}
