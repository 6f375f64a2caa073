use crate::analysis::FallConfig;
use crate::types::Config;
use anyhow::{ensure, Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
        Self::from_yaml(&contents).with_context(|| format!("loading config {}", path))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Engine parameters, flattened out of the sectioned file layout.
    pub fn fall_config(&self) -> FallConfig {
        FallConfig {
            frames_per_velocity: self.params.frames_per_velocity,
            velocity_history_length: self.params.velocity_history_length,
            default_fps: self.params.default_fps,
            height_drop_ratio: self.thresholds.bbox.height_drop_ratio,
            width_increase_ratio: self.thresholds.bbox.width_increase_ratio,
            bent_posture_angle: self.thresholds.keypoint.bent_posture_angle,
            height_drop_kp: self.thresholds.keypoint.height_drop,
            head_inversion_threshold: self.thresholds.posture.head_inversion_threshold,
            head_inversion_mode: self.thresholds.posture.head_inversion_mode,
            min_fall_speed: self.thresholds.motion.min_fall_speed,
            confirmation_frames: self.confirmation.confirmation_frames,
            alert_reset_seconds: self.confirmation.alert_reset_seconds,
            bent_posture_in_fusion: self.confirmation.bent_posture_in_fusion,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.fall_config().validate()?;
        ensure!(
            self.tracking.idle_eviction_seconds.is_finite()
                && self.tracking.idle_eviction_seconds > 0.0,
            "tracking.idle_eviction_seconds must be positive, got {}",
            self.tracking.idle_eviction_seconds
        );
        Ok(())
    }

    pub fn idle_eviction_ms(&self) -> f64 {
        self.tracking.idle_eviction_seconds * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HeadInversionMode;

    const SAMPLE: &str = r#"
params:
  frames_per_velocity: 5
  velocity_history_length: 3
  default_fps: 25.0
thresholds:
  bbox:
    height_drop_ratio: 0.6
    width_increase_ratio: 1.4
  keypoint:
    bent_posture_angle: 55.0
    height_drop: 0.3
  posture:
    head_inversion_threshold: 0.0
  motion:
    min_fall_speed: 50.0
confirmation:
  confirmation_frames: 5
  alert_reset_seconds: 10.0
tracking:
  idle_eviction_seconds: 5.0
input:
  recordings_dir: "recordings"
output:
  alerts_dir: "alerts"
logging:
  level: "info"
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        let fall = config.fall_config();
        assert_eq!(fall.frames_per_velocity, 5);
        assert_eq!(fall.velocity_history_length, 3);
        assert_eq!(fall.confirmation_frames, 5);
        assert!(fall.bent_posture_in_fusion);
        assert_eq!(fall.head_inversion_mode, HeadInversionMode::ZeroCrossing);
        assert_eq!(config.idle_eviction_ms(), 5000.0);
    }

    #[test]
    fn test_threshold_mode_parses() {
        let yaml = SAMPLE.replace(
            "head_inversion_threshold: 0.0",
            "head_inversion_threshold: 12.0\n    head_inversion_mode: threshold",
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(
            config.thresholds.posture.head_inversion_mode,
            HeadInversionMode::Threshold
        );
    }

    #[test]
    fn test_zero_frames_per_velocity_rejected() {
        let yaml = SAMPLE.replace("frames_per_velocity: 5", "frames_per_velocity: 0");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_missing_parameter_rejected() {
        let yaml = SAMPLE.replace("    min_fall_speed: 50.0\n", "    {}\n");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_bent_posture_opt_out_parses() {
        let yaml = SAMPLE.replace(
            "alert_reset_seconds: 10.0",
            "alert_reset_seconds: 10.0\n  bent_posture_in_fusion: false",
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert!(!config.fall_config().bent_posture_in_fusion);
    }

    #[test]
    fn test_zero_alert_reset_rejected() {
        let yaml = SAMPLE.replace("alert_reset_seconds: 10.0", "alert_reset_seconds: 0.0");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_non_positive_idle_eviction_rejected() {
        let yaml = SAMPLE.replace("idle_eviction_seconds: 5.0", "idle_eviction_seconds: 0.0");
        assert!(Config::from_yaml(&yaml).is_err());
    }
}
