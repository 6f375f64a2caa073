// src/lib.rs

pub mod analysis;
pub mod config;
pub mod pipeline;
pub mod types;

pub use analysis::{FallConfig, FallEngine, FrameDecision};
pub use types::{BBox, Config, FallStatus, Keypoint, PoseObservation};
