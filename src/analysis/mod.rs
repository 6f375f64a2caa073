// src/analysis/mod.rs
//
// Fall decision core.
//
// Signal flow, per person per frame:
//   keypoints + bbox → features → person_state (bounded history)
//                    → velocity_tracker (every N frames)
//                    → indicators → state_machine → FrameDecision
//
// Orchestrated by fall_engine::FallEngine.

pub mod fall_engine;
pub mod features;
pub mod indicators;
pub mod person_state;
pub mod state_machine;
pub mod velocity_tracker;

// Re-exports for ergonomic access from the pipeline and main.rs
pub use fall_engine::{FallConfig, FallEngine, FrameDecision};
pub use features::FeatureSnapshot;
pub use indicators::Indicators;
pub use person_state::{PersonState, PersonStore};
pub use state_machine::{ConfirmationStateMachine, Transition};
pub use velocity_tracker::VerticalVelocityTracker;
