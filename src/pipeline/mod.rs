// src/pipeline/mod.rs

pub mod camera_worker;
pub mod clock;
pub mod event_bus;
pub mod metrics;
pub mod recording;

pub use camera_worker::{
    AlertRecord, AlertSink, CameraInfo, CameraWorker, FpsMeter, FrameDetections, JsonlAlertSink,
    MemoryAlertSink, PersonStatus,
};
pub use clock::{Clock, ManualClock};
pub use event_bus::{EventBus, EventSink, FallEvent, TracingSink};
pub use metrics::{MetricsSummary, PipelineMetrics};
pub use recording::{find_recordings, replay, CameraReport, Recording};
