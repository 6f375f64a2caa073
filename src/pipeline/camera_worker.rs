// src/pipeline/camera_worker.rs
//
// One camera's processing context. Owns the engine, the person store, the
// frame-rate meter, and the alert sink for that camera; nothing here is
// shared with other cameras except the metrics counters.
//
// On a triggered alert the worker builds an AlertRecord and hands it to the
// AlertSink. Snapshot images and before/after clips are the capture side's
// business and are not produced here.

use crate::analysis::{FallConfig, FallEngine, PersonStore};
use crate::pipeline::clock::Clock;
use crate::pipeline::event_bus::TracingSink;
use crate::pipeline::metrics::PipelineMetrics;
use crate::types::{FallStatus, PoseObservation};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, info_span};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub camera_id: String,
    pub camera_name: String,
}

/// All tracked persons of one frame.
#[derive(Debug, Clone)]
pub struct FrameDetections {
    pub frame_index: u64,
    pub detections: Vec<PoseObservation>,
}

/// Per-person result for overlay/annotation collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonStatus {
    pub person_id: u32,
    pub status: FallStatus,
    pub alert_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub alert_id: Uuid,
    pub camera_id: String,
    pub camera_name: String,
    pub person_id: u32,
    pub frame_index: u64,
    pub timestamp: DateTime<Utc>,
    pub analytics: String,
    pub alert_type: String,
}

impl AlertRecord {
    pub fn new(camera: &CameraInfo, person_id: u32, frame_index: u64) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            camera_id: camera.camera_id.clone(),
            camera_name: camera.camera_name.clone(),
            person_id,
            frame_index,
            timestamp: Utc::now(),
            analytics: "Fall Detection".to_string(),
            alert_type: "FALL DETECTED".to_string(),
        }
    }
}

// ============================================================================
// ALERT SINKS
// ============================================================================

pub trait AlertSink {
    fn deliver(&mut self, record: &AlertRecord) -> Result<()>;
}

/// Appends one JSON object per line.
pub struct JsonlAlertSink {
    writer: BufWriter<File>,
}

impl JsonlAlertSink {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating alert directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening alert file {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl AlertSink for JsonlAlertSink {
    fn deliver(&mut self, record: &AlertRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    pub records: Vec<AlertRecord>,
}

impl AlertSink for MemoryAlertSink {
    fn deliver(&mut self, record: &AlertRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

// ============================================================================
// FPS METER
// ============================================================================

/// Frames per elapsed second, refreshed once a second and truncated to a
/// whole number. The first frame only opens the window; reads 0 until a
/// full second has passed.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    window_start_ms: Option<f64>,
    frames_in_window: u32,
    fps: f32,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self {
            window_start_ms: None,
            frames_in_window: 0,
            fps: 0.0,
        }
    }

    pub fn tick(&mut self, now_ms: f64) -> f32 {
        let Some(start) = self.window_start_ms else {
            self.window_start_ms = Some(now_ms);
            return self.fps;
        };
        self.frames_in_window += 1;

        let elapsed_ms = now_ms - start;
        if elapsed_ms >= 1000.0 {
            self.fps = (self.frames_in_window as f64 / (elapsed_ms / 1000.0)).floor() as f32;
            self.frames_in_window = 0;
            self.window_start_ms = Some(now_ms);
        }
        self.fps
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// WORKER
// ============================================================================

pub struct CameraWorker<C: Clock, A: AlertSink> {
    camera: CameraInfo,
    engine: FallEngine<C>,
    store: PersonStore,
    events: TracingSink,
    alerts: A,
    fps_meter: FpsMeter,
    idle_eviction_ms: f64,
    metrics: PipelineMetrics,
    frames_processed: u64,
    alerts_delivered: u64,
}

impl<C: Clock, A: AlertSink> CameraWorker<C, A> {
    pub fn new(
        camera: CameraInfo,
        config: FallConfig,
        idle_eviction_ms: f64,
        clock: C,
        alerts: A,
        metrics: PipelineMetrics,
    ) -> Result<Self> {
        let engine = FallEngine::new(config, clock)
            .with_context(|| format!("camera {}: invalid fall configuration", camera.camera_id))?;
        let store = engine.new_store();
        info!(
            "Starting camera {}:{}",
            camera.camera_id, camera.camera_name
        );
        Ok(Self {
            events: TracingSink::new(camera.camera_id.clone()),
            camera,
            engine,
            store,
            alerts,
            fps_meter: FpsMeter::new(),
            idle_eviction_ms,
            metrics,
            frames_processed: 0,
            alerts_delivered: 0,
        })
    }

    pub fn process_frame(&mut self, frame: &FrameDetections) -> Result<Vec<PersonStatus>> {
        let _span = info_span!("camera", id = %self.camera.camera_id).entered();
        let now_ms = self.engine.clock().now_ms();
        let fps = self
            .engine
            .config()
            .effective_fps(self.fps_meter.tick(now_ms));

        self.frames_processed += 1;
        let started = Instant::now();
        let mut statuses = Vec::with_capacity(frame.detections.len());

        for observation in &frame.detections {
            let decision =
                self.engine
                    .process(&mut self.store, observation, fps, &mut self.events)?;
            self.metrics.record_decision(&decision);

            let alert_id = if decision.alert_triggered {
                self.raise_alert(decision.person_id, frame.frame_index)
            } else {
                None
            };

            statuses.push(PersonStatus {
                person_id: decision.person_id,
                status: decision.status,
                alert_id,
            });
        }

        let evicted = self
            .engine
            .evict_idle(&mut self.store, self.idle_eviction_ms, &mut self.events);
        self.metrics.record_evictions(evicted.len());
        self.metrics.record_frame(started.elapsed());
        Ok(statuses)
    }

    /// Tracker reported the person gone.
    pub fn end_track(&mut self, person_id: u32) {
        self.engine
            .end_track(&mut self.store, person_id, &mut self.events);
    }

    fn raise_alert(&mut self, person_id: u32, frame_index: u64) -> Option<Uuid> {
        let record = AlertRecord::new(&self.camera, person_id, frame_index);

        info!(
            "🚨 Fall alert {} camera={} person={} frame={}",
            record.alert_id, self.camera.camera_id, person_id, frame_index
        );

        match self.alerts.deliver(&record) {
            Ok(()) => {
                self.alerts_delivered += 1;
                Some(record.alert_id)
            }
            Err(e) => {
                self.metrics.record_delivery_failure();
                error!("Failed to deliver alert {}: {:#}", record.alert_id, e);
                None
            }
        }
    }

    pub fn camera(&self) -> &CameraInfo {
        &self.camera
    }

    pub fn tracked_persons(&self) -> usize {
        self.store.len()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn alerts_delivered(&self) -> u64 {
        self.alerts_delivered
    }

    /// Last measured frame rate; 0 until a full second has been seen.
    pub fn current_fps(&self) -> f32 {
        self.fps_meter.fps()
    }

    pub fn into_alert_sink(self) -> A {
        self.alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fall_engine::tests::{falling_frame, observation, test_config};
    use crate::pipeline::clock::ManualClock;

    fn camera() -> CameraInfo {
        CameraInfo {
            camera_id: "cam-1".to_string(),
            camera_name: "Lobby".to_string(),
        }
    }

    struct FailingSink;

    impl AlertSink for FailingSink {
        fn deliver(&mut self, _record: &AlertRecord) -> Result<()> {
            anyhow::bail!("database unavailable")
        }
    }

    #[test]
    fn test_fps_meter_refreshes_once_per_second() {
        let mut meter = FpsMeter::new();
        for i in 0..25 {
            assert_eq!(meter.tick(i as f64 * 40.0), 0.0);
        }
        // 25 frames after the opening one, exactly one second later
        assert_eq!(meter.tick(1000.0), 25.0);
        assert_eq!(meter.tick(1040.0), 25.0);
        for i in 2..25 {
            assert_eq!(meter.tick(1000.0 + i as f64 * 40.0), 25.0);
        }
        // Steady 25fps keeps reading 25 in later windows
        assert_eq!(meter.tick(2000.0), 25.0);
    }

    #[test]
    fn test_worker_raises_one_alert_for_sustained_fall() {
        let clock = ManualClock::new(0.0);
        let metrics = PipelineMetrics::new();
        let mut worker = CameraWorker::new(
            camera(),
            test_config(),
            5000.0,
            clock.clone(),
            MemoryAlertSink::default(),
            metrics.clone(),
        )
        .unwrap();

        let mut alert_frames = Vec::new();
        for f in 1..=40u32 {
            clock.set_ms(f as f64 * 40.0);
            let frame = FrameDetections {
                frame_index: f as u64,
                detections: vec![falling_frame(1, f), observation(2, 250.0, 200.0)],
            };
            let statuses = worker.process_frame(&frame).unwrap();
            assert_eq!(statuses.len(), 2);
            assert_eq!(statuses[1].status, FallStatus::Normal);
            if statuses[0].alert_id.is_some() {
                alert_frames.push(f);
            }
        }

        assert_eq!(alert_frames, vec![30]);
        assert_eq!(worker.alerts_delivered(), 1);

        let summary = metrics.summary();
        assert_eq!(summary.total_frames, 40);
        assert_eq!(summary.observations, 80);
        assert_eq!(summary.alerts_triggered, 1);
        assert_eq!(summary.potential_fall_frames, 4);
        assert_eq!(summary.falling_frames, 11);
        assert_eq!(summary.alerts_suppressed, 10);

        let sink = worker.into_alert_sink();
        assert_eq!(sink.records.len(), 1);
        let record = &sink.records[0];
        assert_eq!(record.camera_id, "cam-1");
        assert_eq!(record.person_id, 1);
        assert_eq!(record.frame_index, 30);
        assert_eq!(record.alert_type, "FALL DETECTED");
    }

    #[test]
    fn test_worker_evicts_persons_that_leave() {
        let clock = ManualClock::new(0.0);
        let metrics = PipelineMetrics::new();
        let mut worker = CameraWorker::new(
            camera(),
            test_config(),
            1000.0,
            clock.clone(),
            MemoryAlertSink::default(),
            metrics.clone(),
        )
        .unwrap();

        clock.set_ms(0.0);
        worker
            .process_frame(&FrameDetections {
                frame_index: 1,
                detections: vec![observation(1, 200.0, 200.0), observation(2, 200.0, 200.0)],
            })
            .unwrap();
        assert_eq!(worker.tracked_persons(), 2);

        clock.set_ms(2000.0);
        worker
            .process_frame(&FrameDetections {
                frame_index: 2,
                detections: vec![observation(2, 200.0, 200.0)],
            })
            .unwrap();
        assert_eq!(worker.tracked_persons(), 1);
        assert_eq!(metrics.summary().persons_evicted, 1);

        worker.end_track(2);
        assert_eq!(worker.tracked_persons(), 0);
    }

    #[test]
    fn test_delivery_failure_does_not_stop_the_camera() {
        let clock = ManualClock::new(0.0);
        let metrics = PipelineMetrics::new();
        let mut worker = CameraWorker::new(
            camera(),
            test_config(),
            5000.0,
            clock.clone(),
            FailingSink,
            metrics.clone(),
        )
        .unwrap();

        for f in 1..=40u32 {
            clock.set_ms(f as f64 * 40.0);
            let frame = FrameDetections {
                frame_index: f as u64,
                detections: vec![falling_frame(1, f)],
            };
            let statuses = worker.process_frame(&frame).unwrap();
            assert!(statuses[0].alert_id.is_none());
        }

        let summary = metrics.summary();
        assert_eq!(summary.alerts_triggered, 1);
        assert_eq!(summary.alert_delivery_failures, 1);
        assert_eq!(worker.frames_processed(), 40);
    }

    #[test]
    fn test_alert_record_json_shape() {
        let record = AlertRecord::new(&camera(), 9, 120);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["camera_id"], "cam-1");
        assert_eq!(json["person_id"], 9);
        assert_eq!(json["analytics"], "Fall Detection");
        assert!(json["alert_id"].as_str().unwrap().len() == 36);
    }
}
