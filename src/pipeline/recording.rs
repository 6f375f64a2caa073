// src/pipeline/recording.rs
//
// Replay of recorded tracker output. One JSON-lines file per camera:
//
//   {"camera_id": "cam-1", "camera_name": "Lobby"}
//   {"frame_index": 1, "timestamp_ms": 0.0, "detections": [
//       {"person_id": 3, "keypoints": [[x, y, conf], ...17], "bbox": [x1, y1, x2, y2]}]}
//   ...
//
// Frame timestamps drive a ManualClock, so a replay reproduces the
// debounce timing of the live capture regardless of replay speed.

use super::camera_worker::{AlertSink, CameraInfo, CameraWorker, FrameDetections};
use super::clock::ManualClock;
use super::metrics::PipelineMetrics;
use crate::analysis::FallConfig;
use crate::types::{BBox, Keypoint, PoseObservation, NUM_KEYPOINTS};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedDetection {
    pub person_id: u32,
    /// [x, y, confidence] per COCO keypoint
    pub keypoints: Vec<[f32; 3]>,
    pub bbox: [f32; 4],
}

impl RecordedDetection {
    pub fn to_observation(&self) -> Result<PoseObservation> {
        let points: Vec<Keypoint> = self
            .keypoints
            .iter()
            .map(|k| Keypoint {
                x: k[0],
                y: k[1],
                confidence: k[2],
            })
            .collect();
        let keypoints: [Keypoint; NUM_KEYPOINTS] = points.try_into().map_err(|v: Vec<Keypoint>| {
            anyhow!(
                "person {}: expected {} keypoints, got {}",
                self.person_id,
                NUM_KEYPOINTS,
                v.len()
            )
        })?;

        let [x1, y1, x2, y2] = self.bbox;
        Ok(PoseObservation {
            person_id: self.person_id,
            keypoints,
            bbox: BBox::new(x1, y1, x2, y2),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub frame_index: u64,
    pub timestamp_ms: f64,
    #[serde(default)]
    pub detections: Vec<RecordedDetection>,
}

impl RecordedFrame {
    pub fn to_detections(&self) -> Result<FrameDetections> {
        let detections = self
            .detections
            .iter()
            .map(RecordedDetection::to_observation)
            .collect::<Result<Vec<_>>>()?;
        Ok(FrameDetections {
            frame_index: self.frame_index,
            detections,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Recording {
    pub camera: CameraInfo,
    pub frames: Vec<RecordedFrame>,
}

impl Recording {
    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("opening recording {}", path.display()))?;
        Self::parse(BufReader::new(file))
            .with_context(|| format!("parsing recording {}", path.display()))
    }

    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader
            .lines()
            .enumerate()
            .filter(|(_, l)| l.as_ref().map(|s| !s.trim().is_empty()).unwrap_or(true));

        let (_, header) = lines.next().ok_or_else(|| anyhow!("empty recording"))?;
        let camera: CameraInfo =
            serde_json::from_str(&header?).context("line 1: invalid camera header")?;

        let mut frames = Vec::new();
        for (idx, line) in lines {
            let frame: RecordedFrame = serde_json::from_str(&line?)
                .with_context(|| format!("line {}: invalid frame", idx + 1))?;
            frames.push(frame);
        }

        Ok(Self { camera, frames })
    }
}

/// All `.jsonl` files under `dir`, sorted for a stable camera order.
pub fn find_recordings(dir: &str) -> Result<Vec<PathBuf>> {
    let mut recordings = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
            recordings.push(path.to_path_buf());
        }
    }

    recordings.sort();
    info!("Found {} recording(s) in {}", recordings.len(), dir);
    Ok(recordings)
}

#[derive(Debug, Clone, Serialize)]
pub struct CameraReport {
    pub camera_id: String,
    pub camera_name: String,
    pub frames: u64,
    pub alerts: u64,
    pub skipped_frames: u64,
    /// Frame rate measured over the recording's timestamps
    pub measured_fps: f32,
}

/// Run a whole recording through one camera worker.
///
/// Frames whose detections are malformed are skipped with a warning; the
/// rest of the recording still plays.
pub fn replay<A: AlertSink>(
    recording: &Recording,
    config: FallConfig,
    idle_eviction_ms: f64,
    alerts: A,
    metrics: PipelineMetrics,
) -> Result<(CameraReport, A)> {
    let start_ms = recording
        .frames
        .first()
        .map(|f| f.timestamp_ms)
        .unwrap_or(0.0);
    let clock = ManualClock::new(start_ms);
    let mut worker = CameraWorker::new(
        recording.camera.clone(),
        config,
        idle_eviction_ms,
        clock.clone(),
        alerts,
        metrics,
    )?;

    let mut skipped_frames = 0;
    for frame in &recording.frames {
        let detections = match frame.to_detections() {
            Ok(d) => d,
            Err(e) => {
                warn!(
                    "[{}] skipping frame {}: {:#}",
                    recording.camera.camera_id, frame.frame_index, e
                );
                skipped_frames += 1;
                continue;
            }
        };
        clock.set_ms(frame.timestamp_ms);
        worker.process_frame(&detections)?;
    }

    let camera = worker.camera();
    let report = CameraReport {
        camera_id: camera.camera_id.clone(),
        camera_name: camera.camera_name.clone(),
        frames: worker.frames_processed(),
        alerts: worker.alerts_delivered(),
        skipped_frames,
        measured_fps: worker.current_fps(),
    };
    info!(
        "[{}:{}] replay finished: {} frames at {} fps, {} alert(s)",
        report.camera_id, report.camera_name, report.frames, report.measured_fps, report.alerts
    );
    Ok((report, worker.into_alert_sink()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fall_engine::tests::{falling_frame, test_config};
    use crate::pipeline::camera_worker::MemoryAlertSink;
    use std::io::Cursor;

    fn to_recorded(obs: &PoseObservation) -> RecordedDetection {
        RecordedDetection {
            person_id: obs.person_id,
            keypoints: obs
                .keypoints
                .iter()
                .map(|k| [k.x, k.y, k.confidence])
                .collect(),
            bbox: [obs.bbox.x1, obs.bbox.y1, obs.bbox.x2, obs.bbox.y2],
        }
    }

    fn falling_recording_text() -> String {
        let mut text = String::from("{\"camera_id\":\"cam-7\",\"camera_name\":\"Ward B\"}\n");
        for f in 1..=40u32 {
            let frame = RecordedFrame {
                frame_index: f as u64,
                timestamp_ms: f as f64 * 40.0,
                detections: vec![to_recorded(&falling_frame(5, f))],
            };
            text.push_str(&serde_json::to_string(&frame).unwrap());
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_parse_header_and_frames() {
        let recording = Recording::parse(Cursor::new(falling_recording_text())).unwrap();
        assert_eq!(recording.camera.camera_id, "cam-7");
        assert_eq!(recording.frames.len(), 40);
        assert_eq!(recording.frames[0].detections[0].keypoints.len(), 17);
    }

    #[test]
    fn test_parse_reports_bad_line() {
        let text = "{\"camera_id\":\"c\",\"camera_name\":\"n\"}\n{not json}\n";
        let err = Recording::parse(Cursor::new(text)).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn test_wrong_keypoint_count_rejected() {
        let det = RecordedDetection {
            person_id: 1,
            keypoints: vec![[0.0, 0.0, 1.0]; 16],
            bbox: [0.0, 0.0, 10.0, 10.0],
        };
        assert!(det.to_observation().is_err());
    }

    #[test]
    fn test_replay_produces_one_alert() {
        let recording = Recording::parse(Cursor::new(falling_recording_text())).unwrap();
        let (report, sink) = replay(
            &recording,
            test_config(),
            5000.0,
            MemoryAlertSink::default(),
            PipelineMetrics::new(),
        )
        .unwrap();

        assert_eq!(report.frames, 40);
        assert_eq!(report.alerts, 1);
        assert_eq!(report.skipped_frames, 0);
        // 40ms frame spacing
        assert_eq!(report.measured_fps, 25.0);
        assert_eq!(sink.records[0].camera_id, "cam-7");
        assert_eq!(sink.records[0].person_id, 5);
        assert_eq!(sink.records[0].frame_index, 30);
    }
}
