// src/main.rs
//
// Replays recorded tracker output through one fall-detection worker per
// camera, in parallel, and writes alert records as JSON lines.

use anyhow::Result;
use fall_detection::pipeline::{
    find_recordings, replay, CameraReport, JsonlAlertSink, PipelineMetrics, Recording,
};
use fall_detection::Config;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("FALL_DETECTION_CONFIG").ok())
        .unwrap_or_else(|| "config.yaml".to_string());

    let config = Config::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fall_detection={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🧍 Fall Detection System Starting");
    info!("✓ Configuration loaded from {}", config_path);

    let fall = config.fall_config();
    info!(
        "Engine: N={}, M={}, min_fall_speed={:.1}px/s, confirm_frames={}, alert_reset={:.1}s, head_inversion={:?}",
        fall.frames_per_velocity,
        fall.velocity_history_length,
        fall.min_fall_speed,
        fall.confirmation_frames,
        fall.alert_reset_seconds,
        fall.head_inversion_mode
    );

    let recordings = find_recordings(&config.input.recordings_dir)?;
    if recordings.is_empty() {
        error!("No recordings found in {}", config.input.recordings_dir);
        return Ok(());
    }

    let metrics = PipelineMetrics::new();
    let mut handles = Vec::with_capacity(recordings.len());

    for path in recordings {
        let config = config.clone();
        let metrics = metrics.clone();
        let label = path.display().to_string();
        let handle = tokio::task::spawn_blocking(move || run_camera(&path, &config, metrics));
        handles.push((label, handle));
    }

    let mut reports: Vec<CameraReport> = Vec::new();
    for (label, handle) in handles {
        match handle.await {
            Ok(Ok(report)) => reports.push(report),
            Ok(Err(e)) => error!("Camera {} failed: {:#}", label, e),
            Err(e) => error!("Camera task {} panicked: {}", label, e),
        }
    }

    info!("\n========================================");
    for report in &reports {
        info!(
            "  [{}:{}] frames={} fps={} alerts={} skipped={}",
            report.camera_id,
            report.camera_name,
            report.frames,
            report.measured_fps,
            report.alerts,
            report.skipped_frames
        );
    }
    let summary = metrics.summary();
    info!("  Total frames: {}", summary.total_frames);
    info!("  Person observations: {}", summary.observations);
    info!("  🚨 Alerts triggered: {}", summary.alerts_triggered);
    info!("  Alerts suppressed (debounce): {}", summary.alerts_suppressed);
    info!("  Engine time per frame: {:.1}us", summary.avg_engine_us);
    if summary.alert_delivery_failures > 0 {
        error!(
            "  Alert delivery failures: {}",
            summary.alert_delivery_failures
        );
    }
    info!("{}", serde_json::to_string_pretty(&summary)?);
    info!("========================================\n");

    Ok(())
}

/// One camera, start to finish. Runs on a blocking thread: the engine is
/// pure computation and never awaits.
fn run_camera(path: &Path, config: &Config, metrics: PipelineMetrics) -> Result<CameraReport> {
    let recording = Recording::load(path)?;
    let alerts_path: PathBuf = Path::new(&config.output.alerts_dir)
        .join(format!("{}.jsonl", recording.camera.camera_id));
    let sink = JsonlAlertSink::create(&alerts_path)?;

    let (report, _sink) = replay(
        &recording,
        config.fall_config(),
        config.idle_eviction_ms(),
        sink,
        metrics,
    )?;
    Ok(report)
}
