// src/pipeline/metrics.rs
//
// Decision counters. Every camera worker records into a clone of the same
// PipelineMetrics; summary() aggregates across cameras.

use crate::analysis::FrameDecision;
use crate::types::FallStatus;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct Counters {
    frames: AtomicU64,
    observations: AtomicU64,
    velocity_samples: AtomicU64,
    potential_fall_frames: AtomicU64,
    falling_frames: AtomicU64,
    alerts_triggered: AtomicU64,
    alerts_suppressed: AtomicU64,
    alert_delivery_failures: AtomicU64,
    persons_evicted: AtomicU64,
    engine_us_total: AtomicU64,
}

fn bump(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

fn read(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    counters: Arc<Counters>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// One camera frame, with the time spent running the engine over it.
    pub fn record_frame(&self, engine_time: Duration) {
        bump(&self.counters.frames, 1);
        bump(
            &self.counters.engine_us_total,
            engine_time.as_micros() as u64,
        );
    }

    pub fn record_decision(&self, decision: &FrameDecision) {
        let c = &self.counters;
        bump(&c.observations, 1);
        if decision.velocity_sample.is_some() {
            bump(&c.velocity_samples, 1);
        }
        match decision.status {
            FallStatus::PotentialFall => bump(&c.potential_fall_frames, 1),
            FallStatus::Falling => bump(&c.falling_frames, 1),
            FallStatus::Normal => {}
        }
        if decision.alert_triggered {
            bump(&c.alerts_triggered, 1);
        }
        if decision.alert_suppressed {
            bump(&c.alerts_suppressed, 1);
        }
    }

    pub fn record_delivery_failure(&self) {
        bump(&self.counters.alert_delivery_failures, 1);
    }

    pub fn record_evictions(&self, count: usize) {
        bump(&self.counters.persons_evicted, count as u64);
    }

    pub fn summary(&self) -> MetricsSummary {
        let c = &self.counters;
        let frames = read(&c.frames);
        let avg_engine_us = if frames > 0 {
            read(&c.engine_us_total) as f64 / frames as f64
        } else {
            0.0
        };
        MetricsSummary {
            total_frames: frames,
            observations: read(&c.observations),
            velocity_samples: read(&c.velocity_samples),
            potential_fall_frames: read(&c.potential_fall_frames),
            falling_frames: read(&c.falling_frames),
            alerts_triggered: read(&c.alerts_triggered),
            alerts_suppressed: read(&c.alerts_suppressed),
            alert_delivery_failures: read(&c.alert_delivery_failures),
            persons_evicted: read(&c.persons_evicted),
            avg_engine_us,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub observations: u64,
    pub velocity_samples: u64,
    pub potential_fall_frames: u64,
    pub falling_frames: u64,
    pub alerts_triggered: u64,
    pub alerts_suppressed: u64,
    pub alert_delivery_failures: u64,
    pub persons_evicted: u64,
    /// Mean engine time per frame, microseconds
    pub avg_engine_us: f64,
}
