// src/pipeline/event_bus.rs
//
// Decision-point events. The engine publishes into an EventSink and never
// logs inline; the sink decides whether events are queued, logged, or dropped.

use std::collections::VecDeque;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum FallEvent {
    VelocitySample {
        person_id: u32,
        frame_count: u64,
        velocity_px_s: f32,
    },

    PotentialFall {
        person_id: u32,
        fall_streak: u32,
        indicators: Vec<&'static str>,
    },

    FallConfirmed {
        person_id: u32,
        fall_streak: u32,
        indicators: Vec<&'static str>,
        timestamp_ms: f64,
    },

    /// Fall still confirmed, but an alert already went out inside the reset window
    AlertSuppressed {
        person_id: u32,
        since_last_alert_ms: f64,
    },

    AlertRearmed {
        person_id: u32,
    },

    PersonEvicted {
        person_id: u32,
    },
}

pub trait EventSink {
    fn publish(&mut self, event: FallEvent);
}

/// Discards everything.
impl EventSink for () {
    fn publish(&mut self, _event: FallEvent) {}
}

/// Bounded in-memory queue, drained by the owner.
pub struct EventBus {
    events: VecDeque<FallEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
        }
    }

    pub fn drain(&mut self) -> Vec<FallEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }
}

impl EventSink for EventBus {
    fn publish(&mut self, event: FallEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Writes every event as a structured log line tagged with the camera.
pub struct TracingSink {
    camera_id: String,
}

impl TracingSink {
    pub fn new(camera_id: impl Into<String>) -> Self {
        Self {
            camera_id: camera_id.into(),
        }
    }
}

impl EventSink for TracingSink {
    fn publish(&mut self, event: FallEvent) {
        let camera = self.camera_id.as_str();
        match event {
            FallEvent::VelocitySample {
                person_id,
                frame_count,
                velocity_px_s,
            } => debug!(
                camera,
                person_id,
                frame_count,
                "velocity {:.1} px/s ({})",
                velocity_px_s,
                if velocity_px_s > 0.0 { "down" } else { "up" }
            ),
            FallEvent::PotentialFall {
                person_id,
                fall_streak,
                indicators,
            } => debug!(
                camera,
                person_id, fall_streak, "potential fall: {:?}", indicators
            ),
            FallEvent::FallConfirmed {
                person_id,
                fall_streak,
                indicators,
                ..
            } => info!(
                camera,
                person_id,
                fall_streak,
                "FALL CONFIRMED, indicators: {:?}",
                indicators
            ),
            FallEvent::AlertSuppressed {
                person_id,
                since_last_alert_ms,
            } => debug!(
                camera,
                person_id,
                "alert suppressed, last alert {:.0} ms ago",
                since_last_alert_ms
            ),
            FallEvent::AlertRearmed { person_id } => {
                debug!(camera, person_id, "alert re-armed")
            }
            FallEvent::PersonEvicted { person_id } => {
                debug!(camera, person_id, "idle person evicted")
            }
        }
    }
}
