// src/analysis/person_state.rs
//
// Bounded per-person history, owned by one camera context.
//
// The store is passed by reference into every engine call. Nothing in here
// is global, and nothing is shared across cameras.

use super::features::FeatureSnapshot;
use crate::types::FallStatus;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PersonState {
    /// Last N*M snapshots, oldest first
    pub history: VecDeque<FeatureSnapshot>,
    /// Last M velocity samples (px/s, positive = downward), oldest first
    pub velocity_history: VecDeque<f32>,
    pub frame_count: u64,
    /// Consecutive frames the fusion rule fired
    pub fall_streak: u32,
    pub alert_active: bool,
    pub last_alert_ms: Option<f64>,
    pub last_seen_ms: f64,
    pub last_status: FallStatus,
    history_capacity: usize,
    velocity_capacity: usize,
}

impl PersonState {
    pub fn new(history_capacity: usize, velocity_capacity: usize, now_ms: f64) -> Self {
        Self {
            history: VecDeque::with_capacity(history_capacity),
            velocity_history: VecDeque::with_capacity(velocity_capacity),
            frame_count: 0,
            fall_streak: 0,
            alert_active: false,
            last_alert_ms: None,
            last_seen_ms: now_ms,
            last_status: FallStatus::Normal,
            history_capacity,
            velocity_capacity,
        }
    }

    pub fn push_snapshot(&mut self, snapshot: FeatureSnapshot) {
        push_bounded(&mut self.history, snapshot, self.history_capacity);
    }

    pub fn push_velocity(&mut self, velocity: f32) {
        push_bounded(&mut self.velocity_history, velocity, self.velocity_capacity);
    }

    /// Snapshot `back` positions before the latest one (0 = latest).
    pub fn snapshot_back(&self, back: usize) -> Option<&FeatureSnapshot> {
        let len = self.history.len();
        if back >= len {
            return None;
        }
        self.history.get(len - 1 - back)
    }

    pub fn latest(&self) -> Option<&FeatureSnapshot> {
        self.history.back()
    }
}

fn push_bounded<T>(buf: &mut VecDeque<T>, item: T, capacity: usize) {
    if buf.len() >= capacity {
        buf.pop_front();
    }
    buf.push_back(item);
}

// ============================================================================
// STORE
// ============================================================================

pub struct PersonStore {
    persons: HashMap<u32, PersonState>,
    history_capacity: usize,
    velocity_capacity: usize,
}

impl PersonStore {
    /// `history_capacity` is N*M, `velocity_capacity` is M.
    pub fn new(history_capacity: usize, velocity_capacity: usize) -> Self {
        Self {
            persons: HashMap::new(),
            history_capacity,
            velocity_capacity,
        }
    }

    /// Record one frame for `person_id`, creating its state on first sight.
    pub fn observe(
        &mut self,
        person_id: u32,
        snapshot: FeatureSnapshot,
        now_ms: f64,
    ) -> &mut PersonState {
        let (history_capacity, velocity_capacity) = (self.history_capacity, self.velocity_capacity);
        let state = self.persons.entry(person_id).or_insert_with(|| {
            debug!("New person {} tracked", person_id);
            PersonState::new(history_capacity, velocity_capacity, now_ms)
        });

        state.push_snapshot(snapshot);
        state.frame_count += 1;
        state.last_seen_ms = now_ms;
        state
    }

    pub fn get(&self, person_id: u32) -> Option<&PersonState> {
        self.persons.get(&person_id)
    }

    /// Explicit "track ended" from the tracker.
    pub fn end_track(&mut self, person_id: u32) -> Option<PersonState> {
        self.persons.remove(&person_id)
    }

    /// Drop every person not observed within `idle_ms`. Returns the removed ids.
    pub fn evict_idle(&mut self, now_ms: f64, idle_ms: f64) -> Vec<u32> {
        let mut evicted: Vec<u32> = self
            .persons
            .iter()
            .filter(|(_, s)| now_ms - s.last_seen_ms > idle_ms)
            .map(|(id, _)| *id)
            .collect();
        evicted.sort_unstable();

        for id in &evicted {
            self.persons.remove(id);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn person_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.persons.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
