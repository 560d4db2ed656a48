//! Geofence evaluation - decides which alarms fire for a position sample.
//!
//! # Arm state
//!
//! ```text
//!             sample inside radius
//!   Armed ──────────────────────────► Fired   (emits FireEvent)
//!     ▲                                 │
//!     │    sample outside radius        │  sample inside radius
//!     └─────────────────────────────────┘  (suppressed, no event)
//! ```
//!
//! An alarm fires once on entry and stays silent while the user remains
//! inside the zone. Leaving the zone re-arms it, so a later re-entry fires
//! again. Re-arming is geometric, never time-based: standing inside the zone
//! for an hour produces exactly one event.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::model::{AlarmDefinition, AlarmId};
use crate::core::geo;
use crate::core::model::PositionSample;

/// Per-alarm arm state, held in memory for the lifetime of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArmState {
    /// Eligible to fire on the next in-range sample.
    Armed,
    /// Inside the zone, already fired; waiting for exit.
    Fired,
}

/// An alarm whose trigger condition was met for the current sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireEvent {
    pub alarm_id: AlarmId,
    /// Distance from the sample to the alarm center, in meters.
    pub distance_meters: f64,
}

/// Pure decision core plus the arm-state table.
///
/// Performs no I/O; side effects (notification, disable-after-trigger
/// persistence) are signaled through the returned events and performed by the
/// caller.
#[derive(Debug, Default)]
pub struct GeofenceEvaluator {
    states: HashMap<AlarmId, ArmState>,
}

impl GeofenceEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one sample against the current alarm set.
    ///
    /// Each enabled alarm is checked independently; evaluation order never
    /// affects the result set. Arm-state entries are created lazily
    /// (armed) the first time an id is seen. Disabled alarms are skipped
    /// entirely; their arm state is irrelevant while disabled.
    pub fn evaluate(
        &mut self,
        sample: &PositionSample,
        alarms: &[AlarmDefinition],
    ) -> Vec<FireEvent> {
        let mut fired = Vec::new();

        for alarm in alarms {
            if !alarm.enabled {
                continue;
            }

            let distance = geo::distance_meters(sample.coordinate, alarm.center);
            let state = self
                .states
                .entry(alarm.id.clone())
                .or_insert(ArmState::Armed);

            if distance <= alarm.radius_meters {
                if *state == ArmState::Armed {
                    *state = ArmState::Fired;
                    fired.push(FireEvent {
                        alarm_id: alarm.id.clone(),
                        distance_meters: distance,
                    });
                }
                // Fired and still inside: suppress repeat.
            } else if *state == ArmState::Fired {
                // Left the zone: eligible to fire again on re-entry.
                *state = ArmState::Armed;
            }
        }

        fired
    }

    /// Re-arm one alarm. Idempotent; a no-op for ids with no entry yet
    /// (a lazily created entry starts armed anyway).
    pub fn reset(&mut self, id: &str) {
        if let Some(state) = self.states.get_mut(id) {
            *state = ArmState::Armed;
        }
    }

    /// Drop one arm-state entry (disable-after-trigger).
    pub fn remove(&mut self, id: &str) {
        self.states.remove(id);
    }

    /// Drop entries for alarms that no longer exist.
    pub fn prune(&mut self, live: &HashSet<AlarmId>) {
        self.states.retain(|id, _| live.contains(id));
    }

    /// Discard all arm state (session start/stop).
    pub fn clear(&mut self) {
        self.states.clear();
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.states.len()
    }
}
