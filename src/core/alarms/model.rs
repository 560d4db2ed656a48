//! Alarm model types.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::geo::Coordinate;
use crate::core::model::ValidationError;

pub type AlarmId = String;

static ALARM_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new opaque alarm id.
///
/// Epoch milliseconds plus a process-wide counter keeps ids unique even when
/// several alarms are created in the same millisecond.
pub fn next_alarm_id() -> AlarmId {
    let seq = ALARM_ID_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{:x}-{:x}", Utc::now().timestamp_millis(), seq)
}

/// A stored alarm: a named location with a trigger radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmDefinition {
    /// Opaque unique identifier, immutable once created.
    pub id: AlarmId,
    pub name: String,
    pub center: Coordinate,
    /// Trigger threshold. Always positive; enforced before storage.
    pub radius_meters: f64,
    /// Disabled alarms are never evaluated.
    pub enabled: bool,
    /// One-shot: disable the alarm the first time it fires.
    #[serde(default)]
    pub disable_after_trigger: bool,
    /// Display only, no role in evaluation.
    #[serde(default)]
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every write; last-writer-wins merge key for concurrent
    /// edits.
    pub updated_at: DateTime<Utc>,
}

impl AlarmDefinition {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        self.center.validate()?;
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(ValidationError::RadiusNotPositive(self.radius_meters));
        }
        Ok(())
    }
}

/// Input for creating an alarm; id and timestamps are assigned by the service.
#[derive(Debug, Clone)]
pub struct NewAlarm {
    pub name: String,
    pub center: Coordinate,
    pub radius_meters: f64,
    pub enabled: bool,
    pub disable_after_trigger: bool,
    /// Explicit display address; when `None` the service may fill it in via
    /// reverse geocoding.
    pub address: Option<String>,
}

impl NewAlarm {
    pub fn new(name: impl Into<String>, center: Coordinate, radius_meters: f64) -> Self {
        Self {
            name: name.into(),
            center,
            radius_meters,
            enabled: true,
            disable_after_trigger: false,
            address: None,
        }
    }
}

/// Partial update for an existing alarm. `None` fields are left untouched;
/// id and created_at are never changed.
#[derive(Debug, Clone, Default)]
pub struct AlarmChanges {
    pub name: Option<String>,
    pub center: Option<Coordinate>,
    pub radius_meters: Option<f64>,
    pub disable_after_trigger: Option<bool>,
    pub address: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alarm(radius: f64) -> AlarmDefinition {
        let now = Utc::now();
        AlarmDefinition {
            id: next_alarm_id(),
            name: "Home".to_string(),
            center: Coordinate::new(37.7749, -122.4194).unwrap(),
            radius_meters: radius,
            enabled: true,
            disable_after_trigger: false,
            address: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_valid_alarm_passes() {
        assert!(alarm(500.0).validate().is_ok());
    }

    #[test]
    fn test_non_positive_radius_rejected() {
        assert_eq!(
            alarm(0.0).validate(),
            Err(ValidationError::RadiusNotPositive(0.0))
        );
        assert_eq!(
            alarm(-10.0).validate(),
            Err(ValidationError::RadiusNotPositive(-10.0))
        );
        assert!(alarm(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut a = alarm(500.0);
        a.name = "  ".to_string();
        assert_eq!(a.validate(), Err(ValidationError::EmptyName));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = next_alarm_id();
        let b = next_alarm_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_serde_defaults_for_optional_fields() {
        // Older stored records carry neither disable_after_trigger nor address.
        let json = r#"{
            "id": "abc",
            "name": "Work",
            "center": {"latitude": 1.0, "longitude": 2.0},
            "radius_meters": 250.0,
            "enabled": true,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }"#;
        let parsed: AlarmDefinition = serde_json::from_str(json).unwrap();
        assert!(!parsed.disable_after_trigger);
        assert_eq!(parsed.address, None);
    }
}
