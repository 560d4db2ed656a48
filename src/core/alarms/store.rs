//! Persistent storage for alarms.
//!
//! Stores the alarm list as one JSON array in the app data directory.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use thiserror::Error;

use super::model::{AlarmDefinition, AlarmId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("alarm store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("alarm store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("no alarm with id {0}")]
    NotFound(AlarmId),
}

/// Durable mapping from alarm id to alarm record.
///
/// Read-your-writes within one process; concurrent writers to the same
/// record resolve last-writer-wins on `updated_at` (every `put` refreshes it).
pub trait AlarmStore: Send + Sync {
    fn list(&self) -> Result<Vec<AlarmDefinition>, StoreError>;

    fn get(&self, id: &str) -> Result<Option<AlarmDefinition>, StoreError>;

    /// Insert or replace, refreshing `updated_at`. Returns the stored record.
    fn put(&self, alarm: AlarmDefinition) -> Result<AlarmDefinition, StoreError>;

    /// Returns true if the alarm existed.
    fn delete(&self, id: &str) -> Result<bool, StoreError>;

    fn list_enabled(&self) -> Result<Vec<AlarmDefinition>, StoreError> {
        Ok(self.list()?.into_iter().filter(|a| a.enabled).collect())
    }
}

/// File-backed [`AlarmStore`] keeping the whole list in `alarms.json`.
pub struct JsonAlarmStore {
    path: PathBuf,
    alarms: Mutex<Vec<AlarmDefinition>>,
}

impl JsonAlarmStore {
    /// Open the store in `data_dir`, reading any existing alarm file.
    ///
    /// A corrupt file is treated as empty rather than refusing to start; the
    /// damaged content is logged and overwritten on the next write.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = data_dir.into().join("alarms.json");
        let alarms = if path.exists() {
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str(&content) {
                Ok(list) => list,
                Err(e) => {
                    log::warn!("ignoring corrupt alarm file {:?}: {e}", path);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        Ok(Self {
            path,
            alarms: Mutex::new(alarms),
        })
    }

    fn persist(&self, alarms: &[AlarmDefinition]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(alarms)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl AlarmStore for JsonAlarmStore {
    fn list(&self) -> Result<Vec<AlarmDefinition>, StoreError> {
        Ok(self.alarms.lock().unwrap().clone())
    }

    fn get(&self, id: &str) -> Result<Option<AlarmDefinition>, StoreError> {
        Ok(self
            .alarms
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    fn put(&self, mut alarm: AlarmDefinition) -> Result<AlarmDefinition, StoreError> {
        alarm.updated_at = Utc::now();
        let mut alarms = self.alarms.lock().unwrap();
        match alarms.iter_mut().find(|a| a.id == alarm.id) {
            Some(existing) => *existing = alarm.clone(),
            None => alarms.push(alarm.clone()),
        }
        self.persist(&alarms)?;
        Ok(alarm)
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut alarms = self.alarms.lock().unwrap();
        let before = alarms.len();
        alarms.retain(|a| a.id != id);
        if alarms.len() == before {
            return Ok(false);
        }
        self.persist(&alarms)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alarms::model::{next_alarm_id, NewAlarm};
    use crate::core::geo::Coordinate;
    use tempfile::tempdir;

    fn make_alarm(name: &str) -> AlarmDefinition {
        let new = NewAlarm::new(name, Coordinate::new(37.7749, -122.4194).unwrap(), 500.0);
        let now = Utc::now();
        AlarmDefinition {
            id: next_alarm_id(),
            name: new.name,
            center: new.center,
            radius_meters: new.radius_meters,
            enabled: new.enabled,
            disable_after_trigger: new.disable_after_trigger,
            address: new.address,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_put_get_delete_roundtrip() {
        let dir = tempdir().unwrap();
        let store = JsonAlarmStore::open(dir.path()).unwrap();

        let alarm = store.put(make_alarm("Home")).unwrap();
        assert_eq!(store.get(&alarm.id).unwrap().unwrap().name, "Home");
        assert_eq!(store.list().unwrap().len(), 1);

        assert!(store.delete(&alarm.id).unwrap());
        assert!(store.get(&alarm.id).unwrap().is_none());
        assert!(!store.delete(&alarm.id).unwrap());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let id = {
            let store = JsonAlarmStore::open(dir.path()).unwrap();
            store.put(make_alarm("Work")).unwrap().id
        };

        let store = JsonAlarmStore::open(dir.path()).unwrap();
        let loaded = store.get(&id).unwrap().unwrap();
        assert_eq!(loaded.name, "Work");
    }

    #[test]
    fn test_put_refreshes_updated_at() {
        let dir = tempdir().unwrap();
        let store = JsonAlarmStore::open(dir.path()).unwrap();

        let alarm = store.put(make_alarm("Home")).unwrap();
        let first = alarm.updated_at;

        let again = store.put(alarm).unwrap();
        assert!(again.updated_at >= first);
        assert_eq!(store.list().unwrap().len(), 1, "put replaces, not appends");
    }

    #[test]
    fn test_list_enabled_filters() {
        let dir = tempdir().unwrap();
        let store = JsonAlarmStore::open(dir.path()).unwrap();

        let mut off = make_alarm("Off");
        off.enabled = false;
        store.put(off).unwrap();
        store.put(make_alarm("On")).unwrap();

        let enabled = store.list_enabled().unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "On");
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("alarms.json"), "{ not json").unwrap();

        let store = JsonAlarmStore::open(dir.path()).unwrap();
        assert!(store.list().unwrap().is_empty());
    }
}
