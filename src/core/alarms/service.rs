//! Alarm CRUD operations - the headless equivalents of the app's screen
//! actions (create/edit/delete/toggle).

use std::sync::Arc;

use chrono::Utc;
use log::info;
use thiserror::Error;

use super::model::{next_alarm_id, AlarmChanges, AlarmDefinition, NewAlarm};
use super::store::{AlarmStore, StoreError};
use crate::core::geocode::ReverseGeocoder;
use crate::core::model::ValidationError;
use crate::core::session::MonitorSession;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validated write path to the alarm store.
///
/// Contract violations (non-positive radius, out-of-range coordinates, empty
/// name) fail here, before being admitted to the repository. An attached
/// session is told to re-arm alarms the user re-enables; an attached reverse
/// geocoder fills in display addresses for new alarms.
pub struct AlarmService {
    store: Arc<dyn AlarmStore>,
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    session: Option<Arc<MonitorSession>>,
}

impl AlarmService {
    pub fn new(store: Arc<dyn AlarmStore>) -> Self {
        Self {
            store,
            geocoder: None,
            session: None,
        }
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_session(mut self, session: Arc<MonitorSession>) -> Self {
        self.session = Some(session);
        self
    }

    /// Create an alarm: validate, assign id and timestamps, optionally
    /// resolve a display address, persist.
    pub async fn create(&self, new: NewAlarm) -> Result<AlarmDefinition, ServiceError> {
        let now = Utc::now();
        let mut alarm = AlarmDefinition {
            id: next_alarm_id(),
            name: new.name,
            center: new.center,
            radius_meters: new.radius_meters,
            enabled: new.enabled,
            disable_after_trigger: new.disable_after_trigger,
            address: new.address,
            created_at: now,
            updated_at: now,
        };
        alarm.validate()?;

        if alarm.address.is_none() {
            if let Some(geocoder) = &self.geocoder {
                alarm.address = geocoder.address_for(alarm.center).await;
            }
        }

        let stored = self.store.put(alarm)?;
        info!("created alarm {} ({})", stored.name, stored.id);
        Ok(stored)
    }

    /// Apply a partial edit. Id and created_at never change; `updated_at`
    /// is refreshed by the store.
    pub fn update(&self, id: &str, changes: AlarmChanges) -> Result<AlarmDefinition, ServiceError> {
        let mut alarm = self
            .store
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(name) = changes.name {
            alarm.name = name;
        }
        if let Some(center) = changes.center {
            alarm.center = center;
        }
        if let Some(radius_meters) = changes.radius_meters {
            alarm.radius_meters = radius_meters;
        }
        if let Some(disable_after_trigger) = changes.disable_after_trigger {
            alarm.disable_after_trigger = disable_after_trigger;
        }
        if let Some(address) = changes.address {
            alarm.address = address;
        }
        alarm.validate()?;

        Ok(self.store.put(alarm)?)
    }

    /// Enable or disable an alarm.
    ///
    /// Re-enabling also re-arms it in the running session; without that, a
    /// user standing inside the zone who toggles the alarm back on would
    /// never get a second notification.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<AlarmDefinition, ServiceError> {
        let mut alarm = self
            .store
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        alarm.enabled = enabled;
        let stored = self.store.put(alarm)?;

        if enabled {
            if let Some(session) = &self.session {
                session.reset_arm_state(id);
            }
        }
        Ok(stored)
    }

    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.store.delete(id)
    }

    pub fn list(&self) -> Result<Vec<AlarmDefinition>, StoreError> {
        self.store.list()
    }

    pub fn get(&self, id: &str) -> Result<Option<AlarmDefinition>, StoreError> {
        self.store.get(id)
    }
}
