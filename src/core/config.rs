use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use super::position::SubscribeOptions;

/// Engine settings, persisted in settings.json.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// Minimum time between position fixes, in milliseconds.
    pub min_interval_ms: u64,
    /// Minimum movement between position fixes, in meters.
    pub min_distance_meters: f64,
}

impl Default for Settings {
    fn default() -> Self {
        // Battery-friendly defaults: a fix every 10 seconds or 50 meters.
        Self {
            min_interval_ms: 10_000,
            min_distance_meters: 50.0,
        }
    }
}

impl Settings {
    pub fn subscribe_options(&self) -> SubscribeOptions {
        SubscribeOptions {
            min_interval: Duration::from_millis(self.min_interval_ms),
            min_distance_meters: self.min_distance_meters,
        }
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(app_config_dir: PathBuf) -> Self {
        Self {
            config_path: app_config_dir.join("settings.json"),
        }
    }

    /// Load settings, falling back to defaults on a missing or unreadable file.
    pub fn load(&self) -> Settings {
        if self.config_path.exists() {
            if let Ok(content) = fs::read_to_string(&self.config_path) {
                match serde_json::from_str(&content) {
                    Ok(settings) => return settings,
                    Err(e) => {
                        log::warn!("ignoring corrupt settings file: {e}");
                    }
                }
            }
        }
        Settings::default()
    }

    pub fn save(&self, settings: &Settings) -> io::Result<()> {
        // Ensure directory exists
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.config_path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());

        let default = manager.load();
        assert_eq!(default.min_interval_ms, 10_000);

        let new_settings = Settings {
            min_interval_ms: 5_000,
            min_distance_meters: 10.0,
        };

        manager.save(&new_settings).unwrap();
        let loaded = manager.load();

        assert_eq!(loaded.min_interval_ms, 5_000);
        assert_eq!(loaded.min_distance_meters, 10.0);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());

        fs::write(dir.path().join("settings.json"), "not json").unwrap();
        let loaded = manager.load();
        assert_eq!(loaded.min_interval_ms, Settings::default().min_interval_ms);
    }

    #[test]
    fn test_subscribe_options_conversion() {
        let settings = Settings {
            min_interval_ms: 5_000,
            min_distance_meters: 10.0,
        };
        let options = settings.subscribe_options();
        assert_eq!(options.min_interval, Duration::from_secs(5));
        assert_eq!(options.min_distance_meters, 10.0);
    }
}
