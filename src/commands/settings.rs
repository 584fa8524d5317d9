use crate::config::{self, ConfigError, SETTING_API_URL, SETTING_KEYS};
use crate::coordinator::SessionCoordinator;
use crate::db::Database;
use crate::transport::Health;
use std::collections::HashMap;

pub fn get_settings(db: &Database) -> Result<HashMap<String, String>, String> {
    let mut map = db.all_settings().map_err(|e| e.to_string())?;
    map.retain(|key, _| SETTING_KEYS.contains(&key.as_str()));
    Ok(map)
}

/// Stored for the next start; the running configuration does not change.
pub fn set_setting(db: &Database, key: String, value: String) -> Result<(), String> {
    if !SETTING_KEYS.contains(&key.as_str()) {
        return Err(ConfigError::UnknownKey(key).to_string());
    }
    let value = if key == SETTING_API_URL {
        config::normalize_base_url(&value).map_err(|e| e.to_string())?
    } else {
        value
    };
    db.set_setting(&key, &value).map_err(|e| e.to_string())
}

pub fn delete_setting(db: &Database, key: String) -> Result<(), String> {
    if !SETTING_KEYS.contains(&key.as_str()) {
        return Err(ConfigError::UnknownKey(key).to_string());
    }
    db.delete_setting(&key).map_err(|e| e.to_string())
}

pub async fn health(coordinator: &SessionCoordinator) -> Result<Health, String> {
    coordinator.transport().health().await.map_err(|e| e.to_string())
}
