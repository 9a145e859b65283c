//! Settings loading: defaults → user file → environment overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::{Result, SettingsError};
use crate::types::ParleySettings;

/// Path to the user settings file (`~/.parley/settings.json`).
pub fn settings_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").map_err(|_| SettingsError::NoHome)?;
    Ok(PathBuf::from(home).join(".parley").join("settings.json"))
}

/// Load settings from the default path with env overrides applied.
///
/// A missing file is not an error — defaults are used.
pub fn load_settings() -> Result<ParleySettings> {
    let path = settings_path()?;
    if path.exists() {
        load_settings_from_path(&path)
    } else {
        let mut settings = apply_env_overrides(ParleySettings::default());
        settings.validate();
        Ok(settings)
    }
}

/// Load settings from an explicit file path with env overrides applied.
pub fn load_settings_from_path(path: &Path) -> Result<ParleySettings> {
    let raw = std::fs::read_to_string(path)?;
    let file_value: Value = serde_json::from_str(&raw)?;

    // Deep-merge file values over compiled defaults so partial files work
    // even for nested sections.
    let mut merged = serde_json::to_value(ParleySettings::default())?;
    deep_merge(&mut merged, file_value);

    let settings: ParleySettings = serde_json::from_value(merged)?;
    let mut settings = apply_env_overrides(settings);
    settings.validate();
    Ok(settings)
}

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key-by-key; any other value (including arrays) replaces
/// the base value wholesale.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        let _ = base_map.insert(key, value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value,
    }
}

/// Apply `PARLEY_*` environment variable overrides (highest priority).
fn apply_env_overrides(mut settings: ParleySettings) -> ParleySettings {
    if let Ok(path) = std::env::var("PARLEY_DB_PATH") {
        settings.store.db_path = Some(path);
    }
    if let Ok(level) = std::env::var("PARLEY_LOG_LEVEL") {
        settings.logging.level = level;
    }
    if let Ok(ttl) = std::env::var("PARLEY_FAST_TTL_SECS") {
        match ttl.parse() {
            Ok(v) => settings.store.fast_ttl_secs = v,
            Err(_) => tracing::warn!("ignoring non-numeric PARLEY_FAST_TTL_SECS: {ttl}"),
        }
    }
    if let Ok(ms) = std::env::var("PARLEY_TURN_THRESHOLD_MS") {
        match ms.parse() {
            Ok(v) => settings.voice.turn_threshold_ms = v,
            Err(_) => tracing::warn!("ignoring non-numeric PARLEY_TURN_THRESHOLD_MS: {ms}"),
        }
    }
    settings
}
