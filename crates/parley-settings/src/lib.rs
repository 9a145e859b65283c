//! # parley-settings
//!
//! Configuration management with layered sources for the Parley backend.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`ParleySettings::default()`]
//! 2. **User file** — `~/.parley/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `PARLEY_*` overrides (highest priority)
//!
//! The global singleton is reloadable: when an operator rewrites the
//! settings file, [`reload_settings_from_path`] swaps the cached value so
//! all subsequent [`get_settings`] calls return fresh data.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::path::Path;
use std::sync::{Arc, RwLock};

/// Global settings singleton.
///
/// `RwLock<Option<Arc<ParleySettings>>>` rather than `OnceLock` so the
/// cached value can be swapped after an on-disk settings change. Reads are
/// a shared lock plus `Arc::clone`; writes only happen on reload.
static SETTINGS: RwLock<Option<Arc<ParleySettings>>> = RwLock::new(None);

/// Get the global settings instance.
///
/// On first call, loads from `~/.parley/settings.json` with env overrides.
/// On failure, returns compiled defaults. Returns an `Arc` so callers hold
/// a consistent snapshot even if another thread reloads concurrently.
pub fn get_settings() -> Arc<ParleySettings> {
    {
        let guard = SETTINGS.read().expect("settings lock poisoned");
        if let Some(ref s) = *guard {
            return Arc::clone(s);
        }
    }

    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    // Double-check after acquiring the write lock.
    if let Some(ref s) = *guard {
        return Arc::clone(s);
    }

    let settings = Arc::new(match load_settings() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            ParleySettings::default()
        }
    });
    *guard = Some(Arc::clone(&settings));
    settings
}

/// Reload the global singleton from an explicit path.
pub fn reload_settings_from_path(path: &Path) -> Result<Arc<ParleySettings>> {
    let settings = Arc::new(load_settings_from_path(path)?);
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = Some(Arc::clone(&settings));
    Ok(settings)
}
