//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production default values. `#[serde(default)]` allows
//! partial JSON — missing fields get defaults during deserialization.

use parley_core::retry::RetryConfig;
use serde::{Deserialize, Serialize};

/// Root settings type for the Parley backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParleySettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Context store settings (tiers, TTLs, history bound).
    pub store: StoreSettings,
    /// Rate limiter and abuse guard thresholds.
    pub guard: GuardSettings,
    /// Routing thresholds and invocation timeouts.
    pub router: RouterSettings,
    /// Real-time audio session settings.
    pub voice: VoiceSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for ParleySettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "parley".to_string(),
            store: StoreSettings::default(),
            guard: GuardSettings::default(),
            router: RouterSettings::default(),
            voice: VoiceSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl ParleySettings {
    /// Clamp ratio fields to [0.0, 1.0] and correct invalid invariants.
    ///
    /// Called automatically during loading. Out-of-range values are clamped
    /// with a warning rather than rejected, so operators get corrected
    /// behavior instead of a refused startup.
    pub fn validate(&mut self) {
        fn clamp_ratio(val: &mut f64, name: &str) {
            if *val < 0.0 || *val > 1.0 {
                let clamped = val.clamp(0.0, 1.0);
                tracing::warn!("{name} out of range ({val}), clamped to {clamped}");
                *val = clamped;
            }
        }

        clamp_ratio(&mut self.router.keep_current_threshold, "keep_current_threshold");
        clamp_ratio(&mut self.router.fallback_threshold, "fallback_threshold");
        clamp_ratio(&mut self.router.retry.jitter_factor, "jitter_factor");

        if self.guard.connection_cap == 0 {
            tracing::warn!("connection_cap of 0 would reject every call, correcting to 1");
            self.guard.connection_cap = 1;
        }
        if self.store.turn_history_limit == 0 {
            tracing::warn!("turn_history_limit of 0 drops all history, correcting to 1");
            self.store.turn_history_limit = 1;
        }
    }
}

/// How `save` writes the durable tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurableWriteMode {
    /// Write durable storage before `save` returns.
    #[default]
    Sync,
    /// Fire-and-forget the durable write on a background task.
    Spawn,
}

/// Context store settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Fast-tier TTL in seconds.
    pub fast_ttl_secs: u64,
    /// Bound on retained turns per conversation.
    pub turn_history_limit: usize,
    /// Durable write mode for `save`.
    pub durable_write_mode: DurableWriteMode,
    /// SQLite database path. `None` selects `~/.parley/parley.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            fast_ttl_secs: 1_800,
            turn_history_limit: 20,
            durable_write_mode: DurableWriteMode::Sync,
            db_path: None,
        }
    }
}

/// Rate limiter and abuse guard thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuardSettings {
    /// Request-rate window length in seconds.
    pub rate_window_secs: u64,
    /// Requests admitted per window per subject.
    pub rate_threshold: u64,
    /// Concurrent real-time connections per subject.
    pub connection_cap: u64,
    /// Safety-net TTL for connection counters whose release was missed.
    pub connection_ttl_secs: u64,
    /// Failures within the window that trigger a block.
    pub failure_threshold: u64,
    /// Failure-count window in seconds.
    pub failure_window_secs: u64,
    /// Block duration in seconds.
    pub block_secs: u64,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            rate_window_secs: 60,
            rate_threshold: 100,
            connection_cap: 3,
            connection_ttl_secs: 3_600,
            failure_threshold: 5,
            failure_window_secs: 300,
            block_secs: 900,
        }
    }
}

/// Routing thresholds and invocation timeouts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterSettings {
    /// Confidence at which the current agent keeps the turn without fan-out.
    pub keep_current_threshold: f64,
    /// Winning confidence below which the fallback agent takes over.
    pub fallback_threshold: f64,
    /// Per-call timeout for confidence queries, in milliseconds.
    pub confidence_timeout_ms: u64,
    /// Per-call timeout for the answer invocation, in milliseconds.
    pub invoke_timeout_ms: u64,
    /// Retry policy for the answer invocation.
    pub retry: RetryConfig,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            keep_current_threshold: 0.7,
            fallback_threshold: 0.5,
            confidence_timeout_ms: 2_000,
            invoke_timeout_ms: 30_000,
            retry: RetryConfig::default(),
        }
    }
}

/// Real-time audio session settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoiceSettings {
    /// Buffered audio duration that closes a turn, in milliseconds.
    pub turn_threshold_ms: u64,
    /// Transport audio rate used to convert bytes to duration.
    pub bytes_per_second: u64,
    /// Idle seconds after which a session is reaped.
    pub idle_timeout_secs: u64,
    /// Overall per-turn latency budget in milliseconds.
    pub turn_budget_ms: u64,
    /// Outbound frame size in bytes for synthesized audio.
    pub frame_bytes: usize,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            turn_threshold_ms: 1_000,
            bytes_per_second: 8_000,
            idle_timeout_secs: 300,
            turn_budget_ms: 10_000,
            frame_bytes: 3_200,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Tracing filter directive (e.g. `info`, `parley_router=debug`).
    pub level: String,
    /// Emit JSON-formatted log lines.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
