//! Admission policies: request rate, connection cap, failure blocking.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parley_settings::GuardSettings;
use tracing::{debug, warn};

use crate::counters::CounterStore;
use crate::errors::AdmissionError;

fn rate_key(subject: &str) -> String {
    format!("rate:{subject}")
}

fn conns_key(subject: &str) -> String {
    format!("conns:{subject}")
}

fn fail_key(ip: &str) -> String {
    format!("fail:{ip}")
}

fn block_key(ip: &str) -> String {
    format!("block:{ip}")
}

/// Rate limiter and abuse guard over a shared counter store.
///
/// Stateless beyond the injected store; safe to share via `Arc` across
/// every pipeline instance.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    settings: GuardSettings,
}

impl RateLimiter {
    /// Create a limiter with the given counter store and thresholds.
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>, settings: GuardSettings) -> Self {
        Self { store, settings }
    }

    /// Configured thresholds.
    #[must_use]
    pub fn settings(&self) -> &GuardSettings {
        &self.settings
    }

    /// Fixed-window request-rate check.
    ///
    /// Increments first, compares after — two concurrent requests at the
    /// threshold can never both pass.
    pub fn check_request_rate(&self, subject: &str) -> Result<(), AdmissionError> {
        let window = Duration::from_secs(self.settings.rate_window_secs);
        let count = self.store.incr_with_expiry(&rate_key(subject), window);
        if count > self.settings.rate_threshold {
            counter!("admission_denied_total", "reason" => "rate").increment(1);
            debug!(subject, count, "request rate exceeded");
            return Err(AdmissionError::RateLimited {
                subject: subject.to_string(),
                count,
                max: self.settings.rate_threshold,
            });
        }
        Ok(())
    }

    /// Reserve a concurrent-connection slot for `subject`.
    ///
    /// The returned [`ConnectionPermit`] releases the slot on
    /// [`ConnectionPermit::release`] or on drop. The counter carries a
    /// safety-net TTL for releases lost to crashes; normal operation
    /// releases explicitly.
    pub fn acquire_connection(
        self: &Arc<Self>,
        subject: &str,
    ) -> Result<ConnectionPermit, AdmissionError> {
        let ttl = Duration::from_secs(self.settings.connection_ttl_secs);
        let key = conns_key(subject);
        let count = self.store.incr_with_expiry(&key, ttl);
        if count > self.settings.connection_cap {
            // Undo the reservation we just took.
            self.store.decr(&key);
            counter!("admission_denied_total", "reason" => "connections").increment(1);
            debug!(subject, count, "connection cap reached");
            return Err(AdmissionError::ConnectionLimit {
                subject: subject.to_string(),
                max: self.settings.connection_cap,
            });
        }
        metrics::gauge!("guard_connections_active").increment(1.0);
        Ok(ConnectionPermit {
            limiter: Arc::clone(self),
            key,
            released: false,
        })
    }

    /// Active connection count for `subject` (0 if none).
    #[must_use]
    pub fn connection_count(&self, subject: &str) -> u64 {
        self.store.get(&conns_key(subject)).unwrap_or(0)
    }

    /// Record a failure for `source_ip`; crossing the threshold installs
    /// a block flag for the configured duration.
    pub fn record_failure(&self, source_ip: &str) {
        let window = Duration::from_secs(self.settings.failure_window_secs);
        let count = self.store.incr_with_expiry(&fail_key(source_ip), window);
        if count > self.settings.failure_threshold {
            warn!(source_ip, count, "failure threshold crossed, blocking source");
            counter!("guard_blocks_installed_total").increment(1);
            self.store.set_flag(
                &block_key(source_ip),
                Duration::from_secs(self.settings.block_secs),
            );
        }
    }

    /// Whether `source_ip` is currently blocked.
    #[must_use]
    pub fn is_blocked(&self, source_ip: &str) -> bool {
        self.store.exists(&block_key(source_ip))
    }

    /// Combined admission for an inbound message: block status first,
    /// then the request-rate policy.
    pub fn admit_message(
        &self,
        subject: &str,
        source_ip: Option<&str>,
    ) -> Result<(), AdmissionError> {
        if let Some(ip) = source_ip {
            if self.is_blocked(ip) {
                counter!("admission_denied_total", "reason" => "blocked").increment(1);
                return Err(AdmissionError::Blocked { ip: ip.to_string() });
            }
        }
        self.check_request_rate(subject)
    }

    fn release_connection(&self, key: &str) {
        self.store.decr(key);
        metrics::gauge!("guard_connections_active").decrement(1.0);
    }
}

/// RAII reservation of one concurrent-connection slot.
///
/// Dropping the permit releases the slot, so a panicking session loop
/// cannot leak its reservation; the counter TTL covers whole-process
/// crashes only.
pub struct ConnectionPermit {
    limiter: Arc<RateLimiter>,
    key: String,
    released: bool,
}

impl std::fmt::Debug for ConnectionPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPermit")
            .field("key", &self.key)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl ConnectionPermit {
    /// Release the reservation explicitly.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.limiter.release_connection(&self.key);
        }
    }
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::MemoryCounters;
    use assert_matches::assert_matches;

    fn limiter(settings: GuardSettings) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(Arc::new(MemoryCounters::new()), settings))
    }

    fn default_limiter() -> Arc<RateLimiter> {
        limiter(GuardSettings::default())
    }

    // --- Request rate ---

    #[test]
    fn requests_under_threshold_pass() {
        let l = default_limiter();
        for _ in 0..100 {
            l.check_request_rate("user-1").unwrap();
        }
    }

    #[test]
    fn request_101_is_denied_within_window() {
        let l = default_limiter();
        for _ in 0..100 {
            l.check_request_rate("user-1").unwrap();
        }
        let err = l.check_request_rate("user-1").unwrap_err();
        assert_matches!(err, AdmissionError::RateLimited { count: 101, max: 100, .. });
    }

    #[test]
    fn fresh_window_admits_again() {
        let l = limiter(GuardSettings {
            rate_window_secs: 1,
            rate_threshold: 2,
            ..GuardSettings::default()
        });
        l.check_request_rate("user-1").unwrap();
        l.check_request_rate("user-1").unwrap();
        assert!(l.check_request_rate("user-1").is_err());

        std::thread::sleep(Duration::from_millis(1_100));
        l.check_request_rate("user-1").unwrap();
    }

    #[test]
    fn subjects_are_isolated() {
        let l = limiter(GuardSettings {
            rate_threshold: 1,
            ..GuardSettings::default()
        });
        l.check_request_rate("user-1").unwrap();
        assert!(l.check_request_rate("user-1").is_err());
        l.check_request_rate("user-2").unwrap();
    }

    // --- Connection cap ---

    #[test]
    fn fourth_connection_denied_release_admits_next() {
        let l = default_limiter();
        let _p1 = l.acquire_connection("user-1").unwrap();
        let _p2 = l.acquire_connection("user-1").unwrap();
        let p3 = l.acquire_connection("user-1").unwrap();

        let err = l.acquire_connection("user-1").unwrap_err();
        assert_matches!(err, AdmissionError::ConnectionLimit { max: 3, .. });
        assert_eq!(l.connection_count("user-1"), 3);

        p3.release();
        assert_eq!(l.connection_count("user-1"), 2);
        let _p4 = l.acquire_connection("user-1").unwrap();
    }

    #[test]
    fn denied_acquire_does_not_consume_a_slot() {
        let l = limiter(GuardSettings {
            connection_cap: 1,
            ..GuardSettings::default()
        });
        let _p = l.acquire_connection("user-1").unwrap();
        assert!(l.acquire_connection("user-1").is_err());
        assert!(l.acquire_connection("user-1").is_err());
        // The failed attempts must not have inflated the counter.
        assert_eq!(l.connection_count("user-1"), 1);
    }

    #[test]
    fn dropping_permit_releases_slot() {
        let l = default_limiter();
        {
            let _p1 = l.acquire_connection("user-1").unwrap();
            let _p2 = l.acquire_connection("user-1").unwrap();
            let _p3 = l.acquire_connection("user-1").unwrap();
        }
        assert_eq!(l.connection_count("user-1"), 0);
        let _p = l.acquire_connection("user-1").unwrap();
    }

    #[test]
    fn release_is_idempotent_with_drop() {
        let l = default_limiter();
        let p = l.acquire_connection("user-1").unwrap();
        p.release(); // drop after release must not double-decrement
        assert_eq!(l.connection_count("user-1"), 0);
        let _a = l.acquire_connection("user-1").unwrap();
        assert_eq!(l.connection_count("user-1"), 1);
    }

    // --- Failure blocking ---

    #[test]
    fn five_failures_do_not_block_six_do() {
        let l = default_limiter();
        for _ in 0..5 {
            l.record_failure("203.0.113.9");
        }
        assert!(!l.is_blocked("203.0.113.9"));
        l.record_failure("203.0.113.9");
        assert!(l.is_blocked("203.0.113.9"));
    }

    #[test]
    fn block_expires() {
        let l = limiter(GuardSettings {
            failure_threshold: 0,
            block_secs: 0,
            ..GuardSettings::default()
        });
        l.record_failure("203.0.113.9");
        // Zero-second block expires immediately.
        std::thread::sleep(Duration::from_millis(10));
        assert!(!l.is_blocked("203.0.113.9"));
    }

    #[test]
    fn admit_message_checks_block_before_rate() {
        let l = limiter(GuardSettings {
            failure_threshold: 0,
            rate_threshold: 1_000,
            ..GuardSettings::default()
        });
        l.record_failure("203.0.113.9");
        let err = l.admit_message("user-1", Some("203.0.113.9")).unwrap_err();
        assert_matches!(err, AdmissionError::Blocked { .. });
        // A blocked denial must not have consumed rate budget.
        assert_eq!(
            l.store.get(&rate_key("user-1")),
            None,
            "rate counter untouched"
        );
    }

    #[test]
    fn admit_message_without_ip_applies_rate_only() {
        let l = default_limiter();
        l.admit_message("user-1", None).unwrap();
    }
}
