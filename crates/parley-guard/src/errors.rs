//! Admission errors.
//!
//! Every variant is terminal for the request it denies — admission
//! failures are never retried by the backend.

/// Reason a request or connection was refused admission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// Subject exceeded the fixed-window request threshold.
    #[error("rate limit exceeded for {subject}: {count} requests in the current window (max {max})")]
    RateLimited {
        /// Denied subject.
        subject: String,
        /// Observed count including this request.
        count: u64,
        /// Window threshold.
        max: u64,
    },

    /// Subject is at its concurrent-connection cap.
    #[error("connection limit reached for {subject}: {max} concurrent connections")]
    ConnectionLimit {
        /// Denied subject.
        subject: String,
        /// Concurrent cap.
        max: u64,
    },

    /// Source IP is blocked for repeated failures.
    #[error("source {ip} is blocked")]
    Blocked {
        /// Blocked source IP.
        ip: String,
    },
}

impl AdmissionError {
    /// Metric label for the denial reason.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate",
            Self::ConnectionLimit { .. } => "connections",
            Self::Blocked { .. } => "blocked",
        }
    }
}
