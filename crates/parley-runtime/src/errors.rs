//! Pipeline errors.

use parley_guard::AdmissionError;
use parley_router::RouterError;
use parley_store::StoreError;

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// A turn that could not produce a reply.
///
/// Storage degradation is deliberately absent: a failed durable write is
/// a logged warning on a successful turn, not a variant here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The guard refused the message before any work ran.
    #[error("admission denied: {0}")]
    Admission(#[from] AdmissionError),

    /// The selected agent failed to answer after exhausting retries.
    #[error("routing failed: {0}")]
    Router(#[from] RouterError),

    /// A storage operation outside the save path failed.
    #[error("store failed: {0}")]
    Store(#[from] StoreError),
}
