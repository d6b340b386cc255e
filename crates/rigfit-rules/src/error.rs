use rigfit_core::ComponentId;
use rigfit_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("timed out after {after_ms}ms fetching {what}")]
    Timeout { what: String, after_ms: u64 },
    #[error("component not found: {0}")]
    ComponentNotFound(ComponentId),
}

impl EngineError {
    /// Timeouts and backend failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Timeout { .. } | EngineError::Store(StoreError::Backend(_)))
    }
}
