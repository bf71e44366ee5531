use pgben_core::ParseError;
use pgben_storage::StorageError;

/// Errors surfaced by the lifecycle manager.
///
/// `Validation` and `NotFound` are client-correctable and carry messages
/// safe to show to callers. `Internal` never carries backend detail; the
/// detail is logged where the error is converted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// Invalid enum value, forbidden transition, missing reason or a broken
    /// business rule.
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Another request changed the grant between read and write.
    #[error("grant {grant_id} was modified concurrently, retry the operation")]
    Conflict { grant_id: String },

    #[error("{0}")]
    Internal(String),
}

impl LifecycleError {
    pub fn validation(message: impl Into<String>) -> Self {
        LifecycleError::Validation(message.into())
    }

    pub(crate) fn invalid_transition(
        from: pgben_core::GrantStatus,
        to: pgben_core::GrantStatus,
    ) -> Self {
        LifecycleError::Validation(format!("invalid status transition: {from} -> {to}"))
    }

    /// Whether the caller can fix the request and retry.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, LifecycleError::Internal(_))
    }
}

impl From<ParseError> for LifecycleError {
    fn from(e: ParseError) -> Self {
        LifecycleError::Validation(e.to_string())
    }
}

impl From<StorageError> for LifecycleError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { kind, id } => LifecycleError::NotFound {
                entity: kind.to_string(),
                id,
            },
            StorageError::ConcurrentConflict { grant_id, .. } => {
                tracing::info!(%grant_id, "optimistic concurrency conflict");
                LifecycleError::Conflict { grant_id }
            }
            other => {
                tracing::error!(error = %other, "storage failure");
                LifecycleError::Internal("internal error".to_string())
            }
        }
    }
}
