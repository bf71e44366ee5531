/// All errors that can be returned by a GrantStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict: another transaction modified
    /// the grant concurrently. The expected version was not found.
    #[error("concurrent conflict on grant {grant_id}: expected version {expected_version}")]
    ConcurrentConflict {
        grant_id: String,
        expected_version: i64,
    },

    /// No record of the given kind ("grant", "payment", "request", ...) has this id.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A record of the given kind with this id already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub(crate) fn not_found(kind: &'static str, id: &str) -> Self {
        StorageError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn already_exists(kind: &'static str, id: &str) -> Self {
        StorageError::AlreadyExists {
            kind,
            id: id.to_string(),
        }
    }
}
