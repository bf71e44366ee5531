//! History recorder: the append-only audit sink for grant transitions.

use std::sync::Arc;

use async_trait::async_trait;
use pgben_core::GrantStatus;
use pgben_storage::{GrantStorage, HistoryKind, HistoryRecord};
use time::OffsetDateTime;

use crate::error::LifecycleError;

/// Append-only sink for history entries.
///
/// The lifecycle manager calls this after the transition it describes has
/// been committed, and only logs a failure. Implementations must never
/// update or delete an entry once appended.
#[async_trait]
pub trait HistoryRecorder: Send + Sync {
    async fn append(&self, entry: HistoryRecord) -> Result<(), LifecycleError>;
}

/// Build a history entry with a fresh id.
pub fn history_entry(
    grant_id: &str,
    previous_status: Option<GrantStatus>,
    new_status: GrantStatus,
    actor_id: &str,
    reason: Option<&str>,
    kind: HistoryKind,
    recorded_at: OffsetDateTime,
) -> HistoryRecord {
    HistoryRecord {
        id: uuid::Uuid::new_v4().to_string(),
        grant_id: grant_id.to_string(),
        previous_status,
        new_status,
        actor_id: actor_id.to_string(),
        reason: reason.map(str::to_string),
        kind,
        recorded_at,
    }
}

/// Writes each entry in its own storage snapshot.
pub struct StorageHistoryRecorder<S> {
    storage: Arc<S>,
}

impl<S: GrantStorage> StorageHistoryRecorder<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl<S: GrantStorage> HistoryRecorder for StorageHistoryRecorder<S> {
    async fn append(&self, entry: HistoryRecord) -> Result<(), LifecycleError> {
        let mut snap = self.storage.begin_snapshot().await?;
        if let Err(e) = self.storage.insert_history(&mut snap, entry).await {
            let _ = self.storage.abort_snapshot(snap).await;
            return Err(e.into());
        }
        self.storage.commit_snapshot(snap).await?;
        Ok(())
    }
}
