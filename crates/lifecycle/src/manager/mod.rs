//! Grant Lifecycle Manager.
//!
//! Every status change follows the same cycle inside one storage snapshot:
//! read the grant, check the operation's precondition, mutate, write with
//! the version that was read, commit. The history entry for the change is
//! appended after the commit and a failure to append is only logged, so an
//! audit gap never rolls back a transition that already happened.
//!
//! Operations:
//! - [`GrantLifecycleManager::update_status`] generic transition by table
//! - suspend / block / unblock / reactivate / cancel
//! - [`GrantLifecycleManager::create_if_absent`] idempotent creation
//! - [`GrantLifecycleManager::prorogate`] successor grant after cessation
//! - [`GrantLifecycleManager::check_automatic_closure`] closure once every
//!   payment is released, and the payment-status entry point that drives it

mod closure;
mod creation;
mod transitions;

#[cfg(test)]
mod tests;

pub use closure::{PaymentUpdate, AUTOMATIC_CLOSURE_REASON};

use std::sync::Arc;

use pgben_core::{GrantStatus, ReasonEntry, ReasonOperation};
use pgben_storage::{
    GrantFilter, GrantPage, GrantRecord, GrantStorage, HistoryKind, HistoryRecord, PaymentFilter,
    PaymentPage,
};
use time::OffsetDateTime;

use crate::error::LifecycleError;
use crate::history::{history_entry, HistoryRecorder, StorageHistoryRecorder};
use crate::payments::{PaymentGenerator, StoragePaymentGenerator};
use crate::reasons::ReasonCatalog;

/// Orchestrates grant transitions over a [`GrantStorage`] backend.
pub struct GrantLifecycleManager<S> {
    storage: Arc<S>,
    payments: Arc<dyn PaymentGenerator>,
    history: Arc<dyn HistoryRecorder>,
    reasons: ReasonCatalog,
}

/// A transition staged in an open snapshot, not yet committed.
struct Staged {
    grant: GrantRecord,
    previous: GrantStatus,
    at: OffsetDateTime,
}

impl<S: GrantStorage> GrantLifecycleManager<S> {
    /// A manager whose payment generator and history recorder write to the
    /// same storage, with the built-in reason catalog.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            payments: Arc::new(StoragePaymentGenerator::new(storage.clone())),
            history: Arc::new(StorageHistoryRecorder::new(storage.clone())),
            reasons: ReasonCatalog::builtin(),
            storage,
        }
    }

    pub fn with_reason_catalog(mut self, reasons: ReasonCatalog) -> Self {
        self.reasons = reasons;
        self
    }

    pub fn with_payment_generator(mut self, payments: Arc<dyn PaymentGenerator>) -> Self {
        self.payments = payments;
        self
    }

    pub fn with_history_recorder(mut self, history: Arc<dyn HistoryRecorder>) -> Self {
        self.history = history;
        self
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn reason_catalog(&self) -> &ReasonCatalog {
        &self.reasons
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub async fn get(&self, grant_id: &str) -> Result<GrantRecord, LifecycleError> {
        tracing::debug!(grant_id, "loading grant");
        Ok(self.storage.get_grant(grant_id).await?)
    }

    pub async fn list(&self, filter: &GrantFilter) -> Result<GrantPage, LifecycleError> {
        tracing::debug!(?filter, "listing grants");
        Ok(self.storage.list_grants(filter).await?)
    }

    /// History of an existing grant, oldest first.
    pub async fn history(&self, grant_id: &str) -> Result<Vec<HistoryRecord>, LifecycleError> {
        self.storage.get_grant(grant_id).await?;
        Ok(self.storage.list_history(grant_id).await?)
    }

    /// Installments of an existing grant, in installment order.
    pub async fn payments(&self, grant_id: &str) -> Result<PaymentPage, LifecycleError> {
        self.storage.get_grant(grant_id).await?;
        Ok(self
            .storage
            .list_payments(&PaymentFilter {
                grant_id: Some(grant_id.to_string()),
                status: None,
            })
            .await?)
    }

    /// Active catalog reasons for an operation given by name.
    pub fn reasons(&self, operation: &str) -> Result<Vec<ReasonEntry>, LifecycleError> {
        let operation: ReasonOperation = operation.parse()?;
        Ok(self.reasons.active_for(operation))
    }

    // ── Shared transition machinery ──────────────────────────────────────────

    /// Run one read-check-mutate-write cycle and commit it.
    ///
    /// `check` sees the grant as read inside the snapshot; an error from it
    /// aborts the snapshot untouched. `mutate` receives the grant with
    /// `status` already set to `target`, the status it was read with and
    /// the transition timestamp.
    async fn apply_transition<C, M>(
        &self,
        grant_id: &str,
        actor_id: &str,
        target: GrantStatus,
        reason: Option<&str>,
        check: C,
        mutate: M,
    ) -> Result<GrantRecord, LifecycleError>
    where
        C: FnOnce(&GrantRecord) -> Result<(), LifecycleError> + Send,
        M: FnOnce(&mut GrantRecord, GrantStatus, OffsetDateTime) + Send,
    {
        require_actor(actor_id)?;

        let mut snap = self.storage.begin_snapshot().await?;
        let staged = match self
            .stage_transition(&mut snap, grant_id, target, check, mutate)
            .await
        {
            Ok(staged) => staged,
            Err(e) => {
                let _ = self.storage.abort_snapshot(snap).await;
                return Err(e);
            }
        };
        self.storage.commit_snapshot(snap).await?;

        let Staged {
            grant,
            previous,
            at,
        } = staged;
        tracing::info!(
            grant_id,
            from = %previous,
            to = %target,
            actor_id,
            version = grant.version,
            "grant status changed"
        );
        self.record_history(history_entry(
            grant_id,
            Some(previous),
            target,
            actor_id,
            reason,
            HistoryKind::Transition,
            at,
        ))
        .await;
        Ok(grant)
    }

    async fn stage_transition<C, M>(
        &self,
        snap: &mut S::Snapshot,
        grant_id: &str,
        target: GrantStatus,
        check: C,
        mutate: M,
    ) -> Result<Staged, LifecycleError>
    where
        C: FnOnce(&GrantRecord) -> Result<(), LifecycleError> + Send,
        M: FnOnce(&mut GrantRecord, GrantStatus, OffsetDateTime) + Send,
    {
        let current = self.storage.get_grant_for_update(snap, grant_id).await?;
        check(&current)?;

        let at = OffsetDateTime::now_utc();
        let previous = current.status;
        let expected_version = current.version;
        let mut grant = current;
        grant.status = target;
        grant.updated_at = at;
        mutate(&mut grant, previous, at);

        grant.version = self
            .storage
            .update_grant(snap, expected_version, grant.clone())
            .await?;
        Ok(Staged {
            grant,
            previous,
            at,
        })
    }

    /// Append to the history sink; failures are logged and swallowed.
    async fn record_history(&self, entry: HistoryRecord) {
        let grant_id = entry.grant_id.clone();
        if let Err(e) = self.history.append(entry).await {
            tracing::warn!(%grant_id, error = %e, "failed to record grant history");
        }
    }
}

fn require_actor(actor_id: &str) -> Result<(), LifecycleError> {
    if actor_id.trim().is_empty() {
        return Err(LifecycleError::validation("actor_id is required"));
    }
    Ok(())
}

/// Trimmed, non-empty reason or a validation error naming the operation.
fn require_reason<'a>(reason: &'a str, operation: &str) -> Result<&'a str, LifecycleError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(LifecycleError::validation(format!(
            "a reason is required to {operation} a grant"
        )));
    }
    Ok(trimmed)
}
