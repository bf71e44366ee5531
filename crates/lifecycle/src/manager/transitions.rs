use pgben_core::GrantStatus;
use pgben_storage::{GrantRecord, GrantStorage};
use time::OffsetDateTime;

use super::{require_actor, require_reason, GrantLifecycleManager};
use crate::error::LifecycleError;

/// Reject unless the table allows `current -> target`.
fn check_table(current: &GrantRecord, target: GrantStatus) -> Result<(), LifecycleError> {
    if current.status.can_transition_to(target) {
        Ok(())
    } else {
        Err(LifecycleError::invalid_transition(current.status, target))
    }
}

/// Reject unless the grant is in one of `allowed`.
fn check_source(
    current: &GrantRecord,
    allowed: &[GrantStatus],
    operation: &str,
) -> Result<(), LifecycleError> {
    if allowed.contains(&current.status) {
        return Ok(());
    }
    let names: Vec<&str> = allowed.iter().map(|s| s.as_str()).collect();
    Err(LifecycleError::validation(format!(
        "cannot {operation} grant {} in status {} (requires {})",
        current.id,
        current.status,
        names.join(" or ")
    )))
}

fn mark_unblocked(grant: &mut GrantRecord, reason: Option<&str>, at: OffsetDateTime) {
    grant.unblock_reason = reason.map(str::to_string);
    grant.unblocked_at = Some(at);
}

/// Back to `ATIVO` from a suspension or a cessation: neither leaves a trace
/// on the active grant.
fn clear_interruption(grant: &mut GrantRecord) {
    grant.suspension_reason = None;
    grant.suspension_review_date = None;
    grant.closure_date = None;
    grant.closure_reason = None;
}

impl<S: GrantStorage> GrantLifecycleManager<S> {
    /// Move a grant to `target` if the transition table allows it.
    ///
    /// Asking for the status the grant already has returns it untouched:
    /// no version bump and no history entry.
    pub async fn update_status(
        &self,
        grant_id: &str,
        target: &str,
        actor_id: &str,
        reason: Option<&str>,
    ) -> Result<GrantRecord, LifecycleError> {
        let target: GrantStatus = target.parse()?;
        require_actor(actor_id)?;
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());

        let current = self.storage.get_grant(grant_id).await?;
        if current.status == target {
            tracing::debug!(grant_id, status = %target, "status unchanged");
            return Ok(current);
        }

        self.apply_transition(
            grant_id,
            actor_id,
            target,
            reason,
            |g| check_table(g, target),
            |g, previous, at| match target {
                GrantStatus::Suspenso => g.suspension_reason = reason.map(str::to_string),
                GrantStatus::Bloqueado => {
                    g.block_reason = reason.map(str::to_string);
                    g.blocked_at = Some(at);
                }
                GrantStatus::Cessado | GrantStatus::Cancelado => {
                    g.closure_date = Some(at);
                    g.closure_reason = reason.map(str::to_string);
                }
                GrantStatus::Ativo => match previous {
                    GrantStatus::Bloqueado => mark_unblocked(g, reason, at),
                    GrantStatus::Suspenso | GrantStatus::Cessado => clear_interruption(g),
                    _ => {}
                },
                GrantStatus::Apto => {}
            },
        )
        .await
    }

    pub async fn suspend(
        &self,
        grant_id: &str,
        actor_id: &str,
        reason: &str,
        review_date: Option<OffsetDateTime>,
    ) -> Result<GrantRecord, LifecycleError> {
        let reason = require_reason(reason, "suspend")?;
        self.apply_transition(
            grant_id,
            actor_id,
            GrantStatus::Suspenso,
            Some(reason),
            |g| check_table(g, GrantStatus::Suspenso),
            |g, _, _| {
                g.suspension_reason = Some(reason.to_string());
                g.suspension_review_date = review_date;
            },
        )
        .await
    }

    pub async fn block(
        &self,
        grant_id: &str,
        actor_id: &str,
        reason: &str,
    ) -> Result<GrantRecord, LifecycleError> {
        let reason = require_reason(reason, "block")?;
        self.apply_transition(
            grant_id,
            actor_id,
            GrantStatus::Bloqueado,
            Some(reason),
            |g| check_table(g, GrantStatus::Bloqueado),
            |g, _, at| {
                g.block_reason = Some(reason.to_string());
                g.blocked_at = Some(at);
            },
        )
        .await
    }

    pub async fn unblock(
        &self,
        grant_id: &str,
        actor_id: &str,
        reason: &str,
    ) -> Result<GrantRecord, LifecycleError> {
        let reason = require_reason(reason, "unblock")?;
        self.apply_transition(
            grant_id,
            actor_id,
            GrantStatus::Ativo,
            Some(reason),
            |g| check_source(g, &[GrantStatus::Bloqueado], "unblock"),
            |g, _, at| mark_unblocked(g, Some(reason), at),
        )
        .await
    }

    /// Bring a suspended or ceased grant back to `ATIVO`.
    pub async fn reactivate(
        &self,
        grant_id: &str,
        actor_id: &str,
        reason: Option<&str>,
    ) -> Result<GrantRecord, LifecycleError> {
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        self.apply_transition(
            grant_id,
            actor_id,
            GrantStatus::Ativo,
            reason,
            |g| {
                check_source(
                    g,
                    &[GrantStatus::Suspenso, GrantStatus::Cessado],
                    "reactivate",
                )
            },
            |g, _, _| clear_interruption(g),
        )
        .await
    }

    /// Cancel an active grant. `CANCELADO` is terminal.
    pub async fn cancel(
        &self,
        grant_id: &str,
        actor_id: &str,
        reason: &str,
    ) -> Result<GrantRecord, LifecycleError> {
        let reason = require_reason(reason, "cancel")?;
        self.apply_transition(
            grant_id,
            actor_id,
            GrantStatus::Cancelado,
            Some(reason),
            |g| check_source(g, &[GrantStatus::Ativo], "cancel"),
            |g, _, at| {
                g.closure_date = Some(at);
                g.closure_reason = Some(reason.to_string());
            },
        )
        .await
    }
}
