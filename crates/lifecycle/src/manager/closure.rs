use pgben_core::{GrantStatus, PaymentStatus, SYSTEM_ACTOR};
use pgben_storage::{GrantRecord, GrantStorage, PaymentFilter, PaymentRecord};
use serde::Serialize;
use time::OffsetDateTime;

use super::GrantLifecycleManager;
use crate::error::LifecycleError;

/// Reason recorded when a grant closes because every payment was released.
pub const AUTOMATIC_CLOSURE_REASON: &str =
    "Encerramento automatico: todos os pagamentos liberados";

/// Outcome of a payment status change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentUpdate {
    pub payment: PaymentRecord,
    /// The owning grant, if this change closed it.
    pub closed_grant: Option<GrantRecord>,
}

impl<S: GrantStorage> GrantLifecycleManager<S> {
    /// Close an `ATIVO` grant once all of its payments are released.
    ///
    /// Returns the closed grant, or `None` when nothing changed: the grant
    /// is not `ATIVO`, it has no payments, or some payment is still open.
    pub async fn check_automatic_closure(
        &self,
        grant_id: &str,
    ) -> Result<Option<GrantRecord>, LifecycleError> {
        let grant = self.storage.get_grant(grant_id).await?;
        if grant.status != GrantStatus::Ativo {
            tracing::debug!(grant_id, status = %grant.status, "closure check skipped");
            return Ok(None);
        }

        let payments = self
            .payments
            .find_payments(&PaymentFilter {
                grant_id: Some(grant.id.clone()),
                status: None,
            })
            .await?;
        if payments.items.is_empty() {
            tracing::debug!(grant_id, "closure check skipped, no payments");
            return Ok(None);
        }
        let pending = payments
            .items
            .iter()
            .filter(|p| !p.status.is_released())
            .count();
        if pending > 0 {
            tracing::debug!(grant_id, pending, "closure check: payments still open");
            return Ok(None);
        }

        let read_version = grant.version;
        let closed = self
            .apply_transition(
                grant_id,
                SYSTEM_ACTOR,
                GrantStatus::Cessado,
                Some(AUTOMATIC_CLOSURE_REASON),
                |g| {
                    if g.version != read_version {
                        return Err(LifecycleError::Conflict {
                            grant_id: g.id.clone(),
                        });
                    }
                    Ok(())
                },
                |g, _, at| {
                    g.closure_date = Some(at);
                    g.closure_reason = Some(AUTOMATIC_CLOSURE_REASON.to_string());
                },
            )
            .await?;
        Ok(Some(closed))
    }

    /// Record a payment's new status, then run the closure check for the
    /// grant that owns it.
    pub async fn update_payment_status(
        &self,
        payment_id: &str,
        status: &str,
    ) -> Result<PaymentUpdate, LifecycleError> {
        let status: PaymentStatus = status.parse()?;

        let mut snap = self.storage.begin_snapshot().await?;
        let payment = match self
            .storage
            .update_payment_status(&mut snap, payment_id, status, OffsetDateTime::now_utc())
            .await
        {
            Ok(payment) => payment,
            Err(e) => {
                let _ = self.storage.abort_snapshot(snap).await;
                return Err(e.into());
            }
        };
        self.storage.commit_snapshot(snap).await?;
        tracing::info!(
            payment_id,
            grant_id = %payment.grant_id,
            status = %status,
            "payment status changed"
        );

        let closed_grant = self.check_automatic_closure(&payment.grant_id).await?;
        Ok(PaymentUpdate {
            payment,
            closed_grant,
        })
    }
}
