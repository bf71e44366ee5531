//! Payment generator: turns a grant into installment records.

use std::sync::Arc;

use async_trait::async_trait;
use pgben_core::{PaymentStatus, MAX_INSTALLMENTS};
use pgben_storage::{
    GrantRecord, GrantStorage, PaymentFilter, PaymentPage, PaymentRecord, RequestRecord,
};
use time::OffsetDateTime;

use crate::calendar::add_months;
use crate::error::LifecycleError;

/// Produces and looks up the installments of a grant.
#[async_trait]
pub trait PaymentGenerator: Send + Sync {
    /// Create `installments` payment records for `grant`.
    async fn generate_payments(
        &self,
        grant: &GrantRecord,
        request: &RequestRecord,
        installments: u32,
        actor_id: &str,
    ) -> Result<Vec<PaymentRecord>, LifecycleError>;

    async fn find_payments(&self, filter: &PaymentFilter) -> Result<PaymentPage, LifecycleError>;
}

/// Generates installments from the request's benefit type and stores them.
///
/// Installment `n` (1-based) is due `n - 1` periods after the grant start.
/// All installments of one call are committed together.
pub struct StoragePaymentGenerator<S> {
    storage: Arc<S>,
}

impl<S: GrantStorage> StoragePaymentGenerator<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl<S: GrantStorage> PaymentGenerator for StoragePaymentGenerator<S> {
    async fn generate_payments(
        &self,
        grant: &GrantRecord,
        request: &RequestRecord,
        installments: u32,
        actor_id: &str,
    ) -> Result<Vec<PaymentRecord>, LifecycleError> {
        if installments == 0 || installments > MAX_INSTALLMENTS {
            return Err(LifecycleError::validation(format!(
                "installment count must be between 1 and {MAX_INSTALLMENTS} (got {installments})"
            )));
        }
        let benefit = self.storage.get_benefit_type(&request.benefit_type_id).await?;
        let interval = benefit.periodicity.interval_months();
        let now = OffsetDateTime::now_utc();

        let mut records = Vec::new();
        for n in 1..=installments {
            let due_date = add_months(grant.start_date, interval * (n - 1)).ok_or_else(|| {
                tracing::error!(grant_id = %grant.id, installment = n, "due date out of range");
                LifecycleError::Internal("internal error".to_string())
            })?;
            records.push(PaymentRecord {
                id: uuid::Uuid::new_v4().to_string(),
                grant_id: grant.id.clone(),
                installment: n,
                total_installments: installments,
                amount: benefit.amount,
                status: PaymentStatus::Pendente,
                due_date,
                created_at: now,
                updated_at: now,
            });
        }

        let mut snap = self.storage.begin_snapshot().await?;
        for record in &records {
            if let Err(e) = self.storage.insert_payment(&mut snap, record.clone()).await {
                let _ = self.storage.abort_snapshot(snap).await;
                return Err(e.into());
            }
        }
        self.storage.commit_snapshot(snap).await?;

        tracing::info!(
            grant_id = %grant.id,
            installments,
            amount = %benefit.amount,
            actor_id,
            "payments generated"
        );
        Ok(records)
    }

    async fn find_payments(&self, filter: &PaymentFilter) -> Result<PaymentPage, LifecycleError> {
        Ok(self.storage.list_payments(filter).await?)
    }
}
