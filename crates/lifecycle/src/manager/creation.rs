use pgben_core::GrantStatus;
use pgben_storage::{
    BenefitTypeRecord, GrantRecord, GrantStorage, HistoryKind, PaymentFilter, RequestRecord,
};
use time::OffsetDateTime;

use super::{require_actor, GrantLifecycleManager};
use crate::calendar::add_months;
use crate::error::LifecycleError;
use crate::history::history_entry;

/// End of a grant starting at `start`, if the benefit type caps its duration.
fn end_date_for(
    benefit: &BenefitTypeRecord,
    start: OffsetDateTime,
) -> Result<Option<OffsetDateTime>, LifecycleError> {
    match benefit.max_duration_months {
        None => Ok(None),
        Some(months) => add_months(start, months).map(Some).ok_or_else(|| {
            tracing::error!(benefit_type = %benefit.id, months, "end date out of range");
            LifecycleError::Internal("internal error".to_string())
        }),
    }
}

/// Installments for a fresh grant: the request's own count, else the
/// benefit type default. One-time benefits always pay once.
fn installments_for(request: &RequestRecord, benefit: &BenefitTypeRecord) -> u32 {
    if benefit.periodicity.is_one_time() {
        return 1;
    }
    request
        .requested_installments
        .unwrap_or(benefit.default_installments)
}

fn new_grant(
    request: &RequestRecord,
    status: GrantStatus,
    now: OffsetDateTime,
    end_date: Option<OffsetDateTime>,
) -> GrantRecord {
    let id = uuid::Uuid::new_v4().to_string();
    let mut grant = GrantRecord::new(&id, &request.id, status, now);
    grant.end_date = end_date;
    grant.priority_order = request.priority_order;
    grant.judicial_determination = request.judicial_determination;
    grant.judicial_document_id = request.judicial_document_id.clone();
    grant
}

impl<S: GrantStorage> GrantLifecycleManager<S> {
    /// Return the grant linked to `request_id`, creating an `ATIVO` one if
    /// there is none yet.
    ///
    /// When several grants share the request (after a prorogation) the
    /// earliest one is returned. The lookup and the insert are not atomic:
    /// two concurrent first calls for the same request can both create.
    pub async fn create_if_absent(
        &self,
        request_id: &str,
        actor_id: &str,
    ) -> Result<GrantRecord, LifecycleError> {
        require_actor(actor_id)?;

        let existing = self.storage.find_grants_by_request(request_id).await?;
        if let Some(grant) = existing.into_iter().next() {
            tracing::debug!(request_id, grant_id = %grant.id, "grant already exists");
            return Ok(grant);
        }

        let request = self.storage.get_request(request_id).await?;
        let benefit = self
            .storage
            .get_benefit_type(&request.benefit_type_id)
            .await?;
        let now = OffsetDateTime::now_utc();
        let grant = new_grant(
            &request,
            GrantStatus::Ativo,
            now,
            end_date_for(&benefit, now)?,
        );

        let mut snap = self.storage.begin_snapshot().await?;
        if let Err(e) = self.storage.insert_grant(&mut snap, grant.clone()).await {
            let _ = self.storage.abort_snapshot(snap).await;
            return Err(e.into());
        }
        self.storage.commit_snapshot(snap).await?;
        tracing::info!(request_id, grant_id = %grant.id, actor_id, "grant created");

        self.record_history(history_entry(
            &grant.id,
            None,
            GrantStatus::Ativo,
            actor_id,
            None,
            HistoryKind::Creation,
            now,
        ))
        .await;

        let installments = installments_for(&request, &benefit);
        if let Err(e) = self
            .payments
            .generate_payments(&grant, &request, installments, actor_id)
            .await
        {
            tracing::warn!(
                grant_id = %grant.id,
                installments,
                error = %e,
                "payment generation failed, grant kept without payments"
            );
        }
        Ok(grant)
    }

    /// Create the `APTO` successor of a ceased grant.
    ///
    /// The successor mirrors the source's installment count. The source
    /// grant's version is bumped in the same snapshot, so two concurrent
    /// prorogations of one grant cannot both commit. Payment generation
    /// runs after the commit and, as on creation, a failure there is logged
    /// and the successor is returned without payments.
    pub async fn prorogate(
        &self,
        grant_id: &str,
        actor_id: &str,
        judicial_document_id: Option<&str>,
    ) -> Result<GrantRecord, LifecycleError> {
        require_actor(actor_id)?;

        let source = self.storage.get_grant(grant_id).await?;
        if source.status != GrantStatus::Cessado {
            return Err(LifecycleError::validation(format!(
                "only grants in status CESSADO can be prorogated (grant {} is {})",
                source.id, source.status
            )));
        }
        let request = self.storage.get_request(&source.request_id).await?;
        let benefit = self
            .storage
            .get_benefit_type(&request.benefit_type_id)
            .await?;

        let judicial = request.judicial_determination || source.judicial_determination;
        let document = if judicial {
            let on_file = judicial_document_id
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .or_else(|| request.judicial_document_id.clone())
                .or_else(|| source.judicial_document_id.clone());
            match on_file {
                Some(doc) => Some(doc),
                None => {
                    return Err(LifecycleError::validation(
                        "a judicial document reference is required to prorogate a judicial grant",
                    ))
                }
            }
        } else {
            let siblings = self
                .storage
                .find_grants_by_request(&source.request_id)
                .await?;
            if siblings.len() > 1 {
                return Err(LifecycleError::validation(format!(
                    "prorogation limit exceeded for request {}",
                    source.request_id
                )));
            }
            if benefit.periodicity.is_one_time() {
                return Err(LifecycleError::validation(format!(
                    "benefit type {} is paid once and cannot be prorogated",
                    benefit.code
                )));
            }
            source.judicial_document_id.clone()
        };

        let installments = self
            .payments
            .find_payments(&PaymentFilter {
                grant_id: Some(source.id.clone()),
                status: None,
            })
            .await?
            .total;
        if installments == 0 {
            return Err(LifecycleError::validation(format!(
                "grant {} has no payments to mirror",
                source.id
            )));
        }
        let installments = u32::try_from(installments).map_err(|_| {
            tracing::error!(grant_id, installments, "installment count out of range");
            LifecycleError::Internal("internal error".to_string())
        })?;

        let now = OffsetDateTime::now_utc();
        let mut successor = new_grant(
            &request,
            GrantStatus::Apto,
            now,
            end_date_for(&benefit, now)?,
        );
        successor.priority_order = source.priority_order;
        successor.judicial_determination = judicial;
        successor.judicial_document_id = document;

        let mut snap = self.storage.begin_snapshot().await?;
        if let Err(e) = self
            .stage_prorogation(&mut snap, &source, successor.clone(), now)
            .await
        {
            let _ = self.storage.abort_snapshot(snap).await;
            return Err(e);
        }
        self.storage.commit_snapshot(snap).await?;
        tracing::info!(
            source_id = %source.id,
            grant_id = %successor.id,
            judicial,
            actor_id,
            "grant prorogated"
        );

        let reason = format!("Prorrogacao da concessao {}", source.id);
        self.record_history(history_entry(
            &successor.id,
            None,
            GrantStatus::Apto,
            actor_id,
            Some(&reason),
            HistoryKind::Prorogation,
            now,
        ))
        .await;

        if let Err(e) = self
            .payments
            .generate_payments(&successor, &request, installments, actor_id)
            .await
        {
            tracing::warn!(
                grant_id = %successor.id,
                installments,
                error = %e,
                "payment generation failed, successor kept without payments"
            );
        }
        Ok(successor)
    }

    async fn stage_prorogation(
        &self,
        snap: &mut S::Snapshot,
        source: &GrantRecord,
        successor: GrantRecord,
        now: OffsetDateTime,
    ) -> Result<(), LifecycleError> {
        let mut current = self.storage.get_grant_for_update(snap, &source.id).await?;
        if current.status != GrantStatus::Cessado || current.version != source.version {
            return Err(LifecycleError::Conflict {
                grant_id: source.id.clone(),
            });
        }
        let expected_version = current.version;
        current.updated_at = now;
        self.storage
            .update_grant(snap, expected_version, current)
            .await?;
        self.storage.insert_grant(snap, successor).await?;
        Ok(())
    }
}
