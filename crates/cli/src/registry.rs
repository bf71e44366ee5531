//! Registration of the records grants are derived from: benefit types and
//! requests. Used for configuration seeding and by the HTTP API.

use pgben_core::MAX_INSTALLMENTS;
use pgben_storage::{BenefitTypeRecord, GrantStorage, RequestRecord, StorageError};
use time::OffsetDateTime;

use crate::config::PgbenConfig;

#[derive(Debug, thiserror::Error)]
pub(crate) enum RegistryError {
    #[error("{kind} already exists: {id}")]
    Duplicate { kind: &'static str, id: String },

    #[error("unknown benefit type '{0}'")]
    UnknownBenefitType(String),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for RegistryError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::AlreadyExists { kind, id } => RegistryError::Duplicate { kind, id },
            other => RegistryError::Storage(other),
        }
    }
}

pub(crate) async fn register_benefit_type<S: GrantStorage>(
    storage: &S,
    record: BenefitTypeRecord,
) -> Result<BenefitTypeRecord, RegistryError> {
    if record.id.trim().is_empty() {
        return Err(RegistryError::Invalid("benefit type id is required".to_string()));
    }
    if !(1..=MAX_INSTALLMENTS).contains(&record.default_installments) {
        return Err(RegistryError::Invalid(format!(
            "default_installments must be between 1 and {MAX_INSTALLMENTS}"
        )));
    }
    if record.amount.is_sign_negative() {
        return Err(RegistryError::Invalid("amount must not be negative".to_string()));
    }

    let mut snap = storage.begin_snapshot().await?;
    if let Err(e) = storage.insert_benefit_type(&mut snap, record.clone()).await {
        let _ = storage.abort_snapshot(snap).await;
        return Err(e.into());
    }
    storage.commit_snapshot(snap).await?;
    tracing::info!(
        benefit_type = %record.id,
        periodicity = %record.periodicity,
        "benefit type registered"
    );
    Ok(record)
}

pub(crate) async fn register_request<S: GrantStorage>(
    storage: &S,
    record: RequestRecord,
) -> Result<RequestRecord, RegistryError> {
    if let Some(n) = record.requested_installments {
        if !(1..=MAX_INSTALLMENTS).contains(&n) {
            return Err(RegistryError::Invalid(format!(
                "requested_installments must be between 1 and {MAX_INSTALLMENTS}"
            )));
        }
    }
    match storage.get_benefit_type(&record.benefit_type_id).await {
        Ok(_) => {}
        Err(StorageError::NotFound { .. }) => {
            return Err(RegistryError::UnknownBenefitType(record.benefit_type_id))
        }
        Err(e) => return Err(e.into()),
    }

    let mut snap = storage.begin_snapshot().await?;
    if let Err(e) = storage.insert_request(&mut snap, record.clone()).await {
        let _ = storage.abort_snapshot(snap).await;
        return Err(e.into());
    }
    storage.commit_snapshot(snap).await?;
    tracing::info!(request_id = %record.id, protocol = %record.protocol, "request registered");
    Ok(record)
}

/// Load the configuration's benefit types, then its requests.
pub(crate) async fn seed<S: GrantStorage>(
    storage: &S,
    config: &PgbenConfig,
) -> Result<(), RegistryError> {
    for benefit in &config.benefit_types {
        register_benefit_type(storage, benefit.clone()).await?;
    }
    let now = OffsetDateTime::now_utc();
    for request in &config.requests {
        register_request(storage, request.clone().into_record(now)).await?;
    }
    Ok(())
}
