//! In-memory `GrantStorage` backend.
//!
//! Snapshots buffer their writes and apply them under a single lock at
//! commit time. Grant updates remember the committed version they were
//! based on; commit re-checks it, so two snapshots racing on the same
//! grant cannot both commit. Nothing is locked while a snapshot is open.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pgben_core::PaymentStatus;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::record::{
    BenefitTypeRecord, GrantFilter, GrantPage, GrantRecord, HistoryRecord, PaymentFilter,
    PaymentPage, PaymentRecord, RequestRecord,
};
use crate::traits::GrantStorage;

#[derive(Default)]
struct Tables {
    /// Creation order is significant for `find_grants_by_request`.
    grants: Vec<GrantRecord>,
    payments: Vec<PaymentRecord>,
    history: Vec<HistoryRecord>,
    requests: HashMap<String, RequestRecord>,
    benefit_types: HashMap<String, BenefitTypeRecord>,
}

impl Tables {
    fn grant(&self, id: &str) -> Option<&GrantRecord> {
        self.grants.iter().find(|g| g.id == id)
    }

    fn payment(&self, id: &str) -> Option<&PaymentRecord> {
        self.payments.iter().find(|p| p.id == id)
    }
}

/// Shared, cloneable in-memory storage.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<Tables>>,
}

/// Buffered writes of one open transaction.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    new_grants: Vec<GrantRecord>,
    /// (committed version the update was based on, staged record)
    grant_updates: Vec<(i64, GrantRecord)>,
    new_payments: Vec<PaymentRecord>,
    payment_updates: Vec<PaymentRecord>,
    history: Vec<HistoryRecord>,
    requests: Vec<RequestRecord>,
    benefit_types: Vec<BenefitTypeRecord>,
}

impl MemorySnapshot {
    fn staged_grant(&self, id: &str) -> Option<&GrantRecord> {
        self.grant_updates
            .iter()
            .map(|(_, g)| g)
            .find(|g| g.id == id)
            .or_else(|| self.new_grants.iter().find(|g| g.id == id))
    }

    fn staged_payment(&self, id: &str) -> Option<&PaymentRecord> {
        self.payment_updates
            .iter()
            .find(|p| p.id == id)
            .or_else(|| self.new_payments.iter().find(|p| p.id == id))
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed grants. Handy for assertions in tests.
    pub async fn grant_count(&self) -> usize {
        self.inner.lock().await.grants.len()
    }

    /// Number of committed history entries across all grants.
    pub async fn history_count(&self) -> usize {
        self.inner.lock().await.history.len()
    }
}

/// Check every buffered write against the committed tables.
fn validate_snapshot(tables: &Tables, snap: &MemorySnapshot) -> Result<(), StorageError> {
    for g in &snap.new_grants {
        if tables.grant(&g.id).is_some() {
            return Err(StorageError::already_exists("grant", &g.id));
        }
    }
    for (base_version, g) in &snap.grant_updates {
        let committed = tables
            .grant(&g.id)
            .ok_or_else(|| StorageError::not_found("grant", &g.id))?;
        if committed.version != *base_version {
            return Err(StorageError::ConcurrentConflict {
                grant_id: g.id.clone(),
                expected_version: *base_version,
            });
        }
    }

    let grant_visible =
        |id: &str| tables.grant(id).is_some() || snap.new_grants.iter().any(|g| g.id == id);

    for p in &snap.new_payments {
        if tables.payment(&p.id).is_some() {
            return Err(StorageError::already_exists("payment", &p.id));
        }
        if !grant_visible(&p.grant_id) {
            return Err(StorageError::not_found("grant", &p.grant_id));
        }
    }
    for p in &snap.payment_updates {
        let staged_new = snap.new_payments.iter().any(|n| n.id == p.id);
        if !staged_new && tables.payment(&p.id).is_none() {
            return Err(StorageError::not_found("payment", &p.id));
        }
    }
    for h in &snap.history {
        if !grant_visible(&h.grant_id) {
            return Err(StorageError::not_found("grant", &h.grant_id));
        }
    }
    for r in &snap.requests {
        if tables.requests.contains_key(&r.id) {
            return Err(StorageError::already_exists("request", &r.id));
        }
    }
    for b in &snap.benefit_types {
        if tables.benefit_types.contains_key(&b.id) {
            return Err(StorageError::already_exists("benefit type", &b.id));
        }
    }
    Ok(())
}

#[async_trait]
impl GrantStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        Ok(MemorySnapshot::default())
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        let mut tables = self.inner.lock().await;
        validate_snapshot(&tables, &snapshot)?;

        let MemorySnapshot {
            new_grants,
            grant_updates,
            new_payments,
            payment_updates,
            history,
            requests,
            benefit_types,
        } = snapshot;

        tables.grants.extend(new_grants);
        for (_, updated) in grant_updates {
            if let Some(slot) = tables.grants.iter_mut().find(|g| g.id == updated.id) {
                *slot = updated;
            }
        }
        tables.payments.extend(new_payments);
        for updated in payment_updates {
            if let Some(slot) = tables.payments.iter_mut().find(|p| p.id == updated.id) {
                *slot = updated;
            }
        }
        tables.history.extend(history);
        for r in requests {
            tables.requests.insert(r.id.clone(), r);
        }
        for b in benefit_types {
            tables.benefit_types.insert(b.id.clone(), b);
        }
        Ok(())
    }

    async fn abort_snapshot(&self, _snapshot: MemorySnapshot) -> Result<(), StorageError> {
        Ok(())
    }

    async fn insert_grant(
        &self,
        snapshot: &mut MemorySnapshot,
        mut record: GrantRecord,
    ) -> Result<(), StorageError> {
        let exists = snapshot.staged_grant(&record.id).is_some()
            || self.inner.lock().await.grant(&record.id).is_some();
        if exists {
            return Err(StorageError::already_exists("grant", &record.id));
        }
        record.version = 0;
        snapshot.new_grants.push(record);
        Ok(())
    }

    async fn get_grant_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        grant_id: &str,
    ) -> Result<GrantRecord, StorageError> {
        if let Some(staged) = snapshot.staged_grant(grant_id) {
            return Ok(staged.clone());
        }
        self.get_grant(grant_id).await
    }

    async fn update_grant(
        &self,
        snapshot: &mut MemorySnapshot,
        expected_version: i64,
        mut record: GrantRecord,
    ) -> Result<i64, StorageError> {
        let current = self.get_grant_for_update(snapshot, &record.id).await?;
        if current.version != expected_version {
            return Err(StorageError::ConcurrentConflict {
                grant_id: record.id,
                expected_version,
            });
        }
        let new_version = expected_version + 1;
        record.version = new_version;

        if let Some(slot) = snapshot.new_grants.iter_mut().find(|g| g.id == record.id) {
            *slot = record;
        } else if let Some((_, slot)) = snapshot
            .grant_updates
            .iter_mut()
            .find(|(_, g)| g.id == record.id)
        {
            *slot = record;
        } else {
            snapshot.grant_updates.push((expected_version, record));
        }
        Ok(new_version)
    }

    async fn insert_payment(
        &self,
        snapshot: &mut MemorySnapshot,
        record: PaymentRecord,
    ) -> Result<(), StorageError> {
        if snapshot.staged_payment(&record.id).is_some() {
            return Err(StorageError::already_exists("payment", &record.id));
        }
        snapshot.new_payments.push(record);
        Ok(())
    }

    async fn update_payment_status(
        &self,
        snapshot: &mut MemorySnapshot,
        payment_id: &str,
        status: PaymentStatus,
        updated_at: OffsetDateTime,
    ) -> Result<PaymentRecord, StorageError> {
        let mut payment = match snapshot.staged_payment(payment_id) {
            Some(p) => p.clone(),
            None => self.get_payment(payment_id).await?,
        };
        payment.status = status;
        payment.updated_at = updated_at;

        if let Some(slot) = snapshot.new_payments.iter_mut().find(|p| p.id == payment_id) {
            *slot = payment.clone();
        } else if let Some(slot) = snapshot
            .payment_updates
            .iter_mut()
            .find(|p| p.id == payment_id)
        {
            *slot = payment.clone();
        } else {
            snapshot.payment_updates.push(payment.clone());
        }
        Ok(payment)
    }

    async fn insert_history(
        &self,
        snapshot: &mut MemorySnapshot,
        record: HistoryRecord,
    ) -> Result<(), StorageError> {
        snapshot.history.push(record);
        Ok(())
    }

    async fn insert_request(
        &self,
        snapshot: &mut MemorySnapshot,
        record: RequestRecord,
    ) -> Result<(), StorageError> {
        if snapshot.requests.iter().any(|r| r.id == record.id) {
            return Err(StorageError::already_exists("request", &record.id));
        }
        snapshot.requests.push(record);
        Ok(())
    }

    async fn insert_benefit_type(
        &self,
        snapshot: &mut MemorySnapshot,
        record: BenefitTypeRecord,
    ) -> Result<(), StorageError> {
        if snapshot.benefit_types.iter().any(|b| b.id == record.id) {
            return Err(StorageError::already_exists("benefit type", &record.id));
        }
        snapshot.benefit_types.push(record);
        Ok(())
    }

    async fn get_grant(&self, grant_id: &str) -> Result<GrantRecord, StorageError> {
        self.inner
            .lock()
            .await
            .grant(grant_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("grant", grant_id))
    }

    async fn list_grants(&self, filter: &GrantFilter) -> Result<GrantPage, StorageError> {
        let tables = self.inner.lock().await;
        let matching: Vec<&GrantRecord> = tables
            .grants
            .iter()
            .filter(|g| filter.status.is_none_or(|s| g.status == s))
            .filter(|g| {
                filter
                    .request_id
                    .as_deref()
                    .is_none_or(|r| g.request_id == r)
            })
            .filter(|g| {
                filter
                    .judicial_determination
                    .is_none_or(|j| g.judicial_determination == j)
            })
            .collect();

        let total = matching.len();
        let take = if filter.limit == 0 {
            usize::MAX
        } else {
            filter.limit
        };
        let items = matching
            .into_iter()
            .skip(filter.offset)
            .take(take)
            .cloned()
            .collect();
        Ok(GrantPage { items, total })
    }

    async fn find_grants_by_request(
        &self,
        request_id: &str,
    ) -> Result<Vec<GrantRecord>, StorageError> {
        let tables = self.inner.lock().await;
        Ok(tables
            .grants
            .iter()
            .filter(|g| g.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> Result<PaymentPage, StorageError> {
        let tables = self.inner.lock().await;
        let mut items: Vec<PaymentRecord> = tables
            .payments
            .iter()
            .filter(|p| filter.grant_id.as_deref().is_none_or(|g| p.grant_id == g))
            .filter(|p| filter.status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.grant_id
                .cmp(&b.grant_id)
                .then(a.installment.cmp(&b.installment))
        });
        let total = items.len();
        Ok(PaymentPage { items, total })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentRecord, StorageError> {
        self.inner
            .lock()
            .await
            .payment(payment_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("payment", payment_id))
    }

    async fn list_history(&self, grant_id: &str) -> Result<Vec<HistoryRecord>, StorageError> {
        let tables = self.inner.lock().await;
        Ok(tables
            .history
            .iter()
            .filter(|h| h.grant_id == grant_id)
            .cloned()
            .collect())
    }

    async fn get_request(&self, request_id: &str) -> Result<RequestRecord, StorageError> {
        self.inner
            .lock()
            .await
            .requests
            .get(request_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("request", request_id))
    }

    async fn get_benefit_type(
        &self,
        benefit_type_id: &str,
    ) -> Result<BenefitTypeRecord, StorageError> {
        self.inner
            .lock()
            .await
            .benefit_types
            .get(benefit_type_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("benefit type", benefit_type_id))
    }
}
