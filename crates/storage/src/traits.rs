use async_trait::async_trait;
use pgben_core::PaymentStatus;
use time::OffsetDateTime;

use crate::error::StorageError;
use crate::record::{
    BenefitTypeRecord, GrantFilter, GrantPage, GrantRecord, HistoryRecord, PaymentFilter,
    PaymentPage, PaymentRecord, RequestRecord,
};

/// The storage trait for grant lifecycle backends.
///
/// A `GrantStorage` implementation provides transactional storage for
/// grants, their payments and history, and read access to the requests and
/// benefit types grants are derived from.
///
/// ## Snapshot Semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing an
/// in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()`: start a transaction, returns a `Snapshot`
/// 2. Call mutating methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)`: commit and consume the transaction
///    OR `abort_snapshot(snapshot)`: roll back and consume the transaction
///
/// If a `Snapshot` is dropped without committing, its writes MUST be
/// discarded. Reads through the snapshot see the snapshot's own writes;
/// query operations only ever see committed data.
///
/// ## OCC Conflict Detection
///
/// `update_grant` is conditional on `version = expected_version`. A mismatch,
/// detected either at update time or at commit time, is reported as
/// `Err(StorageError::ConcurrentConflict { ... })` and nothing from the
/// snapshot is applied.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait GrantStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all mutations durable.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all mutations.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Grant operations (within snapshot) ───────────────────────────────────

    /// Insert a new grant. The stored version is forced to 0.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if the id is taken.
    async fn insert_grant(
        &self,
        snapshot: &mut Self::Snapshot,
        record: GrantRecord,
    ) -> Result<(), StorageError>;

    /// Read a grant for a read-modify-write cycle.
    ///
    /// Returns `Err(StorageError::NotFound)` if the grant does not exist.
    async fn get_grant_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        grant_id: &str,
    ) -> Result<GrantRecord, StorageError>;

    /// Replace a grant, conditional on its stored version being
    /// `expected_version`. The `version` field of `record` is ignored.
    ///
    /// Returns the new version number on success.
    async fn update_grant(
        &self,
        snapshot: &mut Self::Snapshot,
        expected_version: i64,
        record: GrantRecord,
    ) -> Result<i64, StorageError>;

    // ── Recording operations (within snapshot) ────────────────────────────────

    /// Insert a payment installment.
    ///
    /// FK: `grant_id` must reference a grant that is committed or inserted
    /// in the same snapshot.
    async fn insert_payment(
        &self,
        snapshot: &mut Self::Snapshot,
        record: PaymentRecord,
    ) -> Result<(), StorageError>;

    /// Set a payment's status, returning the updated record.
    async fn update_payment_status(
        &self,
        snapshot: &mut Self::Snapshot,
        payment_id: &str,
        status: PaymentStatus,
        updated_at: OffsetDateTime,
    ) -> Result<PaymentRecord, StorageError>;

    /// Append a history entry. History is never updated or deleted.
    async fn insert_history(
        &self,
        snapshot: &mut Self::Snapshot,
        record: HistoryRecord,
    ) -> Result<(), StorageError>;

    /// Register a request.
    async fn insert_request(
        &self,
        snapshot: &mut Self::Snapshot,
        record: RequestRecord,
    ) -> Result<(), StorageError>;

    /// Register a benefit type.
    async fn insert_benefit_type(
        &self,
        snapshot: &mut Self::Snapshot,
        record: BenefitTypeRecord,
    ) -> Result<(), StorageError>;

    // ── Query operations (committed data only) ───────────────────────────────

    /// Read a grant without starting a transaction.
    async fn get_grant(&self, grant_id: &str) -> Result<GrantRecord, StorageError>;

    /// List grants matching `filter`, in creation order.
    async fn list_grants(&self, filter: &GrantFilter) -> Result<GrantPage, StorageError>;

    /// Every grant tied to a request, in creation order.
    async fn find_grants_by_request(
        &self,
        request_id: &str,
    ) -> Result<Vec<GrantRecord>, StorageError>;

    /// Payments matching `filter`, ordered by grant then installment.
    async fn list_payments(&self, filter: &PaymentFilter) -> Result<PaymentPage, StorageError>;

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentRecord, StorageError>;

    /// History of a grant in the order it was appended.
    async fn list_history(&self, grant_id: &str) -> Result<Vec<HistoryRecord>, StorageError>;

    async fn get_request(&self, request_id: &str) -> Result<RequestRecord, StorageError>;

    async fn get_benefit_type(
        &self,
        benefit_type_id: &str,
    ) -> Result<BenefitTypeRecord, StorageError>;
}
