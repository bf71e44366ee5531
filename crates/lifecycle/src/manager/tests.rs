use std::sync::Arc;

use async_trait::async_trait;
use pgben_core::{GrantStatus, PaymentStatus, Periodicity, MAX_INSTALLMENTS, SYSTEM_ACTOR};
use pgben_storage::{
    BenefitTypeRecord, GrantFilter, GrantRecord, GrantStorage, HistoryKind, HistoryRecord,
    MemoryStorage, PaymentFilter, PaymentPage, PaymentRecord, RequestRecord,
};
use rust_decimal::Decimal;
use time::macros::datetime;
use time::OffsetDateTime;

use super::*;
use crate::calendar::add_months;

const ACTOR: &str = "operator-7";
const T0: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn benefit(id: &str, periodicity: Periodicity, installments: u32) -> BenefitTypeRecord {
    BenefitTypeRecord {
        id: id.to_string(),
        code: id.to_uppercase(),
        name: format!("Benefit {id}"),
        periodicity,
        amount: Decimal::new(60000, 2),
        max_duration_months: Some(installments),
        default_installments: installments,
    }
}

fn request(id: &str, benefit_type_id: &str) -> RequestRecord {
    RequestRecord {
        id: id.to_string(),
        protocol: format!("SOL-{id}"),
        beneficiary_id: "citizen-1".to_string(),
        benefit_type_id: benefit_type_id.to_string(),
        judicial_determination: false,
        judicial_document_id: None,
        priority_order: 4,
        requested_installments: None,
        created_at: T0,
    }
}

async fn register(
    storage: &MemoryStorage,
    benefits: Vec<BenefitTypeRecord>,
    requests: Vec<RequestRecord>,
) {
    let mut snap = storage.begin_snapshot().await.unwrap();
    for b in benefits {
        storage.insert_benefit_type(&mut snap, b).await.unwrap();
    }
    for r in requests {
        storage.insert_request(&mut snap, r).await.unwrap();
    }
    storage.commit_snapshot(snap).await.unwrap();
}

/// Storage with a monthly benefit (3 installments), a one-time benefit and
/// one request for each.
async fn setup() -> (Arc<MemoryStorage>, GrantLifecycleManager<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    register(
        &storage,
        vec![
            benefit("aluguel", Periodicity::Mensal, 3),
            benefit("natalidade", Periodicity::Unico, 1),
        ],
        vec![request("req-1", "aluguel"), request("req-unico", "natalidade")],
    )
    .await;
    let manager = GrantLifecycleManager::new(storage.clone());
    (storage, manager)
}

async fn seed_grant(storage: &MemoryStorage, id: &str, status: GrantStatus) -> GrantRecord {
    let grant = GrantRecord::new(id, "req-seeded", status, T0);
    let mut snap = storage.begin_snapshot().await.unwrap();
    storage.insert_grant(&mut snap, grant.clone()).await.unwrap();
    storage.commit_snapshot(snap).await.unwrap();
    grant
}

async fn payments_of(storage: &MemoryStorage, grant_id: &str) -> Vec<PaymentRecord> {
    storage
        .list_payments(&PaymentFilter {
            grant_id: Some(grant_id.to_string()),
            status: None,
        })
        .await
        .unwrap()
        .items
}

async fn history_of(storage: &MemoryStorage, grant_id: &str) -> Vec<HistoryRecord> {
    storage.list_history(grant_id).await.unwrap()
}

fn is_validation(result: &Result<GrantRecord, LifecycleError>) -> bool {
    matches!(result, Err(LifecycleError::Validation(_)))
}

// ── Collaborator doubles ─────────────────────────────────────────────────────

struct FailingHistory;

#[async_trait]
impl HistoryRecorder for FailingHistory {
    async fn append(&self, _entry: HistoryRecord) -> Result<(), LifecycleError> {
        Err(LifecycleError::Internal("history sink unavailable".to_string()))
    }
}

struct FailingPayments;

#[async_trait]
impl PaymentGenerator for FailingPayments {
    async fn generate_payments(
        &self,
        _grant: &GrantRecord,
        _request: &RequestRecord,
        _installments: u32,
        _actor_id: &str,
    ) -> Result<Vec<PaymentRecord>, LifecycleError> {
        Err(LifecycleError::Internal("payment service down".to_string()))
    }

    async fn find_payments(&self, _filter: &PaymentFilter) -> Result<PaymentPage, LifecycleError> {
        Ok(PaymentPage {
            items: Vec::new(),
            total: 0,
        })
    }
}

/// Looks payments up normally but cannot generate new ones.
struct UnavailableGenerator {
    inner: StoragePaymentGenerator<MemoryStorage>,
}

#[async_trait]
impl PaymentGenerator for UnavailableGenerator {
    async fn generate_payments(
        &self,
        _grant: &GrantRecord,
        _request: &RequestRecord,
        _installments: u32,
        _actor_id: &str,
    ) -> Result<Vec<PaymentRecord>, LifecycleError> {
        Err(LifecycleError::Internal("payment service down".to_string()))
    }

    async fn find_payments(&self, filter: &PaymentFilter) -> Result<PaymentPage, LifecycleError> {
        self.inner.find_payments(filter).await
    }
}

/// Bumps the grant's version behind the manager's back every time the
/// manager looks up its payments.
struct InterferingPayments {
    storage: Arc<MemoryStorage>,
    inner: StoragePaymentGenerator<MemoryStorage>,
}

#[async_trait]
impl PaymentGenerator for InterferingPayments {
    async fn generate_payments(
        &self,
        grant: &GrantRecord,
        request: &RequestRecord,
        installments: u32,
        actor_id: &str,
    ) -> Result<Vec<PaymentRecord>, LifecycleError> {
        self.inner
            .generate_payments(grant, request, installments, actor_id)
            .await
    }

    async fn find_payments(&self, filter: &PaymentFilter) -> Result<PaymentPage, LifecycleError> {
        if let Some(grant_id) = &filter.grant_id {
            let mut snap = self.storage.begin_snapshot().await.unwrap();
            let mut grant = self
                .storage
                .get_grant_for_update(&mut snap, grant_id)
                .await
                .unwrap();
            let version = grant.version;
            grant.priority_order += 1;
            self.storage
                .update_grant(&mut snap, version, grant)
                .await
                .unwrap();
            self.storage.commit_snapshot(snap).await.unwrap();
        }
        self.inner.find_payments(filter).await
    }
}

// ── update_status ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn same_status_update_is_a_noop() {
    let (storage, manager) = setup().await;
    for status in GrantStatus::ALL {
        let id = format!("g-{status}");
        seed_grant(&storage, &id, status).await;
        let grant = manager
            .update_status(&id, status.as_str(), ACTOR, Some("again"))
            .await
            .unwrap();
        assert_eq!(grant.status, status);
        assert_eq!(grant.version, 0);
        assert!(history_of(&storage, &id).await.is_empty());
    }
}

#[tokio::test]
async fn transitions_outside_the_table_are_rejected() {
    let (storage, manager) = setup().await;
    for from in GrantStatus::ALL {
        for to in GrantStatus::ALL {
            if from == to || from.can_transition_to(to) {
                continue;
            }
            let id = format!("g-{from}-{to}");
            seed_grant(&storage, &id, from).await;
            let result = manager.update_status(&id, to.as_str(), ACTOR, None).await;
            match result {
                Err(LifecycleError::Validation(msg)) => {
                    assert!(msg.contains(from.as_str()) && msg.contains(to.as_str()), "{msg}")
                }
                other => panic!("{from} -> {to} should be rejected, got {other:?}"),
            }
            let stored = storage.get_grant(&id).await.unwrap();
            assert_eq!(stored.status, from);
            assert_eq!(stored.version, 0);
        }
    }
}

#[tokio::test]
async fn allowed_transition_bumps_version_and_records_history() {
    let (storage, manager) = setup().await;
    seed_grant(&storage, "g-1", GrantStatus::Ativo).await;

    let grant = manager
        .update_status("g-1", "suspenso", ACTOR, Some("documentos pendentes"))
        .await
        .unwrap();
    assert_eq!(grant.status, GrantStatus::Suspenso);
    assert_eq!(grant.version, 1);
    assert_eq!(grant.suspension_reason.as_deref(), Some("documentos pendentes"));
    assert_eq!(storage.get_grant("g-1").await.unwrap(), grant);

    let history = history_of(&storage, "g-1").await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].previous_status, Some(GrantStatus::Ativo));
    assert_eq!(history[0].new_status, GrantStatus::Suspenso);
    assert_eq!(history[0].actor_id, ACTOR);
    assert_eq!(history[0].kind, HistoryKind::Transition);
}

#[tokio::test]
async fn update_to_cessado_stamps_closure() {
    let (storage, manager) = setup().await;
    seed_grant(&storage, "g-1", GrantStatus::Ativo).await;
    let grant = manager
        .update_status("g-1", "CESSADO", ACTOR, Some("fim do periodo"))
        .await
        .unwrap();
    assert!(grant.closure_date.is_some());
    assert_eq!(grant.closure_reason.as_deref(), Some("fim do periodo"));
}

#[tokio::test]
async fn unknown_target_status_is_validation() {
    let (storage, manager) = setup().await;
    seed_grant(&storage, "g-1", GrantStatus::Ativo).await;
    let result = manager.update_status("g-1", "ARQUIVADO", ACTOR, None).await;
    assert!(is_validation(&result), "{result:?}");
}

#[tokio::test]
async fn missing_grant_is_not_found() {
    let (_storage, manager) = setup().await;
    let result = manager.update_status("nope", "ATIVO", ACTOR, None).await;
    assert_eq!(
        result,
        Err(LifecycleError::NotFound {
            entity: "grant".to_string(),
            id: "nope".to_string()
        })
    );
    assert!(matches!(
        manager.history("nope").await,
        Err(LifecycleError::NotFound { .. })
    ));
}

#[tokio::test]
async fn blank_actor_is_rejected() {
    let (storage, manager) = setup().await;
    seed_grant(&storage, "g-1", GrantStatus::Ativo).await;
    let result = manager.block("g-1", "  ", "fraude").await;
    assert!(is_validation(&result));
    assert_eq!(storage.get_grant("g-1").await.unwrap().version, 0);
}

// ── suspend / block ───────────────────────────────────────────────────────────

#[tokio::test]
async fn suspend_follows_the_transition_table() {
    let (storage, manager) = setup().await;
    let review = datetime!(2025-06-01 00:00 UTC);

    for (status, allowed) in [
        (GrantStatus::Apto, true),
        (GrantStatus::Ativo, true),
        (GrantStatus::Bloqueado, false),
        (GrantStatus::Cessado, false),
        (GrantStatus::Cancelado, false),
    ] {
        let id = format!("g-{status}");
        seed_grant(&storage, &id, status).await;
        let result = manager
            .suspend(&id, ACTOR, "aguardando revisao", Some(review))
            .await;
        if allowed {
            let grant = result.unwrap();
            assert_eq!(grant.status, GrantStatus::Suspenso);
            assert_eq!(grant.suspension_review_date, Some(review));
        } else {
            assert!(is_validation(&result), "{status}: {result:?}");
        }
    }
}

#[tokio::test]
async fn suspend_requires_reason() {
    let (storage, manager) = setup().await;
    seed_grant(&storage, "g-1", GrantStatus::Ativo).await;
    assert!(is_validation(&manager.suspend("g-1", ACTOR, "", None).await));
}

#[tokio::test]
async fn block_stamps_timestamp_and_reason() {
    let (storage, manager) = setup().await;
    seed_grant(&storage, "g-1", GrantStatus::Ativo).await;
    let grant = manager.block("g-1", ACTOR, " indicio de fraude ").await.unwrap();
    assert_eq!(grant.status, GrantStatus::Bloqueado);
    assert_eq!(grant.block_reason.as_deref(), Some("indicio de fraude"));
    assert!(grant.blocked_at.is_some());

    seed_grant(&storage, "g-2", GrantStatus::Cessado).await;
    assert!(is_validation(&manager.block("g-2", ACTOR, "fraude").await));
}

// ── unblock / reactivate / cancel ─────────────────────────────────────────────

#[tokio::test]
async fn unblock_requires_bloqueado() {
    let (storage, manager) = setup().await;
    for status in GrantStatus::ALL {
        if status == GrantStatus::Bloqueado {
            continue;
        }
        let id = format!("g-{status}");
        seed_grant(&storage, &id, status).await;
        let result = manager.unblock(&id, ACTOR, "regularizado").await;
        assert!(is_validation(&result), "{status}: {result:?}");
        assert_eq!(storage.get_grant(&id).await.unwrap().status, status);
    }
}

#[tokio::test]
async fn unblock_restores_ativo_with_history() {
    let (storage, manager) = setup().await;
    seed_grant(&storage, "G2", GrantStatus::Bloqueado).await;

    let grant = manager
        .unblock("G2", ACTOR, "documents regularized")
        .await
        .unwrap();
    assert_eq!(grant.status, GrantStatus::Ativo);
    assert_eq!(grant.unblock_reason.as_deref(), Some("documents regularized"));
    assert!(grant.unblocked_at.is_some());

    let history = manager.history("G2").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].previous_status, Some(GrantStatus::Bloqueado));
    assert_eq!(history[0].new_status, GrantStatus::Ativo);
    assert_eq!(history[0].reason.as_deref(), Some("documents regularized"));
}

#[tokio::test]
async fn reactivate_only_from_suspenso_or_cessado() {
    let (storage, manager) = setup().await;
    for status in GrantStatus::ALL {
        let id = format!("g-{status}");
        seed_grant(&storage, &id, status).await;
        let result = manager.reactivate(&id, ACTOR, None).await;
        match status {
            GrantStatus::Suspenso | GrantStatus::Cessado => {
                let grant = result.unwrap();
                assert_eq!(grant.status, GrantStatus::Ativo);
                assert!(grant.suspension_reason.is_none());
                assert!(grant.closure_date.is_none());
            }
            _ => assert!(is_validation(&result), "{status}: {result:?}"),
        }
    }
}

#[tokio::test]
async fn reactivate_clears_suspension() {
    let (storage, manager) = setup().await;
    seed_grant(&storage, "g-1", GrantStatus::Ativo).await;
    manager
        .suspend("g-1", ACTOR, "revisao", Some(datetime!(2025-03-01 00:00 UTC)))
        .await
        .unwrap();
    let grant = manager.reactivate("g-1", ACTOR, Some("ok")).await.unwrap();
    assert_eq!(grant.status, GrantStatus::Ativo);
    assert_eq!(grant.suspension_reason, None);
    assert_eq!(grant.suspension_review_date, None);
    assert_eq!(grant.version, 2);
}

#[tokio::test]
async fn cancel_requires_ativo() {
    let (storage, manager) = setup().await;
    for status in GrantStatus::ALL {
        if status == GrantStatus::Ativo {
            continue;
        }
        let id = format!("g-{status}");
        seed_grant(&storage, &id, status).await;
        let result = manager.cancel(&id, ACTOR, "mudanca de municipio").await;
        assert!(is_validation(&result), "{status}: {result:?}");
    }
}

#[tokio::test]
async fn cancel_requires_reason() {
    let (storage, manager) = setup().await;
    seed_grant(&storage, "g-1", GrantStatus::Ativo).await;
    assert!(is_validation(&manager.cancel("g-1", ACTOR, "   ").await));
    assert_eq!(
        storage.get_grant("g-1").await.unwrap().status,
        GrantStatus::Ativo
    );
}

#[tokio::test]
async fn cancelled_grant_is_terminal() {
    let (storage, manager) = setup().await;
    seed_grant(&storage, "G1", GrantStatus::Ativo).await;

    let grant = manager
        .cancel("G1", ACTOR, "beneficiary relocated")
        .await
        .unwrap();
    assert_eq!(grant.status, GrantStatus::Cancelado);
    assert!(grant.closure_date.is_some());
    assert_eq!(grant.closure_reason.as_deref(), Some("beneficiary relocated"));

    assert!(is_validation(&manager.suspend("G1", ACTOR, "x", None).await));
    assert!(is_validation(&manager.block("G1", ACTOR, "x").await));
    assert!(is_validation(&manager.unblock("G1", ACTOR, "x").await));
    assert!(is_validation(&manager.reactivate("G1", ACTOR, None).await));
    assert!(is_validation(&manager.cancel("G1", ACTOR, "x").await));
    for target in ["APTO", "ATIVO", "SUSPENSO", "BLOQUEADO", "CESSADO"] {
        assert!(is_validation(
            &manager.update_status("G1", target, ACTOR, None).await
        ));
    }
    assert_eq!(storage.get_grant("G1").await.unwrap(), grant);
}

// ── History sink ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn history_failure_does_not_roll_back_transition() {
    let (storage, manager) = setup().await;
    let manager = manager.with_history_recorder(Arc::new(FailingHistory));
    seed_grant(&storage, "g-1", GrantStatus::Ativo).await;

    let grant = manager.block("g-1", ACTOR, "fraude").await.unwrap();
    assert_eq!(grant.status, GrantStatus::Bloqueado);
    assert_eq!(
        storage.get_grant("g-1").await.unwrap().status,
        GrantStatus::Bloqueado
    );
    assert_eq!(storage.history_count().await, 0);
}

// ── create_if_absent ──────────────────────────────────────────────────────────

#[tokio::test]
async fn create_if_absent_is_idempotent() {
    let (storage, manager) = setup().await;

    let first = manager.create_if_absent("req-1", ACTOR).await.unwrap();
    assert_eq!(first.status, GrantStatus::Ativo);
    assert_eq!(first.request_id, "req-1");
    assert_eq!(first.priority_order, 4);
    assert_eq!(first.end_date, add_months(first.start_date, 3));

    let second = manager.create_if_absent("req-1", ACTOR).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(storage.grant_count().await, 1);
    assert_eq!(payments_of(&storage, &first.id).await.len(), 3);

    let history = history_of(&storage, &first.id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, HistoryKind::Creation);
    assert_eq!(history[0].previous_status, None);
    assert_eq!(history[0].new_status, GrantStatus::Ativo);
}

#[tokio::test]
async fn created_payments_follow_periodicity() {
    let (storage, manager) = setup().await;
    let grant = manager.create_if_absent("req-1", ACTOR).await.unwrap();

    let payments = payments_of(&storage, &grant.id).await;
    for (n, p) in payments.iter().enumerate() {
        assert_eq!(p.installment, n as u32 + 1);
        assert_eq!(p.total_installments, 3);
        assert_eq!(p.status, PaymentStatus::Pendente);
        assert_eq!(p.amount, Decimal::new(60000, 2));
        assert_eq!(Some(p.due_date), add_months(grant.start_date, n as u32));
    }
}

#[tokio::test]
async fn requested_installments_override_default() {
    let (storage, manager) = setup().await;
    let mut custom = request("req-5x", "aluguel");
    custom.requested_installments = Some(5);
    register(&storage, Vec::new(), vec![custom]).await;

    let grant = manager.create_if_absent("req-5x", ACTOR).await.unwrap();
    assert_eq!(payments_of(&storage, &grant.id).await.len(), 5);
}

#[tokio::test]
async fn one_time_benefit_pays_once() {
    let (storage, manager) = setup().await;
    let grant = manager.create_if_absent("req-unico", ACTOR).await.unwrap();
    assert_eq!(payments_of(&storage, &grant.id).await.len(), 1);
}

#[tokio::test]
async fn create_for_unknown_request_is_not_found() {
    let (storage, manager) = setup().await;
    let result = manager.create_if_absent("req-missing", ACTOR).await;
    assert_eq!(
        result,
        Err(LifecycleError::NotFound {
            entity: "request".to_string(),
            id: "req-missing".to_string()
        })
    );
    assert_eq!(storage.grant_count().await, 0);
}

#[tokio::test]
async fn payment_failure_keeps_created_grant() {
    let (storage, manager) = setup().await;
    let manager = manager.with_payment_generator(Arc::new(FailingPayments));

    let grant = manager.create_if_absent("req-1", ACTOR).await.unwrap();
    assert_eq!(storage.get_grant(&grant.id).await.unwrap(), grant);
    assert!(payments_of(&storage, &grant.id).await.is_empty());
}

#[tokio::test]
async fn oversized_installment_count_is_rejected_before_generation() {
    let (storage, _manager) = setup().await;
    let generator = StoragePaymentGenerator::new(storage.clone());
    let grant = seed_grant(&storage, "g-big", GrantStatus::Ativo).await;
    let req = request("req-1", "aluguel");

    let result = generator
        .generate_payments(&grant, &req, MAX_INSTALLMENTS + 1, ACTOR)
        .await;
    assert!(matches!(result, Err(LifecycleError::Validation(_))), "{result:?}");
    assert!(payments_of(&storage, "g-big").await.is_empty());

    let generated = generator
        .generate_payments(&grant, &req, MAX_INSTALLMENTS, ACTOR)
        .await
        .unwrap();
    assert_eq!(generated.len(), MAX_INSTALLMENTS as usize);
}

#[tokio::test]
async fn huge_requested_installments_keep_grant_without_payments() {
    let (storage, manager) = setup().await;
    let mut huge = request("req-huge", "aluguel");
    huge.requested_installments = Some(u32::MAX);
    register(&storage, Vec::new(), vec![huge]).await;

    let grant = manager.create_if_absent("req-huge", ACTOR).await.unwrap();
    assert_eq!(grant.status, GrantStatus::Ativo);
    assert!(payments_of(&storage, &grant.id).await.is_empty());
}

// ── prorogate ─────────────────────────────────────────────────────────────────

/// Create the grant for `request_id` and move it to `CESSADO`.
async fn ceased_grant(
    manager: &GrantLifecycleManager<MemoryStorage>,
    request_id: &str,
) -> GrantRecord {
    let grant = manager.create_if_absent(request_id, ACTOR).await.unwrap();
    manager
        .update_status(&grant.id, "CESSADO", ACTOR, Some("fim"))
        .await
        .unwrap()
}

#[tokio::test]
async fn prorogation_requires_cessado() {
    let (_storage, manager) = setup().await;
    let grant = manager.create_if_absent("req-1", ACTOR).await.unwrap();
    let result = manager.prorogate(&grant.id, ACTOR, None).await;
    assert!(is_validation(&result), "{result:?}");
}

#[tokio::test]
async fn prorogation_creates_apto_successor() {
    let (storage, manager) = setup().await;
    let source = ceased_grant(&manager, "req-1").await;

    let successor = manager.prorogate(&source.id, ACTOR, None).await.unwrap();
    assert_ne!(successor.id, source.id);
    assert_eq!(successor.request_id, "req-1");
    assert_eq!(successor.status, GrantStatus::Apto);
    assert_eq!(successor.priority_order, source.priority_order);
    assert!(!successor.judicial_determination);
    assert_eq!(payments_of(&storage, &successor.id).await.len(), 3);

    let history = history_of(&storage, &successor.id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, HistoryKind::Prorogation);
    assert_eq!(history[0].new_status, GrantStatus::Apto);

    let source_after = storage.get_grant(&source.id).await.unwrap();
    assert_eq!(source_after.status, GrantStatus::Cessado);
}

#[tokio::test]
async fn second_non_judicial_prorogation_exceeds_limit() {
    let (storage, manager) = setup().await;
    let source = ceased_grant(&manager, "req-1").await;
    manager.prorogate(&source.id, ACTOR, None).await.unwrap();

    let result = manager.prorogate(&source.id, ACTOR, None).await;
    match result {
        Err(LifecycleError::Validation(msg)) => assert!(msg.contains("limit exceeded"), "{msg}"),
        other => panic!("expected limit exceeded, got {other:?}"),
    }
    assert_eq!(storage.grant_count().await, 2);
}

#[tokio::test]
async fn one_time_benefit_cannot_be_prorogated() {
    let (storage, manager) = setup().await;
    let source = ceased_grant(&manager, "req-unico").await;
    assert!(is_validation(&manager.prorogate(&source.id, ACTOR, None).await));
    assert_eq!(storage.grant_count().await, 1);
}

#[tokio::test]
async fn prorogation_without_payments_is_rejected() {
    let (storage, manager) = setup().await;
    let manager = manager.with_payment_generator(Arc::new(FailingPayments));
    let source = ceased_grant(&manager, "req-1").await;

    let result = manager.prorogate(&source.id, ACTOR, None).await;
    assert!(is_validation(&result), "{result:?}");
    assert_eq!(storage.grant_count().await, 1);
}

#[tokio::test]
async fn payment_failure_keeps_prorogated_successor() {
    let (storage, manager) = setup().await;
    let source = ceased_grant(&manager, "req-1").await;
    let flaky = GrantLifecycleManager::new(storage.clone()).with_payment_generator(Arc::new(
        UnavailableGenerator {
            inner: StoragePaymentGenerator::new(storage.clone()),
        },
    ));

    let successor = flaky.prorogate(&source.id, ACTOR, None).await.unwrap();
    assert_eq!(successor.status, GrantStatus::Apto);
    assert_eq!(storage.get_grant(&successor.id).await.unwrap(), successor);
    assert!(payments_of(&storage, &successor.id).await.is_empty());
    assert_eq!(storage.grant_count().await, 2);
    assert_eq!(
        history_of(&storage, &successor.id).await[0].kind,
        HistoryKind::Prorogation
    );
}

#[tokio::test]
async fn judicial_prorogation_needs_a_document() {
    let (storage, manager) = setup().await;
    let mut judicial = request("req-jud", "aluguel");
    judicial.judicial_determination = true;
    register(&storage, Vec::new(), vec![judicial]).await;
    let source = ceased_grant(&manager, "req-jud").await;

    assert!(is_validation(&manager.prorogate(&source.id, ACTOR, None).await));
    assert!(is_validation(&manager.prorogate(&source.id, ACTOR, Some(" ")).await));

    let successor = manager
        .prorogate(&source.id, ACTOR, Some("PROC-0001234"))
        .await
        .unwrap();
    assert!(successor.judicial_determination);
    assert_eq!(successor.judicial_document_id.as_deref(), Some("PROC-0001234"));

    // Court orders override the one-prorogation limit.
    manager
        .prorogate(&source.id, ACTOR, Some("PROC-0001235"))
        .await
        .unwrap();
    assert_eq!(storage.grant_count().await, 3);
}

#[tokio::test]
async fn judicial_document_on_file_is_reused() {
    let (storage, manager) = setup().await;
    let mut judicial = request("req-jud", "aluguel");
    judicial.judicial_determination = true;
    judicial.judicial_document_id = Some("PROC-777".to_string());
    register(&storage, Vec::new(), vec![judicial]).await;
    let source = ceased_grant(&manager, "req-jud").await;

    let successor = manager.prorogate(&source.id, ACTOR, None).await.unwrap();
    assert_eq!(successor.judicial_document_id.as_deref(), Some("PROC-777"));
}

// ── Automatic closure ─────────────────────────────────────────────────────────

#[tokio::test]
async fn closes_only_when_every_payment_is_released() {
    let (storage, manager) = setup().await;
    let grant = manager.create_if_absent("req-1", ACTOR).await.unwrap();
    let payments = payments_of(&storage, &grant.id).await;
    assert_eq!(payments.len(), 3);

    let first = manager
        .update_payment_status(&payments[0].id, "LIBERADO")
        .await
        .unwrap();
    assert_eq!(first.payment.status, PaymentStatus::Liberado);
    assert_eq!(first.closed_grant, None);
    let second = manager
        .update_payment_status(&payments[1].id, "PAGO")
        .await
        .unwrap();
    assert_eq!(second.closed_grant, None);

    assert_eq!(manager.check_automatic_closure(&grant.id).await.unwrap(), None);
    assert_eq!(manager.get(&grant.id).await.unwrap().status, GrantStatus::Ativo);

    let third = manager
        .update_payment_status(&payments[2].id, "CONFIRMADO")
        .await
        .unwrap();
    let closed = third.closed_grant.unwrap();
    assert_eq!(closed.status, GrantStatus::Cessado);
    assert!(closed.closure_date.is_some());
    assert_eq!(closed.closure_reason.as_deref(), Some(AUTOMATIC_CLOSURE_REASON));

    let history = history_of(&storage, &grant.id).await;
    let last = history.last().unwrap();
    assert_eq!(last.actor_id, SYSTEM_ACTOR);
    assert_eq!(last.previous_status, Some(GrantStatus::Ativo));
    assert_eq!(last.new_status, GrantStatus::Cessado);

    // Already ceased: checking again changes nothing.
    assert_eq!(manager.check_automatic_closure(&grant.id).await.unwrap(), None);
}

#[tokio::test]
async fn closure_is_noop_without_payments() {
    let (storage, manager) = setup().await;
    seed_grant(&storage, "g-1", GrantStatus::Ativo).await;
    assert_eq!(manager.check_automatic_closure("g-1").await.unwrap(), None);
    assert_eq!(storage.get_grant("g-1").await.unwrap().version, 0);
}

#[tokio::test]
async fn closure_ignores_grants_that_are_not_ativo() {
    let (storage, manager) = setup().await;
    let grant = manager.create_if_absent("req-1", ACTOR).await.unwrap();
    manager.block(&grant.id, ACTOR, "fraude").await.unwrap();
    for p in payments_of(&storage, &grant.id).await {
        let update = manager.update_payment_status(&p.id, "PAGO").await.unwrap();
        assert_eq!(update.closed_grant, None);
    }
    assert_eq!(
        manager.get(&grant.id).await.unwrap().status,
        GrantStatus::Bloqueado
    );
}

#[tokio::test]
async fn cancelled_payment_is_not_released() {
    let (storage, manager) = setup().await;
    let grant = manager.create_if_absent("req-unico", ACTOR).await.unwrap();
    let payment = &payments_of(&storage, &grant.id).await[0];
    let update = manager
        .update_payment_status(&payment.id, "CANCELADO")
        .await
        .unwrap();
    assert_eq!(update.closed_grant, None);
}

#[tokio::test]
async fn payment_update_validates_input() {
    let (storage, manager) = setup().await;
    let grant = manager.create_if_absent("req-1", ACTOR).await.unwrap();
    let payment = &payments_of(&storage, &grant.id).await[0];

    assert!(matches!(
        manager.update_payment_status(&payment.id, "ESTORNADO").await,
        Err(LifecycleError::Validation(_))
    ));
    assert!(matches!(
        manager.update_payment_status("pay-missing", "PAGO").await,
        Err(LifecycleError::NotFound { .. })
    ));
}

// ── Concurrency ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn closure_conflicts_when_grant_changes_mid_check() {
    let (storage, manager) = setup().await;
    let grant = manager.create_if_absent("req-1", ACTOR).await.unwrap();

    let mut snap = storage.begin_snapshot().await.unwrap();
    for p in payments_of(&storage, &grant.id).await {
        storage
            .update_payment_status(&mut snap, &p.id, PaymentStatus::Pago, T0)
            .await
            .unwrap();
    }
    storage.commit_snapshot(snap).await.unwrap();

    let manager = manager.with_payment_generator(Arc::new(InterferingPayments {
        storage: storage.clone(),
        inner: StoragePaymentGenerator::new(storage.clone()),
    }));
    let result = manager.check_automatic_closure(&grant.id).await;
    assert!(
        matches!(result, Err(LifecycleError::Conflict { ref grant_id }) if *grant_id == grant.id),
        "{result:?}"
    );
    assert_eq!(
        storage.get_grant(&grant.id).await.unwrap().status,
        GrantStatus::Ativo
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancels_apply_once() {
    let (storage, manager) = setup().await;
    seed_grant(&storage, "g-1", GrantStatus::Ativo).await;
    let manager = Arc::new(manager);

    let mut handles = Vec::new();
    for i in 0..8 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager
                .cancel("g-1", &format!("operator-{i}"), "duplicado")
                .await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => applied += 1,
            Err(LifecycleError::Validation(_)) | Err(LifecycleError::Conflict { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(applied, 1);
    let stored = storage.get_grant("g-1").await.unwrap();
    assert_eq!(stored.status, GrantStatus::Cancelado);
    assert_eq!(stored.version, 1);
    assert_eq!(history_of(&storage, "g-1").await.len(), 1);
}

// ── Queries ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reasons_return_active_entries_only() {
    let (_storage, manager) = setup().await;
    let reasons = manager.reasons("bloqueio").unwrap();
    assert!(!reasons.is_empty());
    assert!(reasons.iter().all(|r| r.active));

    let all = manager.reason_catalog().entries().count();
    let active: usize = pgben_core::ReasonOperation::ALL
        .iter()
        .map(|op| manager.reasons(op.as_str()).unwrap().len())
        .sum();
    assert!(active < all);

    assert!(matches!(
        manager.reasons("arquivamento"),
        Err(LifecycleError::Validation(_))
    ));
}

#[tokio::test]
async fn list_filters_and_pages() {
    let (storage, manager) = setup().await;
    seed_grant(&storage, "g-1", GrantStatus::Ativo).await;
    seed_grant(&storage, "g-2", GrantStatus::Ativo).await;
    seed_grant(&storage, "g-3", GrantStatus::Suspenso).await;

    let page = manager
        .list(&GrantFilter {
            status: Some(GrantStatus::Ativo),
            limit: 1,
            ..GrantFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, "g-1");
}

#[tokio::test]
async fn payments_query_requires_existing_grant() {
    let (_storage, manager) = setup().await;
    let grant = manager.create_if_absent("req-1", ACTOR).await.unwrap();

    let page = manager.payments(&grant.id).await.unwrap();
    assert_eq!(page.total, 3);
    assert!(page.items.iter().all(|p| p.grant_id == grant.id));

    assert!(matches!(
        manager.payments("nope").await,
        Err(LifecycleError::NotFound { .. })
    ));
}

#[tokio::test]
async fn generic_reactivation_from_cessado_clears_closure() {
    let (storage, manager) = setup().await;
    let ceased = ceased_grant(&manager, "req-1").await;
    assert!(ceased.closure_date.is_some());

    let active = manager
        .update_status(&ceased.id, "ATIVO", ACTOR, None)
        .await
        .unwrap();
    assert_eq!(active.status, GrantStatus::Ativo);
    assert!(active.closure_date.is_none());
    assert!(active.closure_reason.is_none());
    assert_eq!(storage.get_grant(&ceased.id).await.unwrap(), active);
}

#[tokio::test]
async fn generic_update_matches_dedicated_operations() {
    let (_storage, manager) = setup().await;
    let grant = manager.create_if_absent("req-1", ACTOR).await.unwrap();

    manager.suspend(&grant.id, ACTOR, "revisao", Some(T0)).await.unwrap();
    let resumed = manager
        .update_status(&grant.id, "ATIVO", ACTOR, Some("revisado"))
        .await
        .unwrap();
    assert!(resumed.suspension_reason.is_none());
    assert!(resumed.suspension_review_date.is_none());

    manager.block(&grant.id, ACTOR, "fraude").await.unwrap();
    let unblocked = manager
        .update_status(&grant.id, "ATIVO", ACTOR, Some("apurado"))
        .await
        .unwrap();
    assert_eq!(unblocked.unblock_reason.as_deref(), Some("apurado"));
    assert!(unblocked.unblocked_at.is_some());
    assert_eq!(unblocked.block_reason.as_deref(), Some("fraude"));
}
