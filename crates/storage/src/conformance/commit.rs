use std::future::Future;

use pgben_core::{GrantStatus, PaymentStatus};

use super::{
    make_benefit_type, make_grant, make_history, make_payment, make_request, seed_grant,
    TestResult, T0,
};
use crate::{GrantStorage, PaymentFilter, StorageError};

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "commit",
            "grant_with_payments_and_history_commit_together",
            grant_with_payments_and_history_commit_together(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "failed_commit_applies_nothing",
            failed_commit_applies_nothing(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "payment_status_update_persists",
            payment_status_update_persists(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "request_and_benefit_type_round_trip",
            request_and_benefit_type_round_trip(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "duplicate_request_rejected",
            duplicate_request_rejected(factory).await,
        ),
    ]
}

async fn grant_with_payments_and_history_commit_together<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_grant(&mut snap, make_grant("g-1", "r-1", GrantStatus::Ativo))
        .await
        .map_err(|e| e.to_string())?;
    for i in 1..=3u32 {
        s.insert_payment(
            &mut snap,
            make_payment(&format!("p-{i}"), "g-1", i, PaymentStatus::Pendente),
        )
        .await
        .map_err(|e| e.to_string())?;
    }
    s.insert_history(
        &mut snap,
        make_history("h-1", "g-1", GrantStatus::Apto, GrantStatus::Ativo),
    )
    .await
    .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let page = s
        .list_payments(&PaymentFilter {
            grant_id: Some("g-1".to_string()),
            status: None,
        })
        .await
        .map_err(|e| e.to_string())?;
    if page.total != 3 || page.items.len() != 3 {
        return Err(format!("expected 3 payments, got {}", page.total));
    }
    let installments: Vec<u32> = page.items.iter().map(|p| p.installment).collect();
    if installments != vec![1, 2, 3] {
        return Err(format!("payments out of order: {installments:?}"));
    }
    let history = s.list_history("g-1").await.map_err(|e| e.to_string())?;
    if history.len() != 1 {
        return Err(format!("expected 1 history entry, got {}", history.len()));
    }
    Ok(())
}

/// A snapshot that fails at commit (stale version) must not leak any of its
/// other buffered writes.
async fn failed_commit_applies_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_grant(&s, "g-1", "r-1", GrantStatus::Ativo).await?;

    // Snapshot A reads version 0 and stages more work.
    let mut snap_a = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut grant_a = s
        .get_grant_for_update(&mut snap_a, "g-1")
        .await
        .map_err(|e| e.to_string())?;
    grant_a.status = GrantStatus::Suspenso;

    // Snapshot B updates and commits first.
    let mut snap_b = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut grant_b = s
        .get_grant_for_update(&mut snap_b, "g-1")
        .await
        .map_err(|e| e.to_string())?;
    grant_b.status = GrantStatus::Bloqueado;
    s.update_grant(&mut snap_b, 0, grant_b)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap_b).await.map_err(|e| e.to_string())?;

    let staged = s.update_grant(&mut snap_a, 0, grant_a).await;
    let result = match staged {
        Ok(_) => {
            s.insert_history(
                &mut snap_a,
                make_history("h-a", "g-1", GrantStatus::Ativo, GrantStatus::Suspenso),
            )
            .await
            .map_err(|e| e.to_string())?;
            s.commit_snapshot(snap_a).await
        }
        Err(e) => {
            let _ = s.abort_snapshot(snap_a).await;
            Err(e)
        }
    };
    if !matches!(result, Err(StorageError::ConcurrentConflict { .. })) {
        return Err(format!("expected ConcurrentConflict, got {result:?}"));
    }

    let history = s.list_history("g-1").await.map_err(|e| e.to_string())?;
    if !history.is_empty() {
        return Err("history from failed snapshot was applied".to_string());
    }
    let rec = s.get_grant("g-1").await.map_err(|e| e.to_string())?;
    if rec.status != GrantStatus::Bloqueado || rec.version != 1 {
        return Err(format!(
            "expected BLOQUEADO@1, got {}@{}",
            rec.status, rec.version
        ));
    }
    Ok(())
}

async fn payment_status_update_persists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_grant(&mut snap, make_grant("g-1", "r-1", GrantStatus::Ativo))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_payment(&mut snap, make_payment("p-1", "g-1", 1, PaymentStatus::Pendente))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let updated = s
        .update_payment_status(&mut snap, "p-1", PaymentStatus::Liberado, T0)
        .await
        .map_err(|e| e.to_string())?;
    if updated.status != PaymentStatus::Liberado {
        return Err(format!("returned record has status {}", updated.status));
    }
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s.get_payment("p-1").await.map_err(|e| e.to_string())?;
    if rec.status != PaymentStatus::Liberado {
        return Err(format!("expected LIBERADO, got {}", rec.status));
    }
    Ok(())
}

async fn request_and_benefit_type_round_trip<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let benefit = make_benefit_type("b-1");
    let request = make_request("r-1", "b-1");
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_benefit_type(&mut snap, benefit.clone())
        .await
        .map_err(|e| e.to_string())?;
    s.insert_request(&mut snap, request.clone())
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if s.get_benefit_type("b-1").await.map_err(|e| e.to_string())? != benefit {
        return Err("benefit type differs after round trip".to_string());
    }
    if s.get_request("r-1").await.map_err(|e| e.to_string())? != request {
        return Err("request differs after round trip".to_string());
    }
    Ok(())
}

async fn duplicate_request_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_request(&mut snap, make_request("r-1", "b-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let inserted = s.insert_request(&mut snap, make_request("r-1", "b-1")).await;
    let result = match inserted {
        Ok(()) => s.commit_snapshot(snap).await,
        Err(e) => {
            let _ = s.abort_snapshot(snap).await;
            Err(e)
        }
    };
    match result {
        Err(StorageError::AlreadyExists { kind: "request", .. }) => Ok(()),
        other => Err(format!("expected AlreadyExists(request), got {other:?}")),
    }
}
