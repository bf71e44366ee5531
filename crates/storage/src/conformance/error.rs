use std::future::Future;

use pgben_core::{GrantStatus, PaymentStatus};

use super::{make_grant, make_payment, TestResult, T0};
use crate::{GrantStorage, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "error",
            "get_grant_nonexistent",
            get_grant_nonexistent(factory).await,
        ),
        TestResult::from_result(
            "error",
            "get_grant_for_update_nonexistent",
            get_grant_for_update_nonexistent(factory).await,
        ),
        TestResult::from_result(
            "error",
            "update_grant_nonexistent",
            update_grant_nonexistent(factory).await,
        ),
        TestResult::from_result(
            "error",
            "get_payment_nonexistent",
            get_payment_nonexistent(factory).await,
        ),
        TestResult::from_result(
            "error",
            "update_payment_status_nonexistent",
            update_payment_status_nonexistent(factory).await,
        ),
        TestResult::from_result(
            "error",
            "get_request_and_benefit_type_nonexistent",
            get_request_and_benefit_type_nonexistent(factory).await,
        ),
        TestResult::from_result(
            "error",
            "payment_for_unknown_grant_rejected",
            payment_for_unknown_grant_rejected(factory).await,
        ),
        TestResult::from_result(
            "error",
            "empty_listings_for_unknown_grant",
            empty_listings_for_unknown_grant(factory).await,
        ),
    ]
}

fn expect_not_found<T: std::fmt::Debug>(
    result: Result<T, StorageError>,
    kind: &str,
    id: &str,
) -> Result<(), String> {
    match result {
        Err(StorageError::NotFound { kind: k, id: i }) if k == kind && i == id => Ok(()),
        other => Err(format!("expected NotFound({kind}, {id}), got {other:?}")),
    }
}

async fn get_grant_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_not_found(s.get_grant("missing").await, "grant", "missing")
}

async fn get_grant_for_update_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.get_grant_for_update(&mut snap, "missing").await;
    let _ = s.abort_snapshot(snap).await;
    expect_not_found(result, "grant", "missing")
}

async fn update_grant_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_grant(&mut snap, 0, make_grant("missing", "r-1", GrantStatus::Ativo))
        .await;
    let _ = s.abort_snapshot(snap).await;
    expect_not_found(result, "grant", "missing")
}

async fn get_payment_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_not_found(s.get_payment("p-missing").await, "payment", "p-missing")
}

async fn update_payment_status_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_payment_status(&mut snap, "p-missing", PaymentStatus::Liberado, T0)
        .await;
    let _ = s.abort_snapshot(snap).await;
    expect_not_found(result, "payment", "p-missing")
}

async fn get_request_and_benefit_type_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_not_found(s.get_request("r-missing").await, "request", "r-missing")?;
    expect_not_found(
        s.get_benefit_type("b-missing").await,
        "benefit type",
        "b-missing",
    )
}

async fn payment_for_unknown_grant_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let inserted = s
        .insert_payment(
            &mut snap,
            make_payment("p-1", "g-missing", 1, PaymentStatus::Pendente),
        )
        .await;
    let result = match inserted {
        Ok(()) => s.commit_snapshot(snap).await,
        Err(e) => {
            let _ = s.abort_snapshot(snap).await;
            Err(e)
        }
    };
    expect_not_found(result, "grant", "g-missing")
}

async fn empty_listings_for_unknown_grant<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let history = s.list_history("g-missing").await.map_err(|e| e.to_string())?;
    if !history.is_empty() {
        return Err(format!("expected empty history, got {}", history.len()));
    }
    let grants = s
        .find_grants_by_request("r-missing")
        .await
        .map_err(|e| e.to_string())?;
    if !grants.is_empty() {
        return Err(format!("expected no grants, got {}", grants.len()));
    }
    Ok(())
}
