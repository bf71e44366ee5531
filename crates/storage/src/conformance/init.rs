use std::future::Future;

use pgben_core::GrantStatus;

use super::{make_grant, seed_grant, TestResult};
use crate::{GrantStorage, StorageError};

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "init",
            "insert_grant_starts_at_version_0",
            insert_grant_starts_at_version_0(factory).await,
        ),
        TestResult::from_result(
            "init",
            "insert_grant_forces_version_0",
            insert_grant_forces_version_0(factory).await,
        ),
        TestResult::from_result(
            "init",
            "insert_grant_preserves_fields",
            insert_grant_preserves_fields(factory).await,
        ),
        TestResult::from_result(
            "init",
            "duplicate_committed_grant_rejected",
            duplicate_committed_grant_rejected(factory).await,
        ),
        TestResult::from_result(
            "init",
            "duplicate_grant_in_same_snapshot_rejected",
            duplicate_grant_in_same_snapshot_rejected(factory).await,
        ),
    ]
}

async fn insert_grant_starts_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_grant(&s, "g-1", "r-1", GrantStatus::Ativo).await?;
    let rec = s.get_grant("g-1").await.map_err(|e| e.to_string())?;
    if rec.version != 0 {
        return Err(format!("expected version 0, got {}", rec.version));
    }
    if rec.status != GrantStatus::Ativo {
        return Err(format!("expected ATIVO, got {}", rec.status));
    }
    Ok(())
}

async fn insert_grant_forces_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut grant = make_grant("g-1", "r-1", GrantStatus::Apto);
    grant.version = 42;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_grant(&mut snap, grant)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s.get_grant("g-1").await.map_err(|e| e.to_string())?;
    if rec.version != 0 {
        return Err(format!("expected version forced to 0, got {}", rec.version));
    }
    Ok(())
}

async fn insert_grant_preserves_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut grant = make_grant("g-1", "r-1", GrantStatus::Ativo);
    grant.priority_order = 7;
    grant.judicial_determination = true;
    grant.judicial_document_id = Some("proc-123".to_string());
    let expected = grant.clone();

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_grant(&mut snap, grant)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s.get_grant("g-1").await.map_err(|e| e.to_string())?;
    if rec != expected {
        return Err(format!("stored grant differs: {rec:?} != {expected:?}"));
    }
    Ok(())
}

async fn duplicate_committed_grant_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_grant(&s, "g-1", "r-1", GrantStatus::Ativo).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let inserted = s
        .insert_grant(&mut snap, make_grant("g-1", "r-2", GrantStatus::Apto))
        .await;
    // Backends may detect the duplicate eagerly or at commit.
    let result = match inserted {
        Ok(()) => s.commit_snapshot(snap).await,
        Err(e) => {
            let _ = s.abort_snapshot(snap).await;
            Err(e)
        }
    };
    match result {
        Err(StorageError::AlreadyExists { kind, id }) if kind == "grant" && id == "g-1" => Ok(()),
        other => Err(format!("expected AlreadyExists(grant, g-1), got {other:?}")),
    }
}

async fn duplicate_grant_in_same_snapshot_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let second = s
        .insert_grant(&mut snap, make_grant("g-1", "r-1", GrantStatus::Ativo))
        .await;
    let _ = s.abort_snapshot(snap).await;
    match second {
        Err(StorageError::AlreadyExists { .. }) => Ok(()),
        other => Err(format!("expected AlreadyExists, got {other:?}")),
    }
}
