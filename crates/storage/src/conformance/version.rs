use std::future::Future;

use pgben_core::GrantStatus;

use super::{seed_grant, TestResult};
use crate::{GrantStorage, StorageError};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "version",
            "update_returns_incremented_version",
            update_returns_incremented_version(factory).await,
        ),
        TestResult::from_result(
            "version",
            "version_increments_sequentially",
            version_increments_sequentially(factory).await,
        ),
        TestResult::from_result(
            "version",
            "update_with_wrong_version_returns_conflict",
            update_with_wrong_version_returns_conflict(factory).await,
        ),
        TestResult::from_result(
            "version",
            "stale_version_after_intervening_commit",
            stale_version_after_intervening_commit(factory).await,
        ),
        TestResult::from_result(
            "version",
            "conflict_has_correct_fields",
            conflict_has_correct_fields(factory).await,
        ),
        TestResult::from_result(
            "version",
            "two_updates_in_one_snapshot",
            two_updates_in_one_snapshot(factory).await,
        ),
    ]
}

/// Read, set status, update at `expected`, commit. Returns the new version.
async fn transition<S: GrantStorage>(
    s: &S,
    grant_id: &str,
    expected: i64,
    status: GrantStatus,
) -> Result<i64, StorageError> {
    let mut snap = s.begin_snapshot().await?;
    let mut grant = s.get_grant_for_update(&mut snap, grant_id).await?;
    grant.status = status;
    match s.update_grant(&mut snap, expected, grant).await {
        Ok(v) => {
            s.commit_snapshot(snap).await?;
            Ok(v)
        }
        Err(e) => {
            let _ = s.abort_snapshot(snap).await;
            Err(e)
        }
    }
}

async fn update_returns_incremented_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_grant(&s, "g-1", "r-1", GrantStatus::Ativo).await?;
    let v = transition(&s, "g-1", 0, GrantStatus::Suspenso)
        .await
        .map_err(|e| e.to_string())?;
    if v != 1 {
        return Err(format!("expected new version 1, got {v}"));
    }
    let rec = s.get_grant("g-1").await.map_err(|e| e.to_string())?;
    if rec.version != 1 || rec.status != GrantStatus::Suspenso {
        return Err(format!(
            "expected SUSPENSO@1, got {}@{}",
            rec.status, rec.version
        ));
    }
    Ok(())
}

async fn version_increments_sequentially<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_grant(&s, "g-1", "r-1", GrantStatus::Ativo).await?;
    let path = [
        GrantStatus::Suspenso,
        GrantStatus::Ativo,
        GrantStatus::Bloqueado,
        GrantStatus::Ativo,
    ];
    for (i, status) in path.into_iter().enumerate() {
        let expected = i as i64;
        let v = transition(&s, "g-1", expected, status)
            .await
            .map_err(|e| format!("step {i}: {e}"))?;
        if v != expected + 1 {
            return Err(format!("step {i}: expected version {}, got {v}", expected + 1));
        }
    }
    Ok(())
}

async fn update_with_wrong_version_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_grant(&s, "g-1", "r-1", GrantStatus::Ativo).await?;
    for wrong in [-1, 1, 5] {
        let result = transition(&s, "g-1", wrong, GrantStatus::Cancelado).await;
        if !matches!(result, Err(StorageError::ConcurrentConflict { .. })) {
            return Err(format!("version {wrong}: expected conflict, got {result:?}"));
        }
    }
    let rec = s.get_grant("g-1").await.map_err(|e| e.to_string())?;
    if rec.status != GrantStatus::Ativo || rec.version != 0 {
        return Err(format!(
            "failed updates mutated grant: {}@{}",
            rec.status, rec.version
        ));
    }
    Ok(())
}

async fn stale_version_after_intervening_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_grant(&s, "g-1", "r-1", GrantStatus::Ativo).await?;
    transition(&s, "g-1", 0, GrantStatus::Suspenso)
        .await
        .map_err(|e| e.to_string())?;
    let result = transition(&s, "g-1", 0, GrantStatus::Bloqueado).await;
    if !matches!(result, Err(StorageError::ConcurrentConflict { .. })) {
        return Err(format!("expected conflict on stale version, got {result:?}"));
    }
    Ok(())
}

async fn conflict_has_correct_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_grant(&s, "g-7", "r-1", GrantStatus::Ativo).await?;
    match transition(&s, "g-7", 3, GrantStatus::Cessado).await {
        Err(StorageError::ConcurrentConflict {
            grant_id,
            expected_version,
        }) if grant_id == "g-7" && expected_version == 3 => Ok(()),
        other => Err(format!("expected ConcurrentConflict(g-7, 3), got {other:?}")),
    }
}

async fn two_updates_in_one_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_grant(&s, "g-1", "r-1", GrantStatus::Ativo).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut grant = s
        .get_grant_for_update(&mut snap, "g-1")
        .await
        .map_err(|e| e.to_string())?;
    grant.status = GrantStatus::Suspenso;
    let v1 = s
        .update_grant(&mut snap, 0, grant.clone())
        .await
        .map_err(|e| e.to_string())?;
    grant.status = GrantStatus::Ativo;
    let v2 = s
        .update_grant(&mut snap, v1, grant)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s.get_grant("g-1").await.map_err(|e| e.to_string())?;
    if v2 != 2 || rec.version != 2 || rec.status != GrantStatus::Ativo {
        return Err(format!(
            "expected ATIVO@2, got {}@{} (returned {v2})",
            rec.status, rec.version
        ));
    }
    Ok(())
}
