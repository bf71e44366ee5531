use std::future::Future;

use pgben_core::GrantStatus;

use super::{make_grant, make_history, seed_grant, TestResult};
use crate::{GrantStorage, StorageError};

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "snapshot",
            "empty_snapshot_commits",
            empty_snapshot_commits(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "uncommitted_grant_invisible_to_get",
            uncommitted_grant_invisible_to_get(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "snapshot_reads_its_own_insert",
            snapshot_reads_its_own_insert(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "snapshot_reads_its_own_update",
            snapshot_reads_its_own_update(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "uncommitted_update_invisible_to_get",
            uncommitted_update_invisible_to_get(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "aborted_insert_discarded",
            aborted_insert_discarded(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "dropped_snapshot_discarded",
            dropped_snapshot_discarded(factory).await,
        ),
    ]
}

async fn empty_snapshot_commits<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())
}

async fn uncommitted_grant_invisible_to_get<S, F, Fut>(factory: &F) -> Result<(), String>
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
    // Do NOT commit, the snapshot is still open.

    let result = s.get_grant("g-1").await;
    let _ = s.abort_snapshot(snap).await;
    if !matches!(result, Err(StorageError::NotFound { .. })) {
        return Err(format!(
            "expected NotFound for uncommitted grant, got {result:?}"
        ));
    }
    Ok(())
}

async fn snapshot_reads_its_own_insert<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_grant(&mut snap, make_grant("g-1", "r-1", GrantStatus::Apto))
        .await
        .map_err(|e| e.to_string())?;
    let rec = s
        .get_grant_for_update(&mut snap, "g-1")
        .await
        .map_err(|e| e.to_string())?;
    let _ = s.abort_snapshot(snap).await;
    if rec.status != GrantStatus::Apto {
        return Err(format!("expected APTO, got {}", rec.status));
    }
    Ok(())
}

async fn snapshot_reads_its_own_update<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.update_grant(&mut snap, 0, grant)
        .await
        .map_err(|e| e.to_string())?;
    let rec = s
        .get_grant_for_update(&mut snap, "g-1")
        .await
        .map_err(|e| e.to_string())?;
    let _ = s.abort_snapshot(snap).await;

    if rec.status != GrantStatus::Suspenso || rec.version != 1 {
        return Err(format!(
            "expected SUSPENSO@1 inside snapshot, got {}@{}",
            rec.status, rec.version
        ));
    }
    Ok(())
}

async fn uncommitted_update_invisible_to_get<S, F, Fut>(factory: &F) -> Result<(), String>
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
    grant.status = GrantStatus::Bloqueado;
    s.update_grant(&mut snap, 0, grant)
        .await
        .map_err(|e| e.to_string())?;

    let outside = s.get_grant("g-1").await.map_err(|e| e.to_string())?;
    let _ = s.abort_snapshot(snap).await;
    if outside.status != GrantStatus::Ativo || outside.version != 0 {
        return Err(format!(
            "uncommitted update leaked: {}@{}",
            outside.status, outside.version
        ));
    }
    Ok(())
}

async fn aborted_insert_discarded<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.insert_history(
        &mut snap,
        make_history("h-1", "g-1", GrantStatus::Apto, GrantStatus::Ativo),
    )
    .await
    .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    if s.get_grant("g-1").await.is_ok() {
        return Err("aborted grant is visible".to_string());
    }
    let history = s.list_history("g-1").await.map_err(|e| e.to_string())?;
    if !history.is_empty() {
        return Err(format!("aborted history visible: {} entries", history.len()));
    }
    Ok(())
}

async fn dropped_snapshot_discarded<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    {
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        s.insert_grant(&mut snap, make_grant("g-1", "r-1", GrantStatus::Ativo))
            .await
            .map_err(|e| e.to_string())?;
        drop(snap);
    }
    if s.get_grant("g-1").await.is_ok() {
        return Err("grant from dropped snapshot is visible".to_string());
    }
    Ok(())
}
