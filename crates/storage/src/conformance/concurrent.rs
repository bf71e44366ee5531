use std::future::Future;
use std::sync::Arc;

use pgben_core::GrantStatus;

use super::{make_grant, seed_grant, TestResult};
use crate::{GrantStorage, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_updates_exactly_one_wins",
            concurrent_updates_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_inserts_exactly_one_wins",
            concurrent_inserts_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_updates_different_grants_all_succeed",
            concurrent_updates_different_grants_all_succeed(factory).await,
        ),
    ]
}

// ── Concurrent update: exactly one wins ─────────────────────────────────────

/// N tasks each open a snapshot and attempt to move the same grant from
/// version 0. Exactly one commit succeeds; the rest must get
/// ConcurrentConflict, either from `update_grant` or from the commit.
async fn concurrent_updates_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed_grant(storage.as_ref(), "g-1", "r-1", GrantStatus::Ativo).await?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let mut grant = s.get_grant_for_update(&mut snap, "g-1").await?;
            grant.status = GrantStatus::Suspenso;
            let staged = s.update_grant(&mut snap, 0, grant).await;
            let result = match staged {
                Ok(_) => s.commit_snapshot(snap).await,
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    Err(e)
                }
            };
            match result {
                Ok(()) => Ok(true),
                Err(StorageError::ConcurrentConflict { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }

    let rec = storage.get_grant("g-1").await.map_err(|e| e.to_string())?;
    if rec.version != 1 || rec.status != GrantStatus::Suspenso {
        return Err(format!(
            "expected SUSPENSO@1 after race, got {}@{}",
            rec.status, rec.version
        ));
    }
    Ok(())
}

// ── Concurrent insert: exactly one wins ─────────────────────────────────────

async fn concurrent_inserts_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let inserted = s
                .insert_grant(&mut snap, make_grant("g-1", "r-1", GrantStatus::Ativo))
                .await;
            let result = match inserted {
                Ok(()) => s.commit_snapshot(snap).await,
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    Err(e)
                }
            };
            match result {
                Ok(()) => Ok(true),
                Err(StorageError::AlreadyExists { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    Ok(())
}

// ── Concurrent updates to different grants: all succeed ─────────────────────

async fn concurrent_updates_different_grants_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    for i in 0..N {
        seed_grant(storage.as_ref(), &format!("g-{i}"), "r-1", GrantStatus::Ativo).await?;
    }

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("g-{i}");
            let mut snap = s.begin_snapshot().await?;
            let mut grant = s.get_grant_for_update(&mut snap, &id).await?;
            grant.status = GrantStatus::Bloqueado;
            s.update_grant(&mut snap, 0, grant).await?;
            s.commit_snapshot(snap).await?;
            Ok::<(), StorageError>(())
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        handle
            .await
            .map_err(|e| format!("task {i} panic: {e}"))?
            .map_err(|e| format!("task {i} failed: {e}"))?;
    }

    for i in 0..N {
        let rec = storage
            .get_grant(&format!("g-{i}"))
            .await
            .map_err(|e| format!("get g-{i}: {e}"))?;
        if rec.status != GrantStatus::Bloqueado || rec.version != 1 {
            return Err(format!(
                "g-{i}: expected BLOQUEADO@1, got {}@{}",
                rec.status, rec.version
            ));
        }
    }
    Ok(())
}
