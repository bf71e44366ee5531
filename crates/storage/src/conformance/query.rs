use std::future::Future;

use pgben_core::{GrantStatus, PaymentStatus};

use super::{make_grant, make_payment, TestResult};
use crate::{GrantFilter, GrantStorage, PaymentFilter};

pub(super) async fn run_query_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "query",
            "list_grants_filters_by_status",
            list_grants_filters_by_status(factory).await,
        ),
        TestResult::from_result(
            "query",
            "list_grants_filters_by_request_and_judicial_flag",
            list_grants_filters_by_request_and_judicial_flag(factory).await,
        ),
        TestResult::from_result(
            "query",
            "list_grants_paginates_with_total",
            list_grants_paginates_with_total(factory).await,
        ),
        TestResult::from_result(
            "query",
            "find_grants_by_request_in_creation_order",
            find_grants_by_request_in_creation_order(factory).await,
        ),
        TestResult::from_result(
            "query",
            "list_payments_filters_by_status",
            list_payments_filters_by_status(factory).await,
        ),
    ]
}

/// Commit grants `g-0..g-{n}` in one snapshot, with statuses cycling through `statuses`.
async fn seed_many<S: GrantStorage>(
    s: &S,
    n: usize,
    statuses: &[GrantStatus],
) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    for i in 0..n {
        let mut grant = make_grant(
            &format!("g-{i}"),
            &format!("r-{}", i % 2),
            statuses[i % statuses.len()],
        );
        grant.judicial_determination = i % 3 == 0;
        s.insert_grant(&mut snap, grant)
            .await
            .map_err(|e| e.to_string())?;
    }
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())
}

async fn list_grants_filters_by_status<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_many(&s, 6, &[GrantStatus::Ativo, GrantStatus::Suspenso, GrantStatus::Cessado]).await?;
    let page = s
        .list_grants(&GrantFilter {
            status: Some(GrantStatus::Suspenso),
            ..Default::default()
        })
        .await
        .map_err(|e| e.to_string())?;
    let ids: Vec<&str> = page.items.iter().map(|g| g.id.as_str()).collect();
    if ids != vec!["g-1", "g-4"] || page.total != 2 {
        return Err(format!("expected [g-1, g-4], got {ids:?} (total {})", page.total));
    }
    Ok(())
}

async fn list_grants_filters_by_request_and_judicial_flag<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_many(&s, 6, &[GrantStatus::Ativo]).await?;
    // r-0 holds g-0, g-2, g-4; judicial grants are g-0 and g-3.
    let page = s
        .list_grants(&GrantFilter {
            request_id: Some("r-0".to_string()),
            judicial_determination: Some(true),
            ..Default::default()
        })
        .await
        .map_err(|e| e.to_string())?;
    let ids: Vec<&str> = page.items.iter().map(|g| g.id.as_str()).collect();
    if ids != vec!["g-0"] {
        return Err(format!("expected [g-0], got {ids:?}"));
    }
    Ok(())
}

async fn list_grants_paginates_with_total<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_many(&s, 5, &[GrantStatus::Ativo]).await?;
    let page = s
        .list_grants(&GrantFilter {
            offset: 2,
            limit: 2,
            ..Default::default()
        })
        .await
        .map_err(|e| e.to_string())?;
    let ids: Vec<&str> = page.items.iter().map(|g| g.id.as_str()).collect();
    if ids != vec!["g-2", "g-3"] {
        return Err(format!("expected [g-2, g-3], got {ids:?}"));
    }
    if page.total != 5 {
        return Err(format!("expected total 5, got {}", page.total));
    }

    let past_end = s
        .list_grants(&GrantFilter {
            offset: 10,
            ..Default::default()
        })
        .await
        .map_err(|e| e.to_string())?;
    if !past_end.items.is_empty() || past_end.total != 5 {
        return Err("offset past the end must return no items but the full total".to_string());
    }
    Ok(())
}

async fn find_grants_by_request_in_creation_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for id in ["g-b", "g-a", "g-c"] {
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        s.insert_grant(&mut snap, make_grant(id, "r-1", GrantStatus::Ativo))
            .await
            .map_err(|e| e.to_string())?;
        s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    }
    let grants = s
        .find_grants_by_request("r-1")
        .await
        .map_err(|e| e.to_string())?;
    let ids: Vec<&str> = grants.iter().map(|g| g.id.as_str()).collect();
    if ids != vec!["g-b", "g-a", "g-c"] {
        return Err(format!("expected creation order, got {ids:?}"));
    }
    Ok(())
}

async fn list_payments_filters_by_status<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let statuses = [
        PaymentStatus::Liberado,
        PaymentStatus::Pendente,
        PaymentStatus::Liberado,
    ];
    for (i, status) in statuses.into_iter().enumerate() {
        let n = i as u32 + 1;
        s.insert_payment(&mut snap, make_payment(&format!("p-{n}"), "g-1", n, status))
            .await
            .map_err(|e| e.to_string())?;
    }
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let page = s
        .list_payments(&PaymentFilter {
            grant_id: Some("g-1".to_string()),
            status: Some(PaymentStatus::Liberado),
        })
        .await
        .map_err(|e| e.to_string())?;
    let ids: Vec<&str> = page.items.iter().map(|p| p.id.as_str()).collect();
    if ids != vec!["p-1", "p-3"] || page.total != 2 {
        return Err(format!("expected [p-1, p-3], got {ids:?}"));
    }
    Ok(())
}
