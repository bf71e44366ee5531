//! Conformance test suite for `GrantStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any `GrantStorage`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Initialization**: grant insertion, duplicate detection, version 0
//! - **Snapshot isolation**: uncommitted writes invisible, committed writes visible
//! - **Atomic commit**: all-or-nothing semantics for multi-record snapshots
//! - **Version validation / OCC**: optimistic concurrency conflict detection
//! - **Queries**: filters, pagination and ordering of listings
//! - **Error handling**: correct error variants for missing records
//! - **Concurrency**: racing snapshots on the same grant
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use pgben_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_storage().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod commit;
mod concurrent;
mod error;
mod init;
mod query;
mod snapshot;
mod version;

use std::fmt;
use std::future::Future;

use pgben_core::{GrantStatus, PaymentStatus, Periodicity};
use rust_decimal::Decimal;
use time::macros::datetime;
use time::OffsetDateTime;

use crate::record::{
    BenefitTypeRecord, GrantRecord, HistoryKind, HistoryRecord, PaymentRecord, RequestRecord,
};
use crate::GrantStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "init", "snapshot", "commit").
    pub category: String,
    /// Test name (e.g. "insert_grant_starts_at_version_0").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: GrantStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(init::run_init_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(query::run_query_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

const T0: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);

fn make_grant(id: &str, request_id: &str, status: GrantStatus) -> GrantRecord {
    GrantRecord::new(id, request_id, status, T0)
}

fn make_payment(id: &str, grant_id: &str, installment: u32, status: PaymentStatus) -> PaymentRecord {
    PaymentRecord {
        id: id.to_string(),
        grant_id: grant_id.to_string(),
        installment,
        total_installments: 3,
        amount: Decimal::new(15000, 2),
        status,
        due_date: T0,
        created_at: T0,
        updated_at: T0,
    }
}

fn make_history(id: &str, grant_id: &str, from: GrantStatus, to: GrantStatus) -> HistoryRecord {
    HistoryRecord {
        id: id.to_string(),
        grant_id: grant_id.to_string(),
        previous_status: Some(from),
        new_status: to,
        actor_id: "test-actor".to_string(),
        reason: None,
        kind: HistoryKind::Transition,
        recorded_at: T0,
    }
}

fn make_request(id: &str, benefit_type_id: &str) -> RequestRecord {
    RequestRecord {
        id: id.to_string(),
        protocol: format!("SOL-{id}"),
        beneficiary_id: "citizen-1".to_string(),
        benefit_type_id: benefit_type_id.to_string(),
        judicial_determination: false,
        judicial_document_id: None,
        priority_order: 0,
        requested_installments: None,
        created_at: T0,
    }
}

fn make_benefit_type(id: &str) -> BenefitTypeRecord {
    BenefitTypeRecord {
        id: id.to_string(),
        code: "ALUGUEL_SOCIAL".to_string(),
        name: "Aluguel Social".to_string(),
        periodicity: Periodicity::Mensal,
        amount: Decimal::new(60000, 2),
        max_duration_months: Some(6),
        default_installments: 6,
    }
}

/// Insert and commit a single grant.
async fn seed_grant<S: GrantStorage>(
    s: &S,
    id: &str,
    request_id: &str,
    status: GrantStatus,
) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    s.insert_grant(&mut snap, make_grant(id, request_id, status))
        .await
        .map_err(|e| format!("insert {id}: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit {id}: {e}"))
}
