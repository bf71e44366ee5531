use pgben_core::{GrantStatus, PaymentStatus, Periodicity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A benefit grant ("concessão") as stored in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub id: String,
    pub request_id: String,
    pub status: GrantStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub end_date: Option<OffsetDateTime>,
    pub priority_order: i32,
    pub judicial_determination: bool,
    pub judicial_document_id: Option<String>,
    pub suspension_reason: Option<String>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub suspension_review_date: Option<OffsetDateTime>,
    pub block_reason: Option<String>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub blocked_at: Option<OffsetDateTime>,
    pub unblock_reason: Option<String>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub unblocked_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub closure_date: Option<OffsetDateTime>,
    pub closure_reason: Option<String>,
    /// OCC version. Starts at 0 on insert, bumped by every update.
    pub version: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl GrantRecord {
    /// A fresh grant at version 0 with every optional field empty.
    pub fn new(id: &str, request_id: &str, status: GrantStatus, now: OffsetDateTime) -> Self {
        GrantRecord {
            id: id.to_string(),
            request_id: request_id.to_string(),
            status,
            start_date: now,
            end_date: None,
            priority_order: 0,
            judicial_determination: false,
            judicial_document_id: None,
            suspension_reason: None,
            suspension_review_date: None,
            block_reason: None,
            blocked_at: None,
            unblock_reason: None,
            unblocked_at: None,
            closure_date: None,
            closure_reason: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Creation,
    Transition,
    Prorogation,
}

/// An immutable record of one grant status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub grant_id: String,
    /// None for the entry written when the grant is created.
    pub previous_status: Option<GrantStatus>,
    pub new_status: GrantStatus,
    pub actor_id: String,
    pub reason: Option<String>,
    pub kind: HistoryKind,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

/// One installment of a grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub grant_id: String,
    /// 1-based installment number.
    pub installment: u32,
    pub total_installments: u32,
    pub amount: Decimal,
    pub status: PaymentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub due_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A citizen's benefit request ("solicitação"). Read-only to the lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: String,
    pub protocol: String,
    pub beneficiary_id: String,
    pub benefit_type_id: String,
    #[serde(default)]
    pub judicial_determination: bool,
    #[serde(default)]
    pub judicial_document_id: Option<String>,
    #[serde(default)]
    pub priority_order: i32,
    /// Overrides the benefit type's default installment count when set.
    #[serde(default)]
    pub requested_installments: Option<u32>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A benefit type and the rules that shape its grants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenefitTypeRecord {
    pub id: String,
    pub code: String,
    pub name: String,
    pub periodicity: Periodicity,
    pub amount: Decimal,
    #[serde(default)]
    pub max_duration_months: Option<u32>,
    pub default_installments: u32,
}

/// Filter for grant listings. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrantFilter {
    pub status: Option<GrantStatus>,
    pub request_id: Option<String>,
    pub judicial_determination: Option<bool>,
    pub offset: usize,
    /// Maximum number of items (0 = no limit).
    pub limit: usize,
}

/// One page of a grant listing plus the unpaged match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantPage {
    pub items: Vec<GrantRecord>,
    pub total: usize,
}

/// Filter for payment listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentFilter {
    pub grant_id: Option<String>,
    pub status: Option<PaymentStatus>,
}

/// Payments matching a filter, in installment order, with their count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPage {
    pub items: Vec<PaymentRecord>,
    pub total: usize,
}
