//! pgben-core: vocabulary of the benefit-grant lifecycle.
//!
//! Everything here is pure data and lookup tables: grant and payment
//! statuses, the allowed-transition table, benefit periodicity and the
//! default reason catalog. Persistence and orchestration live in
//! `pgben-storage` and `pgben-lifecycle`.

pub mod benefit;
pub mod error;
pub mod payment;
pub mod reason;
pub mod status;

pub use benefit::{Periodicity, MAX_INSTALLMENTS};
pub use error::ParseError;
pub use payment::PaymentStatus;
pub use reason::{default_catalog, ReasonEntry, ReasonOperation};
pub use status::{transition_table_json, GrantStatus};

/// Actor id attributed to transitions the system performs on its own.
pub const SYSTEM_ACTOR: &str = "SYSTEM";
