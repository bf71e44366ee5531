//! Benefit grant lifecycle.
//!
//! [`GrantLifecycleManager`] drives a grant through its statuses on top of
//! any [`pgben_storage::GrantStorage`] backend. Payment generation, history
//! recording and the reason catalog are separate seams so deployments can
//! swap them independently.

pub mod calendar;
mod error;
pub mod history;
mod manager;
pub mod payments;
mod reasons;

pub use error::LifecycleError;
pub use history::{HistoryRecorder, StorageHistoryRecorder};
pub use manager::{GrantLifecycleManager, PaymentUpdate, AUTOMATIC_CLOSURE_REASON};
pub use payments::{PaymentGenerator, StoragePaymentGenerator};
pub use reasons::ReasonCatalog;
