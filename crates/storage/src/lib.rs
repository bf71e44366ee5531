pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{MemorySnapshot, MemoryStorage};
pub use record::{
    BenefitTypeRecord, GrantFilter, GrantPage, GrantRecord, HistoryKind, HistoryRecord,
    PaymentFilter, PaymentPage, PaymentRecord, RequestRecord,
};
pub use traits::GrantStorage;
