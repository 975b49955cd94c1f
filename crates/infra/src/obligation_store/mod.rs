//! Payment record store boundary.
//!
//! One row per (product, billing period). The store's atomic, uniqueness-enforcing
//! insert is the only concurrency guard the billing engine relies on.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryObligationStore;
pub use postgres::PostgresObligationStore;
pub use r#trait::{ObligationFilter, ObligationStore, StoreError};
