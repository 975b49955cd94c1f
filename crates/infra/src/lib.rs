//! Infrastructure layer: payment stores, the lifecycle engine, configuration
//! and read models.

pub mod clock;
pub mod config;
pub mod db;
pub mod lifecycle;
pub mod obligation_store;
pub mod packages;
pub mod read_model;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::BillingConfig;
pub use lifecycle::{LifecycleError, PaymentLifecycle, RolloverOutcome, StatusOutcome};
pub use obligation_store::{
    InMemoryObligationStore, ObligationFilter, ObligationStore, PostgresObligationStore, StoreError,
};
pub use packages::{PackageBilling, PackageSchedule};
