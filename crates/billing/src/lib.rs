//! Billing domain module.
//!
//! This crate contains the business rules for monthly payment obligations:
//! the status state machine, the rollover target rules and subscription
//! amortization. Deterministic domain logic only (no IO, no storage, no clock).

pub mod amortization;
pub mod obligation;
pub mod rollover;

pub use amortization::{AmortizedEntry, PackageStatus, SubscriptionPackage, expand, synthetic_paid_on};
pub use obligation::{
    NewObligation, ObligationRecord, PaymentObligation, PaymentState, PaymentStatus,
    StatusTransition, StatusUpdate,
};
pub use rollover::{RolloverAnchor, plan_follow_on, rollover_period};
