//! `rentbill-core`: billing foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod period;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CustomerId, ObligationId, ProductId};
pub use money::Amount;
pub use period::BillingPeriod;
pub use value_object::ValueObject;
