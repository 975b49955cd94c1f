//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. `Amount` and
/// `BillingPeriod` are value objects: two amounts of 50000 minor units are the
/// same amount, two `2024-03` periods are the same month.
///
/// To "modify" a value object, create a new one (e.g. `BillingPeriod::next`).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
