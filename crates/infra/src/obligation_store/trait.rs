use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use rentbill_billing::{PaymentObligation, PaymentStatus};
use rentbill_core::{BillingPeriod, CustomerId, ObligationId, ProductId};

/// Payment record store operation error.
///
/// These are **store errors** (uniqueness, lookup, storage availability) as
/// opposed to domain errors (validation, invariants).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The (product, billing period) key is already taken.
    #[error("obligation already exists for product {product_id} in {billing_period}")]
    Duplicate {
        product_id: ProductId,
        billing_period: BillingPeriod,
    },

    #[error("obligation not found: {0}")]
    NotFound(ObligationId),

    /// A stored row could not be decoded into a valid obligation.
    #[error("corrupt payment record: {0}")]
    Corrupt(String),

    /// The backing storage failed (connectivity, timeout, poisoned lock, ...).
    #[error("payment store unavailable: {0}")]
    Unavailable(String),
}

/// Listing criteria. Every set criterion must match; an empty `statuses`
/// matches any status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObligationFilter {
    pub product_id: Option<ProductId>,
    pub customer_id: Option<CustomerId>,
    pub statuses: Vec<PaymentStatus>,
}

impl ObligationFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn status(mut self, status: PaymentStatus) -> Self {
        if !self.statuses.contains(&status) {
            self.statuses.push(status);
        }
        self
    }

    pub fn unpaid(self) -> Self {
        PaymentStatus::UNPAID.into_iter().fold(self, Self::status)
    }

    pub fn matches(&self, obligation: &PaymentObligation) -> bool {
        self.product_id.is_none_or(|p| p == obligation.product_id())
            && self.customer_id.is_none_or(|c| c == obligation.customer_id())
            && (self.statuses.is_empty() || self.statuses.contains(&obligation.status()))
    }
}

/// Persistent table of payment obligations, unique per (product, billing period).
///
/// ## Implementation Requirements
///
/// - `insert` is atomic and enforces the (product, billing period) uniqueness
///   itself. A conflicting insert fails with `StoreError::Duplicate` and leaves
///   the existing record untouched. Callers never pre-check.
/// - `update` writes only the mutable columns (status, payment date, notes,
///   `updated_at`); the billing key and amount are never rewritten.
/// - Listings are ordered by billing period, newest first.
#[async_trait]
pub trait ObligationStore: Send + Sync {
    async fn insert(&self, obligation: &PaymentObligation) -> Result<(), StoreError>;

    async fn get(&self, id: ObligationId) -> Result<Option<PaymentObligation>, StoreError>;

    async fn find_by_period(
        &self,
        product_id: ProductId,
        billing_period: BillingPeriod,
    ) -> Result<Option<PaymentObligation>, StoreError>;

    async fn list(&self, filter: &ObligationFilter) -> Result<Vec<PaymentObligation>, StoreError>;

    /// Persist the mutable fields of `obligation`. Fails with `NotFound` when the
    /// record no longer exists.
    async fn update(&self, obligation: &PaymentObligation) -> Result<(), StoreError>;

    /// Remove a record. Returns whether a record was removed.
    async fn delete(&self, id: ObligationId) -> Result<bool, StoreError>;
}

#[async_trait]
impl<S> ObligationStore for Arc<S>
where
    S: ObligationStore + ?Sized,
{
    async fn insert(&self, obligation: &PaymentObligation) -> Result<(), StoreError> {
        (**self).insert(obligation).await
    }

    async fn get(&self, id: ObligationId) -> Result<Option<PaymentObligation>, StoreError> {
        (**self).get(id).await
    }

    async fn find_by_period(
        &self,
        product_id: ProductId,
        billing_period: BillingPeriod,
    ) -> Result<Option<PaymentObligation>, StoreError> {
        (**self).find_by_period(product_id, billing_period).await
    }

    async fn list(&self, filter: &ObligationFilter) -> Result<Vec<PaymentObligation>, StoreError> {
        (**self).list(filter).await
    }

    async fn update(&self, obligation: &PaymentObligation) -> Result<(), StoreError> {
        (**self).update(obligation).await
    }

    async fn delete(&self, id: ObligationId) -> Result<bool, StoreError> {
        (**self).delete(id).await
    }
}
