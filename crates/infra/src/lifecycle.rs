//! Payment lifecycle engine.
//!
//! Owns every mutation of payment obligations: creation, operator status
//! changes, mark-as-paid and deletion. Entering `paid` triggers a best-effort
//! rollover that makes sure the product has a pending obligation for the next
//! billing period.
//!
//! ## Rollover
//!
//! ```text
//! set_status / mark_paid
//!   ↓
//! 1. Load obligation (NotFound if missing)
//!   ↓
//! 2. Apply the change in the domain type (Validation before any mutation)
//!   ↓
//! 3. Persist the mutable fields
//!   ↓
//! 4. If the obligation entered `paid`: insert the follow-on obligation
//!      - inserted          → RolloverOutcome::Created
//!      - key already taken → RolloverOutcome::AlreadyExists
//!      - anything else     → RolloverOutcome::Failed (logged, never returned as an error)
//! ```
//!
//! There is no existence pre-check before the follow-on insert: the store's
//! unique (product, billing period) key decides, so concurrent payments for the
//! same product end up with exactly one follow-on and no failing caller.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use rentbill_billing::{
    NewObligation, PaymentObligation, PaymentStatus, RolloverAnchor, StatusTransition,
    StatusUpdate, plan_follow_on,
};
use rentbill_core::{BillingPeriod, CustomerId, DomainError, ObligationId, ProductId};

use crate::clock::{Clock, SystemClock};
use crate::obligation_store::{ObligationFilter, ObligationStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Malformed input; nothing was written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown obligation; nothing was written.
    #[error("not found: {0}")]
    NotFound(String),

    /// The product already has an obligation for this billing period.
    #[error("product {product_id} already has an obligation for {billing_period}")]
    UniquenessViolation {
        product_id: ProductId,
        billing_period: BillingPeriod,
    },

    /// A domain invariant did not hold (including records that fail to decode).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Persistence failed; the operation may be retried.
    #[error("payment store failure: {0}")]
    TransientStore(String),
}

impl From<DomainError> for LifecycleError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => LifecycleError::Validation(msg),
            DomainError::InvariantViolation(msg) => LifecycleError::InvariantViolation(msg),
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Duplicate {
                product_id,
                billing_period,
            } => LifecycleError::UniquenessViolation {
                product_id,
                billing_period,
            },
            StoreError::NotFound(id) => LifecycleError::NotFound(format!("obligation {id}")),
            StoreError::Corrupt(msg) => LifecycleError::InvariantViolation(msg),
            StoreError::Unavailable(msg) => LifecycleError::TransientStore(msg),
        }
    }
}

/// What the rollover step did after a status change.
///
/// Informational only: a rollover never fails the operation that triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloverOutcome {
    /// The obligation did not enter `paid`.
    NotTriggered,
    Created {
        obligation_id: ObligationId,
        billing_period: BillingPeriod,
    },
    /// The follow-on period was already covered.
    AlreadyExists { billing_period: BillingPeriod },
    Failed { reason: String },
}

/// Result of `set_status` / `mark_paid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusOutcome {
    pub obligation: PaymentObligation,
    pub transition: StatusTransition,
    pub rollover: RolloverOutcome,
}

/// Payment lifecycle engine over an obligation store and a clock.
///
/// Shareable across tasks behind `Arc` when `S` and `C` are.
#[derive(Debug, Clone)]
pub struct PaymentLifecycle<S, C = SystemClock> {
    store: S,
    clock: C,
    anchor: RolloverAnchor,
}

impl<S> PaymentLifecycle<S, SystemClock>
where
    S: ObligationStore,
{
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S, C> PaymentLifecycle<S, C>
where
    S: ObligationStore,
    C: Clock,
{
    pub fn with_clock(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            anchor: RolloverAnchor::default(),
        }
    }

    pub fn with_anchor(mut self, anchor: RolloverAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn anchor(&self) -> RolloverAnchor {
        self.anchor
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create an obligation for a (product, billing period) that has none yet.
    ///
    /// Fails with `UniquenessViolation` when the period is already covered; the
    /// existing record is left as it was.
    #[instrument(
        skip(self, new),
        fields(
            product_id = %new.product_id,
            billing_period = %new.billing_period,
            status = %new.state.status()
        ),
        err
    )]
    pub async fn create_obligation(&self, new: NewObligation) -> Result<PaymentObligation, LifecycleError> {
        let obligation = PaymentObligation::create(ObligationId::new(), new, self.clock.now());
        self.store.insert(&obligation).await?;

        info!(
            obligation_id = %obligation.id_typed(),
            amount = obligation.amount().minor_units(),
            "payment obligation created"
        );
        Ok(obligation)
    }

    /// Apply an operator status change.
    ///
    /// `notes` replaces the stored notes. Moving into `paid` from another status
    /// rolls over to the next billing period.
    #[instrument(skip(self, update), fields(obligation_id = %id, status = %update.status), err)]
    pub async fn set_status(
        &self,
        id: ObligationId,
        update: StatusUpdate,
    ) -> Result<StatusOutcome, LifecycleError> {
        let mut obligation = self.load(id).await?;
        let now = self.clock.now();

        let transition = obligation.apply_status(update, now)?;
        self.store.update(&obligation).await?;
        info!(
            previous = %transition.previous,
            current = %transition.current,
            "payment status updated"
        );

        let rollover = if transition.entered_paid() {
            self.ensure_follow_on(&obligation, now).await
        } else {
            RolloverOutcome::NotTriggered
        };

        Ok(StatusOutcome {
            obligation,
            transition,
            rollover,
        })
    }

    /// Mark an obligation paid on `paid_on`, leaving its notes untouched.
    ///
    /// An already-paid obligation is not rewritten, but the rollover is still
    /// ensured.
    #[instrument(skip(self), fields(obligation_id = %id), err)]
    pub async fn mark_paid(
        &self,
        id: ObligationId,
        paid_on: DateTime<Utc>,
    ) -> Result<StatusOutcome, LifecycleError> {
        let mut obligation = self.load(id).await?;
        let now = self.clock.now();

        let transition = obligation.mark_paid(paid_on, now);
        if transition.changed {
            self.store.update(&obligation).await?;
            info!(previous = %transition.previous, "payment marked as paid");
        } else {
            debug!("obligation already paid; record left unchanged");
        }

        let rollover = self.ensure_follow_on(&obligation, now).await;

        Ok(StatusOutcome {
            obligation,
            transition,
            rollover,
        })
    }

    /// Delete an obligation whatever its status. No rollover, no cascade.
    #[instrument(skip(self), fields(obligation_id = %id), err)]
    pub async fn delete_obligation(&self, id: ObligationId) -> Result<(), LifecycleError> {
        if !self.store.delete(id).await? {
            return Err(LifecycleError::NotFound(format!("obligation {id}")));
        }
        info!("payment obligation deleted");
        Ok(())
    }

    pub async fn get_by_id(&self, id: ObligationId) -> Result<Option<PaymentObligation>, LifecycleError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<PaymentObligation>, LifecycleError> {
        Ok(self.store.list(&ObligationFilter::all().product(product_id)).await?)
    }

    pub async fn list_by_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<PaymentObligation>, LifecycleError> {
        Ok(self.store.list(&ObligationFilter::all().customer(customer_id)).await?)
    }

    pub async fn list_by_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<PaymentObligation>, LifecycleError> {
        Ok(self.store.list(&ObligationFilter::all().status(status)).await?)
    }

    async fn load(&self, id: ObligationId) -> Result<PaymentObligation, LifecycleError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("obligation {id}")))
    }

    /// Insert the pending follow-on of `paid`. Never fails the caller.
    async fn ensure_follow_on(&self, paid: &PaymentObligation, now: DateTime<Utc>) -> RolloverOutcome {
        let plan = match plan_follow_on(paid, self.anchor, now) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(obligation_id = %paid.id_typed(), error = %err, "rollover skipped");
                return RolloverOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };

        let follow_on = PaymentObligation::create(ObligationId::new(), plan, now);
        let billing_period = follow_on.billing_period();

        match self.store.insert(&follow_on).await {
            Ok(()) => {
                info!(
                    obligation_id = %follow_on.id_typed(),
                    product_id = %follow_on.product_id(),
                    billing_period = %billing_period,
                    "follow-on obligation created"
                );
                RolloverOutcome::Created {
                    obligation_id: follow_on.id_typed(),
                    billing_period,
                }
            }
            Err(StoreError::Duplicate { .. }) => {
                debug!(billing_period = %billing_period, "follow-on obligation already exists");
                RolloverOutcome::AlreadyExists { billing_period }
            }
            Err(err) => {
                warn!(
                    obligation_id = %paid.id_typed(),
                    billing_period = %billing_period,
                    error = %err,
                    "rollover failed; payment update kept"
                );
                RolloverOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use rentbill_core::Amount;

    use crate::clock::FixedClock;
    use crate::obligation_store::InMemoryObligationStore;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    fn period(s: &str) -> BillingPeriod {
        s.parse().unwrap()
    }

    fn engine_at(now: DateTime<Utc>) -> PaymentLifecycle<Arc<InMemoryObligationStore>, FixedClock> {
        PaymentLifecycle::with_clock(Arc::new(InMemoryObligationStore::new()), FixedClock(now))
    }

    fn new_pending(product_id: ProductId, billing_period: &str, amount: u64) -> NewObligation {
        NewObligation::pending(
            product_id,
            CustomerId::new(),
            period(billing_period),
            Amount::new(amount).unwrap(),
        )
    }

    /// Store whose inserts can be switched to fail, for exercising rollover failures.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryObligationStore,
        fail_inserts: AtomicBool,
    }

    #[async_trait]
    impl ObligationStore for FlakyStore {
        async fn insert(&self, obligation: &PaymentObligation) -> Result<(), StoreError> {
            if self.fail_inserts.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
            self.inner.insert(obligation).await
        }

        async fn get(&self, id: ObligationId) -> Result<Option<PaymentObligation>, StoreError> {
            self.inner.get(id).await
        }

        async fn find_by_period(
            &self,
            product_id: ProductId,
            billing_period: BillingPeriod,
        ) -> Result<Option<PaymentObligation>, StoreError> {
            self.inner.find_by_period(product_id, billing_period).await
        }

        async fn list(&self, filter: &ObligationFilter) -> Result<Vec<PaymentObligation>, StoreError> {
            self.inner.list(filter).await
        }

        async fn update(&self, obligation: &PaymentObligation) -> Result<(), StoreError> {
            self.inner.update(obligation).await
        }

        async fn delete(&self, id: ObligationId) -> Result<bool, StoreError> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn late_payment_rolls_over_from_current_month() {
        let engine = engine_at(at(2024, 5, 20));
        let product = ProductId::new();
        let march = engine
            .create_obligation(new_pending(product, "2024-03", 50_000))
            .await
            .unwrap();

        let outcome = engine
            .set_status(march.id_typed(), StatusUpdate::to(PaymentStatus::Paid).paid_on(at(2024, 5, 20)))
            .await
            .unwrap();

        assert_eq!(outcome.obligation.status(), PaymentStatus::Paid);
        assert!(matches!(
            outcome.rollover,
            RolloverOutcome::Created { billing_period, .. } if billing_period == period("2024-06")
        ));

        let follow_on = engine
            .store()
            .find_by_period(product, period("2024-06"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(follow_on.status(), PaymentStatus::Pending);
        assert_eq!(follow_on.amount().minor_units(), 50_000);
        assert_eq!(follow_on.customer_id(), march.customer_id());
        assert_eq!(follow_on.notes(), None);
        assert!(engine.store().find_by_period(product, period("2024-04")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn following_period_anchor_rolls_over_from_paid_period() {
        let engine = engine_at(at(2024, 5, 20)).with_anchor(RolloverAnchor::FollowingPeriod);
        let product = ProductId::new();
        let march = engine
            .create_obligation(new_pending(product, "2024-03", 50_000))
            .await
            .unwrap();

        let outcome = engine.mark_paid(march.id_typed(), at(2024, 5, 20)).await.unwrap();
        assert!(matches!(
            outcome.rollover,
            RolloverOutcome::Created { billing_period, .. } if billing_period == period("2024-04")
        ));
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected_and_existing_kept() {
        let engine = engine_at(at(2024, 3, 1));
        let product = ProductId::new();
        let original = engine
            .create_obligation(new_pending(product, "2024-03", 10_000))
            .await
            .unwrap();

        let err = engine
            .create_obligation(new_pending(product, "2024-03", 99_000))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            LifecycleError::UniquenessViolation {
                product_id: product,
                billing_period: period("2024-03"),
            }
        );
        let stored = engine.get_by_id(original.id_typed()).await.unwrap().unwrap();
        assert_eq!(stored, original);
        assert_eq!(engine.list_by_product(product).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn overdue_does_not_roll_over() {
        let engine = engine_at(at(2024, 3, 20));
        let product = ProductId::new();
        let obligation = engine
            .create_obligation(new_pending(product, "2024-03", 10_000))
            .await
            .unwrap();

        let outcome = engine
            .set_status(obligation.id_typed(), StatusUpdate::to(PaymentStatus::Overdue))
            .await
            .unwrap();

        assert_eq!(outcome.rollover, RolloverOutcome::NotTriggered);
        assert_eq!(outcome.obligation.status(), PaymentStatus::Overdue);
        assert_eq!(engine.list_by_product(product).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repeated_payments_create_a_single_follow_on() {
        let engine = engine_at(at(2024, 3, 10));
        let product = ProductId::new();
        let obligation = engine
            .create_obligation(new_pending(product, "2024-03", 10_000))
            .await
            .unwrap();

        let first = engine.mark_paid(obligation.id_typed(), at(2024, 3, 10)).await.unwrap();
        assert!(matches!(first.rollover, RolloverOutcome::Created { .. }));

        for _ in 0..5 {
            let again = engine.mark_paid(obligation.id_typed(), at(2024, 3, 12)).await.unwrap();
            assert!(!again.transition.changed);
            assert_eq!(again.obligation.paid_on(), Some(at(2024, 3, 10)));
            assert_eq!(
                again.rollover,
                RolloverOutcome::AlreadyExists {
                    billing_period: period("2024-04")
                }
            );
        }

        assert_eq!(engine.list_by_product(product).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn paid_to_paid_status_update_does_not_roll_over() {
        let engine = engine_at(at(2024, 3, 10));
        let obligation = engine
            .create_obligation(new_pending(ProductId::new(), "2024-03", 10_000))
            .await
            .unwrap();
        engine.mark_paid(obligation.id_typed(), at(2024, 3, 10)).await.unwrap();

        let outcome = engine
            .set_status(
                obligation.id_typed(),
                StatusUpdate::to(PaymentStatus::Paid)
                    .paid_on(at(2024, 3, 11))
                    .notes("corrected date"),
            )
            .await
            .unwrap();

        assert_eq!(outcome.rollover, RolloverOutcome::NotTriggered);
        assert_eq!(outcome.obligation.paid_on(), Some(at(2024, 3, 11)));
        assert_eq!(outcome.obligation.notes(), Some("corrected date"));
    }

    #[tokio::test]
    async fn moving_back_to_pending_keeps_follow_on() {
        let engine = engine_at(at(2024, 3, 10));
        let product = ProductId::new();
        let obligation = engine
            .create_obligation(new_pending(product, "2024-03", 10_000))
            .await
            .unwrap();
        engine.mark_paid(obligation.id_typed(), at(2024, 3, 10)).await.unwrap();

        let outcome = engine
            .set_status(obligation.id_typed(), StatusUpdate::to(PaymentStatus::Pending))
            .await
            .unwrap();

        assert_eq!(outcome.obligation.paid_on(), None);
        assert!(
            engine
                .store()
                .find_by_period(product, period("2024-04"))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn set_status_overwrites_and_clears_notes() {
        let engine = engine_at(at(2024, 3, 10));
        let obligation = engine
            .create_obligation(new_pending(ProductId::new(), "2024-03", 10_000).with_notes("first"))
            .await
            .unwrap();

        let outcome = engine
            .set_status(obligation.id_typed(), StatusUpdate::to(PaymentStatus::Overdue))
            .await
            .unwrap();
        assert_eq!(outcome.obligation.notes(), None);

        let stored = engine.get_by_id(obligation.id_typed()).await.unwrap().unwrap();
        assert_eq!(stored.notes(), None);
        assert_eq!(stored.updated_at(), at(2024, 3, 10));
    }

    #[tokio::test]
    async fn mark_paid_leaves_notes_untouched() {
        let engine = engine_at(at(2024, 3, 10));
        let obligation = engine
            .create_obligation(new_pending(ProductId::new(), "2024-03", 10_000).with_notes("bank transfer"))
            .await
            .unwrap();

        let outcome = engine.mark_paid(obligation.id_typed(), at(2024, 3, 9)).await.unwrap();
        assert_eq!(outcome.obligation.notes(), Some("bank transfer"));
        assert_eq!(outcome.obligation.paid_on(), Some(at(2024, 3, 9)));
    }

    #[tokio::test]
    async fn paid_without_date_is_rejected_without_writing() {
        let engine = engine_at(at(2024, 3, 10));
        let product = ProductId::new();
        let obligation = engine
            .create_obligation(new_pending(product, "2024-03", 10_000))
            .await
            .unwrap();

        let err = engine
            .set_status(obligation.id_typed(), StatusUpdate::to(PaymentStatus::Paid))
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Validation(_)));
        assert_eq!(engine.get_by_id(obligation.id_typed()).await.unwrap(), Some(obligation));
        assert_eq!(engine.list_by_product(product).await.unwrap().len(), 1);
    }

    #[test]
    fn oversized_amount_is_a_validation_error() {
        let err: LifecycleError = Amount::new(u64::MAX).unwrap_err().into();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let engine = engine_at(at(2024, 3, 10));
        let ghost = ObligationId::new();

        assert!(matches!(
            engine.set_status(ghost, StatusUpdate::to(PaymentStatus::Overdue)).await,
            Err(LifecycleError::NotFound(_))
        ));
        assert!(matches!(
            engine.mark_paid(ghost, at(2024, 3, 10)).await,
            Err(LifecycleError::NotFound(_))
        ));
        assert!(matches!(
            engine.delete_obligation(ghost).await,
            Err(LifecycleError::NotFound(_))
        ));
        assert_eq!(engine.get_by_id(ghost).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_paid_obligation_without_cascade() {
        let engine = engine_at(at(2024, 3, 10));
        let product = ProductId::new();
        let obligation = engine
            .create_obligation(new_pending(product, "2024-03", 10_000))
            .await
            .unwrap();
        engine.mark_paid(obligation.id_typed(), at(2024, 3, 10)).await.unwrap();

        engine.delete_obligation(obligation.id_typed()).await.unwrap();

        let remaining = engine.list_by_product(product).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].billing_period(), period("2024-04"));
    }

    #[tokio::test]
    async fn rollover_failure_keeps_primary_update() {
        let store = Arc::new(FlakyStore::default());
        let engine = PaymentLifecycle::with_clock(store.clone(), FixedClock(at(2024, 3, 10)));
        let product = ProductId::new();
        let obligation = engine
            .create_obligation(new_pending(product, "2024-03", 10_000))
            .await
            .unwrap();

        store.fail_inserts.store(true, Ordering::SeqCst);
        let outcome = engine
            .set_status(obligation.id_typed(), StatusUpdate::to(PaymentStatus::Paid).paid_on(at(2024, 3, 10)))
            .await
            .unwrap();

        assert!(matches!(outcome.rollover, RolloverOutcome::Failed { .. }));
        let stored = engine.get_by_id(obligation.id_typed()).await.unwrap().unwrap();
        assert_eq!(stored.status(), PaymentStatus::Paid);
        assert_eq!(engine.list_by_product(product).await.unwrap().len(), 1);

        // A later retry fills the gap.
        store.fail_inserts.store(false, Ordering::SeqCst);
        let retry = engine.mark_paid(obligation.id_typed(), at(2024, 3, 10)).await.unwrap();
        assert!(matches!(retry.rollover, RolloverOutcome::Created { .. }));
    }

    #[tokio::test]
    async fn primary_store_failure_is_surfaced() {
        let store = Arc::new(FlakyStore::default());
        let engine = PaymentLifecycle::with_clock(store.clone(), FixedClock(at(2024, 3, 10)));

        store.fail_inserts.store(true, Ordering::SeqCst);
        let err = engine
            .create_obligation(new_pending(ProductId::new(), "2024-03", 10_000))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::TransientStore(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_payments_produce_one_follow_on() {
        let engine = Arc::new(engine_at(at(2024, 5, 20)));
        let product = ProductId::new();
        let march = engine
            .create_obligation(new_pending(product, "2024-03", 50_000))
            .await
            .unwrap();
        let april = engine
            .create_obligation(new_pending(product, "2024-04", 50_000))
            .await
            .unwrap();

        let handles: Vec<_> = [march.id_typed(), april.id_typed()]
            .into_iter()
            .map(|id| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.mark_paid(id, at(2024, 5, 20)).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            match outcome.rollover {
                RolloverOutcome::Created { .. } => created += 1,
                RolloverOutcome::AlreadyExists { .. } => {}
                other => panic!("unexpected rollover outcome: {other:?}"),
            }
        }
        assert_eq!(created, 1);

        let june = engine
            .store()
            .list(&ObligationFilter::all().product(product).status(PaymentStatus::Pending))
            .await
            .unwrap();
        assert_eq!(june.len(), 1);
        assert_eq!(june[0].billing_period(), period("2024-06"));
    }

    #[tokio::test]
    async fn listings_by_customer_and_status() {
        let engine = engine_at(at(2024, 3, 10));
        let customer = CustomerId::new();
        let mut first = new_pending(ProductId::new(), "2024-02", 10_000);
        first.customer_id = customer;
        let mut second = new_pending(ProductId::new(), "2024-03", 20_000);
        second.customer_id = customer;

        let first = engine.create_obligation(first).await.unwrap();
        engine.create_obligation(second).await.unwrap();
        engine
            .set_status(first.id_typed(), StatusUpdate::to(PaymentStatus::Overdue))
            .await
            .unwrap();

        let by_customer = engine.list_by_customer(customer).await.unwrap();
        let periods: Vec<String> = by_customer.iter().map(|o| o.billing_period().to_string()).collect();
        assert_eq!(periods, vec!["2024-03-01", "2024-02-01"]);

        let overdue = engine.list_by_status(PaymentStatus::Overdue).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id_typed(), first.id_typed());
    }
}
