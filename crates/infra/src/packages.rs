//! Persisting multi-month subscription packages as monthly obligations.

use tracing::{info, instrument, warn};

use rentbill_billing::{PaymentObligation, SubscriptionPackage};
use rentbill_core::BillingPeriod;

use crate::clock::Clock;
use crate::lifecycle::{LifecycleError, PaymentLifecycle};
use crate::obligation_store::ObligationStore;

/// Outcome of persisting a package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageSchedule {
    pub created: Vec<PaymentObligation>,
    /// Periods that already had an obligation for the product.
    pub skipped: Vec<BillingPeriod>,
}

/// Creates one obligation per month of a package through the lifecycle engine.
pub struct PackageBilling<'a, S, C> {
    lifecycle: &'a PaymentLifecycle<S, C>,
}

impl<'a, S, C> PackageBilling<'a, S, C>
where
    S: ObligationStore,
    C: Clock,
{
    pub fn new(lifecycle: &'a PaymentLifecycle<S, C>) -> Self {
        Self { lifecycle }
    }

    /// Expand `package` and create every monthly obligation.
    ///
    /// Months already covered for the product are skipped; any other failure
    /// stops the run and is returned (obligations created so far are kept).
    #[instrument(
        skip(self, package),
        fields(
            product_id = %package.product_id,
            customer_id = %package.customer_id,
            months = package.months
        ),
        err
    )]
    pub async fn create_package_obligations(
        &self,
        package: &SubscriptionPackage,
    ) -> Result<PackageSchedule, LifecycleError> {
        let mut schedule = PackageSchedule::default();

        for obligation in package.schedule()? {
            let billing_period = obligation.billing_period;
            match self.lifecycle.create_obligation(obligation).await {
                Ok(created) => schedule.created.push(created),
                Err(LifecycleError::UniquenessViolation { .. }) => {
                    warn!(billing_period = %billing_period, "package month already billed; skipped");
                    schedule.skipped.push(billing_period);
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            created = schedule.created.len(),
            skipped = schedule.skipped.len(),
            "package obligations created"
        );
        Ok(schedule)
    }
}
