//! Payment listings joined with product and customer metadata.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use rentbill_billing::{PaymentObligation, PaymentStatus};
use rentbill_core::{Amount, BillingPeriod, CustomerId, ObligationId, ProductId};

use super::directory::{CustomerSummary, ProductSummary, ReferenceDirectory};
use crate::obligation_store::{ObligationFilter, ObligationStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Reference metadata could not be read.
    #[error("reference directory failure: {0}")]
    Directory(String),
}

/// One payment row as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentView {
    pub id: ObligationId,
    pub product_id: ProductId,
    pub customer_id: CustomerId,
    pub billing_period: BillingPeriod,
    pub amount: Amount,
    pub status: PaymentStatus,
    pub paid_on: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub msn: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
}

impl PaymentView {
    pub fn new(obligation: &PaymentObligation, product: ProductSummary, customer: CustomerSummary) -> Self {
        Self {
            id: obligation.id_typed(),
            product_id: obligation.product_id(),
            customer_id: obligation.customer_id(),
            billing_period: obligation.billing_period(),
            amount: obligation.amount(),
            status: obligation.status(),
            paid_on: obligation.paid_on(),
            notes: obligation.notes().map(str::to_string),
            created_at: obligation.created_at(),
            updated_at: obligation.updated_at(),
            msn: product.msn,
            customer_name: customer.name,
            customer_email: customer.email,
        }
    }
}

/// Amount sums per status, in minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PaymentTotals {
    pub count: u64,
    pub paid: u64,
    pub pending: u64,
    pub overdue: u64,
}

impl PaymentTotals {
    pub fn add(&mut self, status: PaymentStatus, amount: u64) {
        self.count += 1;
        let bucket = match status {
            PaymentStatus::Paid => &mut self.paid,
            PaymentStatus::Pending => &mut self.pending,
            PaymentStatus::Overdue => &mut self.overdue,
        };
        *bucket = bucket.saturating_add(amount);
    }

    /// Money still expected from customers.
    pub fn outstanding(&self) -> u64 {
        self.pending.saturating_add(self.overdue)
    }
}

impl<'a> FromIterator<&'a PaymentView> for PaymentTotals {
    fn from_iter<I: IntoIterator<Item = &'a PaymentView>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), |mut totals, view| {
            totals.add(view.status, view.amount.minor_units());
            totals
        })
    }
}

/// Read-only payment queries.
///
/// Payments whose product or customer is unknown are left out of every result.
/// Listings are ordered by billing period, newest first.
#[async_trait]
pub trait PaymentQueries: Send + Sync {
    async fn list(&self, filter: &ObligationFilter) -> Result<Vec<PaymentView>, QueryError>;

    async fn get(&self, id: ObligationId) -> Result<Option<PaymentView>, QueryError>;

    async fn by_customer(&self, customer_id: CustomerId) -> Result<Vec<PaymentView>, QueryError> {
        self.list(&ObligationFilter::all().customer(customer_id)).await
    }

    async fn by_product(&self, product_id: ProductId) -> Result<Vec<PaymentView>, QueryError> {
        self.list(&ObligationFilter::all().product(product_id)).await
    }

    /// Pending and overdue payments.
    async fn unpaid(&self) -> Result<Vec<PaymentView>, QueryError> {
        self.list(&ObligationFilter::all().unpaid()).await
    }

    async fn totals(&self, filter: &ObligationFilter) -> Result<PaymentTotals, QueryError> {
        Ok(self.list(filter).await?.iter().collect())
    }
}

/// Query facade composing an obligation store with a reference directory.
#[derive(Debug, Clone)]
pub struct JoinedPaymentQueries<S, D> {
    store: S,
    directory: D,
}

impl<S, D> JoinedPaymentQueries<S, D>
where
    S: ObligationStore,
    D: ReferenceDirectory,
{
    pub fn new(store: S, directory: D) -> Self {
        Self { store, directory }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    fn join(&self, obligation: &PaymentObligation) -> Result<Option<PaymentView>, QueryError> {
        let Some(product) = self.directory.product(obligation.product_id())? else {
            debug!(obligation_id = %obligation.id_typed(), product_id = %obligation.product_id(), "unknown product; payment omitted");
            return Ok(None);
        };
        let Some(customer) = self.directory.customer(obligation.customer_id())? else {
            debug!(obligation_id = %obligation.id_typed(), customer_id = %obligation.customer_id(), "unknown customer; payment omitted");
            return Ok(None);
        };
        Ok(Some(PaymentView::new(obligation, product, customer)))
    }
}

#[async_trait]
impl<S, D> PaymentQueries for JoinedPaymentQueries<S, D>
where
    S: ObligationStore,
    D: ReferenceDirectory,
{
    async fn list(&self, filter: &ObligationFilter) -> Result<Vec<PaymentView>, QueryError> {
        let obligations = self.store.list(filter).await?;

        let mut views = Vec::with_capacity(obligations.len());
        for obligation in &obligations {
            if let Some(view) = self.join(obligation)? {
                views.push(view);
            }
        }
        Ok(views)
    }

    async fn get(&self, id: ObligationId) -> Result<Option<PaymentView>, QueryError> {
        match self.store.get(id).await? {
            Some(obligation) => self.join(&obligation),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::TimeZone;
    use rentbill_billing::{NewObligation, StatusUpdate};

    use crate::obligation_store::InMemoryObligationStore;
    use crate::read_model::directory::InMemoryDirectory;

    struct Fixture {
        store: Arc<InMemoryObligationStore>,
        directory: Arc<InMemoryDirectory>,
        queries: JoinedPaymentQueries<Arc<InMemoryObligationStore>, Arc<InMemoryDirectory>>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryObligationStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let queries = JoinedPaymentQueries::new(store.clone(), directory.clone());
        Fixture {
            store,
            directory,
            queries,
        }
    }

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    fn register(directory: &InMemoryDirectory, product_id: ProductId, customer_id: CustomerId) {
        directory
            .upsert_product(product_id, ProductSummary { msn: Some(format!("MSN-{product_id}")) })
            .unwrap();
        directory
            .upsert_customer(
                customer_id,
                CustomerSummary {
                    name: "Tran Thi B".into(),
                    email: "b@example.com".into(),
                },
            )
            .unwrap();
    }

    async fn seed(
        store: &InMemoryObligationStore,
        product_id: ProductId,
        customer_id: CustomerId,
        period: &str,
        amount: u64,
    ) -> PaymentObligation {
        let obligation = PaymentObligation::create(
            ObligationId::new(),
            NewObligation::pending(product_id, customer_id, period.parse().unwrap(), Amount::new(amount).unwrap()),
            at(1),
        );
        store.insert(&obligation).await.unwrap();
        obligation
    }

    #[tokio::test]
    async fn views_carry_product_and_customer_metadata() {
        let f = fixture();
        let (product, customer) = (ProductId::new(), CustomerId::new());
        register(&f.directory, product, customer);
        let obligation = seed(&f.store, product, customer, "2024-03", 12_000).await;

        let view = f.queries.get(obligation.id_typed()).await.unwrap().unwrap();
        assert_eq!(view.msn, Some(format!("MSN-{product}")));
        assert_eq!(view.customer_email, "b@example.com");
        assert_eq!(view.amount.minor_units(), 12_000);
        assert_eq!(view.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn products_without_serial_are_still_listed() {
        let f = fixture();
        let (with_serial, without_serial, customer) = (ProductId::new(), ProductId::new(), CustomerId::new());
        register(&f.directory, with_serial, customer);
        f.directory
            .upsert_product(without_serial, ProductSummary { msn: None })
            .unwrap();
        seed(&f.store, with_serial, customer, "2024-03", 1_000).await;
        let bare = seed(&f.store, without_serial, customer, "2024-03", 2_000).await;

        let views = f.queries.list(&ObligationFilter::all()).await.unwrap();
        assert_eq!(views.len(), 2);

        let view = f.queries.get(bare.id_typed()).await.unwrap().unwrap();
        assert_eq!(view.msn, None);
        assert!(serde_json::to_value(&view).unwrap()["msn"].is_null());
    }

    #[tokio::test]
    async fn unknown_references_are_omitted() {
        let f = fixture();
        let (product, customer) = (ProductId::new(), CustomerId::new());
        register(&f.directory, product, customer);
        seed(&f.store, product, customer, "2024-03", 1_000).await;
        let orphan = seed(&f.store, ProductId::new(), customer, "2024-03", 1_000).await;

        assert_eq!(f.queries.list(&ObligationFilter::all()).await.unwrap().len(), 1);
        assert_eq!(f.queries.get(orphan.id_typed()).await.unwrap(), None);

        f.directory.remove_customer(customer).unwrap();
        assert!(f.queries.by_customer(customer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unpaid_and_totals_follow_statuses() {
        let f = fixture();
        let (product, customer) = (ProductId::new(), CustomerId::new());
        register(&f.directory, product, customer);

        let mut january = seed(&f.store, product, customer, "2024-01", 10_000).await;
        let mut february = seed(&f.store, product, customer, "2024-02", 20_000).await;
        seed(&f.store, product, customer, "2024-03", 30_000).await;

        january
            .apply_status(StatusUpdate::to(PaymentStatus::Paid).paid_on(at(5)), at(5))
            .unwrap();
        f.store.update(&january).await.unwrap();
        february
            .apply_status(StatusUpdate::to(PaymentStatus::Overdue), at(6))
            .unwrap();
        f.store.update(&february).await.unwrap();

        let unpaid = f.queries.unpaid().await.unwrap();
        let periods: Vec<String> = unpaid.iter().map(|v| v.billing_period.to_string()).collect();
        assert_eq!(periods, vec!["2024-03-01", "2024-02-01"]);

        let totals = f.queries.totals(&ObligationFilter::all().product(product)).await.unwrap();
        assert_eq!(
            totals,
            PaymentTotals {
                count: 3,
                paid: 10_000,
                pending: 30_000,
                overdue: 20_000,
            }
        );
        assert_eq!(totals.outstanding(), 50_000);
        assert_eq!(f.queries.by_product(product).await.unwrap().len(), 3);
    }

    struct BrokenDirectory;

    impl ReferenceDirectory for BrokenDirectory {
        fn product(&self, _id: ProductId) -> Result<Option<ProductSummary>, QueryError> {
            Err(QueryError::Directory("metadata source offline".into()))
        }

        fn customer(&self, _id: CustomerId) -> Result<Option<CustomerSummary>, QueryError> {
            Err(QueryError::Directory("metadata source offline".into()))
        }
    }

    #[tokio::test]
    async fn directory_failures_are_surfaced() {
        let store = Arc::new(InMemoryObligationStore::new());
        seed(&store, ProductId::new(), CustomerId::new(), "2024-03", 1_000).await;
        let queries = JoinedPaymentQueries::new(store, BrokenDirectory);

        assert!(matches!(
            queries.list(&ObligationFilter::all()).await,
            Err(QueryError::Directory(_))
        ));
    }

    #[test]
    fn view_serializes_for_display() {
        let (product, customer) = (ProductId::new(), CustomerId::new());
        let obligation = PaymentObligation::create(
            ObligationId::new(),
            NewObligation::pending(product, customer, "2024-03".parse().unwrap(), Amount::new(5).unwrap()),
            at(1),
        );
        let view = PaymentView::new(
            &obligation,
            ProductSummary { msn: Some("8984".into()) },
            CustomerSummary {
                name: "C".into(),
                email: "c@example.com".into(),
            },
        );

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["billing_period"], "2024-03-01");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["amount"], 5);
        assert_eq!(json["msn"], "8984");
    }
}
