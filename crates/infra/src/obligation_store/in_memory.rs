use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use rentbill_billing::PaymentObligation;
use rentbill_core::{BillingPeriod, ObligationId, ProductId};

use super::r#trait::{ObligationFilter, ObligationStore, StoreError};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct PeriodKey {
    product_id: ProductId,
    billing_period: BillingPeriod,
}

impl PeriodKey {
    fn of(obligation: &PaymentObligation) -> Self {
        Self {
            product_id: obligation.product_id(),
            billing_period: obligation.billing_period(),
        }
    }
}

#[derive(Debug, Default)]
struct Table {
    rows: HashMap<ObligationId, PaymentObligation>,
    by_period: HashMap<PeriodKey, ObligationId>,
}

/// In-memory payment record store.
///
/// Intended for tests/dev. Rows and the (product, period) index live behind a
/// single lock, so the uniqueness check and the insert are one atomic step.
#[derive(Debug, Default)]
pub struct InMemoryObligationStore {
    table: RwLock<Table>,
}

impl InMemoryObligationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("lock poisoned".to_string())
    }
}

#[async_trait]
impl ObligationStore for InMemoryObligationStore {
    async fn insert(&self, obligation: &PaymentObligation) -> Result<(), StoreError> {
        let key = PeriodKey::of(obligation);
        let mut table = self.table.write().map_err(|_| Self::poisoned())?;

        if table.by_period.contains_key(&key) {
            return Err(StoreError::Duplicate {
                product_id: key.product_id,
                billing_period: key.billing_period,
            });
        }
        if table.rows.contains_key(&obligation.id_typed()) {
            return Err(StoreError::Corrupt(format!(
                "obligation id {} is already in use",
                obligation.id_typed()
            )));
        }

        table.by_period.insert(key, obligation.id_typed());
        table.rows.insert(obligation.id_typed(), obligation.clone());
        Ok(())
    }

    async fn get(&self, id: ObligationId) -> Result<Option<PaymentObligation>, StoreError> {
        let table = self.table.read().map_err(|_| Self::poisoned())?;
        Ok(table.rows.get(&id).cloned())
    }

    async fn find_by_period(
        &self,
        product_id: ProductId,
        billing_period: BillingPeriod,
    ) -> Result<Option<PaymentObligation>, StoreError> {
        let table = self.table.read().map_err(|_| Self::poisoned())?;
        let key = PeriodKey {
            product_id,
            billing_period,
        };
        Ok(table
            .by_period
            .get(&key)
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    async fn list(&self, filter: &ObligationFilter) -> Result<Vec<PaymentObligation>, StoreError> {
        let table = self.table.read().map_err(|_| Self::poisoned())?;
        let mut rows: Vec<PaymentObligation> = table
            .rows
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            b.billing_period()
                .cmp(&a.billing_period())
                .then_with(|| b.created_at().cmp(&a.created_at()))
        });
        Ok(rows)
    }

    async fn update(&self, obligation: &PaymentObligation) -> Result<(), StoreError> {
        let mut table = self.table.write().map_err(|_| Self::poisoned())?;
        let Some(stored) = table.rows.get_mut(&obligation.id_typed()) else {
            return Err(StoreError::NotFound(obligation.id_typed()));
        };

        // Only the mutable columns are written; the billing key and amount stay
        // as they were inserted.
        let mut record = stored.to_record();
        let incoming = obligation.to_record();
        record.status = incoming.status;
        record.paid_on = incoming.paid_on;
        record.notes = incoming.notes;
        record.updated_at = incoming.updated_at;

        *stored = PaymentObligation::restore(record).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, id: ObligationId) -> Result<bool, StoreError> {
        let mut table = self.table.write().map_err(|_| Self::poisoned())?;
        match table.rows.remove(&id) {
            Some(removed) => {
                table.by_period.remove(&PeriodKey::of(&removed));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
