//! Reference metadata for payment views: product serials and customer contacts.
//!
//! The directory is an explicit lookup table owned by whoever builds it. Nothing
//! is cached process-wide; callers refresh it with `upsert_*` / `remove_*` or
//! drop everything with `invalidate`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use rentbill_core::{CustomerId, ProductId};

use super::payments::QueryError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    /// SIM serial number; not every product has one.
    pub msn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub name: String,
    pub email: String,
}

/// Lookup of product and customer metadata by id.
pub trait ReferenceDirectory: Send + Sync {
    fn product(&self, id: ProductId) -> Result<Option<ProductSummary>, QueryError>;
    fn customer(&self, id: CustomerId) -> Result<Option<CustomerSummary>, QueryError>;
}

impl<D> ReferenceDirectory for Arc<D>
where
    D: ReferenceDirectory + ?Sized,
{
    fn product(&self, id: ProductId) -> Result<Option<ProductSummary>, QueryError> {
        (**self).product(id)
    }

    fn customer(&self, id: CustomerId) -> Result<Option<CustomerSummary>, QueryError> {
        (**self).customer(id)
    }
}

#[derive(Debug, Default)]
struct Entries {
    products: HashMap<ProductId, ProductSummary>,
    customers: HashMap<CustomerId, CustomerSummary>,
}

/// In-memory directory for tests/dev and for callers that load metadata up front.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    entries: RwLock<Entries>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_product(&self, id: ProductId, summary: ProductSummary) -> Result<(), QueryError> {
        self.write()?.products.insert(id, summary);
        Ok(())
    }

    pub fn upsert_customer(&self, id: CustomerId, summary: CustomerSummary) -> Result<(), QueryError> {
        self.write()?.customers.insert(id, summary);
        Ok(())
    }

    pub fn remove_product(&self, id: ProductId) -> Result<bool, QueryError> {
        Ok(self.write()?.products.remove(&id).is_some())
    }

    pub fn remove_customer(&self, id: CustomerId) -> Result<bool, QueryError> {
        Ok(self.write()?.customers.remove(&id).is_some())
    }

    /// Drop every entry.
    pub fn invalidate(&self) -> Result<(), QueryError> {
        *self.write()? = Entries::default();
        Ok(())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Entries>, QueryError> {
        self.entries
            .write()
            .map_err(|_| QueryError::Directory("lock poisoned".to_string()))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Entries>, QueryError> {
        self.entries
            .read()
            .map_err(|_| QueryError::Directory("lock poisoned".to_string()))
    }
}

impl ReferenceDirectory for InMemoryDirectory {
    fn product(&self, id: ProductId) -> Result<Option<ProductSummary>, QueryError> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    fn customer(&self, id: CustomerId) -> Result<Option<CustomerSummary>, QueryError> {
        Ok(self.read()?.customers.get(&id).cloned())
    }
}
