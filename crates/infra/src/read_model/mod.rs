//! Read-only payment views for operators and reporting.

pub mod directory;
pub mod payments;
pub mod postgres;

pub use directory::{CustomerSummary, InMemoryDirectory, ProductSummary, ReferenceDirectory};
pub use payments::{JoinedPaymentQueries, PaymentQueries, PaymentTotals, PaymentView, QueryError};
pub use postgres::PostgresPaymentQueries;
