//! Postgres payment queries: one SQL join over `payments`, `products` and `customers`.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use rentbill_core::ObligationId;

use super::directory::{CustomerSummary, ProductSummary};
use super::payments::{PaymentQueries, PaymentTotals, PaymentView, QueryError};
use crate::obligation_store::postgres::{decode_obligation, filter_params, map_sqlx_error};
use crate::obligation_store::{ObligationFilter, StoreError};

const SELECT_VIEWS: &str = r#"
    SELECT
        p.id,
        p.product_id,
        p.customer_id,
        p.billing_month,
        p.amount,
        p.status,
        p.payment_date,
        p.notes,
        p.created_at,
        p.updated_at,
        pr.msn,
        c.name AS customer_name,
        c.email AS customer_email
    FROM payments p
    JOIN products pr ON p.product_id = pr.id
    JOIN customers c ON p.customer_id = c.id
"#;

const FILTER_CLAUSE: &str = r#"
    WHERE ($1::uuid IS NULL OR p.product_id = $1)
        AND ($2::uuid IS NULL OR p.customer_id = $2)
        AND ($3::text[] IS NULL OR p.status = ANY($3))
"#;

#[derive(Debug, Clone)]
pub struct PostgresPaymentQueries {
    pool: Arc<PgPool>,
}

impl PostgresPaymentQueries {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn decode_view(row: &PgRow) -> Result<PaymentView, QueryError> {
    let obligation = decode_obligation(row)?;
    let read = |column: &str| -> Result<String, QueryError> {
        row.try_get::<String, _>(column)
            .map_err(|e| StoreError::Corrupt(format!("failed to read {column}: {e}")).into())
    };
    let msn = row
        .try_get::<Option<String>, _>("msn")
        .map_err(|e| StoreError::Corrupt(format!("failed to read msn: {e}")))?;

    Ok(PaymentView::new(
        &obligation,
        ProductSummary { msn },
        CustomerSummary {
            name: read("customer_name")?,
            email: read("customer_email")?,
        },
    ))
}

#[async_trait]
impl PaymentQueries for PostgresPaymentQueries {
    #[instrument(skip(self), err)]
    async fn list(&self, filter: &ObligationFilter) -> Result<Vec<PaymentView>, QueryError> {
        let (product_param, customer_param, status_param) = filter_params(filter);

        let rows = sqlx::query(&format!(
            "{SELECT_VIEWS} {FILTER_CLAUSE} ORDER BY p.billing_month DESC, p.created_at DESC"
        ))
        .bind(product_param)
        .bind(customer_param)
        .bind(status_param)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_payment_views", e))?;

        rows.iter().map(decode_view).collect()
    }

    #[instrument(skip(self), fields(obligation_id = %id), err)]
    async fn get(&self, id: ObligationId) -> Result<Option<PaymentView>, QueryError> {
        let row = sqlx::query(&format!("{SELECT_VIEWS} WHERE p.id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_payment_view", e))?;

        row.as_ref().map(decode_view).transpose()
    }

    #[instrument(skip(self), err)]
    async fn totals(&self, filter: &ObligationFilter) -> Result<PaymentTotals, QueryError> {
        let (product_param, customer_param, status_param) = filter_params(filter);

        let row = sqlx::query(&format!(
            r#"
            SELECT
                COUNT(*)::BIGINT AS count,
                COALESCE(SUM(CASE WHEN p.status = 'paid' THEN p.amount ELSE 0 END), 0)::BIGINT AS paid,
                COALESCE(SUM(CASE WHEN p.status = 'pending' THEN p.amount ELSE 0 END), 0)::BIGINT AS pending,
                COALESCE(SUM(CASE WHEN p.status = 'overdue' THEN p.amount ELSE 0 END), 0)::BIGINT AS overdue
            FROM payments p
            JOIN products pr ON p.product_id = pr.id
            JOIN customers c ON p.customer_id = c.id
            {FILTER_CLAUSE}
            "#
        ))
        .bind(product_param)
        .bind(customer_param)
        .bind(status_param)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("payment_totals", e))?;

        let read = |column: &str| -> Result<u64, QueryError> {
            let value: i64 = row
                .try_get(column)
                .map_err(|e| StoreError::Corrupt(format!("failed to read {column}: {e}")))?;
            u64::try_from(value)
                .map_err(|_| StoreError::Corrupt(format!("negative {column} total {value}")).into())
        };

        Ok(PaymentTotals {
            count: read("count")?,
            paid: read("paid")?,
            pending: read("pending")?,
            overdue: read("overdue")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_query_joins_reference_tables() {
        assert!(SELECT_VIEWS.contains("JOIN products pr ON p.product_id = pr.id"));
        assert!(SELECT_VIEWS.contains("JOIN customers c ON p.customer_id = c.id"));
        assert!(FILTER_CLAUSE.contains("ANY($3)"));
    }
}
