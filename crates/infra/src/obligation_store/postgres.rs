//! Postgres-backed payment record store.
//!
//! Rows live in the `payments` table created by [`crate::db::ensure_schema`].
//! The (product, billing month) uniqueness is enforced by the
//! `payments_product_id_billing_month_key` constraint, so concurrent inserts for the
//! same key are serialized by the database itself. Tables created elsewhere may
//! carry a differently named constraint; any unique violation other than the
//! primary key is treated as the billing key.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation, not the primary key) | `23505` | `Duplicate` |
//! | Database (primary key violation) | `23505` | `Corrupt` |
//! | Database (foreign key / check violation) | `23503` / `23514` | `Corrupt` |
//! | Database (other) | Any other | `Unavailable` |
//! | PoolClosed, Io, timeouts, ... | N/A | `Unavailable` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use rentbill_billing::{ObligationRecord, PaymentObligation, PaymentStatus};
use rentbill_core::{BillingPeriod, CustomerId, ObligationId, ProductId};

use super::r#trait::{ObligationFilter, ObligationStore, StoreError};

/// Name of the unique constraint on `(product_id, billing_month)`, matching the
/// name Postgres generates for an unnamed `UNIQUE (product_id, billing_month)`.
pub(crate) const BILLING_KEY_CONSTRAINT: &str = "payments_product_id_billing_month_key";

const PRIMARY_KEY_CONSTRAINT: &str = "payments_pkey";

const SELECT_COLUMNS: &str = r#"
    SELECT
        id,
        product_id,
        customer_id,
        billing_month,
        amount,
        status,
        payment_date,
        notes,
        created_at,
        updated_at
    FROM payments
"#;

/// Postgres-backed payment record store.
///
/// `Send + Sync`; every operation goes through the shared connection pool.
#[derive(Debug, Clone)]
pub struct PostgresObligationStore {
    pool: Arc<PgPool>,
}

impl PostgresObligationStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ObligationStore for PostgresObligationStore {
    #[instrument(
        skip(self, obligation),
        fields(
            obligation_id = %obligation.id_typed(),
            product_id = %obligation.product_id(),
            billing_period = %obligation.billing_period()
        ),
        err
    )]
    async fn insert(&self, obligation: &PaymentObligation) -> Result<(), StoreError> {
        let record = obligation.to_record();
        let amount = amount_to_db(record.amount)?;

        sqlx::query(
            r#"
            INSERT INTO payments (
                id,
                product_id,
                customer_id,
                billing_month,
                amount,
                status,
                payment_date,
                notes,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.product_id.as_uuid())
        .bind(record.customer_id.as_uuid())
        .bind(record.billing_period.first_day())
        .bind(amount)
        .bind(record.status.as_str())
        .bind(record.paid_on)
        .bind(&record.notes)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_billing_key_violation(&e) {
                StoreError::Duplicate {
                    product_id: record.product_id,
                    billing_period: record.billing_period,
                }
            } else {
                map_sqlx_error("insert_payment", e)
            }
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(obligation_id = %id), err)]
    async fn get(&self, id: ObligationId) -> Result<Option<PaymentObligation>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_payment", e))?;

        row.as_ref().map(decode_obligation).transpose()
    }

    #[instrument(skip(self), fields(product_id = %product_id, billing_period = %billing_period), err)]
    async fn find_by_period(
        &self,
        product_id: ProductId,
        billing_period: BillingPeriod,
    ) -> Result<Option<PaymentObligation>, StoreError> {
        let row = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE product_id = $1 AND billing_month = $2"
        ))
        .bind(product_id.as_uuid())
        .bind(billing_period.first_day())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_payment_by_period", e))?;

        row.as_ref().map(decode_obligation).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self, filter: &ObligationFilter) -> Result<Vec<PaymentObligation>, StoreError> {
        let (product_param, customer_param, status_param) = filter_params(filter);

        let rows = sqlx::query(&format!(
            r#"{SELECT_COLUMNS}
            WHERE ($1::uuid IS NULL OR product_id = $1)
                AND ($2::uuid IS NULL OR customer_id = $2)
                AND ($3::text[] IS NULL OR status = ANY($3))
            ORDER BY billing_month DESC, created_at DESC
            "#
        ))
        .bind(product_param)
        .bind(customer_param)
        .bind(status_param)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_payments", e))?;

        rows.iter().map(decode_obligation).collect()
    }

    #[instrument(
        skip(self, obligation),
        fields(obligation_id = %obligation.id_typed(), status = %obligation.status()),
        err
    )]
    async fn update(&self, obligation: &PaymentObligation) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2,
                payment_date = $3,
                notes = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(obligation.id_typed().as_uuid())
        .bind(obligation.status().as_str())
        .bind(obligation.paid_on())
        .bind(obligation.notes())
        .bind(obligation.updated_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_payment", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(obligation.id_typed()));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(obligation_id = %id), err)]
    async fn delete(&self, id: ObligationId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_payment", e))?;

        Ok(result.rows_affected() > 0)
    }
}

/// Bind values for an [`ObligationFilter`]: `NULL` means "any".
pub(crate) fn filter_params(
    filter: &ObligationFilter,
) -> (Option<uuid::Uuid>, Option<uuid::Uuid>, Option<Vec<String>>) {
    let statuses = (!filter.statuses.is_empty()).then(|| {
        filter
            .statuses
            .iter()
            .map(|s| s.as_str().to_string())
            .collect()
    });
    (
        filter.product_id.map(uuid::Uuid::from),
        filter.customer_id.map(uuid::Uuid::from),
        statuses,
    )
}

pub(crate) fn amount_to_db(amount: u64) -> Result<i64, StoreError> {
    i64::try_from(amount).map_err(|_| StoreError::Corrupt(format!("amount {amount} exceeds BIGINT")))
}

/// Decode one `payments` row, re-checking the domain invariants.
pub(crate) fn decode_obligation(row: &PgRow) -> Result<PaymentObligation, StoreError> {
    let record = PaymentRow::from_row(row)
        .map_err(|e| StoreError::Corrupt(format!("failed to deserialize payment row: {e}")))?
        .into_record()?;

    PaymentObligation::restore(record).map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Map SQLx errors to StoreError.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                // Integrity violations mean the row itself is unacceptable,
                // retrying will not help.
                Some("23505") | Some("23503") | Some("23514") => StoreError::Corrupt(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("failed to decode row in {operation}: {err}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {operation}: {err}")),
    }
}

/// Check if an error is a violation of the (product, billing month) key.
fn is_billing_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            is_billing_key_conflict(db_err.code().as_deref(), db_err.constraint())
        }
        _ => false,
    }
}

/// `payments` has exactly one unique key besides the primary key, whatever
/// name the table was created with.
fn is_billing_key_conflict(code: Option<&str>, constraint: Option<&str>) -> bool {
    code == Some("23505") && constraint != Some(PRIMARY_KEY_CONSTRAINT)
}

// SQLx row types

#[derive(Debug)]
pub(crate) struct PaymentRow {
    id: uuid::Uuid,
    product_id: uuid::Uuid,
    customer_id: uuid::Uuid,
    billing_month: NaiveDate,
    amount: i64,
    status: String,
    payment_date: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for PaymentRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PaymentRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            customer_id: row.try_get("customer_id")?,
            billing_month: row.try_get("billing_month")?,
            amount: row.try_get("amount")?,
            status: row.try_get("status")?,
            payment_date: row.try_get("payment_date")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl PaymentRow {
    fn into_record(self) -> Result<ObligationRecord, StoreError> {
        let corrupt = |what: String| StoreError::Corrupt(format!("payment {}: {what}", self.id));

        let billing_period =
            BillingPeriod::from_first_day(self.billing_month).map_err(|e| corrupt(e.to_string()))?;
        let status = self
            .status
            .parse::<PaymentStatus>()
            .map_err(|e| corrupt(e.to_string()))?;
        let amount = u64::try_from(self.amount).map_err(|_| corrupt(format!("negative amount {}", self.amount)))?;

        Ok(ObligationRecord {
            id: ObligationId::from_uuid(self.id),
            product_id: ProductId::from_uuid(self.product_id),
            customer_id: CustomerId::from_uuid(self.customer_id),
            billing_period,
            amount,
            status,
            paid_on: self.payment_date,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
