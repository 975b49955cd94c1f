//! Postgres connection pool and schema bootstrap.

use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::config::BillingConfig;

/// `payments` table: one row per product and billing month, with integer
/// minor-unit amounts and a constraint tying the payment date to the status.
///
/// `products(id, msn)` and `customers(id, name, email)` are owned by the
/// surrounding application and must already exist.
pub const PAYMENTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS payments (
    id UUID PRIMARY KEY,
    product_id UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    customer_id UUID NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
    billing_month DATE NOT NULL CHECK (EXTRACT(DAY FROM billing_month) = 1),
    amount BIGINT NOT NULL CHECK (amount > 0),
    status VARCHAR(20) NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'paid', 'overdue')),
    payment_date TIMESTAMPTZ,
    notes TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT payments_product_id_billing_month_key UNIQUE (product_id, billing_month),
    CONSTRAINT payments_paid_has_date CHECK ((status = 'paid') = (payment_date IS NOT NULL))
)
"#;

const PAYMENTS_INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS idx_payments_customer ON payments (customer_id)",
    "CREATE INDEX IF NOT EXISTS idx_payments_status ON payments (status)",
    "CREATE INDEX IF NOT EXISTS idx_payments_billing_month ON payments (billing_month DESC)",
];

/// Build a connection pool from `config`.
pub async fn connect(config: &BillingConfig) -> Result<PgPool> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required to connect to Postgres")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Create the `payments` table and its indexes if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(PAYMENTS_SCHEMA)
        .execute(pool)
        .await
        .context("failed to create payments table")?;

    for statement in PAYMENTS_INDEXES {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("failed to run '{statement}'"))?;
    }

    tracing::info!("payments schema ready");
    Ok(())
}
