//! Configuration loading from the environment.

use anyhow::{Context, Result};

use rentbill_billing::RolloverAnchor;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BillingConfig {
    /// Postgres connection string. `None` means the caller runs on in-memory stores.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub rollover_anchor: RolloverAnchor,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            rollover_anchor: RolloverAnchor::default(),
        }
    }
}

impl BillingConfig {
    /// Read `DATABASE_URL`, `RENTBILL_DB_MAX_CONNECTIONS` and `RENTBILL_ROLLOVER_ANCHOR`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`BillingConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let max_connections = match lookup("RENTBILL_DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| {
                    format!("RENTBILL_DB_MAX_CONNECTIONS must be a positive integer (got '{raw}')")
                })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let rollover_anchor = match lookup("RENTBILL_ROLLOVER_ANCHOR") {
            Some(raw) => raw
                .parse::<RolloverAnchor>()
                .context("RENTBILL_ROLLOVER_ANCHOR is invalid")?,
            None => RolloverAnchor::default(),
        };

        Ok(Self {
            database_url,
            max_connections,
            rollover_anchor,
        })
    }
}
