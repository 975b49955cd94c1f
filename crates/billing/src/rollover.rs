//! Rollover: which obligation must exist after a payment.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rentbill_core::{BillingPeriod, DomainError, DomainResult};

use crate::obligation::{NewObligation, PaymentObligation};

/// Reference point for the follow-on billing period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RolloverAnchor {
    /// Month after the current wall-clock month, whatever period was paid.
    ///
    /// A late payment (March paid in May) rolls forward to June.
    #[default]
    CurrentMonth,
    /// Month after the paid obligation's own billing period.
    FollowingPeriod,
}

impl FromStr for RolloverAnchor {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current-month" | "current_month" => Ok(Self::CurrentMonth),
            "following-period" | "following_period" => Ok(Self::FollowingPeriod),
            other => Err(DomainError::validation(format!(
                "rollover anchor must be 'current-month' or 'following-period' (got '{other}')"
            ))),
        }
    }
}

/// Billing period the follow-on obligation must cover.
pub fn rollover_period(
    anchor: RolloverAnchor,
    paid: &PaymentObligation,
    now: DateTime<Utc>,
) -> DomainResult<BillingPeriod> {
    match anchor {
        RolloverAnchor::CurrentMonth => BillingPeriod::containing_instant(now).next(),
        RolloverAnchor::FollowingPeriod => paid.billing_period().next(),
    }
}

/// Follow-on obligation for a paid obligation: same product, customer and
/// amount, `pending`, no notes.
pub fn plan_follow_on(
    paid: &PaymentObligation,
    anchor: RolloverAnchor,
    now: DateTime<Utc>,
) -> DomainResult<NewObligation> {
    if !paid.state().is_paid() {
        return Err(DomainError::invariant(format!(
            "cannot roll over obligation {} with status {}",
            paid.id_typed(),
            paid.status()
        )));
    }

    let period = rollover_period(anchor, paid, now)?;
    Ok(NewObligation::pending(
        paid.product_id(),
        paid.customer_id(),
        period,
        paid.amount(),
    ))
}
