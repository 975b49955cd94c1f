//! Subscription amortization: one obligation per month of a prepaid package.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use rentbill_core::{Amount, BillingPeriod, CustomerId, DomainError, DomainResult, ProductId};

use crate::obligation::{NewObligation, PaymentState};

/// Day of the month following a period on which backfilled payments are dated.
const SYNTHETIC_PAYMENT_DAY: u32 = 5;

/// One month of an expanded package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmortizedEntry {
    pub period: BillingPeriod,
    pub amount: Amount,
}

/// Split `total` into `months` monthly entries starting at `start_date`'s month.
///
/// Every entry carries `floor(total / months)`; the remainder is dropped, so the
/// sum can fall short of `total` by at most `months - 1`.
pub fn expand(start_date: NaiveDate, total: Amount, months: u32) -> DomainResult<Vec<AmortizedEntry>> {
    if months == 0 {
        return Err(DomainError::validation("package must cover at least one month"));
    }
    let amount = total.floor_share(months)?;
    let first = BillingPeriod::containing(start_date);

    (0..months)
        .map(|offset| {
            first
                .checked_add_months(offset)
                .map(|period| AmortizedEntry { period, amount })
                .ok_or_else(|| {
                    DomainError::validation(format!("package starting {first} runs past the calendar"))
                })
        })
        .collect()
}

/// Payment timestamp used when a package is bought already paid: midnight UTC
/// on the 5th of the month after `period`.
pub fn synthetic_paid_on(period: BillingPeriod) -> DomainResult<DateTime<Utc>> {
    let following = period.next()?;
    NaiveDate::from_ymd_opt(following.year(), following.month(), SYNTHETIC_PAYMENT_DAY)
        .map(|day| day.and_time(NaiveTime::MIN).and_utc())
        .ok_or_else(|| DomainError::invariant(format!("no payment day after {period}")))
}

/// Purchase status of a package at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    Pending,
    Paid,
}

/// A multi-month rental package bought in one purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPackage {
    pub product_id: ProductId,
    pub customer_id: CustomerId,
    pub start_date: NaiveDate,
    pub total_amount: Amount,
    pub months: u32,
    pub status: PackageStatus,
}

impl SubscriptionPackage {
    /// Obligations covering every month of the package.
    ///
    /// A paid package produces paid obligations dated by `synthetic_paid_on`;
    /// otherwise every obligation is pending.
    pub fn schedule(&self) -> DomainResult<Vec<NewObligation>> {
        expand(self.start_date, self.total_amount, self.months)?
            .into_iter()
            .map(|entry| {
                let state = match self.status {
                    PackageStatus::Paid => PaymentState::Paid {
                        paid_on: synthetic_paid_on(entry.period)?,
                    },
                    PackageStatus::Pending => PaymentState::Pending,
                };
                Ok(NewObligation::pending(self.product_id, self.customer_id, entry.period, entry.amount)
                    .with_state(state))
            })
            .collect()
    }
}
