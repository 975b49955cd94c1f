use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rentbill_core::{
    Amount, BillingPeriod, CustomerId, DomainError, DomainResult, Entity, ObligationId, ProductId,
};

/// Payment obligation status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Overdue,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 3] = [Self::Pending, Self::Paid, Self::Overdue];

    /// Statuses that still expect money from the customer.
    pub const UNPAID: [PaymentStatus; 2] = [Self::Pending, Self::Overdue];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Overdue => "overdue",
        }
    }
}

impl core::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "overdue" => Ok(Self::Overdue),
            other => Err(DomainError::validation(format!(
                "status must be one of: pending, paid, overdue (got '{other}')"
            ))),
        }
    }
}

/// Status together with its payment timestamp.
///
/// `paid_on` only exists inside `Paid`, so "payment date set iff paid" holds by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PaymentState {
    Pending,
    Overdue,
    Paid { paid_on: DateTime<Utc> },
}

impl PaymentState {
    /// Build a state from operator input.
    ///
    /// `paid_on` is required for `Paid` and discarded for every other status.
    pub fn new(status: PaymentStatus, paid_on: Option<DateTime<Utc>>) -> DomainResult<Self> {
        match status {
            PaymentStatus::Pending => Ok(Self::Pending),
            PaymentStatus::Overdue => Ok(Self::Overdue),
            PaymentStatus::Paid => paid_on
                .map(|paid_on| Self::Paid { paid_on })
                .ok_or_else(|| DomainError::validation("paid_on is required when status is paid")),
        }
    }

    pub fn status(&self) -> PaymentStatus {
        match self {
            PaymentState::Pending => PaymentStatus::Pending,
            PaymentState::Overdue => PaymentStatus::Overdue,
            PaymentState::Paid { .. } => PaymentStatus::Paid,
        }
    }

    pub fn paid_on(&self) -> Option<DateTime<Utc>> {
        match self {
            PaymentState::Paid { paid_on } => Some(*paid_on),
            PaymentState::Pending | PaymentState::Overdue => None,
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentState::Paid { .. })
    }
}

/// Input for creating a payment obligation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewObligation {
    pub product_id: ProductId,
    pub customer_id: CustomerId,
    pub billing_period: BillingPeriod,
    pub amount: Amount,
    pub state: PaymentState,
    pub notes: Option<String>,
}

impl NewObligation {
    pub fn pending(
        product_id: ProductId,
        customer_id: CustomerId,
        billing_period: BillingPeriod,
        amount: Amount,
    ) -> Self {
        Self {
            product_id,
            customer_id,
            billing_period,
            amount,
            state: PaymentState::Pending,
            notes: None,
        }
    }

    pub fn with_state(mut self, state: PaymentState) -> Self {
        self.state = state;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Operator request to change an obligation's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: PaymentStatus,
    pub paid_on: Option<DateTime<Utc>>,
    /// Replaces the current notes (`None` clears them).
    pub notes: Option<String>,
}

impl StatusUpdate {
    pub fn to(status: PaymentStatus) -> Self {
        Self {
            status,
            paid_on: None,
            notes: None,
        }
    }

    pub fn paid_on(mut self, paid_on: DateTime<Utc>) -> Self {
        self.paid_on = Some(paid_on);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Result of a status change on a single obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub previous: PaymentStatus,
    pub current: PaymentStatus,
    /// Whether the record was modified (and must be persisted).
    pub changed: bool,
}

impl StatusTransition {
    /// True when the obligation moved into `paid` from another status.
    pub fn entered_paid(&self) -> bool {
        self.previous != PaymentStatus::Paid && self.current == PaymentStatus::Paid
    }
}

/// Flat, persisted shape of an obligation (one row of the payments table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationRecord {
    pub id: ObligationId,
    pub product_id: ProductId,
    pub customer_id: CustomerId,
    pub billing_period: BillingPeriod,
    pub amount: u64,
    pub status: PaymentStatus,
    pub paid_on: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One month's billing record for one product/customer pair.
///
/// The billing key (`product_id`, `customer_id`, `billing_period`), the id and
/// the amount are fixed at creation. Only the state, notes and `updated_at`
/// change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentObligation {
    id: ObligationId,
    product_id: ProductId,
    customer_id: CustomerId,
    billing_period: BillingPeriod,
    amount: Amount,
    state: PaymentState,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentObligation {
    pub fn create(id: ObligationId, new: NewObligation, now: DateTime<Utc>) -> Self {
        Self {
            id,
            product_id: new.product_id,
            customer_id: new.customer_id,
            billing_period: new.billing_period,
            amount: new.amount,
            state: new.state,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild an obligation from a persisted record, re-checking its invariants.
    pub fn restore(record: ObligationRecord) -> DomainResult<Self> {
        let amount = Amount::new(record.amount)
            .map_err(|e| DomainError::invariant(format!("obligation {}: {e}", record.id)))?;

        let state = match (record.status, record.paid_on) {
            (PaymentStatus::Paid, Some(paid_on)) => PaymentState::Paid { paid_on },
            (PaymentStatus::Pending, None) => PaymentState::Pending,
            (PaymentStatus::Overdue, None) => PaymentState::Overdue,
            (status, paid_on) => {
                return Err(DomainError::invariant(format!(
                    "obligation {} has status {status} with paid_on {paid_on:?}",
                    record.id
                )));
            }
        };

        Ok(Self {
            id: record.id,
            product_id: record.product_id,
            customer_id: record.customer_id,
            billing_period: record.billing_period,
            amount,
            state,
            notes: record.notes,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    pub fn to_record(&self) -> ObligationRecord {
        ObligationRecord {
            id: self.id,
            product_id: self.product_id,
            customer_id: self.customer_id,
            billing_period: self.billing_period,
            amount: self.amount.minor_units(),
            status: self.status(),
            paid_on: self.paid_on(),
            notes: self.notes.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn id_typed(&self) -> ObligationId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn billing_period(&self) -> BillingPeriod {
        self.billing_period
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn state(&self) -> PaymentState {
        self.state
    }

    pub fn status(&self) -> PaymentStatus {
        self.state.status()
    }

    pub fn paid_on(&self) -> Option<DateTime<Utc>> {
        self.state.paid_on()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Apply an operator status update.
    ///
    /// Any status may move to any other status, including out of `paid`.
    pub fn apply_status(
        &mut self,
        update: StatusUpdate,
        now: DateTime<Utc>,
    ) -> DomainResult<StatusTransition> {
        let state = PaymentState::new(update.status, update.paid_on)?;
        let previous = self.status();

        self.state = state;
        self.notes = update.notes;
        self.updated_at = now;

        Ok(StatusTransition {
            previous,
            current: state.status(),
            changed: true,
        })
    }

    /// Mark the obligation paid.
    ///
    /// An already-paid obligation is left untouched (its `paid_on` is kept).
    pub fn mark_paid(&mut self, paid_on: DateTime<Utc>, now: DateTime<Utc>) -> StatusTransition {
        let previous = self.status();
        if self.state.is_paid() {
            return StatusTransition {
                previous,
                current: PaymentStatus::Paid,
                changed: false,
            };
        }

        self.state = PaymentState::Paid { paid_on };
        self.updated_at = now;

        StatusTransition {
            previous,
            current: PaymentStatus::Paid,
            changed: true,
        }
    }
}

impl Entity for PaymentObligation {
    type Id = ObligationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
