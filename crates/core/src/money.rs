//! Monetary amounts in minor currency units.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Strictly positive amount in the smallest currency unit (e.g. cents).
///
/// There is a single implicit currency; zero is not representable. Amounts are
/// capped at `i64::MAX` so they always fit a signed 64-bit column.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Amount(u64);

impl Amount {
    pub const MAX: u64 = i64::MAX as u64;

    pub fn new(minor_units: u64) -> DomainResult<Self> {
        if minor_units == 0 {
            return Err(DomainError::validation("amount must be positive"));
        }
        if minor_units > Self::MAX {
            return Err(DomainError::validation(format!(
                "amount {minor_units} exceeds the maximum of {}",
                Self::MAX
            )));
        }
        Ok(Self(minor_units))
    }

    pub fn minor_units(&self) -> u64 {
        self.0
    }

    /// Even share of this amount over `parts`, rounded down.
    ///
    /// The remainder (`self % parts`) is dropped. Fails when `parts` is zero or
    /// when the share would be zero.
    pub fn floor_share(&self, parts: u32) -> DomainResult<Self> {
        if parts == 0 {
            return Err(DomainError::validation("cannot split an amount into zero parts"));
        }
        let share = self.0 / u64::from(parts);
        if share == 0 {
            return Err(DomainError::validation(format!(
                "amount {} is too small to split over {} parts",
                self.0, parts
            )));
        }
        Ok(Self(share))
    }
}

impl ValueObject for Amount {}

impl TryFrom<u64> for Amount {
    type Error = DomainError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for u64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
