// Purchase transaction - the only input the reward engine consumes

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::RewardError;

/// Customer identifier as stored by every transaction source
pub type CustomerId = u64;

/// A single purchase. Immutable once read from a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub customer_id: CustomerId,

    /// Purchase amount in dollars, expected non-negative
    pub amount: f64,

    /// Calendar date of the purchase (serialized as YYYY-MM-DD)
    pub date: NaiveDate,
}

impl Transaction {
    pub fn new(customer_id: CustomerId, amount: f64, date: NaiveDate) -> Self {
        Transaction {
            customer_id,
            amount,
            date,
        }
    }

    /// Reject amounts that would otherwise turn into plausible-looking points
    pub fn validate(&self) -> Result<(), RewardError> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(RewardError::InvalidAmount {
                customer_id: Some(self.customer_id),
                amount: self.amount,
            });
        }
        Ok(())
    }

    /// Month bucket this purchase belongs to, e.g. "2025-04"
    pub fn month_key(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }
}
