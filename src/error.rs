// Error taxonomy for the reward engine and the service boundary around it

use thiserror::Error;

use crate::transaction::CustomerId;

/// Failures raised by the calculation engine itself.
///
/// All variants are local and synchronous: they come from bad input or a bad
/// configuration, never from a transient resource, so none of them is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RewardError {
    /// A negative (or non-finite) amount; `customer_id` is `None` when a bare
    /// amount was scored outside any transaction
    #[error("invalid amount {amount}{}", for_customer(.customer_id))]
    InvalidAmount {
        customer_id: Option<CustomerId>,
        amount: f64,
    },

    /// Points for an amount, a month or a total do not fit in an `i64`
    #[error("points overflow for amount {amount}{}", for_customer(.customer_id))]
    PointsOverflow {
        customer_id: Option<CustomerId>,
        amount: f64,
    },

    /// The caller passed arguments that have no principled result
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Threshold configuration is malformed (fatal at startup)
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

fn for_customer(customer_id: &Option<CustomerId>) -> String {
    match customer_id {
        Some(id) => format!(" for customer {id}"),
        None => String::new(),
    }
}

/// Outcomes of the collaborator-facing service that are not a reward result.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("no transactions found for customer {0}")]
    NotFound(CustomerId),

    #[error(transparent)]
    Engine(#[from] RewardError),

    #[error("transaction source error: {0:#}")]
    Source(#[from] anyhow::Error),
}
