// 📊 Aggregator - per customer, per calendar month reward totals
//
// Two explicit policies:
//   AllHistory    - every transaction the customer ever made
//   RollingWindow - only transactions from the first day of the month
//                   `time_period_months` before the customer's latest purchase,
//                   through that latest purchase (both ends inclusive)
//
// The window is anchored at the customer's own activity, never at "now", so a
// fixed transaction set always yields the same result.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::config::RewardConfig;
use crate::error::RewardError;
use crate::tiers::TierCalculator;
use crate::transaction::{CustomerId, Transaction};

/// Month key ("YYYY-MM") -> points earned in that month
pub type MonthlyPoints = BTreeMap<String, i64>;

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardResult {
    pub customer_id: CustomerId,
    pub monthly_points: MonthlyPoints,
    pub total_points: i64,
}

/// Which transactions count towards a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationScope {
    #[default]
    AllHistory,
    RollingWindow,
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct Aggregator<'a> {
    config: &'a RewardConfig,
    calculator: TierCalculator<'a>,
}

impl<'a> Aggregator<'a> {
    pub fn new(config: &'a RewardConfig) -> Self {
        Aggregator {
            config,
            calculator: TierCalculator::new(config),
        }
    }

    /// One result per distinct customer, no window applied.
    ///
    /// An empty input is valid and yields an empty list.
    pub fn aggregate_all(&self, transactions: &[Transaction]) -> Result<Vec<RewardResult>, RewardError> {
        self.aggregate_grouped(transactions, AggregationScope::AllHistory)
    }

    /// Like [`aggregate_all`](Self::aggregate_all) but every customer is scoped
    /// to their own rolling window.
    pub fn aggregate_all_windowed(
        &self,
        transactions: &[Transaction],
    ) -> Result<Vec<RewardResult>, RewardError> {
        self.aggregate_grouped(transactions, AggregationScope::RollingWindow)
    }

    /// Rolling-window result for a single known customer.
    ///
    /// Fails fast with `InvalidArgument` when there is nothing to aggregate or
    /// when a transaction belongs to some other customer.
    pub fn aggregate_windowed(
        &self,
        customer_id: CustomerId,
        transactions: &[Transaction],
    ) -> Result<RewardResult, RewardError> {
        if transactions.is_empty() {
            return Err(RewardError::InvalidArgument(format!(
                "transaction list for customer {customer_id} is empty"
            )));
        }

        if let Some(foreign) = transactions.iter().find(|tx| tx.customer_id != customer_id) {
            return Err(RewardError::InvalidArgument(format!(
                "transaction for customer {} passed to aggregation for customer {}",
                foreign.customer_id, customer_id
            )));
        }

        let refs: Vec<&Transaction> = transactions.iter().collect();
        self.windowed(customer_id, &refs)
    }

    fn aggregate_grouped(
        &self,
        transactions: &[Transaction],
        scope: AggregationScope,
    ) -> Result<Vec<RewardResult>, RewardError> {
        let mut by_customer: HashMap<CustomerId, Vec<&Transaction>> = HashMap::new();
        for tx in transactions {
            by_customer.entry(tx.customer_id).or_default().push(tx);
        }

        let mut results = by_customer
            .into_iter()
            .map(|(customer_id, txs)| match scope {
                AggregationScope::AllHistory => self.summarize(customer_id, &txs),
                AggregationScope::RollingWindow => self.windowed(customer_id, &txs),
            })
            .collect::<Result<Vec<_>, _>>()?;

        results.sort_by_key(|r| r.customer_id);
        Ok(results)
    }

    fn windowed(&self, customer_id: CustomerId, transactions: &[&Transaction]) -> Result<RewardResult, RewardError> {
        let latest = transactions
            .iter()
            .map(|tx| tx.date)
            .max()
            .ok_or_else(|| {
                RewardError::InvalidArgument(format!("no transactions for customer {customer_id}"))
            })?;
        let start = window_start(latest, self.config.time_period_months);

        let in_window: Vec<&Transaction> = transactions
            .iter()
            .copied()
            .filter(|tx| start <= tx.date && tx.date <= latest)
            .collect();

        tracing::debug!(
            customer_id,
            %start,
            %latest,
            kept = in_window.len(),
            dropped = transactions.len() - in_window.len(),
            "applied rolling window"
        );

        // Amounts outside the window are still data; corrupt ones must not hide there
        for tx in transactions {
            tx.validate()?;
        }

        self.summarize(customer_id, &in_window)
    }

    /// Bucket by month, score each purchase, sum buckets into the total
    fn summarize(&self, customer_id: CustomerId, transactions: &[&Transaction]) -> Result<RewardResult, RewardError> {
        let mut monthly_points = MonthlyPoints::new();
        let mut total_points: i64 = 0;
        for tx in transactions {
            let points = self.calculator.transaction_points(tx)?;
            let overflow = || RewardError::PointsOverflow {
                customer_id: Some(customer_id),
                amount: tx.amount,
            };

            total_points = total_points.checked_add(points).ok_or_else(overflow)?;
            let month = monthly_points.entry(tx.month_key()).or_insert(0);
            *month = month.checked_add(points).ok_or_else(overflow)?;
        }

        Ok(RewardResult {
            customer_id,
            monthly_points,
            total_points,
        })
    }
}

/// First day of the month `months` before `latest`.
///
/// Month subtraction clamps to the last valid day (May 31 - 3 months = Feb 28/29)
/// before truncating, so the window length varies with month lengths.
pub fn window_start(latest: NaiveDate, months: u32) -> NaiveDate {
    let shifted = latest
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN);
    shifted.with_day(1).unwrap_or(shifted)
}

// ============================================================================
// TESTS
// ============================================================================
