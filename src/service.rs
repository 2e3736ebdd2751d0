// Reward service - the boundary exposed to callers such as the HTTP layer
//
// Each call reads a fresh list from the source and computes from scratch;
// nothing is cached between calls and the configuration is never mutated.

use std::sync::Arc;
use tracing::{info, warn};

use crate::aggregator::{AggregationScope, Aggregator, RewardResult};
use crate::config::RewardConfig;
use crate::error::{RewardError, ServiceError};
use crate::source::TransactionSource;
use crate::transaction::CustomerId;

#[derive(Clone)]
pub struct RewardService {
    source: Arc<dyn TransactionSource>,
    config: Arc<RewardConfig>,
}

impl RewardService {
    /// Fails with `InvalidConfiguration` before any request is served
    pub fn new(
        source: Arc<dyn TransactionSource>,
        config: RewardConfig,
    ) -> Result<Self, RewardError> {
        config.validate()?;
        Ok(RewardService {
            source,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Rewards for every customer in the source.
    ///
    /// An empty vector means "no data" and is not an error.
    pub fn all_rewards(&self, scope: AggregationScope) -> Result<Vec<RewardResult>, ServiceError> {
        let transactions = self.source.find_all()?;
        info!(count = transactions.len(), ?scope, "calculating rewards for all customers");

        if transactions.is_empty() {
            warn!("no transactions found, returning empty reward list");
            return Ok(Vec::new());
        }

        let aggregator = Aggregator::new(&self.config);
        let results = match scope {
            AggregationScope::AllHistory => aggregator.aggregate_all(&transactions)?,
            AggregationScope::RollingWindow => aggregator.aggregate_all_windowed(&transactions)?,
        };

        info!(customers = results.len(), "calculated rewards");
        Ok(results)
    }

    /// Rolling-window rewards for one customer
    pub fn customer_rewards(&self, customer_id: CustomerId) -> Result<RewardResult, ServiceError> {
        let transactions = self.source.find_by_customer(customer_id)?;

        if transactions.is_empty() {
            warn!(customer_id, "no transactions found for customer");
            return Err(ServiceError::NotFound(customer_id));
        }

        let result = Aggregator::new(&self.config).aggregate_windowed(customer_id, &transactions)?;
        info!(customer_id, total_points = result.total_points, "calculated customer rewards");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;
    use crate::transaction::Transaction;
    use anyhow::anyhow;
    use chrono::NaiveDate;

    struct FailingSource;

    impl TransactionSource for FailingSource {
        fn find_all(&self) -> anyhow::Result<Vec<Transaction>> {
            Err(anyhow!("connection refused"))
        }

        fn find_by_customer(&self, _customer_id: CustomerId) -> anyhow::Result<Vec<Transaction>> {
            Err(anyhow!("connection refused"))
        }
    }

    fn sample_service() -> RewardService {
        RewardService::new(Arc::new(InMemorySource::sample()), RewardConfig::default()).unwrap()
    }

    fn find(results: &[RewardResult], customer_id: CustomerId) -> &RewardResult {
        results.iter().find(|r| r.customer_id == customer_id).unwrap()
    }

    #[test]
    fn test_all_rewards_sample_data() {
        let results = sample_service().all_rewards(AggregationScope::AllHistory).unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(find(&results, 1).monthly_points["2025-04"], 550);
        assert_eq!(find(&results, 1).total_points, 550 + 30);
        assert_eq!(find(&results, 2).total_points, 160);
        assert_eq!(find(&results, 3).total_points, 1940);
        assert_eq!(find(&results, 4).total_points, 160);
    }

    #[test]
    fn test_all_rewards_windowed_sample_data() {
        let results = sample_service().all_rewards(AggregationScope::RollingWindow).unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(find(&results, 3).total_points, 1090);
        assert_eq!(find(&results, 1).total_points, 580);
    }

    #[test]
    fn test_all_rewards_empty_source() {
        let service =
            RewardService::new(Arc::new(InMemorySource::default()), RewardConfig::default())
                .unwrap();
        let results = service.all_rewards(AggregationScope::AllHistory).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_customer_rewards() {
        let result = sample_service().customer_rewards(3).unwrap();

        assert_eq!(result.customer_id, 3);
        assert_eq!(result.total_points, 1090);
        assert!(!result.monthly_points.contains_key("2025-03"));
    }

    #[test]
    fn test_customer_rewards_not_found() {
        let err = sample_service().customer_rewards(42).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(42)));
    }

    #[test]
    fn test_negative_amount_surfaces_as_engine_error() {
        let date = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
        let source = InMemorySource::new(vec![
            Transaction::new(1, 120.0, date),
            Transaction::new(1, -100.0, date),
        ]);
        let service = RewardService::new(Arc::new(source), RewardConfig::default()).unwrap();

        let err = service.all_rewards(AggregationScope::AllHistory).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Engine(RewardError::InvalidAmount { customer_id: Some(1), .. })
        ));

        let err = service.customer_rewards(1).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Engine(RewardError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = RewardConfig {
            minimum_range: 150.0,
            ..RewardConfig::default()
        };
        let err = RewardService::new(Arc::new(InMemorySource::sample()), config).err();
        assert!(matches!(err, Some(RewardError::InvalidConfiguration(_))));

        let config = RewardConfig {
            points_per_dollar: f64::NAN,
            ..RewardConfig::default()
        };
        assert!(RewardService::new(Arc::new(InMemorySource::sample()), config).is_err());
    }

    #[test]
    fn test_source_failure() {
        let service = RewardService::new(Arc::new(FailingSource), RewardConfig::default()).unwrap();

        assert!(matches!(
            service.all_rewards(AggregationScope::AllHistory),
            Err(ServiceError::Source(_))
        ));
        assert!(matches!(service.customer_rewards(1), Err(ServiceError::Source(_))));
    }
}
