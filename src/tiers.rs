// 🎯 Tier Calculator - one purchase amount in, points out
//
// Three tiers, driven entirely by RewardConfig:
//   amount <= minimum_range                  -> 0
//   minimum_range < amount <= maximum_range  -> trunc(amount - minimum_range)
//   amount > maximum_range                   -> trunc((amount - maximum_range) * points_per_dollar)
//                                               + trunc(minimum_range)

use crate::config::RewardConfig;
use crate::error::RewardError;
use crate::transaction::{CustomerId, Transaction};

/// Which amount range a purchase falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// At or below `minimum_range`
    Base,
    /// Above `minimum_range`, at or below `maximum_range`
    Standard,
    /// Above `maximum_range`
    Premium,
}

pub struct TierCalculator<'a> {
    config: &'a RewardConfig,
}

impl<'a> TierCalculator<'a> {
    pub fn new(config: &'a RewardConfig) -> Self {
        TierCalculator { config }
    }

    pub fn tier(&self, amount: f64) -> Tier {
        if amount > self.config.maximum_range {
            Tier::Premium
        } else if amount > self.config.minimum_range {
            Tier::Standard
        } else {
            Tier::Base
        }
    }

    /// Points earned by a single amount. Fractional dollars are discarded.
    pub fn points(&self, amount: f64) -> Result<i64, RewardError> {
        self.points_for(None, amount)
    }

    /// Points for a transaction, validating its amount first
    pub fn transaction_points(&self, tx: &Transaction) -> Result<i64, RewardError> {
        self.points_for(Some(tx.customer_id), tx.amount)
    }

    fn points_for(&self, customer_id: Option<CustomerId>, amount: f64) -> Result<i64, RewardError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(RewardError::InvalidAmount {
                customer_id,
                amount,
            });
        }

        let overflow = || RewardError::PointsOverflow {
            customer_id,
            amount,
        };

        let tier = self.tier(amount);
        let points = match tier {
            Tier::Premium => {
                let over = (amount - self.config.maximum_range) * self.config.points_per_dollar;
                whole_points(over)
                    .and_then(|p| p.checked_add(whole_points(self.config.minimum_range)?))
                    .ok_or_else(overflow)?
            }
            Tier::Standard => whole_points(amount - self.config.minimum_range).ok_or_else(overflow)?,
            Tier::Base => 0,
        };

        tracing::debug!(amount, ?tier, points, "scored amount");
        Ok(points)
    }
}

/// Truncate to whole points, `None` when the value does not fit in an `i64`
fn whole_points(value: f64) -> Option<i64> {
    let whole = value.trunc();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if whole.is_finite() && whole >= i64::MIN as f64 && whole < i64::MAX as f64 {
        Some(whole as i64)
    } else {
        None
    }
}

/// Convenience wrapper around [`TierCalculator::points`]
pub fn points(amount: f64, config: &RewardConfig) -> Result<i64, RewardError> {
    TierCalculator::new(config).points(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc_points(amount: f64) -> i64 {
        points(amount, &RewardConfig::default()).unwrap()
    }

    #[test]
    fn test_reference_amounts() {
        assert_eq!(calc_points(120.0), 90);
        assert_eq!(calc_points(60.0), 10);
        assert_eq!(calc_points(75.0), 25);
        assert_eq!(calc_points(200.0), 250);
        assert_eq!(calc_points(110.0), 70);
        assert_eq!(calc_points(40.0), 0);
    }

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(calc_points(0.0), 0);
        assert_eq!(calc_points(50.0), 0);
        assert_eq!(calc_points(50.5), 0);
        assert_eq!(calc_points(51.0), 1);
        assert_eq!(calc_points(100.0), 50);
        assert_eq!(calc_points(101.0), 52);
    }

    #[test]
    fn test_fractional_dollars_truncated() {
        // 0.9 over the threshold doubles to 1.8 -> 1 point
        assert_eq!(calc_points(100.9), 51);
        assert_eq!(calc_points(99.99), 49);
        assert_eq!(calc_points(120.75), 91);
    }

    #[test]
    fn test_negative_amount_is_invalid() {
        let err = points(-10.0, &RewardConfig::default()).unwrap_err();
        assert_eq!(
            err,
            RewardError::InvalidAmount {
                customer_id: None,
                amount: -10.0
            }
        );

        assert!(points(f64::NAN, &RewardConfig::default()).is_err());
    }

    #[test]
    fn test_transaction_points_reports_customer() {
        let config = RewardConfig::default();
        let calc = TierCalculator::new(&config);
        let tx = Transaction::new(9, -5.0, chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        assert_eq!(
            calc.transaction_points(&tx),
            Err(RewardError::InvalidAmount {
                customer_id: Some(9),
                amount: -5.0
            })
        );
    }

    #[test]
    fn test_tiers_follow_configuration() {
        let config = RewardConfig {
            points_per_dollar: 3.0,
            minimum_range: 20.0,
            maximum_range: 40.0,
            time_period_months: 1,
        };
        let calc = TierCalculator::new(&config);

        assert_eq!(calc.tier(20.0), Tier::Base);
        assert_eq!(calc.tier(30.0), Tier::Standard);
        assert_eq!(calc.tier(40.01), Tier::Premium);

        assert_eq!(calc.points(30.0).unwrap(), 10);
        assert_eq!(calc.points(50.0).unwrap(), 30 + 20);
    }

    #[test]
    fn test_points_monotonic() {
        let config = RewardConfig::default();
        let calc = TierCalculator::new(&config);

        let mut previous = 0;
        for cents in 0..50_000 {
            let amount = cents as f64 / 100.0;
            let current = calc.points(amount).unwrap();
            assert!(
                current >= previous,
                "points dropped at {amount}: {previous} -> {current}"
            );
            previous = current;
        }
    }

    #[test]
    fn test_huge_amount_overflows_instead_of_wrapping() {
        let err = points(1e300, &RewardConfig::default()).unwrap_err();
        assert_eq!(
            err,
            RewardError::PointsOverflow {
                customer_id: None,
                amount: 1e300
            }
        );

        // large amounts that still fit keep scoring normally
        assert_eq!(calc_points(1e15), 2 * (1e15 as i64 - 100) + 50);
    }

    #[test]
    fn test_whole_points_range() {
        assert_eq!(whole_points(12.9), Some(12));
        assert_eq!(whole_points(4e18), Some(4_000_000_000_000_000_000));
        assert_eq!(whole_points(i64::MAX as f64), None);
        assert_eq!(whole_points(f64::INFINITY), None);
        assert_eq!(whole_points(f64::NAN), None);
    }
}
