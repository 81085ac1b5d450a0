//! Meter revenue and commission calculation

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::types::*;

/// Round down to whole currency units
pub fn floor_amount(value: &BigDecimal) -> BigDecimal {
    // with_scale drops digits, which truncates toward zero
    let truncated = value.with_scale(0);
    if &truncated > value {
        truncated - BigDecimal::from(1)
    } else {
        truncated
    }
}

/// Check that a rate is a fraction in `[0, 1]`
pub fn validate_rate(rate: &BigDecimal) -> FieldOpsResult<()> {
    if *rate < BigDecimal::from(0) || *rate > BigDecimal::from(1) {
        return Err(FieldOpsError::Validation(format!(
            "Rate must be between 0 and 1, got {}",
            rate
        )));
    }
    Ok(())
}

/// Revenue derived from one pair of meter readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueBreakdown {
    pub previous_score: i64,
    pub current_score: i64,
    /// Units played, clamped at zero
    pub diff: i64,
    /// `diff × coin value`
    pub revenue: BigDecimal,
    /// Rate the commission was computed with
    pub commission_rate: BigDecimal,
    /// `floor(revenue × commission_rate)`
    pub commission: BigDecimal,
    /// Set when the readings look wrong
    pub anomaly: Option<MeterAnomaly>,
}

impl RevenueBreakdown {
    /// Calculate revenue and commission from two meter readings
    pub fn calculate(
        previous_score: i64,
        current_score: i64,
        coin_value: i64,
        commission_rate: BigDecimal,
    ) -> FieldOpsResult<Self> {
        validate_rate(&commission_rate)?;
        if previous_score < 0 || current_score < 0 {
            return Err(FieldOpsError::Validation(format!(
                "Meter readings cannot be negative, got {} -> {}",
                previous_score, current_score
            )));
        }
        if coin_value <= 0 {
            return Err(FieldOpsError::Validation(format!(
                "Coin value must be positive, got {}",
                coin_value
            )));
        }

        let (diff, anomaly) = meter_delta(previous_score, current_score);
        let revenue = BigDecimal::from(diff) * BigDecimal::from(coin_value);
        let commission = floor_amount(&(&revenue * &commission_rate));

        Ok(Self {
            previous_score,
            current_score,
            diff,
            revenue,
            commission_rate,
            commission,
            anomaly,
        })
    }

    pub fn is_rollback(&self) -> bool {
        matches!(self.anomaly, Some(MeterAnomaly::Rollback { .. }))
    }
}

/// Units played between two readings.
///
/// A counter never decreases in normal operation, so a negative delta is
/// clamped to zero and reported as a rollback.
pub fn meter_delta(previous_score: i64, current_score: i64) -> (i64, Option<MeterAnomaly>) {
    if current_score < previous_score {
        (
            0,
            Some(MeterAnomaly::Rollback {
                previous_score,
                current_score,
            }),
        )
    } else {
        (current_score.saturating_sub(previous_score), None)
    }
}

/// `revenue - owner_retention - expenses`, kept signed
pub fn net_payable(
    revenue: &BigDecimal,
    owner_retention: &BigDecimal,
    expenses: &BigDecimal,
) -> BigDecimal {
    revenue - owner_retention - expenses
}

/// Full money breakdown of a collection visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionCalculation {
    pub meter: RevenueBreakdown,
    pub owner_retention: BigDecimal,
    pub expenses: BigDecimal,
    pub coin_exchange: BigDecimal,
    pub net_payable: BigDecimal,
    /// Driver coins left after the visit: `float + revenue - retention - expenses - exchange`
    pub remaining_coins: BigDecimal,
    pub is_coin_stock_negative: bool,
}

/// Revenue calculation engine
#[derive(Debug, Clone)]
pub struct RevenueCalculator {
    coin_value: i64,
    default_profit_share: BigDecimal,
}

impl Default for RevenueCalculator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl RevenueCalculator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            coin_value: config.coin_value,
            default_profit_share: config.default_profit_share.clone(),
        }
    }

    pub fn coin_value(&self) -> i64 {
        self.coin_value
    }

    /// Calculate with an explicit commission rate
    pub fn calculate(
        &self,
        previous_score: i64,
        current_score: i64,
        commission_rate: BigDecimal,
    ) -> FieldOpsResult<RevenueBreakdown> {
        RevenueBreakdown::calculate(
            previous_score,
            current_score,
            self.coin_value,
            commission_rate,
        )
    }

    /// Calculate against a location's last reading and commission rate
    pub fn calculate_for_location(
        &self,
        location: &Location,
        current_score: i64,
    ) -> FieldOpsResult<RevenueBreakdown> {
        self.calculate(
            location.last_score,
            current_score,
            location.effective_commission_rate(&self.default_profit_share),
        )
    }

    /// Calculate the whole collection: retention, net payable and the driver's coin stock.
    ///
    /// `retention` of `None` means the owner keeps the computed commission.
    pub fn calculate_collection(
        &self,
        location: &Location,
        current_score: i64,
        retention: Option<BigDecimal>,
        expenses: BigDecimal,
        coin_exchange: BigDecimal,
        driver_float: &BigDecimal,
    ) -> FieldOpsResult<CollectionCalculation> {
        let meter = self.calculate_for_location(location, current_score)?;
        let owner_retention = retention.unwrap_or_else(|| meter.commission.clone());

        let net_payable = net_payable(&meter.revenue, &owner_retention, &expenses);
        let remaining_coins = driver_float + &meter.revenue
            - &owner_retention
            - &expenses
            - &coin_exchange;
        let is_coin_stock_negative = remaining_coins < BigDecimal::from(0);

        Ok(CollectionCalculation {
            meter,
            owner_retention,
            expenses,
            coin_exchange,
            net_payable,
            remaining_coins,
            is_coin_stock_negative,
        })
    }
}
