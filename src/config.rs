//! Engine configuration

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Tunable business constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Currency value of one meter unit (TZS)
    pub coin_value: i64,
    /// Site commission used when a location has no rate configured
    pub default_profit_share: BigDecimal,
    /// Share of gross pay that payroll may withhold against driver debt
    pub payroll_debt_cap_rate: BigDecimal,
    /// Base salary assigned to drivers registered without one
    pub default_base_salary: BigDecimal,
    /// Days without a collection before a machine counts as stagnant
    pub stagnant_days_threshold: i64,
    /// Driver debt above which a driver is flagged
    pub risky_debt_threshold: BigDecimal,
    /// Refuse collections whose meter went backwards instead of flagging them
    pub reject_meter_rollback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            coin_value: 200,
            default_profit_share: rate("0.15"),
            payroll_debt_cap_rate: rate("0.2"),
            default_base_salary: BigDecimal::from(300_000),
            stagnant_days_threshold: 7,
            risky_debt_threshold: BigDecimal::from(100_000),
            reject_meter_rollback: false,
        }
    }
}

impl EngineConfig {
    /// Build a config from `FIELDOPS_*` environment variables.
    ///
    /// Unset or unparsable variables keep their default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            coin_value: env_parse("FIELDOPS_COIN_VALUE").unwrap_or(defaults.coin_value),
            default_profit_share: env_parse("FIELDOPS_DEFAULT_PROFIT_SHARE")
                .unwrap_or(defaults.default_profit_share),
            payroll_debt_cap_rate: env_parse("FIELDOPS_PAYROLL_DEBT_CAP_RATE")
                .unwrap_or(defaults.payroll_debt_cap_rate),
            default_base_salary: env_parse("FIELDOPS_DEFAULT_BASE_SALARY")
                .unwrap_or(defaults.default_base_salary),
            stagnant_days_threshold: env_parse("FIELDOPS_STAGNANT_DAYS")
                .unwrap_or(defaults.stagnant_days_threshold),
            risky_debt_threshold: env_parse("FIELDOPS_RISKY_DEBT_THRESHOLD")
                .unwrap_or(defaults.risky_debt_threshold),
            reject_meter_rollback: env_parse("FIELDOPS_REJECT_METER_ROLLBACK")
                .unwrap_or(defaults.reject_meter_rollback),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

// Only called with literals.
fn rate(literal: &str) -> BigDecimal {
    BigDecimal::from_str(literal).unwrap_or_else(|_| BigDecimal::from(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_business_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.coin_value, 200);
        assert_eq!(config.default_profit_share, BigDecimal::from_str("0.15").unwrap());
        assert_eq!(config.payroll_debt_cap_rate, BigDecimal::from_str("0.2").unwrap());
        assert_eq!(config.stagnant_days_threshold, 7);
        assert!(!config.reject_meter_rollback);
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"coin_value": 500, "reject_meter_rollback": true}"#).unwrap();
        assert_eq!(config.coin_value, 500);
        assert!(config.reject_meter_rollback);
        assert_eq!(config.stagnant_days_threshold, 7);
    }
}
