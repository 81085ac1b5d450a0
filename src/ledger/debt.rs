//! Driver loan and startup-capital balances

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::calc::ExpenseReview;
use crate::types::*;

/// Result of a capped recovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtRecovery {
    pub requested: BigDecimal,
    /// `min(outstanding, requested)`
    pub recovered: BigDecimal,
    /// Balance left after the recovery
    pub remaining: BigDecimal,
}

impl DebtRecovery {
    pub fn is_fully_applied(&self) -> bool {
        self.recovered == self.requested
    }
}

fn ensure_positive(amount: &BigDecimal, what: &str) -> FieldOpsResult<()> {
    if *amount <= BigDecimal::from(0) {
        return Err(FieldOpsError::Validation(format!(
            "{} must be positive, got {}",
            what, amount
        )));
    }
    Ok(())
}

fn capped(outstanding: &BigDecimal, requested: &BigDecimal) -> BigDecimal {
    outstanding
        .clone()
        .min(requested.clone())
        .max(BigDecimal::from(0))
}

/// Add to a driver's loan balance; returns the new balance
pub fn increase_driver_debt(
    driver: &mut Driver,
    amount: &BigDecimal,
) -> FieldOpsResult<BigDecimal> {
    if *amount < BigDecimal::from(0) {
        return Err(FieldOpsError::Validation(format!(
            "Debt increase cannot be negative, got {}",
            amount
        )));
    }
    driver.remaining_debt += amount;
    Ok(driver.remaining_debt.clone())
}

/// Apply the debt effect of a reviewed expense
pub fn apply_expense_review(
    driver: &mut Driver,
    review: &ExpenseReview,
) -> FieldOpsResult<BigDecimal> {
    if review.driver_id != driver.id {
        return Err(FieldOpsError::Validation(format!(
            "Expense on '{}' belongs to driver '{}', not '{}'",
            review.transaction_id, review.driver_id, driver.id
        )));
    }
    increase_driver_debt(driver, &review.debt_increase)
}

/// Take a repayment from a driver, capped at the outstanding balance
pub fn recover_driver_debt(
    driver: &mut Driver,
    requested: &BigDecimal,
) -> FieldOpsResult<DebtRecovery> {
    ensure_positive(requested, "Repayment")?;

    let recovered = capped(&driver.remaining_debt, requested);
    driver.remaining_debt -= &recovered;

    Ok(DebtRecovery {
        requested: requested.clone(),
        recovered,
        remaining: driver.remaining_debt.clone(),
    })
}

/// Recover startup capital from a location, capped at the outstanding balance
pub fn recover_startup_debt(
    location: &mut Location,
    requested: &BigDecimal,
) -> FieldOpsResult<DebtRecovery> {
    ensure_positive(requested, "Startup recovery")?;

    let recovered = capped(&location.remaining_startup_debt, requested);
    location.remaining_startup_debt -= &recovered;

    Ok(DebtRecovery {
        requested: requested.clone(),
        recovered,
        remaining: location.remaining_startup_debt.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::ExpenseDecision;

    fn driver(debt: i64) -> Driver {
        Driver::new("D1".to_string(), "Rajabu".to_string(), "rajabu".to_string())
            .with_debt(BigDecimal::from(debt))
    }

    #[test]
    fn test_recovery_is_capped() {
        let mut d = driver(3000);

        let recovery = recover_driver_debt(&mut d, &BigDecimal::from(5000)).unwrap();
        assert_eq!(recovery.recovered, BigDecimal::from(3000));
        assert_eq!(recovery.remaining, BigDecimal::from(0));
        assert!(!recovery.is_fully_applied());
        assert_eq!(d.remaining_debt, BigDecimal::from(0));

        let again = recover_driver_debt(&mut d, &BigDecimal::from(100)).unwrap();
        assert_eq!(again.recovered, BigDecimal::from(0));
        assert_eq!(d.remaining_debt, BigDecimal::from(0));
    }

    #[test]
    fn test_non_positive_recovery_is_rejected() {
        let mut d = driver(3000);
        assert!(recover_driver_debt(&mut d, &BigDecimal::from(0)).is_err());
        assert!(recover_driver_debt(&mut d, &BigDecimal::from(-10)).is_err());
        assert_eq!(d.remaining_debt, BigDecimal::from(3000));
    }

    #[test]
    fn test_startup_recovery() {
        let mut location = Location::new(
            "L1".to_string(),
            "Duka".to_string(),
            "M-01".to_string(),
            BigDecimal::from(0),
        )
        .with_startup_debt(BigDecimal::from(100_000));

        let recovery = recover_startup_debt(&mut location, &BigDecimal::from(40_000)).unwrap();
        assert_eq!(recovery.remaining, BigDecimal::from(60_000));
        assert_eq!(location.recovered_startup_debt(), BigDecimal::from(40_000));

        recover_startup_debt(&mut location, &BigDecimal::from(90_000)).unwrap();
        assert!(location.is_startup_debt_cleared());
        assert!(location.remaining_startup_debt <= location.initial_startup_debt);
    }

    #[test]
    fn test_debt_never_negative_across_sequences() {
        let mut d = driver(0);
        let review = ExpenseReview {
            transaction_id: "tx1".to_string(),
            driver_id: "D1".to_string(),
            expense_type: ExpenseType::Public,
            decision: ExpenseDecision::Reject,
            status: ExpenseStatus::Rejected,
            amount: BigDecimal::from(2000),
            debt_increase: BigDecimal::from(2000),
        };

        apply_expense_review(&mut d, &review).unwrap();
        for requested in [500, 10_000, 1, 7] {
            recover_driver_debt(&mut d, &BigDecimal::from(requested)).unwrap();
            assert!(d.remaining_debt >= BigDecimal::from(0));
        }
        assert_eq!(d.remaining_debt, BigDecimal::from(0));
    }

    #[test]
    fn test_review_for_other_driver_is_rejected() {
        let mut d = driver(0);
        let review = ExpenseReview {
            transaction_id: "tx1".to_string(),
            driver_id: "D2".to_string(),
            expense_type: ExpenseType::Private,
            decision: ExpenseDecision::Approve,
            status: ExpenseStatus::Approved,
            amount: BigDecimal::from(2000),
            debt_increase: BigDecimal::from(2000),
        };
        assert!(apply_expense_review(&mut d, &review).is_err());
    }
}
