//! Driver payroll statement

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calc::revenue::floor_amount;
use crate::config::EngineConfig;
use crate::types::*;

/// Salary breakdown for one driver over a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollStatement {
    pub driver_id: String,
    pub driver_name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Revenue collected by the driver in the period
    pub revenue: BigDecimal,
    /// Expenses filed by the driver in the period
    pub expenses: BigDecimal,
    pub base_salary: BigDecimal,
    pub commission_rate: BigDecimal,
    /// `floor(revenue × commission_rate)`
    pub commission: BigDecimal,
    /// Withheld against outstanding debt
    pub debt_deduction: BigDecimal,
    /// `base_salary + commission - debt_deduction`
    pub total: BigDecimal,
}

/// Payroll calculation engine
#[derive(Debug, Clone)]
pub struct PayrollCalculator {
    debt_cap_rate: BigDecimal,
}

impl Default for PayrollCalculator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl PayrollCalculator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            debt_cap_rate: config.payroll_debt_cap_rate.clone(),
        }
    }

    /// Compute a statement from the driver's transactions.
    ///
    /// Transactions outside `[start_date, end_date]` or belonging to other
    /// drivers are ignored.
    pub fn calculate(
        &self,
        driver: &Driver,
        transactions: &[Transaction],
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> PayrollStatement {
        let in_period: Vec<&Transaction> = transactions
            .iter()
            .filter(|tx| tx.driver_id == driver.id)
            .filter(|tx| start_date.is_none_or(|start| tx.business_date() >= start))
            .filter(|tx| end_date.is_none_or(|end| tx.business_date() <= end))
            .collect();

        let revenue: BigDecimal = in_period.iter().map(|tx| &tx.revenue).sum();
        let expenses: BigDecimal = in_period.iter().map(|tx| &tx.expenses).sum();

        let commission = floor_amount(&(&revenue * &driver.commission_rate));
        let gross = &driver.base_salary + &commission;
        let cap = floor_amount(&(&gross * &self.debt_cap_rate)).max(BigDecimal::from(0));
        let debt_deduction = driver.remaining_debt.clone().min(cap);
        let total = &gross - &debt_deduction;

        PayrollStatement {
            driver_id: driver.id.clone(),
            driver_name: driver.name.clone(),
            start_date,
            end_date,
            revenue,
            expenses,
            base_salary: driver.base_salary.clone(),
            commission_rate: driver.commission_rate.clone(),
            commission,
            debt_deduction,
            total,
        }
    }
}
