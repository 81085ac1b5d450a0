//! Daily cash settlement reconciliation
//!
//! A driver's expected cash for the day is the sum of net payable across the
//! day's collections plus the float issued in the morning. The declared cash
//! and coins are compared against it; any difference is reported but never
//! blocks the submission. Judgment is left to the admin confirmation step.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::*;

/// Aggregated figures for one driver and day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTotals {
    pub driver_id: String,
    pub date: NaiveDate,
    /// Revenue across the day's collections
    pub total_revenue: BigDecimal,
    /// Public expenses filed that day, collections and standalone claims alike
    pub total_public_expenses: BigDecimal,
    /// Net payable across the day's collections
    pub total_net_payable: BigDecimal,
    pub collection_count: usize,
}

/// How declared cash compares with the expected total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettlementOutcome {
    /// Declared cash matches exactly
    Perfect,
    /// Cash is missing by this (positive) amount
    Shortage(BigDecimal),
    /// Extra cash of this (positive) amount
    Surplus(BigDecimal),
}

impl SettlementOutcome {
    /// Classify a signed `actual - expected` difference
    pub fn from_difference(difference: &BigDecimal) -> Self {
        let zero = BigDecimal::from(0);
        if *difference == zero {
            SettlementOutcome::Perfect
        } else if *difference < zero {
            SettlementOutcome::Shortage(-difference.clone())
        } else {
            SettlementOutcome::Surplus(difference.clone())
        }
    }

    pub fn is_perfect(&self) -> bool {
        matches!(self, SettlementOutcome::Perfect)
    }
}

impl DailySettlement {
    pub fn outcome(&self) -> SettlementOutcome {
        SettlementOutcome::from_difference(&self.shortage)
    }
}

/// Admin confirming a settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer {
    pub id: String,
    pub name: String,
}

impl Reviewer {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Settlement reconciliation engine
#[derive(Debug, Clone, Copy, Default)]
pub struct SettlementReconciler;

impl SettlementReconciler {
    pub fn new() -> Self {
        Self
    }

    /// Aggregate a driver's transactions for one business day.
    ///
    /// Transactions of other drivers or days are skipped, so the caller may
    /// pass a wider slice.
    pub fn summarize_day(
        &self,
        driver_id: &str,
        date: NaiveDate,
        transactions: &[Transaction],
    ) -> DailyTotals {
        let todays: Vec<&Transaction> = transactions
            .iter()
            .filter(|tx| tx.driver_id == driver_id && tx.business_date() == date)
            .collect();

        let collections = todays.iter().filter(|tx| tx.is_collection());

        let total_revenue: BigDecimal = collections.clone().map(|tx| &tx.revenue).sum();
        let total_net_payable: BigDecimal = collections.clone().map(|tx| &tx.net_payable).sum();
        let total_public_expenses: BigDecimal =
            todays.iter().map(|tx| tx.public_expense_amount()).sum();

        DailyTotals {
            driver_id: driver_id.to_string(),
            date,
            total_revenue,
            total_public_expenses,
            total_net_payable,
            collection_count: collections.count(),
        }
    }

    /// `Σ net_payable + float`
    pub fn expected_total(&self, totals: &DailyTotals, driver_float: &BigDecimal) -> BigDecimal {
        &totals.total_net_payable + driver_float
    }

    /// `(actual_cash + actual_coins) - expected_total`
    pub fn shortage(
        &self,
        actual_cash: &BigDecimal,
        actual_coins: &BigDecimal,
        expected_total: &BigDecimal,
    ) -> BigDecimal {
        actual_cash + actual_coins - expected_total
    }

    /// Float of every active driver, for fleet-wide reconciliation
    pub fn fleet_float(&self, drivers: &[Driver]) -> BigDecimal {
        drivers
            .iter()
            .filter(|d| d.is_active())
            .map(|d| &d.daily_floating_coins)
            .sum()
    }

    /// Build the pending settlement a driver submits at day end
    pub fn reconcile(
        &self,
        driver: &Driver,
        totals: &DailyTotals,
        actual_cash: BigDecimal,
        actual_coins: BigDecimal,
    ) -> DailySettlement {
        let driver_float = driver.daily_floating_coins.clone();
        let expected_total = self.expected_total(totals, &driver_float);
        let shortage = self.shortage(&actual_cash, &actual_coins, &expected_total);

        DailySettlement {
            id: uuid::Uuid::new_v4().to_string(),
            date: totals.date,
            driver_id: driver.id.clone(),
            driver_name: driver.name.clone(),
            total_revenue: totals.total_revenue.clone(),
            total_net_payable: totals.total_net_payable.clone(),
            total_expenses: totals.total_public_expenses.clone(),
            driver_float,
            expected_total,
            actual_cash,
            actual_coins,
            shortage,
            note: None,
            transfer_proof_url: None,
            admin_id: None,
            admin_name: None,
            status: SettlementStatus::Pending,
            timestamp: chrono::Utc::now().naive_utc(),
        }
    }

    /// Confirm a pending settlement.
    ///
    /// The reviewer may correct the declared cash or coins after counting;
    /// the shortage is recomputed against the original expected total.
    pub fn confirm(
        &self,
        settlement: &DailySettlement,
        reviewer: &Reviewer,
        counted_cash: Option<BigDecimal>,
        counted_coins: Option<BigDecimal>,
    ) -> FieldOpsResult<DailySettlement> {
        if settlement.is_confirmed() {
            return Err(FieldOpsError::InvalidTransition(format!(
                "Settlement '{}' is already confirmed",
                settlement.id
            )));
        }

        let mut confirmed = settlement.clone();
        if let Some(cash) = counted_cash {
            confirmed.actual_cash = cash;
        }
        if let Some(coins) = counted_coins {
            confirmed.actual_coins = coins;
        }
        confirmed.shortage = self.shortage(
            &confirmed.actual_cash,
            &confirmed.actual_coins,
            &confirmed.expected_total,
        );
        confirmed.admin_id = Some(reviewer.id.clone());
        confirmed.admin_name = Some(reviewer.name.clone());
        confirmed.status = SettlementStatus::Confirmed;
        confirmed.timestamp = chrono::Utc::now().naive_utc();

        Ok(confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn tx(id: &str, driver_id: &str, date: NaiveDate, kind: TransactionKind) -> Transaction {
        Transaction::new(
            id.to_string(),
            date.and_hms_opt(12, 0, 0).unwrap(),
            "L1".to_string(),
            driver_id.to_string(),
            kind,
        )
    }

    fn driver() -> Driver {
        Driver::new("D1".to_string(), "Nudin".to_string(), "nudin".to_string())
            .with_float(BigDecimal::from(10000))
    }

    #[test]
    fn test_worked_example_shortage() {
        let reconciler = SettlementReconciler::new();
        let mut collection = tx("t1", "D1", day(), TransactionKind::Collection);
        collection.revenue = BigDecimal::from(50000);
        collection.net_payable = BigDecimal::from(42500);

        let totals = reconciler.summarize_day("D1", day(), &[collection]);
        let settlement = reconciler.reconcile(
            &driver(),
            &totals,
            BigDecimal::from(50000),
            BigDecimal::from(2000),
        );

        assert_eq!(settlement.expected_total, BigDecimal::from(52500));
        assert_eq!(settlement.shortage, BigDecimal::from(-500));
        assert_eq!(settlement.status, SettlementStatus::Pending);
        assert_eq!(
            settlement.outcome(),
            SettlementOutcome::Shortage(BigDecimal::from(500))
        );
    }

    #[test]
    fn test_perfect_settlement() {
        let reconciler = SettlementReconciler::new();
        let totals = reconciler.summarize_day("D1", day(), &[]);
        let settlement = reconciler.reconcile(
            &driver(),
            &totals,
            BigDecimal::from(4000),
            BigDecimal::from(6000),
        );

        assert!(settlement.is_balanced());
        assert!(settlement.outcome().is_perfect());
    }

    #[test]
    fn test_summary_skips_other_days_drivers_and_expense_claims() {
        let reconciler = SettlementReconciler::new();
        let other_day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();

        let mut today = tx("t1", "D1", day(), TransactionKind::Collection);
        today.revenue = BigDecimal::from(1000);
        today.net_payable = BigDecimal::from(800);
        today.expenses = BigDecimal::from(50);
        today.expense_type = Some(ExpenseType::Public);

        let mut claim = tx("t2", "D1", day(), TransactionKind::Expense);
        claim.expenses = BigDecimal::from(300);
        claim.expense_type = Some(ExpenseType::Public);
        claim.net_payable = BigDecimal::from(-300);

        let mut private_claim = tx("t3", "D1", day(), TransactionKind::Expense);
        private_claim.expenses = BigDecimal::from(700);
        private_claim.expense_type = Some(ExpenseType::Private);

        let mut yesterday = tx("t4", "D1", other_day, TransactionKind::Collection);
        yesterday.net_payable = BigDecimal::from(9999);

        let mut someone_else = tx("t5", "D2", day(), TransactionKind::Collection);
        someone_else.net_payable = BigDecimal::from(9999);

        let totals = reconciler.summarize_day(
            "D1",
            day(),
            &[today, claim, private_claim, yesterday, someone_else],
        );

        assert_eq!(totals.collection_count, 1);
        assert_eq!(totals.total_revenue, BigDecimal::from(1000));
        assert_eq!(totals.total_net_payable, BigDecimal::from(800));
        assert_eq!(totals.total_public_expenses, BigDecimal::from(350));
    }

    #[test]
    fn test_confirm_recomputes_and_locks() {
        let reconciler = SettlementReconciler::new();
        let totals = reconciler.summarize_day("D1", day(), &[]);
        let pending = reconciler.reconcile(
            &driver(),
            &totals,
            BigDecimal::from(9000),
            BigDecimal::from(0),
        );
        assert_eq!(
            pending.outcome(),
            SettlementOutcome::Shortage(BigDecimal::from(1000))
        );

        let admin = Reviewer::new("ADMIN", "Jack");
        let confirmed = reconciler
            .confirm(&pending, &admin, Some(BigDecimal::from(10500)), None)
            .unwrap();

        assert!(confirmed.is_confirmed());
        assert_eq!(confirmed.shortage, BigDecimal::from(500));
        assert_eq!(
            confirmed.outcome(),
            SettlementOutcome::Surplus(BigDecimal::from(500))
        );
        assert_eq!(confirmed.admin_name.as_deref(), Some("Jack"));
        assert_eq!(confirmed.expected_total, pending.expected_total);

        assert!(matches!(
            reconciler.confirm(&confirmed, &admin, None, None),
            Err(FieldOpsError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_fleet_float_counts_active_drivers() {
        let reconciler = SettlementReconciler::new();
        let mut inactive = Driver::new("D2".to_string(), "B".to_string(), "b".to_string())
            .with_float(BigDecimal::from(5000));
        inactive.status = DriverStatus::Inactive;

        let float = reconciler.fleet_float(&[driver(), inactive]);
        assert_eq!(float, BigDecimal::from(10000));
    }
}
