//! Collection recording and expense review

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::calc::*;
use crate::config::EngineConfig;
use crate::ledger::debt::{self, DebtRecovery};
use crate::traits::*;
use crate::types::*;

/// Builder for a collection visit
#[derive(Debug, Clone)]
pub struct CollectionBuilder {
    id: Option<String>,
    timestamp: Option<NaiveDateTime>,
    location_id: String,
    driver_id: String,
    current_score: i64,
    owner_retains: bool,
    retention: Option<BigDecimal>,
    expenses: BigDecimal,
    expense_type: ExpenseType,
    expense_category: ExpenseCategory,
    expense_description: Option<String>,
    coin_exchange: BigDecimal,
    debt_deduction: BigDecimal,
    startup_debt_deduction: BigDecimal,
    notes: Option<String>,
    reported_status: Option<LocationStatus>,
}

impl CollectionBuilder {
    /// Start a collection at a location with the reading shown on the meter
    pub fn new(location_id: String, driver_id: String, current_score: i64) -> Self {
        Self {
            id: None,
            timestamp: None,
            location_id,
            driver_id,
            current_score,
            owner_retains: true,
            retention: None,
            expenses: BigDecimal::from(0),
            expense_type: ExpenseType::Public,
            expense_category: ExpenseCategory::Fuel,
            expense_description: None,
            coin_exchange: BigDecimal::from(0),
            debt_deduction: BigDecimal::from(0),
            startup_debt_deduction: BigDecimal::from(0),
            notes: None,
            reported_status: None,
        }
    }

    /// Use a fixed ID instead of a generated one
    pub fn id(mut self, id: String) -> Self {
        self.id = Some(id);
        self
    }

    /// Record the visit at a specific time instead of now
    pub fn at(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Whether the site owner keeps their commission on site (default: yes)
    pub fn owner_retains(mut self, retains: bool) -> Self {
        self.owner_retains = retains;
        self
    }

    /// Override the amount the owner kept
    pub fn retention(mut self, amount: BigDecimal) -> Self {
        self.retention = Some(amount);
        self
    }

    /// Attach an expense paid out of today's takings
    pub fn expense(
        mut self,
        amount: BigDecimal,
        expense_type: ExpenseType,
        category: ExpenseCategory,
    ) -> Self {
        self.expenses = amount;
        self.expense_type = expense_type;
        self.expense_category = category;
        self
    }

    pub fn expense_description(mut self, description: String) -> Self {
        self.expense_description = Some(description);
        self
    }

    pub fn coin_exchange(mut self, amount: BigDecimal) -> Self {
        self.coin_exchange = amount;
        self
    }

    /// Driver loan repayment taken with this collection
    pub fn debt_deduction(mut self, amount: BigDecimal) -> Self {
        self.debt_deduction = amount;
        self
    }

    /// Startup capital recovered from this collection
    pub fn startup_debt_deduction(mut self, amount: BigDecimal) -> Self {
        self.startup_debt_deduction = amount;
        self
    }

    pub fn notes(mut self, notes: String) -> Self {
        self.notes = Some(notes);
        self
    }

    /// Machine condition observed on site
    pub fn reported_status(mut self, status: LocationStatus) -> Self {
        self.reported_status = Some(status);
        self
    }

    /// Compute all amounts against the location and driver and build the transaction
    pub fn build(
        self,
        location: &Location,
        driver: &Driver,
        calculator: &RevenueCalculator,
    ) -> FieldOpsResult<(Transaction, CollectionCalculation)> {
        if location.id != self.location_id {
            return Err(FieldOpsError::Validation(format!(
                "Collection is for location '{}', got '{}'",
                self.location_id, location.id
            )));
        }
        if driver.id != self.driver_id {
            return Err(FieldOpsError::Validation(format!(
                "Collection is for driver '{}', got '{}'",
                self.driver_id, driver.id
            )));
        }

        let retention = if self.owner_retains {
            self.retention
        } else {
            Some(BigDecimal::from(0))
        };

        let calculation = calculator.calculate_collection(
            location,
            self.current_score,
            retention,
            self.expenses.clone(),
            self.coin_exchange.clone(),
            &driver.daily_floating_coins,
        )?;

        let mut transaction = Transaction::new(
            self.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            self.timestamp
                .unwrap_or_else(|| chrono::Utc::now().naive_utc()),
            self.location_id,
            self.driver_id,
            TransactionKind::Collection,
        );
        transaction.location_name = location.name.clone();
        transaction.previous_score = calculation.meter.previous_score;
        transaction.current_score = calculation.meter.current_score;
        transaction.revenue = calculation.meter.revenue.clone();
        transaction.commission = calculation.meter.commission.clone();
        transaction.owner_retention = calculation.owner_retention.clone();
        transaction.expenses = calculation.expenses.clone();
        transaction.coin_exchange = calculation.coin_exchange.clone();
        transaction.net_payable = calculation.net_payable.clone();
        transaction.debt_deduction = self.debt_deduction;
        transaction.startup_debt_deduction = self.startup_debt_deduction;
        transaction.meter_anomaly = calculation.meter.anomaly.clone();
        transaction.notes = self.notes;
        transaction.reported_status = self.reported_status;

        if transaction.has_expense() {
            transaction.expense_type = Some(self.expense_type);
            transaction.expense_category = Some(self.expense_category);
            transaction.expense_status = Some(ExpenseStatus::Pending);
            transaction.expense_description = self.expense_description;
        }

        Ok((transaction, calculation))
    }
}

/// Everything that happened when a collection was recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionReceipt {
    pub transaction: Transaction,
    pub calculation: CollectionCalculation,
    pub debt_recovery: Option<DebtRecovery>,
    pub startup_recovery: Option<DebtRecovery>,
}

/// Transaction manager for collections and expense claims
pub struct TransactionManager<S: FieldOpsStorage> {
    pub(crate) storage: S,
    validator: Box<dyn CollectionValidator>,
    classifier: ExpenseClassifier,
    calculator: RevenueCalculator,
    reject_meter_rollback: bool,
}

impl<S: FieldOpsStorage> TransactionManager<S> {
    /// Create a new transaction manager
    pub fn new(storage: S, config: &EngineConfig) -> Self {
        Self::with_validator(storage, config, Box::new(DefaultCollectionValidator))
    }

    /// Create a new transaction manager with a custom validator
    pub fn with_validator(
        storage: S,
        config: &EngineConfig,
        validator: Box<dyn CollectionValidator>,
    ) -> Self {
        Self {
            storage,
            validator,
            classifier: ExpenseClassifier::new(),
            calculator: RevenueCalculator::new(config),
            reject_meter_rollback: config.reject_meter_rollback,
        }
    }

    /// Replace the expense approval policy
    pub fn set_expense_policy(&mut self, policy: Box<dyn ExpensePolicy>) {
        self.classifier = ExpenseClassifier::with_policy(policy);
    }

    pub fn calculator(&self) -> &RevenueCalculator {
        &self.calculator
    }

    /// Record a collection visit.
    ///
    /// Updates the location's meter baseline, applies any debt deductions
    /// (capped at the outstanding balances) and stores the transaction.
    pub async fn record_collection(
        &mut self,
        builder: CollectionBuilder,
    ) -> FieldOpsResult<CollectionReceipt> {
        let mut location = self
            .storage
            .get_location(&builder.location_id)
            .await?
            .ok_or_else(|| FieldOpsError::LocationNotFound(builder.location_id.clone()))?;
        let mut driver = self
            .storage
            .get_driver(&builder.driver_id)
            .await?
            .ok_or_else(|| FieldOpsError::DriverNotFound(builder.driver_id.clone()))?;

        let (mut transaction, calculation) = builder.build(&location, &driver, &self.calculator)?;

        if let Some(MeterAnomaly::Rollback {
            previous_score,
            current_score,
        }) = transaction.meter_anomaly
        {
            if self.reject_meter_rollback {
                return Err(FieldOpsError::MeterRollback {
                    location_id: location.id.clone(),
                    previous_score,
                    current_score,
                });
            }
            warn!(
                location_id = %location.id,
                machine_id = %location.machine_id,
                previous_score,
                current_score,
                "Meter reading went backwards, revenue clamped to zero"
            );
        }

        self.validator.validate_transaction(&transaction)?;

        if calculation.is_coin_stock_negative {
            warn!(
                driver_id = %driver.id,
                remaining_coins = %calculation.remaining_coins,
                "Driver coin stock is negative after collection"
            );
        }

        let debt_recovery = if transaction.debt_deduction > BigDecimal::from(0) {
            let recovery = debt::recover_driver_debt(&mut driver, &transaction.debt_deduction)?;
            transaction.debt_deduction = recovery.recovered.clone();
            Some(recovery)
        } else {
            None
        };

        let startup_recovery = if transaction.startup_debt_deduction > BigDecimal::from(0) {
            let recovery =
                debt::recover_startup_debt(&mut location, &transaction.startup_debt_deduction)?;
            transaction.startup_debt_deduction = recovery.recovered.clone();
            Some(recovery)
        } else {
            None
        };

        location.last_score = transaction.current_score;
        location.last_revenue_date = Some(transaction.business_date());
        if let Some(status) = transaction.reported_status {
            location.status = status;
        }
        driver.last_active = Some(transaction.timestamp);

        self.storage.save_transaction(&transaction).await?;
        self.storage.update_location(&location).await?;
        self.storage.update_driver(&driver).await?;

        info!(
            transaction_id = %transaction.id,
            location_id = %location.id,
            driver_id = %driver.id,
            diff = calculation.meter.diff,
            revenue = %transaction.revenue,
            net_payable = %transaction.net_payable,
            "Collection recorded"
        );

        Ok(CollectionReceipt {
            transaction,
            calculation,
            debt_recovery,
            startup_recovery,
        })
    }

    /// Record a standalone expense claim
    pub async fn record_expense_claim(&mut self, transaction: Transaction) -> FieldOpsResult<()> {
        if transaction.kind != TransactionKind::Expense {
            return Err(FieldOpsError::Validation(
                "Expense claims must have the expense kind".to_string(),
            ));
        }
        if !transaction.has_expense() {
            return Err(FieldOpsError::Validation(
                "Expense claim amount must be positive".to_string(),
            ));
        }
        if self.storage.get_driver(&transaction.driver_id).await?.is_none() {
            return Err(FieldOpsError::DriverNotFound(transaction.driver_id.clone()));
        }

        self.validator.validate_transaction(&transaction)?;
        self.storage.save_transaction(&transaction).await?;

        debug!(
            transaction_id = %transaction.id,
            driver_id = %transaction.driver_id,
            amount = %transaction.expenses,
            "Expense claim recorded"
        );
        Ok(())
    }

    /// Approve or reject a pending expense and apply its debt effect
    pub async fn review_expense(
        &mut self,
        transaction_id: &str,
        decision: ExpenseDecision,
    ) -> FieldOpsResult<ExpenseReview> {
        let mut transaction = self.get_transaction_required(transaction_id).await?;
        let review = self.classifier.review(&transaction, decision)?;

        let mut driver = self
            .storage
            .get_driver(&transaction.driver_id)
            .await?
            .ok_or_else(|| FieldOpsError::DriverNotFound(transaction.driver_id.clone()))?;

        let balance = debt::apply_expense_review(&mut driver, &review)?;
        transaction.expense_status = Some(review.status);

        self.storage.update_transaction(&transaction).await?;
        self.storage.update_driver(&driver).await?;

        info!(
            transaction_id = %transaction.id,
            driver_id = %driver.id,
            decision = ?decision,
            debt_increase = %review.debt_increase,
            remaining_debt = %balance,
            "Expense reviewed"
        );

        Ok(review)
    }

    /// Get a transaction by ID
    pub async fn get_transaction(
        &self,
        transaction_id: &str,
    ) -> FieldOpsResult<Option<Transaction>> {
        self.storage.get_transaction(transaction_id).await
    }

    /// Get a transaction by ID, returning an error if not found
    pub async fn get_transaction_required(
        &self,
        transaction_id: &str,
    ) -> FieldOpsResult<Transaction> {
        self.storage
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| FieldOpsError::TransactionNotFound(transaction_id.to_string()))
    }

    /// List transactions matching a filter
    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> FieldOpsResult<Vec<Transaction>> {
        self.storage.list_transactions(filter).await
    }

    /// Expenses waiting for an admin decision
    pub async fn pending_expenses(&self) -> FieldOpsResult<Vec<Transaction>> {
        let all = self
            .storage
            .list_transactions(&TransactionFilter::default())
            .await?;
        Ok(all.into_iter().filter(|tx| tx.is_expense_pending()).collect())
    }

    /// Transactions not yet acknowledged by the remote store
    pub async fn unsynced(&self) -> FieldOpsResult<Vec<Transaction>> {
        let all = self
            .storage
            .list_transactions(&TransactionFilter::default())
            .await?;
        Ok(all.into_iter().filter(|tx| !tx.is_synced).collect())
    }

    /// Flag a transaction as synchronized
    pub async fn mark_synced(&mut self, transaction_id: &str) -> FieldOpsResult<()> {
        let mut transaction = self.get_transaction_required(transaction_id).await?;
        if transaction.is_synced {
            return Ok(());
        }
        transaction.is_synced = true;
        self.storage.update_transaction(&transaction).await
    }
}

/// Common transaction patterns
pub mod patterns {
    use super::*;

    /// Create a standalone expense claim.
    ///
    /// The claim does not count toward the day's collections; its net
    /// payable is the negated amount.
    pub fn create_expense_claim(
        driver_id: String,
        location_id: Option<String>,
        timestamp: NaiveDateTime,
        amount: BigDecimal,
        expense_type: ExpenseType,
        category: ExpenseCategory,
        description: Option<String>,
    ) -> FieldOpsResult<Transaction> {
        if amount <= BigDecimal::from(0) {
            return Err(FieldOpsError::Validation(
                "Expense claim amount must be positive".to_string(),
            ));
        }

        let mut transaction = Transaction::new(
            uuid::Uuid::new_v4().to_string(),
            timestamp,
            location_id.unwrap_or_default(),
            driver_id,
            TransactionKind::Expense,
        );
        transaction.net_payable = -amount.clone();
        transaction.expenses = amount;
        transaction.expense_type = Some(expense_type);
        transaction.expense_category = Some(category);
        transaction.expense_status = Some(ExpenseStatus::Pending);
        transaction.expense_description = description;
        Ok(transaction)
    }

    /// Collection where the owner hands everything over
    pub fn full_handover(
        location_id: String,
        driver_id: String,
        current_score: i64,
    ) -> CollectionBuilder {
        CollectionBuilder::new(location_id, driver_id, current_score).owner_retains(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    async fn seeded() -> TransactionManager<MemoryStorage> {
        let mut storage = MemoryStorage::new();
        let location = Location::new(
            "L1".to_string(),
            "Mama Ntilie".to_string(),
            "M-01".to_string(),
            BigDecimal::from_str("0.15").unwrap(),
        )
        .with_last_score(1000)
        .with_startup_debt(BigDecimal::from(20000));
        let driver = Driver::new("D1".to_string(), "Nudin".to_string(), "nudin".to_string())
            .with_float(BigDecimal::from(10000))
            .with_debt(BigDecimal::from(5000));
        storage.save_location(&location).await.unwrap();
        storage.save_driver(&driver).await.unwrap();
        TransactionManager::new(storage, &EngineConfig::default())
    }

    #[tokio::test]
    async fn test_record_collection_updates_baseline() {
        let mut manager = seeded().await;

        let receipt = manager
            .record_collection(
                CollectionBuilder::new("L1".to_string(), "D1".to_string(), 1250).at(at(1)),
            )
            .await
            .unwrap();

        assert_eq!(receipt.transaction.revenue, BigDecimal::from(50000));
        assert_eq!(receipt.transaction.commission, BigDecimal::from(7500));
        assert_eq!(receipt.transaction.net_payable, BigDecimal::from(42500));
        assert!(receipt.transaction.expense_status.is_none());

        let location = manager.storage.get_location("L1").await.unwrap().unwrap();
        assert_eq!(location.last_score, 1250);
        assert_eq!(location.last_revenue_date, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[tokio::test]
    async fn test_rollback_flagged_or_rejected() {
        let mut manager = seeded().await;
        let receipt = manager
            .record_collection(CollectionBuilder::new("L1".to_string(), "D1".to_string(), 10))
            .await
            .unwrap();
        assert_eq!(receipt.transaction.revenue, BigDecimal::from(0));
        assert!(receipt.transaction.meter_anomaly.is_some());

        let config = EngineConfig {
            reject_meter_rollback: true,
            ..EngineConfig::default()
        };
        let mut strict = TransactionManager::new(manager.storage.clone(), &config);
        let result = strict
            .record_collection(CollectionBuilder::new("L1".to_string(), "D1".to_string(), 5))
            .await;
        assert!(matches!(result, Err(FieldOpsError::MeterRollback { .. })));
    }

    #[tokio::test]
    async fn test_deductions_are_capped() {
        let mut manager = seeded().await;
        let receipt = manager
            .record_collection(
                CollectionBuilder::new("L1".to_string(), "D1".to_string(), 1100)
                    .debt_deduction(BigDecimal::from(8000))
                    .startup_debt_deduction(BigDecimal::from(3000)),
            )
            .await
            .unwrap();

        assert_eq!(receipt.transaction.debt_deduction, BigDecimal::from(5000));
        assert_eq!(receipt.transaction.startup_debt_deduction, BigDecimal::from(3000));

        let driver = manager.storage.get_driver("D1").await.unwrap().unwrap();
        assert_eq!(driver.remaining_debt, BigDecimal::from(0));
        let location = manager.storage.get_location("L1").await.unwrap().unwrap();
        assert_eq!(location.remaining_startup_debt, BigDecimal::from(17000));
    }

    #[tokio::test]
    async fn test_expense_review_flow() {
        let mut manager = seeded().await;
        let receipt = manager
            .record_collection(
                CollectionBuilder::new("L1".to_string(), "D1".to_string(), 1050).expense(
                    BigDecimal::from(4000),
                    ExpenseType::Public,
                    ExpenseCategory::Repair,
                ),
            )
            .await
            .unwrap();
        // 10000 - 1500 - 4000
        assert_eq!(receipt.transaction.net_payable, BigDecimal::from(4500));
        assert_eq!(manager.pending_expenses().await.unwrap().len(), 1);

        let review = manager
            .review_expense(&receipt.transaction.id, ExpenseDecision::Reject)
            .await
            .unwrap();
        assert_eq!(review.debt_increase, BigDecimal::from(4000));

        let driver = manager.storage.get_driver("D1").await.unwrap().unwrap();
        assert_eq!(driver.remaining_debt, BigDecimal::from(9000));
        assert!(manager.pending_expenses().await.unwrap().is_empty());

        let second = manager
            .review_expense(&receipt.transaction.id, ExpenseDecision::Approve)
            .await;
        assert!(matches!(second, Err(FieldOpsError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_expense_claim_and_sync_flags() {
        let mut manager = seeded().await;
        let claim = patterns::create_expense_claim(
            "D1".to_string(),
            None,
            at(2),
            BigDecimal::from(2500),
            ExpenseType::Private,
            ExpenseCategory::SalaryAdvance,
            Some("advance".to_string()),
        )
        .unwrap();
        let claim_id = claim.id.clone();
        assert_eq!(claim.net_payable, BigDecimal::from(-2500));

        manager.record_expense_claim(claim).await.unwrap();
        assert_eq!(manager.unsynced().await.unwrap().len(), 1);

        manager.mark_synced(&claim_id).await.unwrap();
        assert!(manager.unsynced().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_location_is_rejected() {
        let mut manager = seeded().await;
        let result = manager
            .record_collection(CollectionBuilder::new("NOPE".to_string(), "D1".to_string(), 1))
            .await;
        assert!(matches!(result, Err(FieldOpsError::LocationNotFound(_))));
    }

    #[tokio::test]
    async fn test_full_handover_pays_everything() {
        let mut manager = seeded().await;
        let receipt = manager
            .record_collection(patterns::full_handover("L1".to_string(), "D1".to_string(), 1100))
            .await
            .unwrap();

        assert_eq!(receipt.transaction.revenue, BigDecimal::from(20000));
        assert_eq!(receipt.transaction.commission, BigDecimal::from(3000));
        assert_eq!(receipt.transaction.owner_retention, BigDecimal::from(0));
        assert_eq!(receipt.transaction.net_payable, BigDecimal::from(20000));
    }

    #[tokio::test]
    async fn test_negative_reading_leaves_baseline() {
        let mut manager = seeded().await;
        let result = manager
            .record_collection(CollectionBuilder::new("L1".to_string(), "D1".to_string(), -500))
            .await;
        assert!(matches!(result, Err(FieldOpsError::Validation(_))));

        let location = manager.storage.get_location("L1").await.unwrap().unwrap();
        assert_eq!(location.last_score, 1000);
        let stored = manager
            .storage
            .list_transactions(&TransactionFilter::default())
            .await
            .unwrap();
        assert!(stored.is_empty());
    }
}
