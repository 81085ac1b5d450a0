//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::types::*;

/// Filter for transaction queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub driver_id: Option<String>,
    pub location_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl TransactionFilter {
    pub fn for_driver(driver_id: impl Into<String>) -> Self {
        Self {
            driver_id: Some(driver_id.into()),
            ..Self::default()
        }
    }

    /// Restrict the filter to a single business day
    pub fn on(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self.end_date = Some(date);
        self
    }

    pub fn between(mut self, start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        self.start_date = start_date;
        self.end_date = end_date;
        self
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        let date = transaction.business_date();
        self.driver_id
            .as_deref()
            .is_none_or(|id| transaction.driver_id == id)
            && self
                .location_id
                .as_deref()
                .is_none_or(|id| transaction.location_id == id)
            && self.start_date.is_none_or(|start| date >= start)
            && self.end_date.is_none_or(|end| date <= end)
    }
}

/// Repository abstraction for field operations
///
/// This trait keeps the engine independent of the hosted database, the
/// on-device cache or any other backend. Implementations only store and
/// load records; all business rules live in the engine.
#[async_trait]
pub trait FieldOpsStorage: Send + Sync {
    /// Save a new location
    async fn save_location(&mut self, location: &Location) -> FieldOpsResult<()>;

    /// Get a location by ID
    async fn get_location(&self, location_id: &str) -> FieldOpsResult<Option<Location>>;

    /// List all locations
    async fn list_locations(&self) -> FieldOpsResult<Vec<Location>>;

    /// Update an existing location
    async fn update_location(&mut self, location: &Location) -> FieldOpsResult<()>;

    /// Save a new driver
    async fn save_driver(&mut self, driver: &Driver) -> FieldOpsResult<()>;

    /// Get a driver by ID
    async fn get_driver(&self, driver_id: &str) -> FieldOpsResult<Option<Driver>>;

    /// List all drivers
    async fn list_drivers(&self) -> FieldOpsResult<Vec<Driver>>;

    /// Update an existing driver
    async fn update_driver(&mut self, driver: &Driver) -> FieldOpsResult<()>;

    /// Save a new transaction
    async fn save_transaction(&mut self, transaction: &Transaction) -> FieldOpsResult<()>;

    /// Get a transaction by ID
    async fn get_transaction(&self, transaction_id: &str) -> FieldOpsResult<Option<Transaction>>;

    /// List transactions matching a filter, newest first
    async fn list_transactions(&self, filter: &TransactionFilter)
        -> FieldOpsResult<Vec<Transaction>>;

    /// Update an existing transaction
    async fn update_transaction(&mut self, transaction: &Transaction) -> FieldOpsResult<()>;

    /// Insert or replace a settlement
    async fn save_settlement(&mut self, settlement: &DailySettlement) -> FieldOpsResult<()>;

    /// Get a settlement by ID
    async fn get_settlement(&self, settlement_id: &str) -> FieldOpsResult<Option<DailySettlement>>;

    /// Find the settlement of a driver for a day
    async fn find_settlement(
        &self,
        driver_id: &str,
        date: NaiveDate,
    ) -> FieldOpsResult<Option<DailySettlement>>;

    /// List settlements, optionally by status, newest first
    async fn list_settlements(
        &self,
        status: Option<SettlementStatus>,
    ) -> FieldOpsResult<Vec<DailySettlement>>;

    /// Append an AI interaction log
    async fn append_ai_log(&mut self, log: &AiLog) -> FieldOpsResult<()>;

    /// List AI logs, newest first
    async fn list_ai_logs(&self) -> FieldOpsResult<Vec<AiLog>>;

    /// Append a notification
    async fn append_notification(&mut self, notification: &Notification) -> FieldOpsResult<()>;

    /// List notifications, newest first
    async fn list_notifications(&self) -> FieldOpsResult<Vec<Notification>>;

    /// Mark a notification as read
    async fn mark_notification_read(&mut self, notification_id: &str) -> FieldOpsResult<()>;
}

/// Trait for implementing custom location and driver validation rules
pub trait RegistryValidator: Send + Sync {
    /// Validate a location before saving
    fn validate_location(&self, location: &Location) -> FieldOpsResult<()>;

    /// Validate a driver before saving
    fn validate_driver(&self, driver: &Driver) -> FieldOpsResult<()>;
}

/// Trait for implementing custom collection validation rules
pub trait CollectionValidator: Send + Sync {
    /// Validate a transaction before recording it
    fn validate_transaction(&self, transaction: &Transaction) -> FieldOpsResult<()>;
}

/// Default registry validator with basic rules
pub struct DefaultRegistryValidator;

impl RegistryValidator for DefaultRegistryValidator {
    fn validate_location(&self, location: &Location) -> FieldOpsResult<()> {
        if location.id.trim().is_empty() {
            return Err(FieldOpsError::Validation(
                "Location ID cannot be empty".to_string(),
            ));
        }

        if location.name.trim().is_empty() {
            return Err(FieldOpsError::Validation(
                "Location name cannot be empty".to_string(),
            ));
        }

        crate::calc::validate_rate(&location.commission_rate)?;

        if location.last_score < 0 {
            return Err(FieldOpsError::Validation(
                "Meter reading cannot be negative".to_string(),
            ));
        }

        if location.remaining_startup_debt < BigDecimal::from(0)
            || location.remaining_startup_debt > location.initial_startup_debt
        {
            return Err(FieldOpsError::Validation(format!(
                "Remaining startup debt {} must be between 0 and {}",
                location.remaining_startup_debt, location.initial_startup_debt
            )));
        }

        Ok(())
    }

    fn validate_driver(&self, driver: &Driver) -> FieldOpsResult<()> {
        if driver.id.trim().is_empty() {
            return Err(FieldOpsError::Validation(
                "Driver ID cannot be empty".to_string(),
            ));
        }

        if driver.name.trim().is_empty() {
            return Err(FieldOpsError::Validation(
                "Driver name cannot be empty".to_string(),
            ));
        }

        if driver.remaining_debt < BigDecimal::from(0)
            || driver.remaining_debt > driver.initial_debt
        {
            return Err(FieldOpsError::Validation(format!(
                "Remaining debt {} must be between 0 and {}",
                driver.remaining_debt, driver.initial_debt
            )));
        }

        crate::calc::validate_rate(&driver.commission_rate)
    }
}

/// Default collection validator
pub struct DefaultCollectionValidator;

impl CollectionValidator for DefaultCollectionValidator {
    fn validate_transaction(&self, transaction: &Transaction) -> FieldOpsResult<()> {
        if transaction.current_score < 0 || transaction.previous_score < 0 {
            return Err(FieldOpsError::Validation(format!(
                "Meter readings cannot be negative: {} -> {}",
                transaction.previous_score, transaction.current_score
            )));
        }

        let zero = BigDecimal::from(0);
        let amounts = [
            ("owner retention", &transaction.owner_retention),
            ("expenses", &transaction.expenses),
            ("coin exchange", &transaction.coin_exchange),
            ("debt deduction", &transaction.debt_deduction),
            ("startup debt deduction", &transaction.startup_debt_deduction),
        ];

        for (label, amount) in amounts {
            if *amount < zero {
                return Err(FieldOpsError::Validation(format!(
                    "{} cannot be negative: {}",
                    label, amount
                )));
            }
        }

        if transaction.has_expense() && transaction.expense_type.is_none() {
            return Err(FieldOpsError::Validation(
                "Expenses require an expense type".to_string(),
            ));
        }

        Ok(())
    }
}
