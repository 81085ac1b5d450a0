//! Core types and data structures for kiosk field operations

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Operational state of a machine site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationStatus {
    /// Machine is running and collected on
    Active,
    /// Machine is temporarily down for servicing
    Maintenance,
    /// Machine is out of order
    Broken,
}

/// Employment state of a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverStatus {
    Active,
    Inactive,
}

/// Distinguishes meter collections from standalone expense claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// A visit to a machine with a meter reading
    Collection,
    /// An expense claim filed without a collection
    Expense,
}

/// Who bears an expense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseType {
    /// Company cost (fuel, repairs, fines incurred on duty)
    Public,
    /// Driver's personal draw, treated as a loan
    Private,
}

/// Expense category chosen at entry time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Fuel,
    Repair,
    Fine,
    Allowance,
    SalaryAdvance,
    Other,
}

/// Admin review state of an expense line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
}

/// Lifecycle of a daily settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    /// Submitted by the driver, awaiting admin review
    Pending,
    /// Reviewed by an admin; immutable from here on
    Confirmed,
}

/// Suspicious meter readings detected while computing revenue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeterAnomaly {
    /// The counter went backwards: a reset after maintenance or a misread
    Rollback {
        previous_score: i64,
        current_score: i64,
    },
}

/// Vehicle assigned to a driver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub model: String,
    pub plate: String,
}

/// A machine site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Unique identifier for the location
    pub id: String,
    /// Shop or site name
    pub name: String,
    /// Identifier printed on the machine
    pub machine_id: String,
    /// Area used for grouping sites
    pub area: String,
    /// Last recorded meter reading
    pub last_score: i64,
    /// Fraction of revenue retained by the site owner
    pub commission_rate: BigDecimal,
    /// Capital advanced to open the site
    pub initial_startup_debt: BigDecimal,
    /// Portion of the startup capital still to be recovered
    pub remaining_startup_debt: BigDecimal,
    pub assigned_driver_id: Option<String>,
    pub owner_name: Option<String>,
    pub status: LocationStatus,
    /// Date of the most recent collection
    pub last_revenue_date: Option<NaiveDate>,
}

impl Location {
    /// Create a new active location with no startup debt and a zero meter
    pub fn new(id: String, name: String, machine_id: String, commission_rate: BigDecimal) -> Self {
        Self {
            id,
            name,
            machine_id,
            area: String::new(),
            last_score: 0,
            commission_rate,
            initial_startup_debt: BigDecimal::from(0),
            remaining_startup_debt: BigDecimal::from(0),
            assigned_driver_id: None,
            owner_name: None,
            status: LocationStatus::Active,
            last_revenue_date: None,
        }
    }

    pub fn with_area(mut self, area: impl Into<String>) -> Self {
        self.area = area.into();
        self
    }

    pub fn with_last_score(mut self, score: i64) -> Self {
        self.last_score = score;
        self
    }

    /// Set the startup capital; the full amount starts out as outstanding
    pub fn with_startup_debt(mut self, amount: BigDecimal) -> Self {
        self.remaining_startup_debt = amount.clone();
        self.initial_startup_debt = amount;
        self
    }

    pub fn assigned_to(mut self, driver_id: impl Into<String>) -> Self {
        self.assigned_driver_id = Some(driver_id.into());
        self
    }

    /// Commission rate used for revenue splits.
    ///
    /// A zero rate means "not configured" and falls back to `default_rate`.
    pub fn effective_commission_rate(&self, default_rate: &BigDecimal) -> BigDecimal {
        if self.commission_rate == BigDecimal::from(0) {
            default_rate.clone()
        } else {
            self.commission_rate.clone()
        }
    }

    /// Startup capital recovered so far
    pub fn recovered_startup_debt(&self) -> BigDecimal {
        &self.initial_startup_debt - &self.remaining_startup_debt
    }

    pub fn is_startup_debt_cleared(&self) -> bool {
        self.remaining_startup_debt == BigDecimal::from(0)
    }
}

/// A field agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub username: String,
    pub phone: String,
    /// Loan balance when the driver was registered
    pub initial_debt: BigDecimal,
    /// Outstanding personal loan balance, never negative
    pub remaining_debt: BigDecimal,
    /// Coins issued at day start to make change
    pub daily_floating_coins: BigDecimal,
    pub vehicle: VehicleInfo,
    pub status: DriverStatus,
    pub base_salary: BigDecimal,
    /// Payroll commission on collected revenue (distinct from site commission)
    pub commission_rate: BigDecimal,
    pub last_active: Option<NaiveDateTime>,
}

impl Driver {
    /// Create a new active driver with no debt, float or salary terms
    pub fn new(id: String, name: String, username: String) -> Self {
        Self {
            id,
            name,
            username,
            phone: String::new(),
            initial_debt: BigDecimal::from(0),
            remaining_debt: BigDecimal::from(0),
            daily_floating_coins: BigDecimal::from(0),
            vehicle: VehicleInfo::default(),
            status: DriverStatus::Active,
            base_salary: BigDecimal::from(0),
            commission_rate: BigDecimal::from(0),
            last_active: None,
        }
    }

    pub fn with_float(mut self, amount: BigDecimal) -> Self {
        self.daily_floating_coins = amount;
        self
    }

    /// Set an opening loan; the full amount starts out as outstanding
    pub fn with_debt(mut self, amount: BigDecimal) -> Self {
        self.remaining_debt = amount.clone();
        self.initial_debt = amount;
        self
    }

    pub fn with_salary(mut self, base_salary: BigDecimal, commission_rate: BigDecimal) -> Self {
        self.base_salary = base_salary;
        self.commission_rate = commission_rate;
        self
    }

    pub fn with_vehicle(mut self, model: impl Into<String>, plate: impl Into<String>) -> Self {
        self.vehicle = VehicleInfo {
            model: model.into(),
            plate: plate.into(),
        };
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == DriverStatus::Active
    }
}

/// One collection event at one location by one driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    /// When the driver submitted the record
    pub timestamp: NaiveDateTime,
    pub location_id: String,
    pub location_name: String,
    pub driver_id: String,
    pub kind: TransactionKind,
    pub previous_score: i64,
    pub current_score: i64,
    /// `max(0, current - previous) × coin value`
    pub revenue: BigDecimal,
    /// Site owner's share computed from the commission rate
    pub commission: BigDecimal,
    /// Amount the owner actually kept on site
    pub owner_retention: BigDecimal,
    /// Driver loan repayment taken with this collection
    pub debt_deduction: BigDecimal,
    /// Startup capital recovered from this collection
    pub startup_debt_deduction: BigDecimal,
    pub expenses: BigDecimal,
    pub expense_type: Option<ExpenseType>,
    pub expense_category: Option<ExpenseCategory>,
    pub expense_status: Option<ExpenseStatus>,
    pub expense_description: Option<String>,
    /// Coins swapped for notes with the site owner
    pub coin_exchange: BigDecimal,
    /// `revenue - owner_retention - expenses`; negative when the company owes the driver
    pub net_payable: BigDecimal,
    pub notes: Option<String>,
    pub reported_status: Option<LocationStatus>,
    pub meter_anomaly: Option<MeterAnomaly>,
    pub is_synced: bool,
}

impl Transaction {
    /// Create an empty transaction; amounts are filled in by the builders
    pub fn new(
        id: String,
        timestamp: NaiveDateTime,
        location_id: String,
        driver_id: String,
        kind: TransactionKind,
    ) -> Self {
        Self {
            id,
            timestamp,
            location_id,
            location_name: String::new(),
            driver_id,
            kind,
            previous_score: 0,
            current_score: 0,
            revenue: BigDecimal::from(0),
            commission: BigDecimal::from(0),
            owner_retention: BigDecimal::from(0),
            debt_deduction: BigDecimal::from(0),
            startup_debt_deduction: BigDecimal::from(0),
            expenses: BigDecimal::from(0),
            expense_type: None,
            expense_category: None,
            expense_status: None,
            expense_description: None,
            coin_exchange: BigDecimal::from(0),
            net_payable: BigDecimal::from(0),
            notes: None,
            reported_status: None,
            meter_anomaly: None,
            is_synced: false,
        }
    }

    /// Business day the transaction belongs to
    pub fn business_date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn is_collection(&self) -> bool {
        self.kind == TransactionKind::Collection
    }

    pub fn has_expense(&self) -> bool {
        self.expenses > BigDecimal::from(0)
    }

    pub fn is_expense_pending(&self) -> bool {
        self.has_expense() && self.expense_status == Some(ExpenseStatus::Pending)
    }

    /// Expense amount borne by the company, zero for private expenses
    pub fn public_expense_amount(&self) -> BigDecimal {
        if self.expense_type == Some(ExpenseType::Public) {
            self.expenses.clone()
        } else {
            BigDecimal::from(0)
        }
    }
}

/// End-of-day reconciliation for one driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySettlement {
    pub id: String,
    pub date: NaiveDate,
    pub driver_id: String,
    pub driver_name: String,
    pub total_revenue: BigDecimal,
    pub total_net_payable: BigDecimal,
    /// Public expenses filed that day
    pub total_expenses: BigDecimal,
    pub driver_float: BigDecimal,
    /// `total_net_payable + driver_float`
    pub expected_total: BigDecimal,
    pub actual_cash: BigDecimal,
    pub actual_coins: BigDecimal,
    /// `actual_cash + actual_coins - expected_total`; negative means cash is missing
    pub shortage: BigDecimal,
    pub note: Option<String>,
    pub transfer_proof_url: Option<String>,
    pub admin_id: Option<String>,
    pub admin_name: Option<String>,
    pub status: SettlementStatus,
    pub timestamp: NaiveDateTime,
}

impl DailySettlement {
    /// Total cash and coins the driver declared
    pub fn actual_total(&self) -> BigDecimal {
        &self.actual_cash + &self.actual_coins
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == SettlementStatus::Confirmed
    }

    pub fn is_balanced(&self) -> bool {
        self.shortage == BigDecimal::from(0)
    }
}

/// Record of an AI-assistant interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiLog {
    pub id: String,
    pub timestamp: NaiveDateTime,
    pub driver_id: String,
    pub driver_name: String,
    pub query: String,
    pub response: String,
    pub image_url: Option<String>,
    pub model_used: String,
    pub related_location_id: Option<String>,
    pub related_transaction_id: Option<String>,
}

/// Kind of system notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CheckIn,
    Alert,
    System,
}

/// System event shown to admins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: NaiveDateTime,
    pub is_read: bool,
    pub related_transaction_id: Option<String>,
    pub driver_id: Option<String>,
}

impl Notification {
    /// Create an unread notification stamped with the current time
    pub fn new(kind: NotificationKind, title: String, message: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            title,
            message,
            timestamp: chrono::Utc::now().naive_utc(),
            is_read: false,
            related_transaction_id: None,
            driver_id: None,
        }
    }
}

/// Errors that can occur in field operations
#[derive(Debug, thiserror::Error)]
pub enum FieldOpsError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Location not found: {0}")]
    LocationNotFound(String),
    #[error("Driver not found: {0}")]
    DriverNotFound(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Settlement not found: {0}")]
    SettlementNotFound(String),
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),
    #[error("Meter went backwards at {location_id}: {previous_score} -> {current_score}")]
    MeterRollback {
        location_id: String,
        previous_score: i64,
        current_score: i64,
    },
}

/// Result type for field operations
pub type FieldOpsResult<T> = Result<T, FieldOpsError>;
