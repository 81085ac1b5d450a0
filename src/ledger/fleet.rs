//! Location and driver registry, site statistics and operational alerts

use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::ledger::debt::{self, DebtRecovery};
use crate::traits::*;
use crate::types::*;

/// Machine counts by status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteStats {
    pub total: usize,
    pub active: usize,
    pub maintenance: usize,
    pub broken: usize,
    /// Percentage of sites that are active, 0 when there are none
    pub active_rate: BigDecimal,
}

impl SiteStats {
    pub fn from_locations(locations: &[Location]) -> Self {
        let count = |status: LocationStatus| {
            locations.iter().filter(|l| l.status == status).count()
        };

        let total = locations.len();
        let active = count(LocationStatus::Active);
        let active_rate = if total == 0 {
            BigDecimal::from(0)
        } else {
            let percent = BigDecimal::from(active as u64) * BigDecimal::from(100);
            (percent / BigDecimal::from(total as u64)).round(2)
        };

        Self {
            total,
            active,
            maintenance: count(LocationStatus::Maintenance),
            broken: count(LocationStatus::Broken),
            active_rate,
        }
    }
}

/// Machine that has not been collected on recently
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagnantMachine {
    pub location_id: String,
    pub location_name: String,
    pub machine_id: String,
    /// `None` when the machine was never collected on
    pub last_collection: Option<NaiveDateTime>,
    pub days_idle: Option<i64>,
}

/// Fleet-wide warnings for the admin dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetAlerts {
    pub stagnant_machines: Vec<StagnantMachine>,
    pub risky_drivers: Vec<Driver>,
    pub today_revenue: BigDecimal,
    pub yesterday_revenue: BigDecimal,
    /// Day-over-day revenue change in percent; 100 when yesterday had none
    pub revenue_trend: BigDecimal,
}

impl FleetAlerts {
    pub fn has_warnings(&self) -> bool {
        !self.stagnant_machines.is_empty() || !self.risky_drivers.is_empty()
    }
}

/// Whole days between two instants, rounded up
fn idle_days(now: NaiveDateTime, last: NaiveDateTime) -> i64 {
    let seconds = (now - last).num_seconds().abs();
    let day = Duration::days(1).num_seconds();
    (seconds + day - 1) / day
}

/// `(today - yesterday) / yesterday × 100`, or 100 when yesterday is zero
pub fn revenue_trend(today: &BigDecimal, yesterday: &BigDecimal) -> BigDecimal {
    if *yesterday == BigDecimal::from(0) {
        return BigDecimal::from(100);
    }
    ((today - yesterday) * BigDecimal::from(100) / yesterday.clone()).round(2)
}

/// Compute dashboard alerts from a snapshot of the fleet
pub fn compute_alerts(
    locations: &[Location],
    drivers: &[Driver],
    transactions: &[Transaction],
    now: NaiveDateTime,
    config: &EngineConfig,
) -> FleetAlerts {
    let mut last_seen: HashMap<&str, NaiveDateTime> = HashMap::new();
    for tx in transactions.iter().filter(|tx| !tx.location_id.is_empty()) {
        let entry = last_seen.entry(tx.location_id.as_str()).or_insert(tx.timestamp);
        if tx.timestamp > *entry {
            *entry = tx.timestamp;
        }
    }

    let stagnant_machines = locations
        .iter()
        .filter_map(|location| {
            let last = last_seen.get(location.id.as_str()).copied();
            let days = last.map(|ts| idle_days(now, ts));
            let stagnant = days.is_none_or(|d| d > config.stagnant_days_threshold);
            stagnant.then(|| StagnantMachine {
                location_id: location.id.clone(),
                location_name: location.name.clone(),
                machine_id: location.machine_id.clone(),
                last_collection: last,
                days_idle: days,
            })
        })
        .collect();

    let risky_drivers = drivers
        .iter()
        .filter(|d| d.remaining_debt > config.risky_debt_threshold)
        .cloned()
        .collect();

    let today = now.date();
    let revenue_on = |date: NaiveDate| -> BigDecimal {
        transactions
            .iter()
            .filter(|tx| tx.business_date() == date)
            .map(|tx| &tx.revenue)
            .sum()
    };
    let today_revenue = revenue_on(today);
    let yesterday_revenue = today
        .pred_opt()
        .map(revenue_on)
        .unwrap_or_else(|| BigDecimal::from(0));
    let revenue_trend = revenue_trend(&today_revenue, &yesterday_revenue);

    FleetAlerts {
        stagnant_machines,
        risky_drivers,
        today_revenue,
        yesterday_revenue,
        revenue_trend,
    }
}

/// Fleet manager for locations and drivers
pub struct FleetManager<S: FieldOpsStorage> {
    pub(crate) storage: S,
    validator: Box<dyn RegistryValidator>,
    config: EngineConfig,
}

impl<S: FieldOpsStorage> FleetManager<S> {
    /// Create a new fleet manager
    pub fn new(storage: S, config: EngineConfig) -> Self {
        Self::with_validator(storage, config, Box::new(DefaultRegistryValidator))
    }

    /// Create a new fleet manager with a custom validator
    pub fn with_validator(
        storage: S,
        config: EngineConfig,
        validator: Box<dyn RegistryValidator>,
    ) -> Self {
        Self {
            storage,
            validator,
            config,
        }
    }

    /// Register a new location
    pub async fn register_location(&mut self, location: Location) -> FieldOpsResult<Location> {
        self.validator.validate_location(&location)?;

        if self.storage.get_location(&location.id).await?.is_some() {
            return Err(FieldOpsError::Validation(format!(
                "Location with ID '{}' already exists",
                location.id
            )));
        }

        if let Some(ref driver_id) = location.assigned_driver_id {
            if self.storage.get_driver(driver_id).await?.is_none() {
                return Err(FieldOpsError::DriverNotFound(driver_id.clone()));
            }
        }

        self.storage.save_location(&location).await?;
        info!(location_id = %location.id, machine_id = %location.machine_id, "Location registered");
        Ok(location)
    }

    /// Register a new driver.
    ///
    /// The opening loan becomes the outstanding balance and a zero base
    /// salary takes the configured default. A zero commission rate is kept.
    pub async fn register_driver(&mut self, mut driver: Driver) -> FieldOpsResult<Driver> {
        driver.remaining_debt = driver.initial_debt.clone();
        if driver.base_salary == BigDecimal::from(0) {
            driver.base_salary = self.config.default_base_salary.clone();
        }

        self.validator.validate_driver(&driver)?;

        if self.storage.get_driver(&driver.id).await?.is_some() {
            return Err(FieldOpsError::Validation(format!(
                "Driver with ID '{}' already exists",
                driver.id
            )));
        }

        self.storage.save_driver(&driver).await?;
        info!(driver_id = %driver.id, "Driver registered");
        Ok(driver)
    }

    /// Get a location by ID
    pub async fn get_location(&self, location_id: &str) -> FieldOpsResult<Option<Location>> {
        self.storage.get_location(location_id).await
    }

    /// Get a location by ID, returning an error if not found
    pub async fn get_location_required(&self, location_id: &str) -> FieldOpsResult<Location> {
        self.storage
            .get_location(location_id)
            .await?
            .ok_or_else(|| FieldOpsError::LocationNotFound(location_id.to_string()))
    }

    pub async fn list_locations(&self) -> FieldOpsResult<Vec<Location>> {
        self.storage.list_locations().await
    }

    /// Get a driver by ID
    pub async fn get_driver(&self, driver_id: &str) -> FieldOpsResult<Option<Driver>> {
        self.storage.get_driver(driver_id).await
    }

    /// Get a driver by ID, returning an error if not found
    pub async fn get_driver_required(&self, driver_id: &str) -> FieldOpsResult<Driver> {
        self.storage
            .get_driver(driver_id)
            .await?
            .ok_or_else(|| FieldOpsError::DriverNotFound(driver_id.to_string()))
    }

    pub async fn list_drivers(&self) -> FieldOpsResult<Vec<Driver>> {
        self.storage.list_drivers().await
    }

    async fn save_location_changes(&mut self, location: &Location) -> FieldOpsResult<()> {
        self.validator.validate_location(location)?;
        self.storage.update_location(location).await
    }

    /// Change the site owner's commission rate
    pub async fn update_commission_rate(
        &mut self,
        location_id: &str,
        rate: BigDecimal,
    ) -> FieldOpsResult<Location> {
        let mut location = self.get_location_required(location_id).await?;
        location.commission_rate = rate;
        self.save_location_changes(&location).await?;
        info!(location_id, rate = %location.commission_rate, "Commission rate updated");
        Ok(location)
    }

    pub async fn set_location_status(
        &mut self,
        location_id: &str,
        status: LocationStatus,
    ) -> FieldOpsResult<Location> {
        let mut location = self.get_location_required(location_id).await?;
        location.status = status;
        self.save_location_changes(&location).await?;
        info!(location_id, status = ?status, "Location status updated");
        Ok(location)
    }

    /// Reset the meter baseline, e.g. after a board replacement
    pub async fn reset_meter(&mut self, location_id: &str, score: i64) -> FieldOpsResult<Location> {
        if score < 0 {
            return Err(FieldOpsError::Validation(
                "Meter reading cannot be negative".to_string(),
            ));
        }
        let mut location = self.get_location_required(location_id).await?;
        let previous = location.last_score;
        location.last_score = score;
        self.save_location_changes(&location).await?;
        warn!(location_id, previous, score, "Meter baseline reset");
        Ok(location)
    }

    pub async fn assign_location(
        &mut self,
        location_id: &str,
        driver_id: &str,
    ) -> FieldOpsResult<Location> {
        self.get_driver_required(driver_id).await?;
        let mut location = self.get_location_required(location_id).await?;
        location.assigned_driver_id = Some(driver_id.to_string());
        self.save_location_changes(&location).await?;
        Ok(location)
    }

    /// Flip a driver between active and inactive
    pub async fn toggle_driver_status(&mut self, driver_id: &str) -> FieldOpsResult<DriverStatus> {
        let mut driver = self.get_driver_required(driver_id).await?;
        driver.status = match driver.status {
            DriverStatus::Active => DriverStatus::Inactive,
            DriverStatus::Inactive => DriverStatus::Active,
        };
        self.storage.update_driver(&driver).await?;
        info!(driver_id, status = ?driver.status, "Driver status toggled");
        Ok(driver.status)
    }

    /// Set the coins issued to a driver at day start
    pub async fn set_driver_float(
        &mut self,
        driver_id: &str,
        amount: BigDecimal,
    ) -> FieldOpsResult<Driver> {
        crate::utils::validate_non_negative_amount(&amount)?;
        let mut driver = self.get_driver_required(driver_id).await?;
        driver.daily_floating_coins = amount;
        self.storage.update_driver(&driver).await?;
        Ok(driver)
    }

    /// Take a repayment from a driver outside of a collection
    pub async fn recover_driver_debt(
        &mut self,
        driver_id: &str,
        amount: &BigDecimal,
    ) -> FieldOpsResult<DebtRecovery> {
        let mut driver = self.get_driver_required(driver_id).await?;
        let recovery = debt::recover_driver_debt(&mut driver, amount)?;
        self.storage.update_driver(&driver).await?;
        info!(
            driver_id,
            recovered = %recovery.recovered,
            remaining = %recovery.remaining,
            "Driver debt recovered"
        );
        Ok(recovery)
    }

    /// Recover startup capital from a location outside of a collection
    pub async fn recover_startup_debt(
        &mut self,
        location_id: &str,
        amount: &BigDecimal,
    ) -> FieldOpsResult<DebtRecovery> {
        let mut location = self.get_location_required(location_id).await?;
        let recovery = debt::recover_startup_debt(&mut location, amount)?;
        self.storage.update_location(&location).await?;
        info!(
            location_id,
            recovered = %recovery.recovered,
            remaining = %recovery.remaining,
            "Startup debt recovered"
        );
        Ok(recovery)
    }

    pub async fn site_stats(&self) -> FieldOpsResult<SiteStats> {
        let locations = self.storage.list_locations().await?;
        Ok(SiteStats::from_locations(&locations))
    }

    /// Dashboard alerts as of `now`
    pub async fn fleet_alerts(&self, now: NaiveDateTime) -> FieldOpsResult<FleetAlerts> {
        let locations = self.storage.list_locations().await?;
        let drivers = self.storage.list_drivers().await?;
        let transactions = self
            .storage
            .list_transactions(&TransactionFilter::default())
            .await?;
        Ok(compute_alerts(&locations, &drivers, &transactions, now, &self.config))
    }
}
