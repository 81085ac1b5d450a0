//! In-memory storage implementation for testing

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::*;
use crate::types::*;

/// In-memory storage implementation for testing and development
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    locations: Arc<RwLock<HashMap<String, Location>>>,
    drivers: Arc<RwLock<HashMap<String, Driver>>>,
    transactions: Arc<RwLock<HashMap<String, Transaction>>>,
    settlements: Arc<RwLock<HashMap<String, DailySettlement>>>,
    // Append-only, oldest first
    ai_logs: Arc<RwLock<Vec<AiLog>>>,
    notifications: Arc<RwLock<Vec<Notification>>>,
}

fn read<T>(lock: &RwLock<T>) -> FieldOpsResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|e| FieldOpsError::Storage(format!("lock poisoned: {}", e)))
}

fn write<T>(lock: &RwLock<T>) -> FieldOpsResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|e| FieldOpsError::Storage(format!("lock poisoned: {}", e)))
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self {
            locations: Arc::new(RwLock::new(HashMap::new())),
            drivers: Arc::new(RwLock::new(HashMap::new())),
            transactions: Arc::new(RwLock::new(HashMap::new())),
            settlements: Arc::new(RwLock::new(HashMap::new())),
            ai_logs: Arc::new(RwLock::new(Vec::new())),
            notifications: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> FieldOpsResult<()> {
        write(&self.locations)?.clear();
        write(&self.drivers)?.clear();
        write(&self.transactions)?.clear();
        write(&self.settlements)?.clear();
        write(&self.ai_logs)?.clear();
        write(&self.notifications)?.clear();
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FieldOpsStorage for MemoryStorage {
    async fn save_location(&mut self, location: &Location) -> FieldOpsResult<()> {
        write(&self.locations)?.insert(location.id.clone(), location.clone());
        Ok(())
    }

    async fn get_location(&self, location_id: &str) -> FieldOpsResult<Option<Location>> {
        Ok(read(&self.locations)?.get(location_id).cloned())
    }

    async fn list_locations(&self) -> FieldOpsResult<Vec<Location>> {
        let mut locations: Vec<Location> = read(&self.locations)?.values().cloned().collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    async fn update_location(&mut self, location: &Location) -> FieldOpsResult<()> {
        let mut locations = write(&self.locations)?;
        match locations.get_mut(&location.id) {
            Some(existing) => {
                *existing = location.clone();
                Ok(())
            }
            None => Err(FieldOpsError::LocationNotFound(location.id.clone())),
        }
    }

    async fn save_driver(&mut self, driver: &Driver) -> FieldOpsResult<()> {
        write(&self.drivers)?.insert(driver.id.clone(), driver.clone());
        Ok(())
    }

    async fn get_driver(&self, driver_id: &str) -> FieldOpsResult<Option<Driver>> {
        Ok(read(&self.drivers)?.get(driver_id).cloned())
    }

    async fn list_drivers(&self) -> FieldOpsResult<Vec<Driver>> {
        let mut drivers: Vec<Driver> = read(&self.drivers)?.values().cloned().collect();
        drivers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(drivers)
    }

    async fn update_driver(&mut self, driver: &Driver) -> FieldOpsResult<()> {
        let mut drivers = write(&self.drivers)?;
        match drivers.get_mut(&driver.id) {
            Some(existing) => {
                *existing = driver.clone();
                Ok(())
            }
            None => Err(FieldOpsError::DriverNotFound(driver.id.clone())),
        }
    }

    async fn save_transaction(&mut self, transaction: &Transaction) -> FieldOpsResult<()> {
        write(&self.transactions)?.insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    async fn get_transaction(&self, transaction_id: &str) -> FieldOpsResult<Option<Transaction>> {
        Ok(read(&self.transactions)?.get(transaction_id).cloned())
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> FieldOpsResult<Vec<Transaction>> {
        let mut filtered: Vec<Transaction> = read(&self.transactions)?
            .values()
            .filter(|txn| filter.matches(txn))
            .cloned()
            .collect();
        filtered.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(filtered)
    }

    async fn update_transaction(&mut self, transaction: &Transaction) -> FieldOpsResult<()> {
        let mut transactions = write(&self.transactions)?;
        match transactions.get_mut(&transaction.id) {
            Some(existing) => {
                *existing = transaction.clone();
                Ok(())
            }
            None => Err(FieldOpsError::TransactionNotFound(transaction.id.clone())),
        }
    }

    async fn save_settlement(&mut self, settlement: &DailySettlement) -> FieldOpsResult<()> {
        write(&self.settlements)?.insert(settlement.id.clone(), settlement.clone());
        Ok(())
    }

    async fn get_settlement(&self, settlement_id: &str) -> FieldOpsResult<Option<DailySettlement>> {
        Ok(read(&self.settlements)?.get(settlement_id).cloned())
    }

    async fn find_settlement(
        &self,
        driver_id: &str,
        date: NaiveDate,
    ) -> FieldOpsResult<Option<DailySettlement>> {
        Ok(read(&self.settlements)?
            .values()
            .find(|s| s.driver_id == driver_id && s.date == date)
            .cloned())
    }

    async fn list_settlements(
        &self,
        status: Option<SettlementStatus>,
    ) -> FieldOpsResult<Vec<DailySettlement>> {
        let mut settlements: Vec<DailySettlement> = read(&self.settlements)?
            .values()
            .filter(|s| status.is_none_or(|st| s.status == st))
            .cloned()
            .collect();
        settlements.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(settlements)
    }

    async fn append_ai_log(&mut self, log: &AiLog) -> FieldOpsResult<()> {
        write(&self.ai_logs)?.push(log.clone());
        Ok(())
    }

    async fn list_ai_logs(&self) -> FieldOpsResult<Vec<AiLog>> {
        Ok(read(&self.ai_logs)?.iter().rev().cloned().collect())
    }

    async fn append_notification(&mut self, notification: &Notification) -> FieldOpsResult<()> {
        write(&self.notifications)?.push(notification.clone());
        Ok(())
    }

    async fn list_notifications(&self) -> FieldOpsResult<Vec<Notification>> {
        Ok(read(&self.notifications)?.iter().rev().cloned().collect())
    }

    async fn mark_notification_read(&mut self, notification_id: &str) -> FieldOpsResult<()> {
        let mut notifications = write(&self.notifications)?;
        match notifications.iter_mut().find(|n| n.id == notification_id) {
            Some(notification) => {
                notification.is_read = true;
                Ok(())
            }
            None => Err(FieldOpsError::Validation(format!(
                "Notification not found: {}",
                notification_id
            ))),
        }
    }
}
