//! Main coordinator that owns fleet, collection, settlement and audit state

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{info, warn};

use crate::audit::{self, AiLogFilter, AuditTrail};
use crate::calc::*;
use crate::config::EngineConfig;
use crate::ledger::debt::DebtRecovery;
use crate::ledger::fleet::{FleetAlerts, FleetManager, SiteStats};
use crate::ledger::transaction::{CollectionBuilder, CollectionReceipt, TransactionManager};
use crate::reconciliation::{DailyTotals, Reviewer, SettlementReconciler};
use crate::traits::*;
use crate::types::*;

/// Field operations ledger that orchestrates every engine operation
pub struct FieldLedger<S: FieldOpsStorage> {
    storage: S,
    config: EngineConfig,
    fleet: FleetManager<S>,
    transactions: TransactionManager<S>,
    audit: AuditTrail<S>,
    reconciler: SettlementReconciler,
    payroll: PayrollCalculator,
}

impl<S: FieldOpsStorage + Clone> FieldLedger<S> {
    /// Create a new ledger with the given storage backend and default config
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, EngineConfig::default())
    }

    /// Create a new ledger with explicit business constants
    pub fn with_config(storage: S, config: EngineConfig) -> Self {
        Self::with_validators(
            storage,
            config,
            Box::new(DefaultRegistryValidator),
            Box::new(DefaultCollectionValidator),
        )
    }

    /// Create a new ledger with custom validators
    pub fn with_validators(
        storage: S,
        config: EngineConfig,
        registry_validator: Box<dyn RegistryValidator>,
        collection_validator: Box<dyn CollectionValidator>,
    ) -> Self {
        Self {
            fleet: FleetManager::with_validator(
                storage.clone(),
                config.clone(),
                registry_validator,
            ),
            transactions: TransactionManager::with_validator(
                storage.clone(),
                &config,
                collection_validator,
            ),
            audit: AuditTrail::new(storage.clone()),
            reconciler: SettlementReconciler::new(),
            payroll: PayrollCalculator::new(&config),
            storage,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the expense approval policy
    pub fn set_expense_policy(&mut self, policy: Box<dyn ExpensePolicy>) {
        self.transactions.set_expense_policy(policy);
    }

    // Fleet operations
    /// Register a new location
    pub async fn register_location(&mut self, location: Location) -> FieldOpsResult<Location> {
        self.fleet.register_location(location).await
    }

    /// Register a new driver
    pub async fn register_driver(&mut self, driver: Driver) -> FieldOpsResult<Driver> {
        self.fleet.register_driver(driver).await
    }

    pub async fn get_location(&self, location_id: &str) -> FieldOpsResult<Option<Location>> {
        self.fleet.get_location(location_id).await
    }

    pub async fn list_locations(&self) -> FieldOpsResult<Vec<Location>> {
        self.fleet.list_locations().await
    }

    pub async fn get_driver(&self, driver_id: &str) -> FieldOpsResult<Option<Driver>> {
        self.fleet.get_driver(driver_id).await
    }

    pub async fn list_drivers(&self) -> FieldOpsResult<Vec<Driver>> {
        self.fleet.list_drivers().await
    }

    pub async fn update_commission_rate(
        &mut self,
        location_id: &str,
        rate: BigDecimal,
    ) -> FieldOpsResult<Location> {
        self.fleet.update_commission_rate(location_id, rate).await
    }

    pub async fn set_location_status(
        &mut self,
        location_id: &str,
        status: LocationStatus,
    ) -> FieldOpsResult<Location> {
        self.fleet.set_location_status(location_id, status).await
    }

    pub async fn reset_meter(&mut self, location_id: &str, score: i64) -> FieldOpsResult<Location> {
        self.fleet.reset_meter(location_id, score).await
    }

    pub async fn assign_location(
        &mut self,
        location_id: &str,
        driver_id: &str,
    ) -> FieldOpsResult<Location> {
        self.fleet.assign_location(location_id, driver_id).await
    }

    pub async fn toggle_driver_status(&mut self, driver_id: &str) -> FieldOpsResult<DriverStatus> {
        self.fleet.toggle_driver_status(driver_id).await
    }

    pub async fn set_driver_float(
        &mut self,
        driver_id: &str,
        amount: BigDecimal,
    ) -> FieldOpsResult<Driver> {
        self.fleet.set_driver_float(driver_id, amount).await
    }

    pub async fn recover_driver_debt(
        &mut self,
        driver_id: &str,
        amount: &BigDecimal,
    ) -> FieldOpsResult<DebtRecovery> {
        self.fleet.recover_driver_debt(driver_id, amount).await
    }

    pub async fn recover_startup_debt(
        &mut self,
        location_id: &str,
        amount: &BigDecimal,
    ) -> FieldOpsResult<DebtRecovery> {
        self.fleet.recover_startup_debt(location_id, amount).await
    }

    pub async fn site_stats(&self) -> FieldOpsResult<SiteStats> {
        self.fleet.site_stats().await
    }

    pub async fn fleet_alerts(&self, now: NaiveDateTime) -> FieldOpsResult<FleetAlerts> {
        self.fleet.fleet_alerts(now).await
    }

    // Collection operations
    /// Record a collection and emit a check-in notification
    pub async fn record_collection(
        &mut self,
        builder: CollectionBuilder,
    ) -> FieldOpsResult<CollectionReceipt> {
        let receipt = self.transactions.record_collection(builder).await?;

        let driver_name = self
            .fleet
            .get_driver(&receipt.transaction.driver_id)
            .await?
            .map(|d| d.name)
            .unwrap_or_else(|| receipt.transaction.driver_id.clone());
        self.audit
            .notify(audit::check_in_notification(&receipt.transaction, &driver_name))
            .await?;

        Ok(receipt)
    }

    /// Record a standalone expense claim
    pub async fn record_expense_claim(&mut self, transaction: Transaction) -> FieldOpsResult<()> {
        self.transactions.record_expense_claim(transaction).await
    }

    /// Approve or reject a pending expense
    pub async fn review_expense(
        &mut self,
        transaction_id: &str,
        decision: ExpenseDecision,
    ) -> FieldOpsResult<ExpenseReview> {
        self.transactions.review_expense(transaction_id, decision).await
    }

    pub async fn pending_expenses(&self) -> FieldOpsResult<Vec<Transaction>> {
        self.transactions.pending_expenses().await
    }

    pub async fn get_transaction(
        &self,
        transaction_id: &str,
    ) -> FieldOpsResult<Option<Transaction>> {
        self.transactions.get_transaction(transaction_id).await
    }

    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> FieldOpsResult<Vec<Transaction>> {
        self.transactions.list_transactions(filter).await
    }

    pub async fn unsynced_transactions(&self) -> FieldOpsResult<Vec<Transaction>> {
        self.transactions.unsynced().await
    }

    pub async fn mark_synced(&mut self, transaction_id: &str) -> FieldOpsResult<()> {
        self.transactions.mark_synced(transaction_id).await
    }

    // Settlement operations
    /// Totals for one driver and day
    pub async fn daily_totals(
        &self,
        driver_id: &str,
        date: NaiveDate,
    ) -> FieldOpsResult<DailyTotals> {
        let transactions = self
            .transactions
            .list_transactions(&TransactionFilter::for_driver(driver_id).on(date))
            .await?;
        Ok(self.reconciler.summarize_day(driver_id, date, &transactions))
    }

    /// Submit the day-end settlement for a driver.
    ///
    /// A pending settlement for the same day is replaced; a confirmed one is
    /// locked. Discrepancies are reported, never rejected.
    pub async fn submit_settlement(
        &mut self,
        driver_id: &str,
        date: NaiveDate,
        actual_cash: BigDecimal,
        actual_coins: BigDecimal,
        note: Option<String>,
    ) -> FieldOpsResult<DailySettlement> {
        crate::utils::validate_non_negative_amount(&actual_cash)?;
        crate::utils::validate_non_negative_amount(&actual_coins)?;
        if let Some(ref note) = note {
            crate::utils::validate_notes(note)?;
        }

        let driver = self.fleet.get_driver_required(driver_id).await?;
        let existing = self.storage.find_settlement(driver_id, date).await?;
        if let Some(ref existing) = existing {
            if existing.is_confirmed() {
                return Err(FieldOpsError::InvalidTransition(format!(
                    "Settlement for '{}' on {} is already confirmed",
                    driver_id, date
                )));
            }
        }

        let totals = self.daily_totals(driver_id, date).await?;
        let mut settlement = self
            .reconciler
            .reconcile(&driver, &totals, actual_cash, actual_coins);
        settlement.note = note;
        if let Some(existing) = existing {
            settlement.id = existing.id;
            settlement.transfer_proof_url = existing.transfer_proof_url;
        }

        self.storage.save_settlement(&settlement).await?;

        info!(
            settlement_id = %settlement.id,
            driver_id,
            %date,
            expected = %settlement.expected_total,
            declared = %settlement.actual_total(),
            "Settlement submitted"
        );
        self.report_discrepancy(&settlement).await?;

        Ok(settlement)
    }

    /// Attach a bank-transfer proof to a pending settlement
    pub async fn attach_transfer_proof(
        &mut self,
        settlement_id: &str,
        url: String,
    ) -> FieldOpsResult<DailySettlement> {
        let mut settlement = self.get_settlement_required(settlement_id).await?;
        if settlement.is_confirmed() {
            return Err(FieldOpsError::InvalidTransition(format!(
                "Settlement '{}' is already confirmed",
                settlement_id
            )));
        }
        settlement.transfer_proof_url = Some(url);
        self.storage.save_settlement(&settlement).await?;
        Ok(settlement)
    }

    /// Confirm a pending settlement, optionally correcting the counted cash or coins
    pub async fn confirm_settlement(
        &mut self,
        settlement_id: &str,
        reviewer: &Reviewer,
        counted_cash: Option<BigDecimal>,
        counted_coins: Option<BigDecimal>,
    ) -> FieldOpsResult<DailySettlement> {
        let pending = self.get_settlement_required(settlement_id).await?;
        let confirmed = self
            .reconciler
            .confirm(&pending, reviewer, counted_cash, counted_coins)?;

        self.storage.save_settlement(&confirmed).await?;

        info!(
            settlement_id,
            admin_id = %reviewer.id,
            shortage = %confirmed.shortage,
            "Settlement confirmed"
        );
        if !confirmed.is_balanced() {
            warn!(
                settlement_id,
                driver_id = %confirmed.driver_id,
                outcome = ?confirmed.outcome(),
                "Settlement confirmed with discrepancy"
            );
        }

        Ok(confirmed)
    }

    async fn report_discrepancy(&mut self, settlement: &DailySettlement) -> FieldOpsResult<()> {
        if let Some(alert) = audit::settlement_alert(settlement) {
            warn!(
                settlement_id = %settlement.id,
                driver_id = %settlement.driver_id,
                outcome = ?settlement.outcome(),
                "Settlement does not balance"
            );
            self.audit.notify(alert).await?;
        }
        Ok(())
    }

    pub async fn get_settlement(
        &self,
        settlement_id: &str,
    ) -> FieldOpsResult<Option<DailySettlement>> {
        self.storage.get_settlement(settlement_id).await
    }

    pub async fn get_settlement_required(
        &self,
        settlement_id: &str,
    ) -> FieldOpsResult<DailySettlement> {
        self.storage
            .get_settlement(settlement_id)
            .await?
            .ok_or_else(|| FieldOpsError::SettlementNotFound(settlement_id.to_string()))
    }

    /// Settlements awaiting admin confirmation, newest first
    pub async fn pending_settlements(&self) -> FieldOpsResult<Vec<DailySettlement>> {
        self.storage
            .list_settlements(Some(SettlementStatus::Pending))
            .await
    }

    pub async fn list_settlements(&self) -> FieldOpsResult<Vec<DailySettlement>> {
        self.storage.list_settlements(None).await
    }

    /// Float issued across the active fleet
    pub async fn fleet_float(&self) -> FieldOpsResult<BigDecimal> {
        let drivers = self.fleet.list_drivers().await?;
        Ok(self.reconciler.fleet_float(&drivers))
    }

    // Payroll
    /// Salary statement for a driver over an optional period
    pub async fn driver_payroll(
        &self,
        driver_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> FieldOpsResult<PayrollStatement> {
        let driver = self.fleet.get_driver_required(driver_id).await?;
        let transactions = self
            .transactions
            .list_transactions(
                &TransactionFilter::for_driver(driver_id).between(start_date, end_date),
            )
            .await?;
        Ok(self
            .payroll
            .calculate(&driver, &transactions, start_date, end_date))
    }

    // Audit
    pub async fn log_ai_interaction(&mut self, log: AiLog) -> FieldOpsResult<AiLog> {
        self.audit.log_ai_interaction(log).await
    }

    pub async fn search_ai_logs(&self, filter: &AiLogFilter) -> FieldOpsResult<Vec<AiLog>> {
        self.audit.search_ai_logs(filter).await
    }

    pub async fn notify(&mut self, notification: Notification) -> FieldOpsResult<()> {
        self.audit.notify(notification).await
    }

    pub async fn notifications(&self) -> FieldOpsResult<Vec<Notification>> {
        self.audit.notifications().await
    }

    pub async fn unread_notifications(&self) -> FieldOpsResult<Vec<Notification>> {
        self.audit.unread_notifications().await
    }

    pub async fn mark_notification_read(&mut self, notification_id: &str) -> FieldOpsResult<()> {
        self.audit.mark_read(notification_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;
    use std::str::FromStr;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    async fn ledger() -> FieldLedger<MemoryStorage> {
        let mut ledger = FieldLedger::new(MemoryStorage::new());
        ledger
            .register_location(
                Location::new(
                    "L1".to_string(),
                    "Mama Ntilie".to_string(),
                    "M-01".to_string(),
                    BigDecimal::from_str("0.15").unwrap(),
                )
                .with_last_score(1000),
            )
            .await
            .unwrap();
        ledger
            .register_driver(
                Driver::new("D1".to_string(), "Nudin".to_string(), "nudin".to_string())
                    .with_float(BigDecimal::from(10000)),
            )
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_collection_emits_check_in() {
        let mut ledger = ledger().await;
        ledger
            .record_collection(
                CollectionBuilder::new("L1".to_string(), "D1".to_string(), 1250)
                    .at(day().and_hms_opt(9, 0, 0).unwrap()),
            )
            .await
            .unwrap();

        let notifications = ledger.notifications().await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::CheckIn);
        assert!(notifications[0].title.contains("Nudin"));
    }

    #[tokio::test]
    async fn test_settlement_resubmission_and_lock() {
        let mut ledger = ledger().await;
        ledger
            .record_collection(
                CollectionBuilder::new("L1".to_string(), "D1".to_string(), 1250)
                    .at(day().and_hms_opt(9, 0, 0).unwrap()),
            )
            .await
            .unwrap();

        let first = ledger
            .submit_settlement("D1", day(), BigDecimal::from(50000), BigDecimal::from(2000), None)
            .await
            .unwrap();
        assert_eq!(first.shortage, BigDecimal::from(-500));

        let second = ledger
            .submit_settlement("D1", day(), BigDecimal::from(50000), BigDecimal::from(2500), None)
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert!(second.is_balanced());
        assert_eq!(ledger.list_settlements().await.unwrap().len(), 1);

        let admin = Reviewer::new("A1", "Boss");
        ledger
            .confirm_settlement(&second.id, &admin, None, None)
            .await
            .unwrap();

        let locked = ledger
            .submit_settlement("D1", day(), BigDecimal::from(1), BigDecimal::from(1), None)
            .await;
        assert!(matches!(locked, Err(FieldOpsError::InvalidTransition(_))));
        assert!(ledger.pending_settlements().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_discrepancy_raises_alert() {
        let mut ledger = ledger().await;
        ledger
            .submit_settlement("D1", day(), BigDecimal::from(9000), BigDecimal::from(0), None)
            .await
            .unwrap();

        let alerts: Vec<Notification> = ledger
            .notifications()
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::Alert)
            .collect();
        assert_eq!(alerts.len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_proof_survives_resubmission() {
        let mut ledger = ledger().await;
        let first = ledger
            .submit_settlement("D1", day(), BigDecimal::from(0), BigDecimal::from(10000), None)
            .await
            .unwrap();

        let proof = "https://bank.example/slip/42".to_string();
        let attached = ledger
            .attach_transfer_proof(&first.id, proof.clone())
            .await
            .unwrap();
        assert_eq!(attached.transfer_proof_url.as_deref(), Some(proof.as_str()));

        let resubmitted = ledger
            .submit_settlement("D1", day(), BigDecimal::from(0), BigDecimal::from(9000), None)
            .await
            .unwrap();
        assert_eq!(resubmitted.id, first.id);
        assert_eq!(resubmitted.transfer_proof_url.as_deref(), Some(proof.as_str()));

        let admin = Reviewer::new("A1", "Boss");
        ledger
            .confirm_settlement(&first.id, &admin, None, None)
            .await
            .unwrap();
        let late = ledger
            .attach_transfer_proof(&first.id, "https://bank.example/slip/43".to_string())
            .await;
        assert!(matches!(late, Err(FieldOpsError::InvalidTransition(_))));

        let missing = ledger
            .attach_transfer_proof("NOPE", "https://bank.example/slip/44".to_string())
            .await;
        assert!(matches!(missing, Err(FieldOpsError::SettlementNotFound(_))));
    }

    #[tokio::test]
    async fn test_meter_reset_moves_collection_baseline() {
        let mut ledger = ledger().await;
        let reset = ledger.reset_meter("L1", 5000).await.unwrap();
        assert_eq!(reset.last_score, 5000);

        let receipt = ledger
            .record_collection(CollectionBuilder::new("L1".to_string(), "D1".to_string(), 5010))
            .await
            .unwrap();
        assert_eq!(receipt.calculation.meter.diff, 10);
        assert_eq!(receipt.transaction.revenue, BigDecimal::from(2000));
        assert!(receipt.transaction.meter_anomaly.is_none());

        assert!(matches!(
            ledger.reset_meter("L1", -1).await,
            Err(FieldOpsError::Validation(_))
        ));
    }
}
