//! AI interaction logs and admin notifications

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::traits::*;
use crate::types::*;

impl AiLog {
    /// Create a text-only log entry stamped with the current time
    pub fn new(
        driver_id: String,
        driver_name: String,
        query: String,
        response: String,
        model_used: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().naive_utc(),
            driver_id,
            driver_name,
            query,
            response,
            image_url: None,
            model_used,
            related_location_id: None,
            related_transaction_id: None,
        }
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn for_location(mut self, location_id: impl Into<String>) -> Self {
        self.related_location_id = Some(location_id.into());
        self
    }

    pub fn for_transaction(mut self, transaction_id: impl Into<String>) -> Self {
        self.related_transaction_id = Some(transaction_id.into());
        self
    }

    pub fn has_image(&self) -> bool {
        self.image_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

/// Which AI logs to show
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiLogKind {
    #[default]
    All,
    /// Only interactions with an attached photo
    Image,
    /// Only text interactions
    Text,
}

/// Search over AI logs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiLogFilter {
    /// Case-insensitive substring matched against driver name, query, response and model
    pub text: Option<String>,
    pub kind: AiLogKind,
}

impl AiLogFilter {
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            text: Some(query.into()),
            kind: AiLogKind::All,
        }
    }

    pub fn kind(mut self, kind: AiLogKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn matches(&self, log: &AiLog) -> bool {
        let text_match = match self.text.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(query) => {
                let query = query.to_lowercase();
                [&log.driver_name, &log.query, &log.response, &log.model_used]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&query))
            }
        };

        let kind_match = match self.kind {
            AiLogKind::All => true,
            AiLogKind::Image => log.has_image(),
            AiLogKind::Text => !log.has_image(),
        };

        text_match && kind_match
    }
}

/// Check-in notice emitted when a driver records a collection
pub fn check_in_notification(transaction: &Transaction, driver_name: &str) -> Notification {
    let mut notification = Notification::new(
        NotificationKind::CheckIn,
        format!("{} checked in", driver_name),
        format!(
            "{} collected {} at {} (meter {} -> {})",
            driver_name,
            transaction.revenue,
            transaction.location_name,
            transaction.previous_score,
            transaction.current_score
        ),
    );
    notification.related_transaction_id = Some(transaction.id.clone());
    notification.driver_id = Some(transaction.driver_id.clone());
    notification
}

/// Alert emitted when a settlement does not balance
pub fn settlement_alert(settlement: &DailySettlement) -> Option<Notification> {
    if settlement.is_balanced() {
        return None;
    }

    let (label, amount) = if settlement.shortage < bigdecimal::BigDecimal::from(0) {
        ("shortage", -settlement.shortage.clone())
    } else {
        ("surplus", settlement.shortage.clone())
    };

    let mut notification = Notification::new(
        NotificationKind::Alert,
        format!("Settlement {} for {}", label, settlement.driver_name),
        format!(
            "{} declared {} against an expected {} on {}: {} of {}",
            settlement.driver_name,
            settlement.actual_total(),
            settlement.expected_total,
            settlement.date,
            label,
            amount
        ),
    );
    notification.driver_id = Some(settlement.driver_id.clone());
    Some(notification)
}

/// Append-only audit records backed by storage
pub struct AuditTrail<S: FieldOpsStorage> {
    pub(crate) storage: S,
}

impl<S: FieldOpsStorage> AuditTrail<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Record an AI-assistant interaction
    pub async fn log_ai_interaction(&mut self, log: AiLog) -> FieldOpsResult<AiLog> {
        if log.driver_id.trim().is_empty() {
            return Err(FieldOpsError::Validation(
                "AI log requires a driver".to_string(),
            ));
        }
        self.storage.append_ai_log(&log).await?;
        debug!(
            log_id = %log.id,
            driver_id = %log.driver_id,
            model = %log.model_used,
            "AI interaction logged"
        );
        Ok(log)
    }

    /// AI logs matching a filter, newest first
    pub async fn search_ai_logs(&self, filter: &AiLogFilter) -> FieldOpsResult<Vec<AiLog>> {
        let logs = self.storage.list_ai_logs().await?;
        Ok(logs.into_iter().filter(|log| filter.matches(log)).collect())
    }

    pub async fn notify(&mut self, notification: Notification) -> FieldOpsResult<()> {
        self.storage.append_notification(&notification).await?;
        debug!(
            notification_id = %notification.id,
            kind = ?notification.kind,
            "Notification appended"
        );
        Ok(())
    }

    /// Notifications, newest first
    pub async fn notifications(&self) -> FieldOpsResult<Vec<Notification>> {
        self.storage.list_notifications().await
    }

    pub async fn unread_notifications(&self) -> FieldOpsResult<Vec<Notification>> {
        let all = self.storage.list_notifications().await?;
        Ok(all.into_iter().filter(|n| !n.is_read).collect())
    }

    pub async fn mark_read(&mut self, notification_id: &str) -> FieldOpsResult<()> {
        self.storage.mark_notification_read(notification_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn log(driver: &str, query: &str, model: &str) -> AiLog {
        AiLog::new(
            "D1".to_string(),
            driver.to_string(),
            query.to_string(),
            "ok".to_string(),
            model.to_string(),
        )
    }

    #[test]
    fn test_filter_by_text_and_kind() {
        let text = log("Nudin", "How do I reset the meter?", "gemini-flash");
        let photo = log("Rajabu", "Is this screen broken?", "gemini-pro")
            .with_image("https://img/1.jpg");

        let by_driver = AiLogFilter::text("nudin");
        assert!(by_driver.matches(&text));
        assert!(!by_driver.matches(&photo));

        let by_model = AiLogFilter::text("PRO");
        assert!(by_model.matches(&photo));

        let images = AiLogFilter::default().kind(AiLogKind::Image);
        assert!(images.matches(&photo));
        assert!(!images.matches(&text));

        let texts = AiLogFilter::default().kind(AiLogKind::Text);
        assert!(texts.matches(&text));
        assert!(!texts.matches(&photo));

        assert!(AiLogFilter::text("   ").matches(&text));
    }

    #[test]
    fn test_settlement_alert_only_on_discrepancy() {
        let mut settlement = DailySettlement {
            id: "s1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            driver_id: "D1".to_string(),
            driver_name: "Nudin".to_string(),
            total_revenue: BigDecimal::from(50000),
            total_net_payable: BigDecimal::from(42500),
            total_expenses: BigDecimal::from(0),
            driver_float: BigDecimal::from(10000),
            expected_total: BigDecimal::from(52500),
            actual_cash: BigDecimal::from(50000),
            actual_coins: BigDecimal::from(2500),
            shortage: BigDecimal::from(0),
            note: None,
            transfer_proof_url: None,
            admin_id: None,
            admin_name: None,
            status: SettlementStatus::Pending,
            timestamp: chrono::Utc::now().naive_utc(),
        };
        assert!(settlement_alert(&settlement).is_none());

        settlement.actual_coins = BigDecimal::from(2000);
        settlement.shortage = BigDecimal::from(-500);
        let alert = settlement_alert(&settlement).unwrap();
        assert_eq!(alert.kind, NotificationKind::Alert);
        assert!(alert.title.contains("shortage"));
        assert_eq!(alert.driver_id.as_deref(), Some("D1"));
    }

    #[tokio::test]
    async fn test_audit_trail_roundtrip() {
        let mut audit = AuditTrail::new(MemoryStorage::new());
        audit
            .log_ai_interaction(log("Nudin", "first", "m1"))
            .await
            .unwrap();
        audit
            .log_ai_interaction(log("Nudin", "second", "m1"))
            .await
            .unwrap();

        let logs = audit.search_ai_logs(&AiLogFilter::default()).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].query, "second");

        let notification = Notification::new(
            NotificationKind::System,
            "Sync".to_string(),
            "Offline queue flushed".to_string(),
        );
        let id = notification.id.clone();
        audit.notify(notification).await.unwrap();
        assert_eq!(audit.unread_notifications().await.unwrap().len(), 1);

        audit.mark_read(&id).await.unwrap();
        assert!(audit.unread_notifications().await.unwrap().is_empty());
        assert_eq!(audit.notifications().await.unwrap().len(), 1);
    }
}
