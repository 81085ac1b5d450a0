//! Expense classification and its effect on driver debt

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::*;

/// Admin decision on a pending expense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseDecision {
    Approve,
    Reject,
}

impl ExpenseDecision {
    /// Status the expense moves to after this decision
    pub fn resulting_status(&self) -> ExpenseStatus {
        match self {
            ExpenseDecision::Approve => ExpenseStatus::Approved,
            ExpenseDecision::Reject => ExpenseStatus::Rejected,
        }
    }
}

/// Rule deciding how much a reviewed expense adds to the driver's debt
pub trait ExpensePolicy: Send + Sync {
    /// Debt increase for an expense of `amount`; never negative
    fn debt_effect(
        &self,
        expense_type: ExpenseType,
        decision: ExpenseDecision,
        amount: &BigDecimal,
    ) -> BigDecimal;
}

/// Company policy: only an approved public expense is absorbed.
///
/// | type    | decision | debt        |
/// |---------|----------|-------------|
/// | public  | approve  | none        |
/// | public  | reject   | += amount   |
/// | private | approve  | += amount   |
/// | private | reject   | += amount   |
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardExpensePolicy;

impl ExpensePolicy for StandardExpensePolicy {
    fn debt_effect(
        &self,
        expense_type: ExpenseType,
        decision: ExpenseDecision,
        amount: &BigDecimal,
    ) -> BigDecimal {
        match (expense_type, decision) {
            (ExpenseType::Public, ExpenseDecision::Approve) => BigDecimal::from(0),
            (ExpenseType::Public, ExpenseDecision::Reject)
            | (ExpenseType::Private, ExpenseDecision::Approve)
            | (ExpenseType::Private, ExpenseDecision::Reject) => amount.clone(),
        }
    }
}

/// Outcome of reviewing one expense line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseReview {
    pub transaction_id: String,
    pub driver_id: String,
    pub expense_type: ExpenseType,
    pub decision: ExpenseDecision,
    pub status: ExpenseStatus,
    pub amount: BigDecimal,
    /// Amount to add to the driver's debt
    pub debt_increase: BigDecimal,
}

/// Applies an [`ExpensePolicy`] to pending expenses
pub struct ExpenseClassifier {
    policy: Box<dyn ExpensePolicy>,
}

impl Default for ExpenseClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpenseClassifier {
    pub fn new() -> Self {
        Self {
            policy: Box::new(StandardExpensePolicy),
        }
    }

    pub fn with_policy(policy: Box<dyn ExpensePolicy>) -> Self {
        Self { policy }
    }

    /// Review a pending expense; the transaction itself is not modified
    pub fn review(
        &self,
        transaction: &Transaction,
        decision: ExpenseDecision,
    ) -> FieldOpsResult<ExpenseReview> {
        if !transaction.has_expense() {
            return Err(FieldOpsError::Validation(format!(
                "Transaction '{}' has no expense to review",
                transaction.id
            )));
        }

        match transaction.expense_status {
            Some(ExpenseStatus::Pending) => {}
            other => {
                return Err(FieldOpsError::InvalidTransition(format!(
                    "Expense on '{}' is {:?}, only pending expenses can be reviewed",
                    transaction.id, other
                )));
            }
        }

        let expense_type = transaction.expense_type.ok_or_else(|| {
            FieldOpsError::Validation(format!(
                "Expense on '{}' has no expense type",
                transaction.id
            ))
        })?;

        let debt_increase = self
            .policy
            .debt_effect(expense_type, decision, &transaction.expenses)
            .max(BigDecimal::from(0));

        Ok(ExpenseReview {
            transaction_id: transaction.id.clone(),
            driver_id: transaction.driver_id.clone(),
            expense_type,
            decision,
            status: decision.resulting_status(),
            amount: transaction.expenses.clone(),
            debt_increase,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn expense_tx(expense_type: ExpenseType, amount: i64) -> Transaction {
        let timestamp = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut tx = Transaction::new(
            "tx1".to_string(),
            timestamp,
            "L1".to_string(),
            "D1".to_string(),
            TransactionKind::Collection,
        );
        tx.expenses = BigDecimal::from(amount);
        tx.expense_type = Some(expense_type);
        tx.expense_status = Some(ExpenseStatus::Pending);
        tx
    }

    #[test]
    fn test_rule_table() {
        let policy = StandardExpensePolicy;
        let amount = BigDecimal::from(5000);

        assert_eq!(
            policy.debt_effect(ExpenseType::Public, ExpenseDecision::Approve, &amount),
            BigDecimal::from(0)
        );
        assert_eq!(
            policy.debt_effect(ExpenseType::Public, ExpenseDecision::Reject, &amount),
            amount
        );
        assert_eq!(
            policy.debt_effect(ExpenseType::Private, ExpenseDecision::Approve, &amount),
            amount
        );
        assert_eq!(
            policy.debt_effect(ExpenseType::Private, ExpenseDecision::Reject, &amount),
            amount
        );
    }

    #[test]
    fn test_review_pending_expense() {
        let classifier = ExpenseClassifier::new();
        let tx = expense_tx(ExpenseType::Private, 3000);

        let review = classifier.review(&tx, ExpenseDecision::Approve).unwrap();
        assert_eq!(review.status, ExpenseStatus::Approved);
        assert_eq!(review.debt_increase, BigDecimal::from(3000));
        assert_eq!(review.driver_id, "D1");
    }

    #[test]
    fn test_review_requires_pending_status() {
        let classifier = ExpenseClassifier::new();
        let mut tx = expense_tx(ExpenseType::Public, 3000);
        tx.expense_status = Some(ExpenseStatus::Approved);

        let result = classifier.review(&tx, ExpenseDecision::Reject);
        assert!(matches!(result, Err(FieldOpsError::InvalidTransition(_))));
    }

    #[test]
    fn test_review_without_expense_fails() {
        let classifier = ExpenseClassifier::new();
        let mut tx = expense_tx(ExpenseType::Public, 0);
        tx.expense_status = None;

        assert!(classifier.review(&tx, ExpenseDecision::Approve).is_err());
    }

    struct Lenient;

    impl ExpensePolicy for Lenient {
        fn debt_effect(&self, _: ExpenseType, _: ExpenseDecision, _: &BigDecimal) -> BigDecimal {
            BigDecimal::from(-100)
        }
    }

    #[test]
    fn test_custom_policy_cannot_reduce_debt() {
        let classifier = ExpenseClassifier::with_policy(Box::new(Lenient));
        let tx = expense_tx(ExpenseType::Private, 3000);

        let review = classifier.review(&tx, ExpenseDecision::Reject).unwrap();
        assert_eq!(review.debt_increase, BigDecimal::from(0));
    }
}
