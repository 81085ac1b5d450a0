//! Input coercion and validation utilities

use crate::traits::*;
use crate::types::*;
use bigdecimal::BigDecimal;
use std::str::FromStr;

/// Parse a whole-unit amount typed by a user.
///
/// Thousands separators and surrounding whitespace are ignored; anything
/// missing or garbled becomes zero. Fractions are dropped the way the
/// entry forms read integers.
pub fn parse_amount(input: &str) -> BigDecimal {
    BigDecimal::from(parse_integer(input).unwrap_or(0))
}

/// Parse a meter reading; garbled input becomes `None`
pub fn parse_score(input: &str) -> Option<i64> {
    parse_integer(input)
}

/// Parse a percentage such as `"15"` into a rate (`0.15`).
///
/// Garbled input falls back to `default_percent`.
pub fn parse_percent_rate(input: &str, default_percent: &BigDecimal) -> BigDecimal {
    let percent = BigDecimal::from_str(input.trim()).unwrap_or_else(|_| default_percent.clone());
    percent / BigDecimal::from(100)
}

fn parse_integer(input: &str) -> Option<i64> {
    let cleaned: String = input.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();
    let digits_end = cleaned
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(cleaned.len());
    cleaned[..digits_end].parse().ok()
}

/// Validate that an amount is not negative
pub fn validate_non_negative_amount(amount: &BigDecimal) -> FieldOpsResult<()> {
    if *amount < BigDecimal::from(0) {
        Err(FieldOpsError::Validation(
            "Amount cannot be negative".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate that a record ID is valid
pub fn validate_record_id(id: &str) -> FieldOpsResult<()> {
    if id.trim().is_empty() {
        return Err(FieldOpsError::Validation("ID cannot be empty".to_string()));
    }

    if id.len() > 50 {
        return Err(FieldOpsError::Validation(
            "ID cannot exceed 50 characters".to_string(),
        ));
    }

    if !id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(FieldOpsError::Validation(
            "ID can only contain alphanumeric characters, dashes, and underscores".to_string(),
        ));
    }

    Ok(())
}

/// Validate free-text notes attached to a record
pub fn validate_notes(notes: &str) -> FieldOpsResult<()> {
    if notes.len() > 500 {
        return Err(FieldOpsError::Validation(
            "Notes cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Stricter collection validator for production entry points
pub struct EnhancedCollectionValidator;

impl CollectionValidator for EnhancedCollectionValidator {
    fn validate_transaction(&self, transaction: &Transaction) -> FieldOpsResult<()> {
        DefaultCollectionValidator.validate_transaction(transaction)?;

        validate_record_id(&transaction.id)?;
        validate_record_id(&transaction.driver_id)?;
        // Standalone expense claims may have no location
        if transaction.is_collection() || !transaction.location_id.is_empty() {
            validate_record_id(&transaction.location_id)?;
        }

        if let Some(ref notes) = transaction.notes {
            validate_notes(notes)?;
        }
        if let Some(ref description) = transaction.expense_description {
            validate_notes(description)?;
        }

        if transaction.owner_retention > transaction.revenue {
            return Err(FieldOpsError::Validation(format!(
                "Owner retention {} exceeds revenue {}",
                transaction.owner_retention, transaction.revenue
            )));
        }

        Ok(())
    }
}

/// Stricter registry validator
pub struct EnhancedRegistryValidator;

impl RegistryValidator for EnhancedRegistryValidator {
    fn validate_location(&self, location: &Location) -> FieldOpsResult<()> {
        DefaultRegistryValidator.validate_location(location)?;
        validate_record_id(&location.id)?;

        if location.machine_id.trim().is_empty() {
            return Err(FieldOpsError::Validation(
                "Machine ID cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_driver(&self, driver: &Driver) -> FieldOpsResult<()> {
        DefaultRegistryValidator.validate_driver(driver)?;
        validate_record_id(&driver.id)?;
        validate_non_negative_amount(&driver.daily_floating_coins)?;
        validate_non_negative_amount(&driver.base_salary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_coerces_garbage_to_zero() {
        assert_eq!(parse_amount("1,250"), BigDecimal::from(1250));
        assert_eq!(parse_amount("  42 "), BigDecimal::from(42));
        assert_eq!(parse_amount(""), BigDecimal::from(0));
        assert_eq!(parse_amount("abc"), BigDecimal::from(0));
        assert_eq!(parse_amount("300.75"), BigDecimal::from(300));
        assert_eq!(parse_amount("12abc"), BigDecimal::from(12));
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("001250"), Some(1250));
        assert_eq!(parse_score("LED"), None);
    }

    #[test]
    fn test_parse_percent_rate() {
        let default = BigDecimal::from(15);
        assert_eq!(
            parse_percent_rate("5", &default),
            BigDecimal::from_str("0.05").unwrap()
        );
        assert_eq!(
            parse_percent_rate("x", &default),
            BigDecimal::from_str("0.15").unwrap()
        );
    }

    #[test]
    fn test_validate_record_id() {
        assert!(validate_record_id("D-NUDIN").is_ok());
        assert!(validate_record_id("").is_err());
        assert!(validate_record_id("bad id").is_err());
    }
}
