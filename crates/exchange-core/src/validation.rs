//! # Validation Module
//!
//! Boundary validators used by the data-contract constructors.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Exchange modal (frontend)                                     │
//! │  ├── Rejects non-integer / negative keystrokes                          │
//! │  └── Immediate feedback                                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Order lines, tender amounts, VAT rate shape                        │
//! │  └── Runs once, at construction; engine code never re-checks shape      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Backend order service (authoritative)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_AMOUNT_MINOR, MAX_IDENTIFIER_LEN, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an identifier (order, line, product, batch).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most `MAX_IDENTIFIER_LEN` characters
///
/// ```rust
/// use exchange_core::validation::validate_identifier;
///
/// assert!(validate_identifier("product_id", "5").is_ok());
/// assert!(validate_identifier("product_id", "  ").is_err());
/// ```
pub fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }

    Ok(())
}

/// Validates the per-unit barcodes recorded on an order line.
///
/// ## Rules
/// - No more barcodes than units purchased
/// - Each barcode non-empty and unique within the line
pub fn validate_unit_barcodes(barcodes: &[String], purchased: i64) -> ValidationResult<()> {
    if barcodes.len() as i64 > purchased {
        return Err(ValidationError::OutOfRange {
            field: "barcodes".to_string(),
            min: 0,
            max: purchased,
        });
    }

    let mut seen = HashSet::with_capacity(barcodes.len());
    for code in barcodes {
        validate_identifier("barcode", code)?;
        if !seen.insert(code.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "barcode".to_string(),
                value: code.clone(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a money amount entered or loaded at the boundary (prices,
/// tender, fees).
///
/// ## Rules
/// - Must not be negative
/// - Must not exceed `MAX_AMOUNT_MINOR`, so sums and products of validated
///   amounts stay far inside `i64`
///
/// ```rust
/// use exchange_core::money::Money;
/// use exchange_core::validation::validate_amount;
///
/// assert!(validate_amount("card", Money::from_minor(0)).is_ok());
/// assert!(validate_amount("card", Money::from_minor(-1)).is_err());
/// assert!(validate_amount("card", Money::from_minor(i64::MAX)).is_err());
/// ```
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !(0..=MAX_AMOUNT_MINOR).contains(&amount.minor()) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_MINOR,
        });
    }

    Ok(())
}

/// Validates a VAT rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "vat_rate".to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("line_id", "L-1").is_ok());
        assert!(validate_identifier("line_id", "").is_err());
        assert!(validate_identifier("line_id", "   ").is_err());
        assert!(matches!(
            validate_identifier("line_id", &"x".repeat(MAX_IDENTIFIER_LEN + 1)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validate_unit_barcodes() {
        let codes = vec!["A1".to_string(), "A2".to_string()];
        assert!(validate_unit_barcodes(&codes, 2).is_ok());
        assert!(validate_unit_barcodes(&codes, 1).is_err());

        let dup = vec!["A1".to_string(), "A1".to_string()];
        assert!(matches!(
            validate_unit_barcodes(&dup, 2),
            Err(ValidationError::Duplicate { .. })
        ));

        assert!(validate_unit_barcodes(&[], 0).is_ok());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount("price", Money::from_minor(1099)).is_ok());
        assert!(validate_amount("price", Money::zero()).is_ok());
        assert!(validate_amount("price", Money::from_minor(-100)).is_err());
    }

    #[test]
    fn test_validate_tax_rate_bps() {
        assert!(validate_tax_rate_bps(0).is_ok());
        assert!(validate_tax_rate_bps(750).is_ok());
        assert!(validate_tax_rate_bps(10_000).is_ok());
        assert!(validate_tax_rate_bps(10_001).is_err());
    }
}
