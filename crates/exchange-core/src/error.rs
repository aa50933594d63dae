//! # Error Types
//!
//! Domain-specific error types for exchange-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  exchange-core errors (this file)                                       │
//! │  ├── CoreError        - Exchange rule violations                        │
//! │  └── ValidationError  - Data contract shape failures                    │
//! │                                                                         │
//! │  exchange-session errors (separate crate)                               │
//! │  ├── SessionError     - Collaborator / timeout failures                 │
//! │  └── ApiError         - What the exchange modal sees (serialized)       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SessionError → ApiError → UI       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Recovery
//! | Variant               | Recovered where                                |
//! |-----------------------|------------------------------------------------|
//! | `InvalidQuantity`     | locally, input rejected, state kept            |
//! | `StockExceeded`       | locally, message names the shortfall           |
//! | `IncompleteSelection` | form validation message, blocks review         |
//! | `SettlementPending`   | operator acknowledges the balance and retries  |
//! | `SubmissionFailure`   | flow back in review, server text verbatim      |

use thiserror::Error;

use crate::flow::ExchangeState;
use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Exchange rule violations.
///
/// None of these leave the engine in a partially mutated state: the
/// operation that returns one has not changed anything.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Requested quantity is not within `[1, max]`.
    ///
    /// ## When This Occurs
    /// - Removal quantity above what is still available on the order line
    /// - Zero or negative quantity typed into a replacement row
    #[error("Invalid quantity {requested} for {line_id}: must be between 1 and {max}")]
    InvalidQuantity {
        line_id: String,
        requested: i64,
        max: i64,
    },

    /// Replacement quantity would exceed the batch stock.
    ///
    /// ## User Workflow
    /// ```text
    /// Basket holds 4 of (product 5, batch 9), batch stock is 8
    ///      │
    ///      ▼
    /// Operator adds 6 more
    ///      │
    ///      ▼
    /// StockExceeded { available: 8, already_in_basket: 4, requested: 6 }
    ///      │
    ///      ▼
    /// UI shows: "Only 8 in stock ... short by 2"
    /// ```
    #[error(
        "Only {available} in stock for product {product_id} batch {batch_id}: \
         {already_in_basket} already in basket, {requested} requested (short by {})",
        units_short(.available, .already_in_basket, .requested)
    )]
    StockExceeded {
        product_id: String,
        batch_id: String,
        available: i64,
        already_in_basket: i64,
        requested: i64,
    },

    /// A line is selected without a quantity, or nothing is selected/replaced.
    #[error("Incomplete exchange: {reason}")]
    IncompleteSelection { reason: String },

    /// Tender does not cover the difference and the operator has not
    /// acknowledged the outstanding balance.
    #[error("Outstanding {kind} balance of {balance} must be acknowledged before submitting")]
    SettlementPending { kind: String, balance: Money },

    /// The external exchange call failed. The message is the server's, verbatim.
    #[error("Exchange submission failed: {0}")]
    SubmissionFailure(String),

    /// Line id is not part of the original order.
    #[error("Order line not found: {0}")]
    LineItemNotFound(String),

    /// Replacement line id is not in the basket.
    #[error("Replacement line not found: {0}")]
    ReplacementNotFound(String),

    /// The exchange is in a state that does not allow the operation.
    #[error("Exchange is {state}, cannot {action}")]
    FlowLocked {
        state: ExchangeState,
        action: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Units missing for a `StockExceeded`; zero for every other variant.
    pub fn shortfall(&self) -> i64 {
        match self {
            CoreError::StockExceeded {
                available,
                already_in_basket,
                requested,
                ..
            } => units_short(available, already_in_basket, requested).max(0),
            _ => 0,
        }
    }
}

fn units_short(available: &i64, already_in_basket: &i64, requested: &i64) -> i64 {
    already_in_basket
        .saturating_add(*requested)
        .saturating_sub(*available)
}

// =============================================================================
// Validation Error
// =============================================================================

/// Shape errors raised by data-contract constructors at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Duplicate value (e.g., the same unit barcode twice on one line).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_exceeded_message_names_shortfall() {
        let err = CoreError::StockExceeded {
            product_id: "5".to_string(),
            batch_id: "9".to_string(),
            available: 8,
            already_in_basket: 4,
            requested: 6,
        };
        assert_eq!(
            err.to_string(),
            "Only 8 in stock for product 5 batch 9: 4 already in basket, 6 requested (short by 2)"
        );
        assert_eq!(err.shortfall(), 2);
    }

    #[test]
    fn test_shortfall_zero_for_other_errors() {
        let err = CoreError::LineItemNotFound("L1".to_string());
        assert_eq!(err.shortfall(), 0);
    }

    #[test]
    fn test_settlement_pending_message() {
        let err = CoreError::SettlementPending {
            kind: "payment".to_string(),
            balance: Money::from_minor(6000),
        };
        assert_eq!(
            err.to_string(),
            "Outstanding payment balance of 60.00 must be acknowledged before submitting"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "product_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
