//! # Price Reconciler
//!
//! Turns "what came back" and "what goes out" into one signed difference.
//!
//! ```text
//! removed lines total ─────────────────────────────┐
//!                                                  │  original_amount
//! basket subtotal ──► VAT (order's rate, once) ──► total_new_amount
//!                                                  │
//!                       difference = total_new_amount − original_amount
//!                         > 0  customer owes
//!                         < 0  refund owed
//!                         = 0  even exchange, no tender step
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::TaxRate;

/// Which way money moves for an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    CustomerOwes,
    RefundOwed,
    Even,
}

/// The financial delta of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceDelta {
    pub original_amount: Money,
    pub new_subtotal: Money,
    pub vat_rate: TaxRate,
    pub vat_amount: Money,
    pub total_new_amount: Money,
    pub difference: Money,
}

impl PriceDelta {
    pub fn direction(&self) -> Direction {
        if self.difference.is_positive() {
            Direction::CustomerOwes
        } else if self.difference.is_negative() {
            Direction::RefundOwed
        } else {
            Direction::Even
        }
    }
}

/// Computes the exchange difference.
///
/// VAT is charged on the aggregate replacement subtotal and rounded exactly
/// once; the removed lines are taken at the price they were sold for.
///
/// ```rust
/// use exchange_core::money::Money;
/// use exchange_core::reconcile::reconcile;
/// use exchange_core::types::TaxRate;
///
/// let delta = reconcile(Money::zero(), Money::from_minor(333), TaxRate::from_bps(500));
/// assert_eq!(delta.vat_amount.minor(), 17);
/// assert_eq!(delta.total_new_amount.minor(), 350);
/// ```
pub fn reconcile(original_amount: Money, new_subtotal: Money, vat_rate: TaxRate) -> PriceDelta {
    let vat_amount = new_subtotal.calculate_tax(vat_rate);
    let total_new_amount = new_subtotal + vat_amount;
    PriceDelta {
        original_amount,
        new_subtotal,
        vat_rate,
        vat_amount,
        total_new_amount,
        difference: total_new_amount - original_amount,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
