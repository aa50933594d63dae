//! # Payment Allocator
//!
//! Multi-tender settlement of an exchange difference.
//!
//! ## Tender
//! One immutable [`TenderSplit`] per transaction. Every edit from the tender
//! form is a pure transition returning a new value:
//!
//! ```rust
//! use exchange_core::denomination::Denomination;
//! use exchange_core::money::Money;
//! use exchange_core::payment::{PaymentChannel, TenderSplit};
//!
//! let tender = TenderSplit::new()
//!     .with_note_count(Denomination::Hundred, 1)
//!     .with_channel(PaymentChannel::Card, Money::from_major(40))
//!     .unwrap();
//! assert_eq!(tender.total_tendered(), Money::from_major(140));
//! ```
//!
//! ## Settlement Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  difference > 0   remaining = difference − tendered + fee               │
//! │                   ≤ 0 → FullyPaid { change: −remaining }                │
//! │                   > 0 → PartiallyPaid { due: remaining }                │
//! │                                                                         │
//! │  difference < 0   remaining = |difference| − tendered                   │
//! │                   ≤ 0 → FullyRefunded { excess: −remaining }            │
//! │                   > 0 → PartiallyRefunded { due: remaining }            │
//! │                                                                         │
//! │  difference = 0   EvenExchange, tender ignored                          │
//! │                                                                         │
//! │  The transaction fee is charged only when the customer pays.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Partial settlement is a legitimate end state ("pay/refund later"); the
//! flow asks the operator to acknowledge it instead of rejecting it.

use serde::{Deserialize, Serialize};
use tracing::warn;
use ts_rs::TS;

use crate::denomination::{Denomination, DenominationCount};
use crate::money::Money;
use crate::validation::{validate_amount, ValidationResult};

// =============================================================================
// Tender
// =============================================================================

/// A payment channel with a freehand amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    Cash,
    Card,
    WalletA,
    WalletB,
}

impl PaymentChannel {
    fn field(&self) -> &'static str {
        match self {
            PaymentChannel::Cash => "cash",
            PaymentChannel::Card => "card",
            PaymentChannel::WalletA => "wallet_a",
            PaymentChannel::WalletB => "wallet_b",
        }
    }
}

/// Amounts offered per channel plus the transaction fee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TenderSplit {
    /// Freehand cash figure; ignored while `cash_notes` is non-empty.
    #[serde(default)]
    cash_amount: Money,
    #[serde(default)]
    cash_notes: DenominationCount,
    #[serde(default)]
    card: Money,
    #[serde(default)]
    wallet_a: Money,
    #[serde(default)]
    wallet_b: Money,
    /// Added to what the customer owes; never applied to refunds.
    #[serde(default)]
    fee: Money,
}

impl TenderSplit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with one channel's amount replaced.
    pub fn with_channel(&self, channel: PaymentChannel, amount: Money) -> ValidationResult<Self> {
        validate_amount(channel.field(), amount)?;
        let mut next = self.clone();
        match channel {
            PaymentChannel::Cash => next.cash_amount = amount,
            PaymentChannel::Card => next.card = amount,
            PaymentChannel::WalletA => next.wallet_a = amount,
            PaymentChannel::WalletB => next.wallet_b = amount,
        }
        Ok(next)
    }

    /// Returns a copy with the cash note count replaced.
    #[must_use]
    pub fn with_cash_notes(&self, notes: DenominationCount) -> Self {
        TenderSplit {
            cash_notes: notes,
            ..self.clone()
        }
    }

    /// Returns a copy with one denomination's count replaced.
    #[must_use]
    pub fn with_note_count(&self, denomination: Denomination, count: u32) -> Self {
        self.with_cash_notes(self.cash_notes.with_count(denomination, count))
    }

    pub fn with_fee(&self, fee: Money) -> ValidationResult<Self> {
        validate_amount("fee", fee)?;
        Ok(TenderSplit {
            fee,
            ..self.clone()
        })
    }

    /// Re-checks a tender that arrived through deserialization.
    pub fn validate(&self) -> ValidationResult<()> {
        for channel in [
            PaymentChannel::Cash,
            PaymentChannel::Card,
            PaymentChannel::WalletA,
            PaymentChannel::WalletB,
        ] {
            validate_amount(channel.field(), self.amount(channel))?;
        }
        validate_amount("fee", self.fee)
    }

    /// Freehand amount entered for a channel.
    pub fn amount(&self, channel: PaymentChannel) -> Money {
        match channel {
            PaymentChannel::Cash => self.cash_amount,
            PaymentChannel::Card => self.card,
            PaymentChannel::WalletA => self.wallet_a,
            PaymentChannel::WalletB => self.wallet_b,
        }
    }

    pub fn cash_notes(&self) -> &DenominationCount {
        &self.cash_notes
    }

    pub fn fee(&self) -> Money {
        self.fee
    }

    /// Counted notes win over the freehand cash figure when they total
    /// anything at all.
    pub fn effective_cash(&self) -> Money {
        let counted = self.cash_notes.total();
        if counted.is_positive() {
            counted
        } else {
            self.cash_amount
        }
    }

    /// effective cash + card + both wallets
    pub fn total_tendered(&self) -> Money {
        self.effective_cash() + self.card + self.wallet_a + self.wallet_b
    }
}

// =============================================================================
// Settlement
// =============================================================================

/// Payment state of an exchange after tender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Settlement {
    /// Customer paid everything owed; `change` goes back to them.
    FullyPaid { change: Money },
    /// Customer still owes `due`.
    PartiallyPaid { due: Money },
    /// Refund fully handed out; `excess` is anything beyond what was owed.
    FullyRefunded { excess: Money },
    /// Store still owes the customer `due`.
    PartiallyRefunded { due: Money },
    /// Nothing changes hands.
    EvenExchange,
}

impl Settlement {
    /// True for the states that need operator acknowledgment.
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            Settlement::PartiallyPaid { .. } | Settlement::PartiallyRefunded { .. }
        )
    }

    /// Balance still open after the exchange; zero when fully settled.
    pub fn outstanding(&self) -> Money {
        match self {
            Settlement::PartiallyPaid { due } | Settlement::PartiallyRefunded { due } => *due,
            _ => Money::zero(),
        }
    }

    /// Short name used in logs and acknowledgment prompts.
    pub fn kind(&self) -> &'static str {
        match self {
            Settlement::FullyPaid { .. } | Settlement::PartiallyPaid { .. } => "payment",
            Settlement::FullyRefunded { .. } | Settlement::PartiallyRefunded { .. } => "refund",
            Settlement::EvenExchange => "even",
        }
    }
}

// =============================================================================
// Allocation
// =============================================================================

/// Result of applying a tender to a difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Allocation {
    pub effective_cash: Money,
    pub total_tendered: Money,
    /// Fee actually charged: the tender's fee when the customer owes, else zero.
    pub fee_applied: Money,
    /// Open balance, never below zero.
    pub remaining_balance: Money,
    pub settlement: Settlement,
}

/// Applies `tender` to a signed `difference`.
pub fn allocate(tender: &TenderSplit, difference: Money) -> Allocation {
    let effective_cash = tender.effective_cash();
    let total_tendered = tender.total_tendered();

    let (fee_applied, remaining, settlement) = if difference.is_positive() {
        let fee = tender.fee();
        let remaining = difference - total_tendered + fee;
        let settlement = if remaining.is_positive() {
            Settlement::PartiallyPaid { due: remaining }
        } else {
            Settlement::FullyPaid { change: -remaining }
        };
        (fee, remaining, settlement)
    } else if difference.is_negative() {
        let remaining = difference.abs() - total_tendered;
        let settlement = if remaining.is_positive() {
            Settlement::PartiallyRefunded { due: remaining }
        } else {
            Settlement::FullyRefunded { excess: -remaining }
        };
        (Money::zero(), remaining, settlement)
    } else {
        (Money::zero(), Money::zero(), Settlement::EvenExchange)
    };

    Allocation {
        effective_cash,
        total_tendered,
        fee_applied,
        remaining_balance: remaining.floor_zero(),
        settlement,
    }
}

// =============================================================================
// Change Verification
// =============================================================================

/// Expected vs. counted change, shown side by side to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChangeCheck {
    pub expected: Money,
    pub entered: Money,
}

impl ChangeCheck {
    pub fn is_match(&self) -> bool {
        self.expected == self.entered
    }

    /// entered − expected; positive means too much change counted out.
    pub fn gap(&self) -> Money {
        self.entered - self.expected
    }
}

/// Compares change counted back in notes with the change the allocation
/// expects. A mismatch is logged and reported, never rejected.
pub fn verify_change(allocation: &Allocation, counted: &DenominationCount) -> ChangeCheck {
    let expected = match allocation.settlement {
        Settlement::FullyPaid { change } => change,
        _ => Money::zero(),
    };
    let check = ChangeCheck {
        expected,
        entered: counted.total(),
    };
    if !check.is_match() {
        warn!(
            expected = %check.expected,
            entered = %check.entered,
            gap = %check.gap(),
            "Counted change does not match expected change"
        );
    }
    check
}

// =============================================================================
// Unit Tests
// =============================================================================
