//! # exchange-core: Pure Exchange & Payment Reconciliation Logic
//!
//! Computes and validates product exchanges: which original lines come back,
//! what goes out instead, what the difference is, how the tender settles it,
//! and whether the exchange may be submitted.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Exchange Desk                                    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Exchange Modal (UI)                          │   │
//! │  │   Pick lines ──► Add replacements ──► Tender ──► Submit        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                exchange-session (async)                         │   │
//! │  │   order source, inventory, barcode resolver, exchange gateway  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ exchange-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ selection │  │  basket   │  │ reconcile │  │  payment  │  │   │
//! │  │   │  removed  │  │  merged   │  │ VAT once  │  │  tender   │  │   │
//! │  │   │   lines   │  │ + ceiling │  │ + delta   │  │ + change  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                  flow: state machine gating submit              │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO CLOCK EXCEPT REQUEST TIMESTAMPS     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`denomination`] - Note counts and their totals
//! - [`selection`] - Original lines chosen for return
//! - [`basket`] - Replacement lines with stock ceilings
//! - [`reconcile`] - VAT and the signed difference
//! - [`payment`] - Multi-tender settlement and change verification
//! - [`flow`] - Exchange state machine
//! - [`money`], [`types`], [`error`], [`validation`] - Supporting types
//!
//! ## Example Usage
//!
//! ```rust
//! use exchange_core::money::Money;
//! use exchange_core::types::TaxRate;
//!
//! let subtotal = Money::from_minor(333);
//! let vat = subtotal.calculate_tax(TaxRate::from_bps(500)); // 5%
//! assert_eq!(vat.minor(), 17);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod basket;
pub mod denomination;
pub mod error;
pub mod flow;
pub mod money;
pub mod payment;
pub mod reconcile;
pub mod selection;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use basket::{ReplacementBasket, ReplacementLine};
pub use denomination::{Denomination, DenominationCount};
pub use error::{CoreError, CoreResult, ValidationError};
pub use flow::{ExchangeFlow, ExchangeOutcome, ExchangeState};
pub use money::Money;
pub use payment::{allocate, verify_change, Allocation, PaymentChannel, Settlement, TenderSplit};
pub use reconcile::{reconcile, Direction, PriceDelta};
pub use selection::LineItemSelector;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single line, original or replacement.
///
/// Catches a mistyped 1000 for 10 before stock checks even run.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum replacement lines in one exchange.
pub const MAX_BASKET_LINES: usize = 100;

/// Largest money amount accepted at the boundary, and the cap on order
/// totals and replacement subtotals (10^13 major units).
pub const MAX_AMOUNT_MINOR: i64 = 1_000_000_000_000_000;

/// Maximum length of line, product, batch and order identifiers.
pub const MAX_IDENTIFIER_LEN: usize = 64;
