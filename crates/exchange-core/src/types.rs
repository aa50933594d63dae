//! # Domain Types
//!
//! Data contracts exchanged with the order service.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌──────────────────┐      │
//! │  │  OrderSnapshot  │   │ OriginalLineItem │   │     TaxRate      │      │
//! │  │  ─────────────  │   │ ──────────────── │   │  ─────────────   │      │
//! │  │  order_id       │──►│ line_id          │   │  bps (u32)       │      │
//! │  │  vat_rate       │   │ unit_price       │   │  500 = 5%        │      │
//! │  │  lines          │   │ purchased/avail. │   └──────────────────┘      │
//! │  └─────────────────┘   │ unit barcodes    │                             │
//! │                        └──────────────────┘                             │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐                             │
//! │  │ ExchangeRequest │──►│ ExchangeReceipt  │  (submit boundary)          │
//! │  └─────────────────┘   └──────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Order data arrives untyped from the backend; it becomes one of these
//! types through a validating constructor (or `Deserialize`, which routes
//! through the same constructor) and is never re-checked afterwards.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::payment::{Settlement, TenderSplit};
use crate::validation::{
    validate_amount, validate_identifier, validate_quantity, validate_tax_rate_bps,
    validate_unit_barcodes, ValidationResult,
};
use crate::MAX_AMOUNT_MINOR;

// =============================================================================
// Tax Rate
// =============================================================================

/// VAT rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01%, so 750 bps = 7.5% without a float in sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage as reported by the order service.
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Original Line Item
// =============================================================================

/// Wire shape of an order line before validation.
#[derive(Debug, Clone, Deserialize)]
struct RawOrderLine {
    line_id: String,
    product_id: String,
    unit_price: Money,
    quantity_purchased: i64,
    quantity_available: i64,
    #[serde(default)]
    barcodes: Vec<String>,
}

/// One line of the source order. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOrderLine")]
pub struct OriginalLineItem {
    line_id: String,
    product_id: String,
    unit_price: Money,
    quantity_purchased: i64,
    /// May be below purchased when units were already returned.
    quantity_available: i64,
    /// One per physical unit, when the store tracks unit barcodes.
    barcodes: Vec<String>,
}

impl OriginalLineItem {
    /// Builds a validated order line.
    ///
    /// ## Rules
    /// - ids non-empty
    /// - unit price non-negative
    /// - purchased in `[1, MAX_ITEM_QUANTITY]`
    /// - available in `[0, purchased]`
    /// - unit barcodes unique, at most one per purchased unit
    pub fn new(
        line_id: impl Into<String>,
        product_id: impl Into<String>,
        unit_price: Money,
        quantity_purchased: i64,
        quantity_available: i64,
        barcodes: Vec<String>,
    ) -> ValidationResult<Self> {
        let line_id = line_id.into();
        let product_id = product_id.into();

        validate_identifier("line_id", &line_id)?;
        validate_identifier("product_id", &product_id)?;
        validate_amount("unit_price", unit_price)?;
        validate_quantity(quantity_purchased)?;

        if !(0..=quantity_purchased).contains(&quantity_available) {
            return Err(ValidationError::OutOfRange {
                field: "quantity_available".to_string(),
                min: 0,
                max: quantity_purchased,
            });
        }

        validate_unit_barcodes(&barcodes, quantity_purchased)?;

        Ok(OriginalLineItem {
            line_id,
            product_id,
            unit_price,
            quantity_purchased,
            quantity_available,
            barcodes,
        })
    }

    #[inline]
    pub fn line_id(&self) -> &str {
        &self.line_id
    }

    #[inline]
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    #[inline]
    pub fn quantity_purchased(&self) -> i64 {
        self.quantity_purchased
    }

    #[inline]
    pub fn quantity_available(&self) -> i64 {
        self.quantity_available
    }

    #[inline]
    pub fn barcodes(&self) -> &[String] {
        &self.barcodes
    }

    /// Returns true if the given unit barcode belongs to this line.
    pub fn has_barcode(&self, code: &str) -> bool {
        self.barcodes.iter().any(|b| b == code)
    }
}

impl TryFrom<RawOrderLine> for OriginalLineItem {
    type Error = ValidationError;

    fn try_from(raw: RawOrderLine) -> Result<Self, Self::Error> {
        OriginalLineItem::new(
            raw.line_id,
            raw.product_id,
            raw.unit_price,
            raw.quantity_purchased,
            raw.quantity_available,
            raw.barcodes,
        )
    }
}

// =============================================================================
// Order Snapshot
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
struct RawOrderSnapshot {
    order_id: String,
    vat_rate: TaxRate,
    lines: Vec<OriginalLineItem>,
}

/// What the order source returns for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOrderSnapshot")]
pub struct OrderSnapshot {
    order_id: String,
    /// The rate recorded on the original order; constant for the exchange.
    vat_rate: TaxRate,
    lines: Vec<OriginalLineItem>,
}

impl OrderSnapshot {
    /// Builds a validated order snapshot.
    ///
    /// ## Rules
    /// - line ids unique
    /// - a unit barcode belongs to at most one line
    /// - Σ unit price × purchased at most `MAX_AMOUNT_MINOR`
    pub fn new(
        order_id: impl Into<String>,
        vat_rate: TaxRate,
        lines: Vec<OriginalLineItem>,
    ) -> ValidationResult<Self> {
        let order_id = order_id.into();
        validate_identifier("order_id", &order_id)?;
        validate_tax_rate_bps(vat_rate.bps())?;

        let mut seen = HashSet::with_capacity(lines.len());
        let mut codes = HashSet::new();
        for line in &lines {
            if !seen.insert(line.line_id()) {
                return Err(ValidationError::Duplicate {
                    field: "line_id".to_string(),
                    value: line.line_id().to_string(),
                });
            }
            for code in line.barcodes() {
                if !codes.insert(code.as_str()) {
                    return Err(ValidationError::Duplicate {
                        field: "barcode".to_string(),
                        value: code.clone(),
                    });
                }
            }
        }

        let total = lines.iter().try_fold(Money::zero(), |acc, line| {
            line.unit_price()
                .checked_multiply_quantity(line.quantity_purchased())
                .and_then(|line_total| acc.checked_add(line_total))
        });
        if !total.is_some_and(|t| t.minor() <= MAX_AMOUNT_MINOR) {
            return Err(ValidationError::OutOfRange {
                field: "order_total".to_string(),
                min: 0,
                max: MAX_AMOUNT_MINOR,
            });
        }

        Ok(OrderSnapshot {
            order_id,
            vat_rate,
            lines,
        })
    }

    #[inline]
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    #[inline]
    pub fn vat_rate(&self) -> TaxRate {
        self.vat_rate
    }

    #[inline]
    pub fn lines(&self) -> &[OriginalLineItem] {
        &self.lines
    }

    pub(crate) fn into_parts(self) -> (String, TaxRate, Vec<OriginalLineItem>) {
        (self.order_id, self.vat_rate, self.lines)
    }
}

impl TryFrom<RawOrderSnapshot> for OrderSnapshot {
    type Error = ValidationError;

    fn try_from(raw: RawOrderSnapshot) -> Result<Self, Self::Error> {
        OrderSnapshot::new(raw.order_id, raw.vat_rate, raw.lines)
    }
}

// =============================================================================
// Submit Boundary
// =============================================================================

/// A removed original line as sent to the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RemovedItem {
    pub line_item_id: String,
    pub quantity: i64,
    /// Unit barcodes scanned for this line, if any.
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[ts(as = "Option<Vec<String>>", optional)]
    pub barcodes: Vec<String>,
}

/// A replacement line as sent to the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReplacementItem {
    pub product_id: String,
    pub batch_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

/// The single submit-exchange request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExchangeRequest {
    pub order_id: String,
    pub removed_items: Vec<RemovedItem>,
    pub replacement_items: Vec<ReplacementItem>,
    pub tender: TenderSplit,
    /// Client-side difference; the server recomputes its own.
    pub expected_difference: Money,
    #[ts(as = "String")]
    pub requested_at: DateTime<Utc>,
}

/// The order service's answer to a successful submission.
///
/// The server is authoritative: `difference` and `settlement` here win over
/// whatever the client previewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExchangeReceipt {
    pub exchange_id: String,
    pub difference: Money,
    pub settlement: Settlement,
}

/// Client vs. server difference after submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Drift {
    pub client: Money,
    pub server: Money,
}

impl Drift {
    /// Signed gap, server minus client.
    ///
    /// The server figure is not validated, so the gap saturates.
    pub fn delta(&self) -> Money {
        Money::from_minor(self.server.minor().saturating_sub(self.client.minor()))
    }

    /// True when the gap exceeds `tolerance` minor units either way.
    pub fn exceeds(&self, tolerance: Money) -> bool {
        self.delta().minor().unsigned_abs() > tolerance.minor().unsigned_abs()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, available: i64) -> OriginalLineItem {
        OriginalLineItem::new(id, "P-1", Money::from_minor(500), 3, available, vec![]).unwrap()
    }

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(750);
        assert_eq!(rate.bps(), 750);
        assert!((rate.percentage() - 7.5).abs() < 0.001);
    }

    #[test]
    fn test_tax_rate_from_percentage() {
        assert_eq!(TaxRate::from_percentage(5.0).bps(), 500);
        assert_eq!(TaxRate::from_percentage(7.5).bps(), 750);
    }

    #[test]
    fn test_line_rejects_available_above_purchased() {
        let err = OriginalLineItem::new("L1", "P1", Money::from_minor(100), 2, 3, vec![]);
        assert!(matches!(err, Err(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn test_line_rejects_negative_price() {
        let err = OriginalLineItem::new("L1", "P1", Money::from_minor(-1), 1, 1, vec![]);
        assert!(err.is_err());
    }

    #[test]
    fn test_line_allows_zero_available() {
        let item = line("L1", 0);
        assert_eq!(item.quantity_available(), 0);
    }

    #[test]
    fn test_line_deserialize_runs_validation() {
        let ok = serde_json::json!({
            "line_id": "L1",
            "product_id": "P1",
            "unit_price": 1000,
            "quantity_purchased": 2,
            "quantity_available": 2,
            "barcodes": ["U1", "U2"]
        });
        let item: OriginalLineItem = serde_json::from_value(ok).unwrap();
        assert!(item.has_barcode("U2"));

        let bad = serde_json::json!({
            "line_id": "L1",
            "product_id": "P1",
            "unit_price": 1000,
            "quantity_purchased": 1,
            "quantity_available": 5
        });
        assert!(serde_json::from_value::<OriginalLineItem>(bad).is_err());
    }

    #[test]
    fn test_order_rejects_duplicate_lines() {
        let err = OrderSnapshot::new("O1", TaxRate::from_bps(500), vec![line("L1", 1), line("L1", 2)]);
        assert!(matches!(err, Err(ValidationError::Duplicate { .. })));
    }

    #[test]
    fn test_order_rejects_barcode_shared_by_two_lines() {
        let a = OriginalLineItem::new("L1", "P1", Money::from_minor(100), 1, 1, vec!["U1".into()])
            .unwrap();
        let b = OriginalLineItem::new("L2", "P2", Money::from_minor(100), 2, 2, vec!["U2".into(), "U1".into()])
            .unwrap();
        match OrderSnapshot::new("O1", TaxRate::zero(), vec![a, b]) {
            Err(ValidationError::Duplicate { field, value }) => {
                assert_eq!(field, "barcode");
                assert_eq!(value, "U1");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_line_rejects_price_above_cap() {
        let err = OriginalLineItem::new("L1", "P1", Money::from_minor(i64::MAX), 2, 2, vec![]);
        assert!(matches!(err, Err(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn test_order_rejects_total_above_cap() {
        let price = Money::from_minor(MAX_AMOUNT_MINOR);
        let single = OriginalLineItem::new("L1", "P1", price, 1, 1, vec![]).unwrap();
        assert!(OrderSnapshot::new("O1", TaxRate::zero(), vec![single.clone()]).is_ok());

        let many = OriginalLineItem::new("L2", "P1", price, 999, 999, vec![]).unwrap();
        let err = OrderSnapshot::new("O1", TaxRate::zero(), vec![single, many]);
        assert!(matches!(
            err,
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "order_total"
        ));
    }

    #[test]
    fn test_removed_item_barcodes_optional_in_bindings() {
        assert!(RemovedItem::decl().contains("barcodes?: Array<string>"));

        let item = RemovedItem {
            line_item_id: "L1".into(),
            quantity: 1,
            barcodes: vec![],
        };
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("barcodes").is_none());
    }

    #[test]
    fn test_order_rejects_rate_above_hundred_percent() {
        let err = OrderSnapshot::new("O1", TaxRate::from_bps(10_001), vec![]);
        assert!(err.is_err());
    }

    #[test]
    fn test_drift() {
        let drift = Drift {
            client: Money::from_minor(15_000),
            server: Money::from_minor(15_001),
        };
        assert_eq!(drift.delta().minor(), 1);
        assert!(drift.exceeds(Money::zero()));
        assert!(!drift.exceeds(Money::from_minor(1)));

        let wild = Drift {
            client: Money::from_minor(15_000),
            server: Money::from_minor(i64::MIN),
        };
        assert_eq!(wild.delta().minor(), i64::MIN);
        assert!(wild.exceeds(Money::from_major(1_000)));
    }
}
