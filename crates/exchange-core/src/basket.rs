//! # Replacement Basket
//!
//! The products the customer takes in exchange.
//!
//! ## Invariants
//! - One line per (product, batch): adding the same batch again merges
//! - Every line has `1 ≤ quantity ≤ ceiling`, where the ceiling is the batch
//!   stock reported by inventory
//! - A rejected operation leaves the basket exactly as it was
//!
//! ```text
//! add(P5, B9, qty 2, stock 8)  → [P5/B9 × 2]
//! add(P5, B9, qty 3, stock 8)  → [P5/B9 × 5]          merged, not duplicated
//! add(P5, B9, qty 4, stock 8)  → StockExceeded         basket stays at 5
//! update(line, 0)              → []                    zero removes
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::ReplacementItem;
use crate::validation::{validate_amount, validate_identifier};
use crate::MAX_AMOUNT_MINOR;

// =============================================================================
// Replacement Line
// =============================================================================

/// One (product, batch) in the basket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementLine {
    line_id: String,
    product_id: String,
    batch_id: String,
    /// Price frozen when the batch was first added.
    unit_price: Money,
    quantity: i64,
    /// Available units in the batch.
    ceiling: i64,
}

impl ReplacementLine {
    #[inline]
    pub fn line_id(&self) -> &str {
        &self.line_id
    }

    #[inline]
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    #[inline]
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    #[inline]
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    #[inline]
    pub fn ceiling(&self) -> i64 {
        self.ceiling
    }

    /// unit price × quantity
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    fn matches(&self, product_id: &str, batch_id: &str) -> bool {
        self.product_id == product_id && self.batch_id == batch_id
    }

    fn stock_exceeded(&self, already_in_basket: i64, requested: i64) -> CoreError {
        CoreError::StockExceeded {
            product_id: self.product_id.clone(),
            batch_id: self.batch_id.clone(),
            available: self.ceiling,
            already_in_basket,
            requested,
        }
    }
}

// =============================================================================
// Basket
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct ReplacementBasket {
    lines: Vec<ReplacementLine>,
}

impl ReplacementBasket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds units of a (product, batch), merging into an existing line.
    ///
    /// ## Behavior
    /// - Existing line: quantity grows by `requested_qty` if the total stays
    ///   within `ceiling`; the line's ceiling is refreshed to `ceiling`
    /// - New line: created if `requested_qty ≤ ceiling`
    /// - Otherwise `StockExceeded { available: ceiling, already_in_basket }`
    /// - A subtotal above `MAX_AMOUNT_MINOR` is a `Validation` error
    ///
    /// ## Returns
    /// The id of the line that now holds the units.
    pub fn add(
        &mut self,
        product_id: &str,
        batch_id: &str,
        unit_price: Money,
        requested_qty: i64,
        ceiling: i64,
    ) -> CoreResult<String> {
        validate_identifier("product_id", product_id)?;
        validate_identifier("batch_id", batch_id)?;
        validate_amount("unit_price", unit_price)?;

        if requested_qty < 1 {
            return Err(CoreError::InvalidQuantity {
                line_id: format!("{}/{}", product_id, batch_id),
                requested: requested_qty,
                max: ceiling.max(0),
            });
        }

        let index = self.lines.iter().position(|l| l.matches(product_id, batch_id));
        let existing = index.map_or(0, |i| self.lines[i].quantity);

        let total_qty = match existing.checked_add(requested_qty) {
            Some(total) if total <= ceiling => total,
            _ => {
                return Err(CoreError::StockExceeded {
                    product_id: product_id.to_string(),
                    batch_id: batch_id.to_string(),
                    available: ceiling,
                    already_in_basket: existing,
                    requested: requested_qty,
                })
            }
        };

        if let Some(i) = index {
            let price = self.lines[i].unit_price;
            self.check_subtotal(Some(i), price, total_qty)?;
            let line = &mut self.lines[i];
            line.quantity = total_qty;
            line.ceiling = ceiling;
            debug!(line_id = %line.line_id, product_id, batch_id, qty = line.quantity, "Replacement merged");
            return Ok(line.line_id.clone());
        }

        self.check_subtotal(None, unit_price, requested_qty)?;

        let line = ReplacementLine {
            line_id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            batch_id: batch_id.to_string(),
            unit_price,
            quantity: requested_qty,
            ceiling,
        };
        let line_id = line.line_id.clone();
        debug!(line_id = %line_id, product_id, batch_id, qty = requested_qty, "Replacement added");
        self.lines.push(line);
        Ok(line_id)
    }

    /// Sets a line's quantity outright.
    ///
    /// ## Behavior
    /// - `new_qty ≤ 0`: same as `remove`
    /// - `new_qty > ceiling`: `StockExceeded`, line unchanged
    /// - unknown line: `ReplacementNotFound`
    pub fn update_quantity(&mut self, line_id: &str, new_qty: i64) -> CoreResult<()> {
        let index = self
            .lines
            .iter()
            .position(|l| l.line_id == line_id)
            .ok_or_else(|| CoreError::ReplacementNotFound(line_id.to_string()))?;

        if new_qty <= 0 {
            self.remove(line_id);
            return Ok(());
        }

        let line = &self.lines[index];
        if new_qty > line.ceiling {
            return Err(line.stock_exceeded(0, new_qty));
        }
        self.check_subtotal(Some(index), line.unit_price, new_qty)?;

        self.lines[index].quantity = new_qty;
        debug!(line_id, qty = new_qty, "Replacement quantity updated");
        Ok(())
    }

    /// Rejects a change that would push the subtotal past `MAX_AMOUNT_MINOR`.
    ///
    /// `replacing` is the line whose quantity changes; `None` for a new line.
    fn check_subtotal(&self, replacing: Option<usize>, unit_price: Money, qty: i64) -> CoreResult<()> {
        let others = self
            .lines
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != replacing)
            .try_fold(Money::zero(), |acc, (_, l)| acc.checked_add(l.line_total()));
        let subtotal = others.and_then(|acc| {
            unit_price
                .checked_multiply_quantity(qty)
                .and_then(|line_total| acc.checked_add(line_total))
        });

        match subtotal {
            Some(total) if total.minor() <= MAX_AMOUNT_MINOR => Ok(()),
            _ => Err(ValidationError::OutOfRange {
                field: "replacement_subtotal".to_string(),
                min: 0,
                max: MAX_AMOUNT_MINOR,
            }
            .into()),
        }
    }

    /// Deletes a line. Unknown ids are a no-op.
    pub fn remove(&mut self, line_id: &str) {
        let before = self.lines.len();
        self.lines.retain(|l| l.line_id != line_id);
        if self.lines.len() != before {
            debug!(line_id, "Replacement removed");
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[ReplacementLine] {
        &self.lines
    }

    pub fn line(&self, line_id: &str) -> Option<&ReplacementLine> {
        self.lines.iter().find(|l| l.line_id == line_id)
    }

    /// The line holding a (product, batch), if any.
    pub fn find(&self, product_id: &str, batch_id: &str) -> Option<&ReplacementLine> {
        self.lines.iter().find(|l| l.matches(product_id, batch_id))
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct (product, batch) lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Σ unit price × quantity, before VAT.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(ReplacementLine::line_total).sum()
    }

    /// Lines in submit shape.
    pub fn items(&self) -> Vec<ReplacementItem> {
        self.lines
            .iter()
            .map(|l| ReplacementItem {
                product_id: l.product_id.clone(),
                batch_id: l.batch_id.clone(),
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PRICE: Money = Money::from_minor(12_000);

    #[test]
    fn test_same_batch_merges() {
        let mut basket = ReplacementBasket::new();
        let first = basket.add("5", "9", PRICE, 2, 10).unwrap();
        let second = basket.add("5", "9", PRICE, 3, 10).unwrap();

        assert_eq!(first, second);
        assert_eq!(basket.len(), 1);
        assert_eq!(basket.lines()[0].quantity(), 5);
        assert_eq!(basket.subtotal().minor(), 60_000);
    }

    #[test]
    fn test_different_batches_are_separate_lines() {
        let mut basket = ReplacementBasket::new();
        basket.add("5", "9", PRICE, 1, 10).unwrap();
        basket.add("5", "10", PRICE, 1, 10).unwrap();
        assert_eq!(basket.len(), 2);
    }

    #[test]
    fn test_ceiling_enforced_on_merge() {
        let mut basket = ReplacementBasket::new();
        basket.add("5", "9", PRICE, 4, 8).unwrap();

        let err = basket.add("5", "9", PRICE, 6, 8).unwrap_err();
        assert_eq!(
            err,
            CoreError::StockExceeded {
                product_id: "5".into(),
                batch_id: "9".into(),
                available: 8,
                already_in_basket: 4,
                requested: 6,
            }
        );
        assert_eq!(basket.find("5", "9").unwrap().quantity(), 4);
    }

    #[test]
    fn test_ceiling_enforced_on_new_line() {
        let mut basket = ReplacementBasket::new();
        assert!(matches!(
            basket.add("5", "9", PRICE, 3, 2),
            Err(CoreError::StockExceeded { already_in_basket: 0, .. })
        ));
        assert!(basket.is_empty());
    }

    #[test]
    fn test_add_rejects_non_positive_quantity() {
        let mut basket = ReplacementBasket::new();
        assert!(matches!(
            basket.add("5", "9", PRICE, 0, 8),
            Err(CoreError::InvalidQuantity { .. })
        ));
        assert!(basket.add("5", "9", PRICE, -2, 8).is_err());
        assert!(basket.is_empty());
    }

    #[test]
    fn test_add_rejects_bad_shape() {
        let mut basket = ReplacementBasket::new();
        assert!(matches!(
            basket.add("", "9", PRICE, 1, 8),
            Err(CoreError::Validation(_))
        ));
        assert!(basket.add("5", "9", Money::from_minor(-1), 1, 8).is_err());
    }

    #[test]
    fn test_huge_merge_is_stock_exceeded() {
        let mut basket = ReplacementBasket::new();
        basket.add("5", "9", PRICE, 1, 8).unwrap();

        let err = basket.add("5", "9", PRICE, i64::MAX, 8).unwrap_err();
        assert!(matches!(
            err,
            CoreError::StockExceeded { already_in_basket: 1, requested: i64::MAX, .. }
        ));
        assert_eq!(err.shortfall(), i64::MAX - 8);
        assert!(err.to_string().contains("short by"));
        assert_eq!(basket.find("5", "9").unwrap().quantity(), 1);
    }

    #[test]
    fn test_subtotal_cap() {
        let mut basket = ReplacementBasket::new();
        let price = Money::from_minor(MAX_AMOUNT_MINOR);
        let id = basket.add("5", "9", price, 1, i64::MAX).unwrap();

        // the same price again, as a merge and as a second line
        assert!(matches!(
            basket.add("5", "9", price, 1, i64::MAX),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert!(matches!(
            basket.add("6", "9", Money::from_minor(1), 1, 8),
            Err(CoreError::Validation(_))
        ));
        assert!(basket.update_quantity(&id, i64::MAX).is_err());
        assert_eq!(basket.len(), 1);
        assert_eq!(basket.subtotal().minor(), MAX_AMOUNT_MINOR);

        assert!(basket.add("5", "9", Money::from_minor(MAX_AMOUNT_MINOR + 1), 1, 8).is_err());
    }

    #[test]
    fn test_merge_keeps_first_price() {
        let mut basket = ReplacementBasket::new();
        basket.add("5", "9", PRICE, 1, 8).unwrap();
        basket.add("5", "9", Money::from_minor(99_999), 1, 8).unwrap();
        assert_eq!(basket.find("5", "9").unwrap().unit_price(), PRICE);
    }

    #[test]
    fn test_update_quantity() {
        let mut basket = ReplacementBasket::new();
        let id = basket.add("5", "9", PRICE, 1, 8).unwrap();

        basket.update_quantity(&id, 8).unwrap();
        assert_eq!(basket.line(&id).unwrap().line_total().minor(), 96_000);

        let err = basket.update_quantity(&id, 9).unwrap_err();
        assert_eq!(err.shortfall(), 1);
        assert_eq!(basket.line(&id).unwrap().quantity(), 8);
    }

    #[test]
    fn test_update_to_zero_removes() {
        let mut basket = ReplacementBasket::new();
        let id = basket.add("5", "9", PRICE, 2, 8).unwrap();
        basket.update_quantity(&id, 0).unwrap();
        assert!(basket.is_empty());

        let id = basket.add("5", "9", PRICE, 2, 8).unwrap();
        basket.update_quantity(&id, -3).unwrap();
        assert!(basket.is_empty());
    }

    #[test]
    fn test_update_unknown_line() {
        let mut basket = ReplacementBasket::new();
        assert!(matches!(
            basket.update_quantity("missing", 1),
            Err(CoreError::ReplacementNotFound(_))
        ));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut basket = ReplacementBasket::new();
        basket.add("5", "9", PRICE, 2, 8).unwrap();
        basket.remove("missing");
        basket.remove("missing");
        assert_eq!(basket.len(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add { product: u8, batch: u8, qty: i64, ceiling: i64 },
        Update { index: usize, qty: i64 },
        Remove { index: usize },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..3, 0u8..3, -2i64..6, 0i64..10)
                .prop_map(|(product, batch, qty, ceiling)| Op::Add { product, batch, qty, ceiling }),
            (0usize..6, -2i64..12).prop_map(|(index, qty)| Op::Update { index, qty }),
            (0usize..6).prop_map(|index| Op::Remove { index }),
        ]
    }

    proptest! {
        #[test]
        fn prop_lines_stay_within_ceiling(ops in prop::collection::vec(op(), 0..40)) {
            let mut basket = ReplacementBasket::new();
            for op in ops {
                let before = basket.lines().to_vec();
                let result = match op {
                    Op::Add { product, batch, qty, ceiling } => basket
                        .add(&product.to_string(), &batch.to_string(), PRICE, qty, ceiling)
                        .map(|_| ()),
                    Op::Update { index, qty } => match basket.lines().get(index) {
                        Some(line) => {
                            let id = line.line_id().to_string();
                            basket.update_quantity(&id, qty)
                        }
                        None => Ok(()),
                    },
                    Op::Remove { index } => {
                        if let Some(id) = basket.lines().get(index).map(|l| l.line_id().to_string()) {
                            basket.remove(&id);
                        }
                        Ok(())
                    }
                };

                if result.is_err() {
                    prop_assert_eq!(basket.lines(), &before[..]);
                }

                for line in basket.lines() {
                    prop_assert!(line.quantity() >= 1);
                    prop_assert!(line.quantity() <= line.ceiling());
                }
                let mut keys: Vec<_> = basket
                    .lines()
                    .iter()
                    .map(|l| (l.product_id().to_string(), l.batch_id().to_string()))
                    .collect();
                keys.sort();
                keys.dedup();
                prop_assert_eq!(keys.len(), basket.len());

                let expected: i64 = basket.lines().iter().map(|l| PRICE.minor() * l.quantity()).sum();
                prop_assert_eq!(basket.subtotal().minor(), expected);
            }
        }
    }
}
