//! # Line Item Selector
//!
//! Tracks which original order lines the customer is bringing back, and how
//! many units of each.
//!
//! ## Operator Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Tick checkbox ──────► select(line)        line selected, no quantity   │
//! │  Type quantity ──────► set_quantity(line)  1 ≤ qty ≤ available, else   │
//! │                                            rejected, previous kept      │
//! │  Scan unit barcode ──► scan_unit(code)     select + quantity += 1      │
//! │  Untick checkbox ────► deselect(line)      selection and qty cleared   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{OriginalLineItem, RemovedItem};

/// Per-line selection state. A line absent from the map is not selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Selection {
    quantity: Option<i64>,
    scanned: Vec<String>,
}

/// The subset of original lines chosen for removal.
#[derive(Debug, Clone)]
pub struct LineItemSelector {
    lines: Vec<OriginalLineItem>,
    selected: BTreeMap<String, Selection>,
}

impl LineItemSelector {
    /// Creates a selector over the lines of one order. Nothing is selected.
    pub fn new(lines: Vec<OriginalLineItem>) -> Self {
        LineItemSelector {
            lines,
            selected: BTreeMap::new(),
        }
    }

    /// All lines of the order, selected or not.
    pub fn lines(&self) -> &[OriginalLineItem] {
        &self.lines
    }

    pub fn line(&self, line_id: &str) -> Option<&OriginalLineItem> {
        self.lines.iter().find(|l| l.line_id() == line_id)
    }

    fn require_line(&self, line_id: &str) -> CoreResult<&OriginalLineItem> {
        self.line(line_id)
            .ok_or_else(|| CoreError::LineItemNotFound(line_id.to_string()))
    }

    /// Marks a line as selected. Selecting an already selected line keeps
    /// its quantity.
    pub fn select(&mut self, line_id: &str) -> CoreResult<()> {
        self.require_line(line_id)?;
        self.selected.entry(line_id.to_string()).or_default();
        debug!(line_id, "Line selected");
        Ok(())
    }

    /// Clears the selection and quantity of a line. Unknown or unselected
    /// lines are a no-op.
    pub fn deselect(&mut self, line_id: &str) {
        if self.selected.remove(line_id).is_some() {
            debug!(line_id, "Line deselected");
        }
    }

    /// Flips membership; returns whether the line is selected afterwards.
    pub fn toggle(&mut self, line_id: &str) -> CoreResult<bool> {
        if self.is_selected(line_id) {
            self.deselect(line_id);
            Ok(false)
        } else {
            self.select(line_id)?;
            Ok(true)
        }
    }

    /// Sets the quantity to remove from a selected line.
    ///
    /// ## Rules
    /// - The line must be selected
    /// - `1 ≤ qty ≤ quantity_available`
    ///
    /// On error nothing changes: the previous valid quantity is retained.
    /// Lowering the quantity below the number of scanned unit barcodes drops
    /// the most recent scans.
    pub fn set_quantity(&mut self, line_id: &str, qty: i64) -> CoreResult<()> {
        let available = self.require_line(line_id)?.quantity_available();

        let selection = self.selected.get_mut(line_id).ok_or_else(|| {
            CoreError::IncompleteSelection {
                reason: format!("line {} is not selected", line_id),
            }
        })?;

        if qty < 1 || qty > available {
            return Err(CoreError::InvalidQuantity {
                line_id: line_id.to_string(),
                requested: qty,
                max: available,
            });
        }

        selection.quantity = Some(qty);
        selection.scanned.truncate(qty as usize);
        debug!(line_id, qty, "Removal quantity set");
        Ok(())
    }

    /// Selects the line owning a unit barcode and counts that unit.
    ///
    /// Returns the owning line id. A barcode can only be counted once, and
    /// never beyond the line's available quantity.
    pub fn scan_unit(&mut self, barcode: &str) -> CoreResult<String> {
        let line = self
            .lines
            .iter()
            .find(|l| l.has_barcode(barcode))
            .ok_or_else(|| CoreError::LineItemNotFound(format!("barcode {}", barcode)))?;
        let line_id = line.line_id().to_string();
        let available = line.quantity_available();

        let current = self.selected.get(&line_id).cloned().unwrap_or_default();
        if current.scanned.iter().any(|c| c == barcode) {
            return Err(ValidationError::Duplicate {
                field: "barcode".to_string(),
                value: barcode.to_string(),
            }
            .into());
        }

        let next = current.quantity.unwrap_or(0) + 1;
        if next > available {
            return Err(CoreError::InvalidQuantity {
                line_id,
                requested: next,
                max: available,
            });
        }

        let selection = self.selected.entry(line_id.clone()).or_default();
        selection.quantity = Some(next);
        selection.scanned.push(barcode.to_string());
        debug!(line_id = %line_id, barcode, qty = next, "Unit scanned for removal");
        Ok(line_id)
    }

    pub fn is_selected(&self, line_id: &str) -> bool {
        self.selected.contains_key(line_id)
    }

    /// Recorded quantity, `None` when unselected or not yet quantified.
    pub fn quantity(&self, line_id: &str) -> Option<i64> {
        self.selected.get(line_id).and_then(|s| s.quantity)
    }

    /// True when no line is selected.
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// True when at least one selected line carries a valid quantity.
    pub fn has_quantified(&self) -> bool {
        self.selected.values().any(|s| s.quantity.is_some())
    }

    /// Selected lines that still have no quantity.
    pub fn unquantified(&self) -> Vec<&str> {
        self.selected
            .iter()
            .filter(|(_, s)| s.quantity.is_none())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Σ unit price × quantity over quantified selected lines.
    pub fn total(&self) -> Money {
        self.lines
            .iter()
            .filter_map(|line| {
                self.quantity(line.line_id())
                    .map(|qty| line.unit_price().multiply_quantity(qty))
            })
            .sum()
    }

    /// Quantified selections in order-line order, as submitted.
    pub fn removals(&self) -> Vec<RemovedItem> {
        self.lines
            .iter()
            .filter_map(|line| {
                let selection = self.selected.get(line.line_id())?;
                selection.quantity.map(|quantity| RemovedItem {
                    line_item_id: line.line_id().to_string(),
                    quantity,
                    barcodes: selection.scanned.clone(),
                })
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

    fn selector() -> LineItemSelector {
        LineItemSelector::new(vec![
            OriginalLineItem::new("L1", "P1", Money::from_minor(25_000), 2, 2, vec![]).unwrap(),
            OriginalLineItem::new(
                "L2",
                "P2",
                Money::from_minor(10_000),
                3,
                2,
                vec!["U1".into(), "U2".into(), "U3".into()],
            )
            .unwrap(),
            OriginalLineItem::new("L3", "P3", Money::from_minor(5_000), 1, 0, vec![]).unwrap(),
        ])
    }

    #[test]
    fn test_total_zero_when_nothing_selected() {
        assert!(selector().total().is_zero());
    }

    #[test]
    fn test_select_and_quantify() {
        let mut sel = selector();
        sel.select("L1").unwrap();
        sel.set_quantity("L1", 2).unwrap();
        sel.select("L2").unwrap();
        sel.set_quantity("L2", 1).unwrap();

        assert_eq!(sel.total().minor(), 60_000);
        assert!(sel.has_quantified());
        assert!(sel.unquantified().is_empty());
    }

    #[test]
    fn test_selected_without_quantity_counts_nothing() {
        let mut sel = selector();
        sel.select("L1").unwrap();
        assert!(sel.total().is_zero());
        assert_eq!(sel.unquantified(), vec!["L1"]);
        assert!(!sel.has_quantified());
    }

    #[test]
    fn test_invalid_quantity_keeps_previous() {
        let mut sel = selector();
        sel.select("L2").unwrap();
        sel.set_quantity("L2", 2).unwrap();

        let err = sel.set_quantity("L2", 3).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidQuantity {
                line_id: "L2".into(),
                requested: 3,
                max: 2
            }
        );
        assert!(sel.set_quantity("L2", 0).is_err());
        assert_eq!(sel.quantity("L2"), Some(2));
    }

    #[test]
    fn test_set_quantity_requires_selection() {
        let mut sel = selector();
        assert!(matches!(
            sel.set_quantity("L1", 1),
            Err(CoreError::IncompleteSelection { .. })
        ));
        assert!(matches!(
            sel.set_quantity("nope", 1),
            Err(CoreError::LineItemNotFound(_))
        ));
    }

    #[test]
    fn test_zero_available_can_be_selected_but_never_quantified() {
        let mut sel = selector();
        sel.select("L3").unwrap();
        assert!(sel.set_quantity("L3", 1).is_err());
        assert_eq!(sel.unquantified(), vec!["L3"]);
    }

    #[test]
    fn test_deselect_clears_quantity() {
        let mut sel = selector();
        sel.select("L1").unwrap();
        sel.set_quantity("L1", 1).unwrap();
        sel.deselect("L1");
        assert_eq!(sel.quantity("L1"), None);

        sel.select("L1").unwrap();
        assert_eq!(sel.quantity("L1"), None);
    }

    #[test]
    fn test_deselect_unknown_is_noop() {
        let mut sel = selector();
        sel.deselect("L1");
        sel.deselect("missing");
        assert!(sel.is_empty());
    }

    #[test]
    fn test_toggle() {
        let mut sel = selector();
        assert!(sel.toggle("L1").unwrap());
        assert!(!sel.toggle("L1").unwrap());
        assert!(sel.toggle("missing").is_err());
    }

    #[test]
    fn test_scan_unit_counts_each_barcode_once() {
        let mut sel = selector();
        assert_eq!(sel.scan_unit("U1").unwrap(), "L2");
        assert_eq!(sel.quantity("L2"), Some(1));

        assert!(matches!(
            sel.scan_unit("U1"),
            Err(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));

        sel.scan_unit("U2").unwrap();
        assert_eq!(sel.quantity("L2"), Some(2));

        // only two of three units are still available
        assert!(matches!(
            sel.scan_unit("U3"),
            Err(CoreError::InvalidQuantity { max: 2, .. })
        ));
        assert!(sel.scan_unit("nope").is_err());
    }

    #[test]
    fn test_removals_carry_scanned_barcodes() {
        let mut sel = selector();
        sel.scan_unit("U1").unwrap();
        sel.scan_unit("U2").unwrap();
        sel.set_quantity("L2", 1).unwrap();
        sel.select("L1").unwrap();

        let removals = sel.removals();
        assert_eq!(removals.len(), 1);
        assert_eq!(removals[0].line_item_id, "L2");
        assert_eq!(removals[0].quantity, 1);
        assert_eq!(removals[0].barcodes, vec!["U1".to_string()]);
    }
}
