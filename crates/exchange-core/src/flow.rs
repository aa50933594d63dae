//! # Exchange Flow
//!
//! The state machine that gates an exchange from first selection to the
//! single submit call.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Idle ──► ItemsSelected ──► ReplacementsAdded ──► Reviewing            │
//! │    ▲  ≥1 quantified line   ≥1 replacement   no unquantified line  │     │
//! │    │                                                              │     │
//! │    └────────── edits re-derive the state ◄────────────────────────┤     │
//! │                                                                   │     │
//! │                                    operator confirms (+ ack if    │     │
//! │                                    the settlement is partial)     ▼     │
//! │                               ┌──────────── failure ◄──── Submitting    │
//! │                               ▼                               │         │
//! │                           Reviewing                  success  ▼         │
//! │                       (reason retained)                   Completed     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The flow itself performs no I/O. [`ExchangeFlow::begin_submit`] hands out
//! the request and moves to `Submitting`; the caller performs the call and
//! reports back through [`ExchangeFlow::complete_submit`]. A second
//! `begin_submit` while `Submitting` yields `None`, so a double click never
//! produces a second external call.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::basket::ReplacementBasket;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::payment::{allocate, Allocation, Settlement, TenderSplit};
use crate::reconcile::{reconcile, PriceDelta};
use crate::selection::LineItemSelector;
use crate::types::{Drift, ExchangeReceipt, ExchangeRequest, OrderSnapshot, TaxRate};

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeState {
    Idle,
    ItemsSelected,
    ReplacementsAdded,
    Reviewing,
    Submitting,
    Completed,
}

impl ExchangeState {
    /// Selection, basket and tender may still change.
    pub fn is_editable(&self) -> bool {
        !matches!(self, ExchangeState::Submitting | ExchangeState::Completed)
    }
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExchangeState::Idle => "idle",
            ExchangeState::ItemsSelected => "items selected",
            ExchangeState::ReplacementsAdded => "replacements added",
            ExchangeState::Reviewing => "reviewing",
            ExchangeState::Submitting => "submitting",
            ExchangeState::Completed => "completed",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// Everything the review screen shows: the price delta and its settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExchangeOutcome {
    pub original_amount: Money,
    pub new_subtotal: Money,
    pub vat_rate: TaxRate,
    pub vat_amount: Money,
    pub total_new_amount: Money,
    pub difference: Money,
    pub effective_cash: Money,
    pub total_tendered: Money,
    pub fee_applied: Money,
    pub remaining_balance: Money,
    pub settlement: Settlement,
}

impl ExchangeOutcome {
    /// Reconciles the amounts and applies the tender in one step.
    pub fn evaluate(
        original_amount: Money,
        new_subtotal: Money,
        vat_rate: TaxRate,
        tender: &TenderSplit,
    ) -> Self {
        let delta = reconcile(original_amount, new_subtotal, vat_rate);
        let allocation = allocate(tender, delta.difference);
        Self::from_parts(&delta, &allocation)
    }

    pub fn from_parts(delta: &PriceDelta, allocation: &Allocation) -> Self {
        ExchangeOutcome {
            original_amount: delta.original_amount,
            new_subtotal: delta.new_subtotal,
            vat_rate: delta.vat_rate,
            vat_amount: delta.vat_amount,
            total_new_amount: delta.total_new_amount,
            difference: delta.difference,
            effective_cash: allocation.effective_cash,
            total_tendered: allocation.total_tendered,
            fee_applied: allocation.fee_applied,
            remaining_balance: allocation.remaining_balance,
            settlement: allocation.settlement,
        }
    }

    /// The allocation part alone, for change verification.
    pub fn allocation(&self) -> Allocation {
        Allocation {
            effective_cash: self.effective_cash,
            total_tendered: self.total_tendered,
            fee_applied: self.fee_applied,
            remaining_balance: self.remaining_balance,
            settlement: self.settlement,
        }
    }
}

// =============================================================================
// Flow
// =============================================================================

/// One exchange transaction against one original order.
#[derive(Debug, Clone)]
pub struct ExchangeFlow {
    order_id: String,
    vat_rate: TaxRate,
    selector: LineItemSelector,
    basket: ReplacementBasket,
    tender: TenderSplit,
    state: ExchangeState,
    /// Operator confirmed a partial settlement; cleared by any edit.
    acknowledged: bool,
    /// Server text of the last failed submission.
    last_failure: Option<String>,
    /// Client difference sent with the in-flight request.
    submitted_difference: Option<Money>,
    receipt: Option<ExchangeReceipt>,
}

impl ExchangeFlow {
    /// Starts an exchange over a loaded order. Nothing is selected.
    pub fn from_order(order: OrderSnapshot) -> Self {
        let (order_id, vat_rate, lines) = order.into_parts();
        debug!(order_id = %order_id, lines = lines.len(), "Exchange started");
        ExchangeFlow {
            order_id,
            vat_rate,
            selector: LineItemSelector::new(lines),
            basket: ReplacementBasket::new(),
            tender: TenderSplit::new(),
            state: ExchangeState::Idle,
            acknowledged: false,
            last_failure: None,
            submitted_difference: None,
            receipt: None,
        }
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn vat_rate(&self) -> TaxRate {
        self.vat_rate
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn selector(&self) -> &LineItemSelector {
        &self.selector
    }

    pub fn basket(&self) -> &ReplacementBasket {
        &self.basket
    }

    pub fn tender(&self) -> &TenderSplit {
        &self.tender
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    /// Server receipt once `Completed`.
    pub fn receipt(&self) -> Option<&ExchangeReceipt> {
        self.receipt.as_ref()
    }

    // -------------------------------------------------------------------------
    // Edits
    // -------------------------------------------------------------------------

    fn ensure_editable(&self, action: &str) -> CoreResult<()> {
        if self.state.is_editable() {
            Ok(())
        } else {
            Err(CoreError::FlowLocked {
                state: self.state,
                action: action.to_string(),
            })
        }
    }

    /// Runs one edit: rejected while locked, re-derives the state and drops
    /// any acknowledgment when it succeeds.
    fn edit<T>(
        &mut self,
        action: &str,
        apply: impl FnOnce(&mut Self) -> CoreResult<T>,
    ) -> CoreResult<T> {
        self.ensure_editable(action)?;
        let out = apply(self)?;
        self.acknowledged = false;
        self.refresh_state();
        Ok(out)
    }

    fn derive_state(&self) -> ExchangeState {
        if !self.selector.has_quantified() {
            ExchangeState::Idle
        } else if self.basket.is_empty() {
            ExchangeState::ItemsSelected
        } else if !self.selector.unquantified().is_empty() {
            ExchangeState::ReplacementsAdded
        } else {
            ExchangeState::Reviewing
        }
    }

    fn refresh_state(&mut self) {
        let next = self.derive_state();
        if next != self.state {
            debug!(order_id = %self.order_id, from = %self.state, to = %next, "Exchange state changed");
            self.state = next;
        }
    }

    pub fn select(&mut self, line_id: &str) -> CoreResult<()> {
        self.edit("select a line", |f| f.selector.select(line_id))
    }

    pub fn deselect(&mut self, line_id: &str) -> CoreResult<()> {
        self.edit("deselect a line", |f| {
            f.selector.deselect(line_id);
            Ok(())
        })
    }

    pub fn toggle(&mut self, line_id: &str) -> CoreResult<bool> {
        self.edit("toggle a line", |f| f.selector.toggle(line_id))
    }

    pub fn set_removal_quantity(&mut self, line_id: &str, qty: i64) -> CoreResult<()> {
        self.edit("change a removal quantity", |f| {
            f.selector.set_quantity(line_id, qty)
        })
    }

    /// Counts one original unit by its barcode. Returns the owning line id.
    pub fn scan_unit(&mut self, barcode: &str) -> CoreResult<String> {
        self.edit("scan a unit", |f| f.selector.scan_unit(barcode))
    }

    /// See [`ReplacementBasket::add`].
    pub fn add_replacement(
        &mut self,
        product_id: &str,
        batch_id: &str,
        unit_price: Money,
        qty: i64,
        ceiling: i64,
    ) -> CoreResult<String> {
        self.edit("add a replacement", |f| {
            f.basket.add(product_id, batch_id, unit_price, qty, ceiling)
        })
    }

    pub fn update_replacement(&mut self, line_id: &str, qty: i64) -> CoreResult<()> {
        self.edit("change a replacement quantity", |f| {
            f.basket.update_quantity(line_id, qty)
        })
    }

    pub fn remove_replacement(&mut self, line_id: &str) -> CoreResult<()> {
        self.edit("remove a replacement", |f| {
            f.basket.remove(line_id);
            Ok(())
        })
    }

    pub fn clear_replacements(&mut self) -> CoreResult<()> {
        self.edit("clear replacements", |f| {
            f.basket.clear();
            Ok(())
        })
    }

    /// Replaces the tender wholesale with the form's latest value.
    pub fn set_tender(&mut self, tender: TenderSplit) -> CoreResult<()> {
        self.edit("change the tender", |f| {
            tender.validate()?;
            f.tender = tender;
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Review
    // -------------------------------------------------------------------------

    /// Live preview, valid in any state.
    pub fn outcome(&self) -> ExchangeOutcome {
        ExchangeOutcome::evaluate(
            self.selector.total(),
            self.basket.subtotal(),
            self.vat_rate,
            &self.tender,
        )
    }

    /// The outcome, provided the exchange is complete enough to submit.
    pub fn review(&self) -> CoreResult<ExchangeOutcome> {
        match self.state {
            ExchangeState::Idle => Err(CoreError::IncompleteSelection {
                reason: "no returned line has a quantity".to_string(),
            }),
            ExchangeState::ItemsSelected => Err(CoreError::IncompleteSelection {
                reason: "no replacement added".to_string(),
            }),
            ExchangeState::ReplacementsAdded => Err(CoreError::IncompleteSelection {
                reason: format!(
                    "selected lines without a quantity: {}",
                    self.selector.unquantified().join(", ")
                ),
            }),
            _ => Ok(self.outcome()),
        }
    }

    /// Records that the operator accepts a partial settlement.
    pub fn acknowledge_balance(&mut self) -> CoreResult<()> {
        self.ensure_editable("acknowledge the balance")?;
        self.acknowledged = true;
        debug!(order_id = %self.order_id, "Outstanding balance acknowledged");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Submit
    // -------------------------------------------------------------------------

    /// Moves `Reviewing → Submitting` and returns the request to send.
    ///
    /// `acknowledge` has the same effect as a prior
    /// [`acknowledge_balance`](Self::acknowledge_balance).
    ///
    /// ## Returns
    /// - `Ok(Some(request))`: the caller must send it, then call
    ///   [`complete_submit`](Self::complete_submit)
    /// - `Ok(None)`: a submission is already in flight; send nothing
    pub fn begin_submit(&mut self, acknowledge: bool) -> CoreResult<Option<ExchangeRequest>> {
        if self.state == ExchangeState::Submitting {
            debug!(order_id = %self.order_id, "Submission already in flight");
            return Ok(None);
        }
        self.ensure_editable("submit")?;

        let outcome = self.review()?;
        if acknowledge {
            self.acknowledged = true;
        }
        if outcome.settlement.is_partial() && !self.acknowledged {
            return Err(CoreError::SettlementPending {
                kind: outcome.settlement.kind().to_string(),
                balance: outcome.remaining_balance,
            });
        }

        let request = ExchangeRequest {
            order_id: self.order_id.clone(),
            removed_items: self.selector.removals(),
            replacement_items: self.basket.items(),
            tender: self.tender.clone(),
            expected_difference: outcome.difference,
            requested_at: Utc::now(),
        };

        self.state = ExchangeState::Submitting;
        self.submitted_difference = Some(outcome.difference);
        info!(
            order_id = %self.order_id,
            difference = %outcome.difference,
            removed = request.removed_items.len(),
            replacements = request.replacement_items.len(),
            "Submitting exchange"
        );
        Ok(Some(request))
    }

    /// Records the result of the external call started by `begin_submit`.
    ///
    /// Success moves to `Completed` and returns the client/server drift.
    /// Failure returns to `Reviewing` with local state intact and the server
    /// text kept verbatim, surfaced as `SubmissionFailure`.
    pub fn complete_submit(&mut self, result: Result<ExchangeReceipt, String>) -> CoreResult<Drift> {
        if self.state != ExchangeState::Submitting {
            return Err(CoreError::FlowLocked {
                state: self.state,
                action: "record a submission result".to_string(),
            });
        }
        let client = self.submitted_difference.take().unwrap_or_default();

        match result {
            Ok(receipt) => {
                let drift = Drift {
                    client,
                    server: receipt.difference,
                };
                info!(
                    order_id = %self.order_id,
                    exchange_id = %receipt.exchange_id,
                    difference = %receipt.difference,
                    "Exchange completed"
                );
                self.state = ExchangeState::Completed;
                self.last_failure = None;
                self.receipt = Some(receipt);
                Ok(drift)
            }
            Err(reason) => {
                warn!(order_id = %self.order_id, reason = %reason, "Exchange submission failed");
                self.last_failure = Some(reason.clone());
                self.refresh_state();
                Err(CoreError::SubmissionFailure(reason))
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denomination::Denomination;
    use crate::payment::PaymentChannel;
    use crate::types::OriginalLineItem;

    fn order() -> OrderSnapshot {
        OrderSnapshot::new(
            "ORD-1",
            TaxRate::zero(),
            vec![
                OriginalLineItem::new("L1", "P1", Money::from_major(500), 1, 1, vec![]).unwrap(),
                OriginalLineItem::new("L2", "P2", Money::from_major(100), 2, 2, vec![]).unwrap(),
            ],
        )
        .unwrap()
    }

    /// L1 returned (500), one replacement at 650: customer owes 150.
    fn reviewing_flow() -> ExchangeFlow {
        let mut flow = ExchangeFlow::from_order(order());
        flow.select("L1").unwrap();
        flow.set_removal_quantity("L1", 1).unwrap();
        flow.add_replacement("P9", "B1", Money::from_major(650), 1, 5)
            .unwrap();
        flow
    }

    fn receipt(difference: Money) -> ExchangeReceipt {
        ExchangeReceipt {
            exchange_id: "EX-1".to_string(),
            difference,
            settlement: Settlement::FullyPaid {
                change: Money::zero(),
            },
        }
    }

    #[test]
    fn test_states_follow_edits() {
        let mut flow = ExchangeFlow::from_order(order());
        assert_eq!(flow.state(), ExchangeState::Idle);

        flow.select("L1").unwrap();
        assert_eq!(flow.state(), ExchangeState::Idle);

        flow.set_removal_quantity("L1", 1).unwrap();
        assert_eq!(flow.state(), ExchangeState::ItemsSelected);

        let line = flow
            .add_replacement("P9", "B1", Money::from_major(650), 1, 5)
            .unwrap();
        assert_eq!(flow.state(), ExchangeState::Reviewing);

        flow.select("L2").unwrap();
        assert_eq!(flow.state(), ExchangeState::ReplacementsAdded);
        assert!(matches!(
            flow.review(),
            Err(CoreError::IncompleteSelection { .. })
        ));

        flow.deselect("L2").unwrap();
        assert_eq!(flow.state(), ExchangeState::Reviewing);

        flow.remove_replacement(&line).unwrap();
        assert_eq!(flow.state(), ExchangeState::ItemsSelected);

        flow.deselect("L1").unwrap();
        assert_eq!(flow.state(), ExchangeState::Idle);
    }

    #[test]
    fn test_outcome_available_before_review() {
        let mut flow = ExchangeFlow::from_order(order());
        flow.select("L2").unwrap();
        flow.set_removal_quantity("L2", 2).unwrap();

        let outcome = flow.outcome();
        assert_eq!(outcome.original_amount, Money::from_major(200));
        assert_eq!(outcome.difference, Money::from_major(-200));
        assert!(flow.review().is_err());
    }

    #[test]
    fn test_partial_settlement_requires_acknowledgment() {
        let mut flow = reviewing_flow();
        flow.set_tender(TenderSplit::new().with_note_count(Denomination::Hundred, 1))
            .unwrap();

        let err = flow.begin_submit(false).unwrap_err();
        assert_eq!(
            err,
            CoreError::SettlementPending {
                kind: "payment".to_string(),
                balance: Money::from_major(50),
            }
        );
        assert_eq!(flow.state(), ExchangeState::Reviewing);

        flow.acknowledge_balance().unwrap();
        let request = flow.begin_submit(false).unwrap().unwrap();
        assert_eq!(request.expected_difference, Money::from_major(150));
        assert_eq!(flow.state(), ExchangeState::Submitting);
    }

    #[test]
    fn test_edit_clears_acknowledgment() {
        let mut flow = reviewing_flow();
        flow.acknowledge_balance().unwrap();
        assert!(flow.is_acknowledged());

        let line_id = flow.basket().lines()[0].line_id().to_string();
        flow.update_replacement(&line_id, 2).unwrap();
        assert!(!flow.is_acknowledged());
        assert!(matches!(
            flow.begin_submit(false),
            Err(CoreError::SettlementPending { .. })
        ));
    }

    #[test]
    fn test_submit_acknowledge_flag() {
        let mut flow = reviewing_flow();
        assert!(flow.begin_submit(true).unwrap().is_some());
    }

    #[test]
    fn test_reentrant_submit_is_noop() {
        let mut flow = reviewing_flow();
        let tender = TenderSplit::new()
            .with_channel(PaymentChannel::Card, Money::from_major(150))
            .unwrap();
        flow.set_tender(tender).unwrap();

        assert!(flow.begin_submit(false).unwrap().is_some());
        assert!(flow.begin_submit(false).unwrap().is_none());
        assert!(flow.begin_submit(true).unwrap().is_none());
        assert_eq!(flow.state(), ExchangeState::Submitting);
    }

    #[test]
    fn test_edits_locked_while_submitting() {
        let mut flow = reviewing_flow();
        flow.begin_submit(true).unwrap();

        let err = flow.select("L2").unwrap_err();
        assert!(matches!(
            err,
            CoreError::FlowLocked {
                state: ExchangeState::Submitting,
                ..
            }
        ));
        assert!(flow.set_tender(TenderSplit::new()).is_err());
        assert!(flow.acknowledge_balance().is_err());
    }

    #[test]
    fn test_failed_submission_returns_to_review() {
        let mut flow = reviewing_flow();
        flow.begin_submit(true).unwrap();

        let err = flow
            .complete_submit(Err("Batch B1 is no longer on sale".to_string()))
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::SubmissionFailure("Batch B1 is no longer on sale".to_string())
        );
        assert_eq!(flow.state(), ExchangeState::Reviewing);
        assert_eq!(flow.last_failure(), Some("Batch B1 is no longer on sale"));
        assert_eq!(flow.basket().len(), 1);
        assert_eq!(flow.selector().quantity("L1"), Some(1));

        // operator may edit and retry by hand
        flow.set_removal_quantity("L1", 1).unwrap();
        assert!(flow.begin_submit(true).unwrap().is_some());
    }

    #[test]
    fn test_successful_submission_completes_and_locks() {
        let mut flow = reviewing_flow();
        flow.begin_submit(true).unwrap();

        let drift = flow
            .complete_submit(Ok(receipt(Money::from_major(151))))
            .unwrap();
        assert_eq!(drift.client, Money::from_major(150));
        assert_eq!(drift.delta(), Money::from_major(1));
        assert_eq!(flow.state(), ExchangeState::Completed);
        assert_eq!(flow.receipt().map(|r| r.exchange_id.as_str()), Some("EX-1"));

        assert!(matches!(
            flow.add_replacement("P1", "B1", Money::from_major(1), 1, 1),
            Err(CoreError::FlowLocked { .. })
        ));
        assert!(matches!(
            flow.begin_submit(true),
            Err(CoreError::FlowLocked { .. })
        ));
    }

    #[test]
    fn test_complete_without_begin_rejected() {
        let mut flow = reviewing_flow();
        assert!(matches!(
            flow.complete_submit(Ok(receipt(Money::zero()))),
            Err(CoreError::FlowLocked {
                state: ExchangeState::Reviewing,
                ..
            })
        ));
    }

    #[test]
    fn test_even_exchange_submits_without_tender() {
        let mut flow = ExchangeFlow::from_order(order());
        flow.select("L1").unwrap();
        flow.set_removal_quantity("L1", 1).unwrap();
        flow.add_replacement("P9", "B1", Money::from_major(250), 2, 2)
            .unwrap();

        let outcome = flow.review().unwrap();
        assert_eq!(outcome.settlement, Settlement::EvenExchange);
        let request = flow.begin_submit(false).unwrap().unwrap();
        assert!(request.expected_difference.is_zero());
    }

    #[test]
    fn test_request_contents() {
        let mut flow = reviewing_flow();
        let request = flow.begin_submit(true).unwrap().unwrap();
        assert_eq!(request.order_id, "ORD-1");
        assert_eq!(request.removed_items.len(), 1);
        assert_eq!(request.removed_items[0].line_item_id, "L1");
        assert_eq!(request.replacement_items[0].product_id, "P9");
        assert_eq!(request.replacement_items[0].unit_price, Money::from_major(650));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ExchangeState::ReplacementsAdded.to_string(), "replacements added");
        let err = CoreError::FlowLocked {
            state: ExchangeState::Completed,
            action: "submit".to_string(),
        };
        assert_eq!(err.to_string(), "Exchange is completed, cannot submit");
    }
}
