//! # Scenario Preview
//!
//! Evaluates a whole exchange described in JSON, without any collaborator:
//! stock ceilings and the order come from the scenario itself. Used by the
//! `exchange-preview` binary and handy for reproducing a disputed exchange.
//!
//! ```json
//! {
//!   "order": {
//!     "order_id": "ORD-1",
//!     "vat_rate": 500,
//!     "lines": [{ "line_id": "L1", "product_id": "P1", "unit_price": 50000,
//!                 "quantity_purchased": 1, "quantity_available": 1 }]
//!   },
//!   "removals": [{ "line_id": "L1", "quantity": 1 }],
//!   "replacements": [{ "product_id": "P9", "batch_id": "B1",
//!                      "unit_price": 65000, "quantity": 1, "available": 8 }],
//!   "tender": { "card": 18250 }
//! }
//! ```

use exchange_core::payment::{verify_change, ChangeCheck};
use exchange_core::{
    DenominationCount, ExchangeFlow, ExchangeOutcome, ExchangeState, Money, OrderSnapshot,
    Settlement, TenderSplit,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ExchangeConfig;
use crate::error::{SessionError, SessionResult};

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioRemoval {
    pub line_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioReplacement {
    pub product_id: String,
    pub batch_id: String,
    pub unit_price: Money,
    pub quantity: i64,
    /// Stock ceiling for this batch.
    pub available: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub order: OrderSnapshot,
    #[serde(default)]
    pub removals: Vec<ScenarioRemoval>,
    /// Unit barcodes scanned on the original order.
    #[serde(default)]
    pub unit_barcodes: Vec<String>,
    #[serde(default)]
    pub replacements: Vec<ScenarioReplacement>,
    #[serde(default)]
    pub tender: TenderSplit,
    /// Change the operator counted back, if any.
    #[serde(default)]
    pub counted_change: Option<DenominationCount>,
}

/// Amounts formatted with the configured currency.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayAmounts {
    pub difference: String,
    pub total_tendered: String,
    pub remaining_balance: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewReport {
    pub state: ExchangeState,
    pub outcome: ExchangeOutcome,
    pub display: DisplayAmounts,
    /// Why the exchange could not be submitted yet, if it could not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    /// Notes to hand back when change is due.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_change: Option<DenominationCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_check: Option<ChangeCheck>,
}

/// Replays a scenario through a fresh flow and reports its outcome.
pub fn run_scenario(scenario: Scenario, config: &ExchangeConfig) -> SessionResult<PreviewReport> {
    let limits = &config.limits;
    if scenario.replacements.len() > limits.max_basket_lines {
        return Err(SessionError::LimitExceeded {
            limit: "Replacement lines".to_string(),
            max: limits.max_basket_lines as u64,
        });
    }

    let mut flow = ExchangeFlow::from_order(scenario.order);

    for removal in &scenario.removals {
        if removal.quantity > limits.max_item_quantity {
            return Err(SessionError::LimitExceeded {
                limit: "Item quantity".to_string(),
                max: limits.max_item_quantity as u64,
            });
        }
        flow.select(&removal.line_id)?;
        flow.set_removal_quantity(&removal.line_id, removal.quantity)?;
    }
    for code in &scenario.unit_barcodes {
        flow.scan_unit(code)?;
    }
    for item in &scenario.replacements {
        if item.quantity > limits.max_item_quantity {
            return Err(SessionError::LimitExceeded {
                limit: "Item quantity".to_string(),
                max: limits.max_item_quantity as u64,
            });
        }
        flow.add_replacement(
            &item.product_id,
            &item.batch_id,
            item.unit_price,
            item.quantity,
            item.available,
        )?;
    }
    flow.set_tender(scenario.tender)?;

    let outcome = flow.outcome();
    let blocked_reason = flow.review().err().map(|e| e.to_string());

    let suggested_change = match outcome.settlement {
        Settlement::FullyPaid { change } if change.is_positive() => {
            Some(DenominationCount::suggest(change).0)
        }
        _ => None,
    };
    let change_check = scenario
        .counted_change
        .as_ref()
        .map(|counted| verify_change(&outcome.allocation(), counted));

    debug!(
        order_id = %flow.order_id(),
        state = %flow.state(),
        difference = %outcome.difference,
        "Scenario evaluated"
    );

    let currency = &config.currency;
    Ok(PreviewReport {
        state: flow.state(),
        display: DisplayAmounts {
            difference: currency.format(outcome.difference),
            total_tendered: currency.format(outcome.total_tendered),
            remaining_balance: currency.format(outcome.remaining_balance),
        },
        outcome,
        blocked_reason,
        suggested_change,
        change_check,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use exchange_core::{CoreError, Denomination};
    use serde_json::json;

    fn scenario(tender: serde_json::Value) -> Scenario {
        serde_json::from_value(json!({
            "order": {
                "order_id": "ORD-1",
                "vat_rate": 500,
                "lines": [
                    { "line_id": "L1", "product_id": "P1", "unit_price": 50000,
                      "quantity_purchased": 1, "quantity_available": 1 },
                    { "line_id": "L2", "product_id": "P2", "unit_price": 10000,
                      "quantity_purchased": 2, "quantity_available": 2,
                      "barcodes": ["U1", "U2"] }
                ]
            },
            "removals": [{ "line_id": "L1", "quantity": 1 }],
            "replacements": [{ "product_id": "P9", "batch_id": "B1",
                               "unit_price": 60000, "quantity": 1, "available": 8 }],
            "tender": tender
        }))
        .unwrap()
    }

    #[test]
    fn test_customer_owes_with_vat() {
        // 600 + 5% VAT = 630, minus 500 returned = 130 owed
        let report = run_scenario(scenario(json!({ "card": 13000 })), &ExchangeConfig::default())
            .unwrap();
        assert_eq!(report.state, ExchangeState::Reviewing);
        assert_eq!(report.outcome.vat_amount, Money::from_major(30));
        assert_eq!(report.outcome.difference, Money::from_major(130));
        assert_eq!(report.outcome.settlement, Settlement::FullyPaid { change: Money::zero() });
        assert_eq!(report.display.difference, "৳ 130.00");
        assert!(report.blocked_reason.is_none());
        assert!(report.suggested_change.is_none());
    }

    #[test]
    fn test_change_suggested_and_checked() {
        let mut s = scenario(json!({ "cash_notes": { "notes": { "200": 1 } } }));
        s.counted_change = Some(DenominationCount::new().with_count(Denomination::Fifty, 1));
        let report = run_scenario(s, &ExchangeConfig::default()).unwrap();

        assert_eq!(report.outcome.settlement, Settlement::FullyPaid { change: Money::from_major(70) });
        let suggested = report.suggested_change.unwrap();
        assert_eq!(suggested.count(Denomination::Fifty), 1);
        assert_eq!(suggested.count(Denomination::Twenty), 1);

        let check = report.change_check.unwrap();
        assert!(!check.is_match());
        assert_eq!(check.gap(), Money::from_major(-20));
    }

    #[test]
    fn test_incomplete_scenario_reports_reason() {
        let mut s = scenario(json!({}));
        s.replacements.clear();
        let report = run_scenario(s, &ExchangeConfig::default()).unwrap();
        assert_eq!(report.state, ExchangeState::ItemsSelected);
        assert_eq!(
            report.blocked_reason.as_deref(),
            Some("Incomplete exchange: no replacement added")
        );
    }

    #[test]
    fn test_unit_barcodes_count_toward_removal() {
        let mut s = scenario(json!({}));
        s.unit_barcodes = vec!["U1".into()];
        let report = run_scenario(s, &ExchangeConfig::default()).unwrap();
        assert_eq!(report.outcome.original_amount, Money::from_major(600));
    }

    #[test]
    fn test_rule_violation_is_an_error() {
        let mut s = scenario(json!({}));
        s.replacements[0].quantity = 9;
        assert!(matches!(
            run_scenario(s, &ExchangeConfig::default()),
            Err(SessionError::Core(CoreError::StockExceeded { .. }))
        ));
    }

    #[test]
    fn test_invalid_order_rejected_on_parse() {
        let result = serde_json::from_value::<Scenario>(json!({
            "order": {
                "order_id": "ORD-1",
                "vat_rate": 0,
                "lines": [{ "line_id": "L1", "product_id": "P1", "unit_price": 100,
                            "quantity_purchased": 1, "quantity_available": 2 }]
            }
        }));
        assert!(result.is_err());
    }
}
