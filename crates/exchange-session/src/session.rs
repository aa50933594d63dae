//! # Exchange Session
//!
//! Drives one [`ExchangeFlow`] against its collaborators.
//!
//! ## Locking
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The flow lives in Arc<Mutex<ExchangeFlow>>. The lock is taken only    │
//! │  for synchronous transitions and is never held across an await.        │
//! │                                                                         │
//! │  submit()                                                               │
//! │    lock ─► begin_submit ─► unlock        state = Submitting             │
//! │    await gateway.submit (with timeout)                                  │
//! │    lock ─► complete_submit ─► unlock     Completed | Reviewing          │
//! │                                                                         │
//! │  A second submit() while the first awaits sees Submitting under the    │
//! │  lock and returns AlreadyInFlight without calling the gateway.         │
//! │                                                                         │
//! │  Dropping the submit future mid-call (caller timeout, select!, UI      │
//! │  teardown) records a cancelled submission: the flow is back in        │
//! │  Reviewing, never stuck in Submitting.                                  │
//! │                                                                         │
//! │  add_replacement() re-checks the configured limits under the same      │
//! │  lock that performs the add, after the inventory await.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex};

use exchange_core::payment::{verify_change, ChangeCheck};
use exchange_core::{
    CoreError, CoreResult, DenominationCount, Drift, ExchangeFlow, ExchangeOutcome, ExchangeReceipt,
    ExchangeState, Money, TenderSplit,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ExchangeConfig, LimitSettings};
use crate::error::{SessionError, SessionResult};
use crate::sources::{OrderSource, Services};

/// Result of a submit call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// The order service accepted the exchange.
    Completed {
        receipt: ExchangeReceipt,
        drift: Drift,
        /// The server difference differs from the client's beyond tolerance.
        drift_exceeded: bool,
    },
    /// Another submit for this exchange is still awaiting the server.
    AlreadyInFlight,
}

/// Failure reason recorded when a submit future is dropped mid-call.
pub const SUBMIT_CANCELLED: &str =
    "Submission cancelled before the server answered; check the order before retrying";

/// Holds a flow in `Submitting` for the duration of one gateway call.
///
/// If dropped before [`complete`](Self::complete), records a cancelled
/// submission so the flow returns to `Reviewing`.
struct PendingSubmit<'a> {
    flow: &'a Mutex<ExchangeFlow>,
    settled: bool,
}

impl<'a> PendingSubmit<'a> {
    fn new(flow: &'a Mutex<ExchangeFlow>) -> Self {
        PendingSubmit {
            flow,
            settled: false,
        }
    }

    fn complete(mut self, result: Result<ExchangeReceipt, String>) -> SessionResult<Drift> {
        self.settled = true;
        let mut flow = self.flow.lock().map_err(|_| SessionError::LockPoisoned)?;
        Ok(flow.complete_submit(result)?)
    }
}

impl Drop for PendingSubmit<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        match self.flow.lock() {
            Ok(mut flow) => {
                warn!(order_id = %flow.order_id(), "Submit dropped while awaiting the server");
                let _ = flow.complete_submit(Err(SUBMIT_CANCELLED.to_string()));
            }
            Err(_) => warn!("Flow lock poisoned; cancelled submission not recorded"),
        }
    }
}

/// Rejects an add that would break a configured limit.
fn check_basket_room(
    limits: &LimitSettings,
    flow: &ExchangeFlow,
    product_id: &str,
    batch_id: &str,
    qty: i64,
) -> SessionResult<()> {
    let basket = flow.basket();
    match basket.find(product_id, batch_id) {
        Some(line) => match line.quantity().checked_add(qty) {
            Some(total) => check_quantity(limits, total),
            None => Err(quantity_limit(limits)),
        },
        None => {
            let max = limits.max_basket_lines;
            if basket.len() >= max {
                return Err(SessionError::LimitExceeded {
                    limit: "Replacement lines".to_string(),
                    max: max as u64,
                });
            }
            check_quantity(limits, qty)
        }
    }
}

fn check_quantity(limits: &LimitSettings, qty: i64) -> SessionResult<()> {
    if qty > limits.max_item_quantity {
        return Err(quantity_limit(limits));
    }
    Ok(())
}

fn quantity_limit(limits: &LimitSettings) -> SessionError {
    SessionError::LimitExceeded {
        limit: "Item quantity".to_string(),
        max: limits.max_item_quantity as u64,
    }
}

/// One exchange transaction and the services it talks to.
///
/// Cloning is cheap and shares the same flow.
#[derive(Clone)]
pub struct ExchangeSession {
    flow: Arc<Mutex<ExchangeFlow>>,
    services: Services,
    config: Arc<ExchangeConfig>,
}

impl ExchangeSession {
    /// Loads the order and starts an exchange over it.
    pub async fn open(
        orders: &dyn OrderSource,
        order_id: &str,
        services: Services,
        config: ExchangeConfig,
    ) -> SessionResult<Self> {
        let order = orders.fetch_order(order_id).await?;
        info!(order_id, lines = order.lines().len(), "Exchange session opened");
        Ok(Self::from_flow(ExchangeFlow::from_order(order), services, config))
    }

    pub fn from_flow(flow: ExchangeFlow, services: Services, config: ExchangeConfig) -> Self {
        ExchangeSession {
            flow: Arc::new(Mutex::new(flow)),
            services,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Executes a read-only function with the flow.
    pub fn with_flow<F, R>(&self, f: F) -> SessionResult<R>
    where
        F: FnOnce(&ExchangeFlow) -> R,
    {
        let flow = self.flow.lock().map_err(|_| SessionError::LockPoisoned)?;
        Ok(f(&flow))
    }

    /// Executes a transition on the flow.
    pub fn with_flow_mut<F, R>(&self, f: F) -> SessionResult<R>
    where
        F: FnOnce(&mut ExchangeFlow) -> CoreResult<R>,
    {
        let mut flow = self.flow.lock().map_err(|_| SessionError::LockPoisoned)?;
        Ok(f(&mut flow)?)
    }

    pub fn state(&self) -> SessionResult<ExchangeState> {
        self.with_flow(|f| f.state())
    }

    /// Live preview of the difference and settlement.
    pub fn outcome(&self) -> SessionResult<ExchangeOutcome> {
        self.with_flow(|f| f.outcome())
    }

    pub fn review(&self) -> SessionResult<ExchangeOutcome> {
        self.with_flow(|f| f.review())?.map_err(SessionError::from)
    }

    // =========================================================================
    // Returned Lines
    // =========================================================================

    pub fn select(&self, line_id: &str) -> SessionResult<()> {
        self.with_flow_mut(|f| f.select(line_id))
    }

    pub fn deselect(&self, line_id: &str) -> SessionResult<()> {
        self.with_flow_mut(|f| f.deselect(line_id))
    }

    pub fn toggle(&self, line_id: &str) -> SessionResult<bool> {
        self.with_flow_mut(|f| f.toggle(line_id))
    }

    pub fn set_removal_quantity(&self, line_id: &str, qty: i64) -> SessionResult<()> {
        check_quantity(&self.config.limits, qty)?;
        self.with_flow_mut(|f| f.set_removal_quantity(line_id, qty))
    }

    /// Counts one returned unit by its barcode; returns the owning line.
    pub fn scan_unit(&self, barcode: &str) -> SessionResult<String> {
        self.with_flow_mut(|f| f.scan_unit(barcode))
    }

    // =========================================================================
    // Replacements
    // =========================================================================

    /// Adds replacement units, taking the ceiling from live inventory.
    ///
    /// Returns the id of the basket line holding the units.
    pub async fn add_replacement(
        &self,
        product_id: &str,
        batch_id: &str,
        unit_price: Money,
        qty: i64,
    ) -> SessionResult<String> {
        // early answer before the inventory round trip
        self.with_flow(|f| check_basket_room(&self.config.limits, f, product_id, batch_id, qty))??;
        let ceiling = self
            .services
            .inventory
            .available_quantity(product_id, batch_id)
            .await?;
        debug!(product_id, batch_id, ceiling, "Stock ceiling fetched");
        self.add_within_limits(product_id, batch_id, unit_price, qty, ceiling)
    }

    /// Adds one unit of whatever a scanned product barcode resolves to.
    pub async fn scan_replacement(&self, code: &str) -> SessionResult<String> {
        let resolved = self.services.barcodes.resolve(code).await?;
        debug!(code, product_id = %resolved.product_id, batch_id = %resolved.batch_id, "Barcode resolved");
        self.add_within_limits(
            &resolved.product_id,
            &resolved.batch_id,
            resolved.unit_price,
            1,
            resolved.available,
        )
    }

    /// Checks the configured limits and adds, under one lock.
    fn add_within_limits(
        &self,
        product_id: &str,
        batch_id: &str,
        unit_price: Money,
        qty: i64,
        ceiling: i64,
    ) -> SessionResult<String> {
        let mut flow = self.flow.lock().map_err(|_| SessionError::LockPoisoned)?;
        check_basket_room(&self.config.limits, &flow, product_id, batch_id, qty)?;
        Ok(flow.add_replacement(product_id, batch_id, unit_price, qty, ceiling)?)
    }

    pub fn update_replacement(&self, line_id: &str, qty: i64) -> SessionResult<()> {
        check_quantity(&self.config.limits, qty)?;
        self.with_flow_mut(|f| f.update_replacement(line_id, qty))
    }

    pub fn remove_replacement(&self, line_id: &str) -> SessionResult<()> {
        self.with_flow_mut(|f| f.remove_replacement(line_id))
    }

    // =========================================================================
    // Tender
    // =========================================================================

    pub fn set_tender(&self, tender: TenderSplit) -> SessionResult<()> {
        self.with_flow_mut(|f| f.set_tender(tender))
    }

    pub fn acknowledge_balance(&self) -> SessionResult<()> {
        self.with_flow_mut(|f| f.acknowledge_balance())
    }

    /// Compares change counted back with the change the tender implies.
    pub fn verify_change(&self, counted: &DenominationCount) -> SessionResult<ChangeCheck> {
        self.with_flow(|f| verify_change(&f.outcome().allocation(), counted))
    }

    // =========================================================================
    // Submit
    // =========================================================================

    /// Sends the exchange to the order service, at most once at a time.
    ///
    /// ## Returns
    /// - `Completed` with the receipt and client/server drift
    /// - `AlreadyInFlight` if another submit is awaiting the server
    ///
    /// ## Errors
    /// - `SettlementPending` when a partial balance is unacknowledged
    /// - `SubmissionFailure` when the server refuses or the call times out;
    ///   the flow is back in review with the reason retained
    ///
    /// ## Cancellation
    /// Dropping the returned future before it resolves records a failed
    /// submission with [`SUBMIT_CANCELLED`] as the reason.
    pub async fn submit(&self, acknowledge: bool) -> SessionResult<SubmitOutcome> {
        let request = match self.with_flow_mut(|f| f.begin_submit(acknowledge))? {
            Some(request) => request,
            None => return Ok(SubmitOutcome::AlreadyInFlight),
        };
        let pending = PendingSubmit::new(&self.flow);

        let timeout = self.config.submit.timeout();
        let result = match tokio::time::timeout(timeout, self.services.gateway.submit(request)).await
        {
            Ok(Ok(receipt)) => Ok(receipt),
            Ok(Err(e)) => Err(e.failure_reason()),
            Err(_) => Err(SessionError::Timeout(self.config.submit.timeout_secs).failure_reason()),
        };

        let drift = pending.complete(result.clone())?;
        let receipt = match result {
            Ok(receipt) => receipt,
            Err(reason) => return Err(CoreError::SubmissionFailure(reason).into()),
        };

        let drift_exceeded = drift.exceeds(self.config.submit.drift_tolerance());
        if drift_exceeded {
            warn!(
                exchange_id = %receipt.exchange_id,
                client = %drift.client,
                server = %drift.server,
                delta = %drift.delta(),
                "Server difference disagrees with client preview"
            );
        }

        Ok(SubmitOutcome::Completed {
            receipt,
            drift,
            drift_exceeded,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
