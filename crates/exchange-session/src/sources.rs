//! # Collaborators
//!
//! The external services an exchange talks to. Each is an object-safe async
//! trait so the session can hold them as `Arc<dyn ...>` and tests can swap
//! in in-memory fakes.
//!
//! ```text
//! ┌──────────────────┐   fetch_order        ┌──────────────────────────┐
//! │  OrderSource     │ ───────────────────► │                          │
//! ├──────────────────┤   available_quantity │                          │
//! │  InventorySource │ ───────────────────► │     ExchangeSession      │
//! ├──────────────────┤   resolve            │                          │
//! │  BarcodeResolver │ ───────────────────► │                          │
//! ├──────────────────┤   submit (once)      │                          │
//! │  ExchangeGateway │ ◄─────────────────── │                          │
//! └──────────────────┘                      └──────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use exchange_core::{ExchangeReceipt, ExchangeRequest, Money, OrderSnapshot};
use serde::{Deserialize, Serialize};

use crate::error::SessionResult;

/// Loads the original order being exchanged.
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn fetch_order(&self, order_id: &str) -> SessionResult<OrderSnapshot>;
}

/// Live stock for a (product, batch); the basket ceiling.
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn available_quantity(&self, product_id: &str, batch_id: &str) -> SessionResult<i64>;
}

/// What a scanned product barcode stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedBarcode {
    pub product_id: String,
    pub batch_id: String,
    pub unit_price: Money,
    /// Stock available for this batch at scan time.
    pub available: i64,
}

#[async_trait]
pub trait BarcodeResolver: Send + Sync {
    /// Unknown codes fail with `SessionError::BarcodeNotFound`.
    async fn resolve(&self, code: &str) -> SessionResult<ResolvedBarcode>;
}

/// The order service endpoint that records the exchange.
///
/// Server-side refusals should be `SessionError::Rejected` carrying the
/// server's message; it reaches the operator unchanged.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn submit(&self, request: ExchangeRequest) -> SessionResult<ExchangeReceipt>;
}

/// The collaborators a session needs after the order is loaded.
#[derive(Clone)]
pub struct Services {
    pub inventory: Arc<dyn InventorySource>,
    pub barcodes: Arc<dyn BarcodeResolver>,
    pub gateway: Arc<dyn ExchangeGateway>,
}
