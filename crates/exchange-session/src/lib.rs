//! # exchange-session: Async Exchange Orchestration
//!
//! Wraps the pure `exchange-core` flow with everything that needs a clock, a
//! network or a file: loading the order, live stock ceilings, barcode lookup,
//! the single submit call with its timeout, configuration and logging.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 ExchangeSession (session.rs)                     │  │
//! │  │   Arc<Mutex<ExchangeFlow>>, lock never held across an await      │  │
//! │  └───────┬──────────────────┬───────────────────┬───────────────────┘  │
//! │          ▼                  ▼                   ▼                      │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────────────────┐  │
//! │  │  sources.rs  │  │    config.rs     │  │       preview.rs         │  │
//! │  │ order, stock │  │ exchange.toml +  │  │ JSON scenario → outcome  │  │
//! │  │ barcode,     │  │ EXCHANGE_* env   │  │ (exchange-preview bin)   │  │
//! │  │ gateway      │  │                  │  │                          │  │
//! │  └──────────────┘  └──────────────────┘  └──────────────────────────┘  │
//! │                                                                         │
//! │  error.rs: SessionError → ApiError { code, message } for the modal     │
//! │  logging.rs: tracing-subscriber with EnvFilter                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`session`] - `ExchangeSession`, the async driver
//! - [`sources`] - Collaborator traits
//! - [`config`] - Currency, limits and submit settings
//! - [`error`] - Session and API error types
//! - [`logging`] - Tracing initialization
//! - [`preview`] - Offline scenario evaluation

pub mod config;
pub mod error;
pub mod logging;
pub mod preview;
pub mod session;
pub mod sources;

pub use config::ExchangeConfig;
pub use error::{ApiError, ErrorCode, SessionError, SessionResult};
pub use session::{ExchangeSession, SubmitOutcome};
pub use sources::{
    BarcodeResolver, ExchangeGateway, InventorySource, OrderSource, ResolvedBarcode, Services,
};
