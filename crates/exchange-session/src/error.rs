//! # Session Error Types
//!
//! Errors raised while driving an exchange against its collaborators, and
//! the serializable shape the exchange modal receives.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CoreError ─────────────┐                                               │
//! │  (rules, flow)          │                                               │
//! │                         ▼                                               │
//! │  collaborator ──► SessionError ──► ApiError { code, message } ──► UI    │
//! │  timeout / lock                    "INSUFFICIENT_STOCK", ...            │
//! │  config / scenario                                                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use exchange_core::CoreError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Exchange rule or flow violation.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    #[error("Order {order_id} could not be loaded: {reason}")]
    OrderUnavailable { order_id: String, reason: String },

    #[error("Stock for product {product_id} batch {batch_id} could not be checked: {reason}")]
    InventoryUnavailable {
        product_id: String,
        batch_id: String,
        reason: String,
    },

    #[error("Barcode not recognized: {0}")]
    BarcodeNotFound(String),

    /// The order service refused the exchange. The message is the server's,
    /// passed through verbatim.
    #[error("{0}")]
    Rejected(String),

    /// Transport-level failure talking to a collaborator.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Exchange service did not answer within {0} seconds")]
    Timeout(u64),

    // =========================================================================
    // Local Errors
    // =========================================================================
    #[error("{limit} limit of {max} exceeded")]
    LimitExceeded { limit: String, max: u64 },

    #[error("Exchange state lock poisoned")]
    LockPoisoned,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<exchange_core::ValidationError> for SessionError {
    fn from(err: exchange_core::ValidationError) -> Self {
        SessionError::Core(err.into())
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SessionError {
    fn from(err: toml::de::Error) -> Self {
        SessionError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SessionError {
    fn from(err: toml::ser::Error) -> Self {
        SessionError::ConfigSaveFailed(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::InvalidScenario(err.to_string())
    }
}

impl SessionError {
    /// The text recorded as the failure reason when a submit goes wrong.
    /// Server rejections keep the server's words.
    pub fn failure_reason(&self) -> String {
        match self {
            SessionError::Rejected(message) => message.clone(),
            other => other.to_string(),
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidConfig(_)
                | SessionError::ConfigLoadFailed(_)
                | SessionError::ConfigSaveFailed(_)
        )
    }
}

// =============================================================================
// API Error
// =============================================================================

/// What the exchange modal receives when an action fails.
///
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Only 8 in stock for product 5 batch 9: 4 already in basket, 6 requested (short by 2)"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Unknown line, replacement, order or barcode
    NotFound,

    /// Input shape or range rejected
    ValidationError,

    /// Replacement would exceed the stock ceiling
    InsufficientStock,

    /// Exchange not ready for review
    IncompleteExchange,

    /// Partial settlement awaiting acknowledgment
    SettlementPending,

    /// Order service refused the exchange
    SubmissionFailed,

    /// Edit attempted while submitting or after completion
    ExchangeLocked,

    /// Collaborator unreachable or too slow
    ServiceUnavailable,

    /// Internal error
    Internal,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::InvalidQuantity { .. } | CoreError::Validation(_) => {
                ErrorCode::ValidationError
            }
            CoreError::StockExceeded { .. } => ErrorCode::InsufficientStock,
            CoreError::IncompleteSelection { .. } => ErrorCode::IncompleteExchange,
            CoreError::SettlementPending { .. } => ErrorCode::SettlementPending,
            CoreError::SubmissionFailure(_) => ErrorCode::SubmissionFailed,
            CoreError::LineItemNotFound(_) | CoreError::ReplacementNotFound(_) => {
                ErrorCode::NotFound
            }
            CoreError::FlowLocked { .. } => ErrorCode::ExchangeLocked,
        };
        // The server's rejection text is shown as-is.
        let message = match err {
            CoreError::SubmissionFailure(reason) => reason,
            other => other.to_string(),
        };
        ApiError::new(code, message)
    }
}

/// Converts session errors to API errors.
impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Core(core) => core.into(),
            SessionError::OrderUnavailable { .. } | SessionError::BarcodeNotFound(_) => {
                ApiError::new(ErrorCode::NotFound, err.to_string())
            }
            SessionError::Rejected(message) => ApiError::new(ErrorCode::SubmissionFailed, message),
            SessionError::InventoryUnavailable { .. }
            | SessionError::Unavailable(_)
            | SessionError::Timeout(_) => {
                ApiError::new(ErrorCode::ServiceUnavailable, err.to_string())
            }
            SessionError::LimitExceeded { .. } | SessionError::InvalidScenario(_) => {
                ApiError::new(ErrorCode::ValidationError, err.to_string())
            }
            SessionError::LockPoisoned
            | SessionError::InvalidConfig(_)
            | SessionError::ConfigLoadFailed(_)
            | SessionError::ConfigSaveFailed(_) => {
                tracing::error!("Exchange session error: {}", err);
                ApiError::internal("Exchange session error")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Unit Tests
// =============================================================================
