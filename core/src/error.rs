//! Error taxonomy for core operations (§7).
//!
//! All recoverable errors are values with a `kind` discriminator; nothing in
//! this crate unwinds the stack to signal a denied trade or an unreachable
//! relay. The only fatal path is a configuration invariant violation
//! detected at startup, which is represented the same way but expected to be
//! handled by aborting initialization rather than continuing.

use thiserror::Error;

/// Closed error taxonomy shared across detection, risk, and protection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("circuit breaker tripped: {0}")]
    BreakerTripped(String),

    #[error("no reachable relay: {0}")]
    RelayUnavailable(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("required data stale or missing: {0}")]
    DataStale(String),

    #[error("emergency halt: {0}")]
    EmergencyHalt(String),
}

impl CoreError {
    /// Short machine-readable tag, used in alerts and logs.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            CoreError::InputInvalid(_) => "INPUT_INVALID",
            CoreError::LimitExceeded(_) => "LIMIT_EXCEEDED",
            CoreError::BreakerTripped(_) => "BREAKER_TRIPPED",
            CoreError::RelayUnavailable(_) => "RELAY_UNAVAILABLE",
            CoreError::Timeout(_) => "TIMEOUT",
            CoreError::DataStale(_) => "DATA_STALE",
            CoreError::EmergencyHalt(_) => "EMERGENCY_HALT",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
