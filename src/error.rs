use std::time::Duration;

use alloy_primitives::BlockNumber;

/// Errors produced while sampling fee data or maintaining the window.
///
/// Everything except [`OracleError::Config`] is recoverable: the update loop
/// logs it, keeps the last published estimate and tries again on the next tick.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("provider request failed: {0}")]
    Provider(String),
    #[error("provider request timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed provider response: {0}")]
    Decode(String),
    #[error("provider returned an empty fee history")]
    EmptyHistory,
    #[error("block {found} does not extend the window (expected {expected})")]
    Discontinuity {
        expected: BlockNumber,
        found: BlockNumber,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl OracleError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, OracleError::Config(_))
    }
}
