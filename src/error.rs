// ============================================================================
// Errors - Wager Ledger
// ============================================================================
//
// Every ledger operation is all-or-nothing: when one of these is returned the
// match is exactly as it was before the call.
//
// ============================================================================

use serde::Serialize;
use thiserror::Error;

use crate::market::{MatchState, SettlementModel};

/// Broad category of a [`WagerError`], used for status mapping and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    State,
    Liquidity,
    Transfer,
    Oracle,
    Math,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WagerError {
    // ===== VALIDATION =====
    #[error("invalid outcome index {outcome} (match has {outcomes_count} outcomes)")]
    InvalidOutcome { outcome: u8, outcomes_count: u8 },

    #[error("amount must be positive")]
    ZeroAmount,

    #[error("amount {amount} exceeds max bet {max}")]
    AmountTooLarge { amount: u128, max: u128 },

    #[error("fee {fee_bps} bps exceeds maximum {max} bps")]
    FeeOutOfBounds { fee_bps: u16, max: u16 },

    #[error("outcome count {count} outside [{min}, {max}]")]
    OutcomeCountOutOfBounds { count: u8, min: u8, max: u8 },

    #[error("zero address supplied for {field}")]
    ZeroAddress { field: &'static str },

    #[error("invalid odds {odds}: {reason}")]
    InvalidOdds { odds: u32, reason: String },

    #[error("invalid cutoff {cutoff}: must be after {now}")]
    InvalidCutoff { cutoff: u64, now: u64 },

    #[error("expected {expected} odds entries, got {got}")]
    OddsCountMismatch { expected: usize, got: usize },

    // ===== STATE =====
    #[error("betting closed at {cutoff} (now {now})")]
    BettingClosed { cutoff: u64, now: u64 },

    #[error("match already settled")]
    AlreadySettled,

    #[error("match not settled yet")]
    NotSettled,

    #[error("operation not valid while match is {state}")]
    WrongState { state: MatchState },

    #[error("already claimed")]
    AlreadyClaimed,

    #[error("no wager found")]
    NoWager,

    #[error("wager {0} not found")]
    WagerNotFound(u64),

    #[error("match is paused")]
    Paused,

    #[error("match is not paused")]
    NotPaused,

    #[error("match already initialized")]
    AlreadyInitialized,

    #[error("match not initialized")]
    NotInitialized,

    #[error("reentrant call rejected")]
    Reentrancy,

    #[error("{caller} lacks role {role}")]
    Unauthorized { caller: String, role: String },

    #[error("fee can only change before the first wager")]
    FeeLocked,

    #[error("{operation} is not available for {model} matches")]
    UnsupportedOperation {
        operation: &'static str,
        model: SettlementModel,
    },

    // ===== LIQUIDITY / RISK =====
    #[error("liability cap exceeded: {current} + {incremental} > {max}")]
    InsufficientLiquidity {
        current: u128,
        incremental: u128,
        max: u128,
    },

    #[error("insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: u128, required: u128 },

    #[error("nothing to claim")]
    NothingToClaim,

    #[error("nothing to sweep")]
    NothingToSweep,

    #[error("winning pool is not empty")]
    WinnersExist,

    #[error("already swept")]
    AlreadySwept,

    #[error("stake value {value} below minimum {minimum}")]
    BelowMinimum { value: u128, minimum: u128 },

    // ===== TRANSFER =====
    #[error("transfer of {amount} to {to} failed")]
    TransferFailed { to: String, amount: u128 },

    // ===== ORACLE =====
    #[error("stale quote: updated {age}s ago (max {max_age}s)")]
    StaleQuote { age: u64, max_age: u64 },

    #[error("invalid quote: {0}")]
    InvalidQuote(String),

    #[error("non-positive quote {0}")]
    NonPositiveQuote(i128),

    #[error("no price feed available for stable-value minimum")]
    MissingPriceFeed,

    // ===== MATH =====
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
}

impl WagerError {
    pub fn kind(&self) -> ErrorKind {
        use WagerError::*;
        match self {
            InvalidOutcome { .. }
            | ZeroAmount
            | AmountTooLarge { .. }
            | FeeOutOfBounds { .. }
            | OutcomeCountOutOfBounds { .. }
            | ZeroAddress { .. }
            | InvalidOdds { .. }
            | InvalidCutoff { .. }
            | OddsCountMismatch { .. } => ErrorKind::Validation,

            BettingClosed { .. }
            | AlreadySettled
            | NotSettled
            | WrongState { .. }
            | AlreadyClaimed
            | NoWager
            | WagerNotFound(_)
            | Paused
            | NotPaused
            | AlreadyInitialized
            | NotInitialized
            | Reentrancy
            | Unauthorized { .. }
            | FeeLocked
            | UnsupportedOperation { .. } => ErrorKind::State,

            InsufficientLiquidity { .. }
            | InsufficientBalance { .. }
            | NothingToClaim
            | NothingToSweep
            | WinnersExist
            | AlreadySwept
            | BelowMinimum { .. } => ErrorKind::Liquidity,

            TransferFailed { .. } => ErrorKind::Transfer,

            StaleQuote { .. } | InvalidQuote(_) | NonPositiveQuote(_) | MissingPriceFeed => {
                ErrorKind::Oracle
            }

            Overflow(_) => ErrorKind::Math,
        }
    }

    /// Oracle staleness and underfunding clear up on their own; the caller may retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WagerError::StaleQuote { .. }
                | WagerError::InsufficientBalance { .. }
                | WagerError::TransferFailed { .. }
        )
    }
}

pub type WagerResult<T> = Result<T, WagerError>;

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors raised by the service around the ledger.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Wager(#[from] WagerError),

    #[error("match {0} not found")]
    MatchNotFound(String),

    #[error("match {0} already exists")]
    MatchExists(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("persistence failed: {0}")]
    Persistence(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(WagerError::ZeroAmount.kind(), ErrorKind::Validation);
        assert_eq!(WagerError::AlreadyClaimed.kind(), ErrorKind::State);
        assert_eq!(WagerError::NothingToClaim.kind(), ErrorKind::Liquidity);
        assert_eq!(
            WagerError::StaleQuote { age: 7200, max_age: 3600 }.kind(),
            ErrorKind::Oracle
        );
        assert_eq!(
            WagerError::TransferFailed { to: "BOB".into(), amount: 1 }.kind(),
            ErrorKind::Transfer
        );
    }

    #[test]
    fn test_display() {
        let err = WagerError::InsufficientLiquidity { current: 900, incremental: 200, max: 1000 };
        assert_eq!(err.to_string(), "liability cap exceeded: 900 + 200 > 1000");
        assert!(WagerError::StaleQuote { age: 1, max_age: 0 }.is_retryable());
        assert!(!WagerError::AlreadyClaimed.is_retryable());
    }
}
