// Shared primitive types for the wager ledger

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Odds are stored as integers scaled by this factor (10_000 = 1.0000x).
pub const ODDS_SCALE: u32 = 10_000;

/// Fees are expressed in basis points of this denominator.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Participant / treasury / escrow identity
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub const ZERO_HEX: &'static str = "0x0000000000000000000000000000000000000000";

    pub fn new(addr: impl Into<String>) -> Self {
        Address(addr.into())
    }

    pub fn zero() -> Self {
        Address(String::new())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty() || self.0 == Self::ZERO_HEX
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Escrow account that holds the funds of one match
    pub fn escrow_for(match_id: &str) -> Self {
        let digest = hex::encode(Sha256::digest(match_id.as_bytes()));
        Address(format!("ESCROW_{}", &digest[..32]))
    }

    /// Shortened form for log lines
    pub fn short(&self) -> &str {
        self.0.get(..16).unwrap_or(&self.0)
    }
}

/// Wall-clock unix seconds, used by the service when stamping calls
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}
