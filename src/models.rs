// Request bodies for the wager ledger API
//
// Callers identify themselves by address in the body; role checks happen
// inside the ledger against the shared role table.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::access::Role;
use crate::market::{SettlementModel, StakeMinimum};

// ===== MATCHES =====

#[derive(Debug, Deserialize)]
pub struct CreateMatchRequest {
    pub caller: String,
    pub match_id: String,
    pub model: SettlementModel,
    /// Defaults to the caller
    pub owner: Option<String>,
    pub cutoff: u64,
    pub outcomes_count: u8,
    pub fee_bps: Option<u16>,
    pub treasury: Option<String>,
    pub min_stake: Option<StakeMinimum>,
    /// Decimal odds per outcome, e.g. `"1.85"`; fixed-odds only
    pub odds: Option<Vec<Decimal>>,
    pub max_liability: Option<u128>,
    pub max_bet_amount: Option<u128>,
}

#[derive(Debug, Deserialize)]
pub struct BetRequest {
    pub bettor: String,
    pub outcome: u8,
    pub amount: u128,
}

/// Bet on a named side (home, draw, away)
#[derive(Debug, Deserialize)]
pub struct SideBetRequest {
    pub bettor: String,
    pub amount: u128,
}

#[derive(Debug, Deserialize)]
pub struct CallerRequest {
    pub caller: String,
}

#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub caller: String,
    pub winning_outcome: u8,
}

#[derive(Debug, Deserialize)]
pub struct SetOddsRequest {
    pub caller: String,
    pub outcome: u8,
    pub odds: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct FundRequest {
    pub caller: String,
    pub amount: u128,
}

#[derive(Debug, Deserialize)]
pub struct CutoffRequest {
    pub caller: String,
    pub cutoff: u64,
}

#[derive(Debug, Deserialize)]
pub struct TreasuryRequest {
    pub caller: String,
    pub treasury: String,
}

#[derive(Debug, Deserialize)]
pub struct FeeRequest {
    pub caller: String,
    pub fee_bps: u16,
}

// ===== ACCOUNTS =====

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub account: String,
    pub amount: u128,
}

/// Approve a match escrow to pull stakes from `owner`
#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub owner: String,
    pub match_id: String,
    pub amount: u128,
}

#[derive(Debug, Deserialize)]
pub struct GrantRoleRequest {
    pub caller: String,
    pub role: Role,
    pub account: String,
}

#[derive(Debug, Deserialize)]
pub struct PushPriceRequest {
    pub caller: String,
    /// Feed units, e.g. 8 decimals
    pub answer: i64,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}
