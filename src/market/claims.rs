// ============================================================================
// Claim Calculator
// ============================================================================
//
// Pure payout formulas. Everything here floors: remainders left by integer
// division stay in escrow and are never owed to anyone.
//
//   pari-mutuel:  payout = stake · (total_pool − fee) / pool[winner]
//   fixed-odds:   payout = amount · locked_odds / ODDS_SCALE
//
// ============================================================================

use crate::error::{WagerError, WagerResult};
use crate::types::{BPS_DENOMINATOR, ODDS_SCALE};

/// Platform fee taken from a settled pari-mutuel pool
pub fn parimutuel_fee(total_pool: u128, fee_bps: u16) -> WagerResult<u128> {
    total_pool
        .checked_mul(fee_bps as u128)
        .map(|v| v / BPS_DENOMINATOR)
        .ok_or(WagerError::Overflow("fee"))
}

/// Share of the net pool owed to `stake` on the winning outcome
pub fn parimutuel_payout(
    stake: u128,
    total_pool: u128,
    fee_amount: u128,
    winning_pool: u128,
) -> WagerResult<u128> {
    if stake == 0 || winning_pool == 0 {
        return Ok(0);
    }
    let net_pool = total_pool.saturating_sub(fee_amount);
    stake
        .checked_mul(net_pool)
        .map(|v| v / winning_pool)
        .ok_or(WagerError::Overflow("pari-mutuel payout"))
}

/// Gross payout of a fixed-odds wager (stake included)
pub fn fixed_odds_payout(amount: u128, odds: u32) -> WagerResult<u128> {
    amount
        .checked_mul(odds as u128)
        .map(|v| v / ODDS_SCALE as u128)
        .ok_or(WagerError::Overflow("fixed-odds payout"))
}

/// Liability a new wager adds on top of its own stake
pub fn incremental_liability(amount: u128, odds: u32) -> WagerResult<u128> {
    Ok(fixed_odds_payout(amount, odds)?.saturating_sub(amount))
}
