// ============================================================================
// Liability Manager - fixed-odds exposure accounting
// ============================================================================
//
// Tracks, per outcome, the odds offered to the next wager, the stakes taken
// and the gross payout owed if that outcome wins. Aggregate exposure is the
// sum over accepted wagers of (payout − stake) and must stay within the
// configured cap after every accepted wager.
//
// Quoting is read-only; nothing changes until `accept` is called with the
// quote the caller just obtained.
//
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{WagerError, WagerResult};
use crate::market::claims::{fixed_odds_payout, incremental_liability};
use crate::types::ODDS_SCALE;

/// 1.0000x: the wager returns its own stake
pub const MIN_ODDS: u32 = ODDS_SCALE;
/// 1000.0000x
pub const MAX_ODDS: u32 = 1_000 * ODDS_SCALE;

/// Fixed-odds initialization parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedOddsParams {
    /// One entry per outcome, scaled by `ODDS_SCALE`
    pub initial_odds: Vec<u32>,
    pub max_liability: u128,
    pub max_bet_amount: u128,
}

/// Priced wager that has not been accepted yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiabilityQuote {
    pub outcome: u8,
    pub amount: u128,
    pub odds: u32,
    pub payout: u128,
    pub incremental: u128,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiabilityBook {
    /// Odds offered to the next wager per outcome
    pub odds: Vec<u32>,
    /// Stakes taken per outcome
    pub pools: Vec<u128>,
    /// Gross payout owed per outcome if it wins
    pub potential_payouts: Vec<u128>,
    pub current_liability: u128,
    pub max_liability: u128,
    pub max_bet_amount: u128,
}

pub fn validate_odds(odds: u32) -> WagerResult<()> {
    if odds < MIN_ODDS {
        return Err(WagerError::InvalidOdds { odds, reason: format!("below minimum {}", MIN_ODDS) });
    }
    if odds > MAX_ODDS {
        return Err(WagerError::InvalidOdds { odds, reason: format!("above maximum {}", MAX_ODDS) });
    }
    Ok(())
}

impl LiabilityBook {
    pub fn new(params: &FixedOddsParams, outcomes_count: u8) -> WagerResult<Self> {
        let outcomes = outcomes_count as usize;
        if params.initial_odds.len() != outcomes {
            return Err(WagerError::OddsCountMismatch {
                expected: outcomes,
                got: params.initial_odds.len(),
            });
        }
        for odds in &params.initial_odds {
            validate_odds(*odds)?;
        }
        if params.max_bet_amount == 0 {
            return Err(WagerError::ZeroAmount);
        }
        Ok(Self {
            odds: params.initial_odds.clone(),
            pools: vec![0; outcomes],
            potential_payouts: vec![0; outcomes],
            current_liability: 0,
            max_liability: params.max_liability,
            max_bet_amount: params.max_bet_amount,
        })
    }

    pub fn current_odds(&self, outcome: u8) -> u32 {
        self.odds.get(outcome as usize).copied().unwrap_or(0)
    }

    pub fn potential_payout(&self, outcome: u8) -> u128 {
        self.potential_payouts.get(outcome as usize).copied().unwrap_or(0)
    }

    pub fn pool(&self, outcome: u8) -> u128 {
        self.pools.get(outcome as usize).copied().unwrap_or(0)
    }

    pub fn total_staked(&self) -> u128 {
        self.pools.iter().sum()
    }

    /// Exposure still available under the cap
    pub fn headroom(&self) -> u128 {
        self.max_liability.saturating_sub(self.current_liability)
    }

    /// Replace the odds for future wagers; returns the previous value
    pub fn set_odds(&mut self, outcome: u8, new_odds: u32) -> WagerResult<u32> {
        validate_odds(new_odds)?;
        let slot = self.odds.get_mut(outcome as usize).ok_or(WagerError::InvalidOutcome {
            outcome,
            outcomes_count: self.pools.len() as u8,
        })?;
        Ok(std::mem::replace(slot, new_odds))
    }

    /// Price a wager at the current odds and check it against both limits
    pub fn quote(&self, outcome: u8, amount: u128) -> WagerResult<LiabilityQuote> {
        if amount > self.max_bet_amount {
            return Err(WagerError::AmountTooLarge { amount, max: self.max_bet_amount });
        }
        let odds = self.current_odds(outcome);
        let payout = fixed_odds_payout(amount, odds)?;
        let incremental = incremental_liability(amount, odds)?;

        let projected = self
            .current_liability
            .checked_add(incremental)
            .ok_or(WagerError::Overflow("liability"))?;
        if projected > self.max_liability {
            return Err(WagerError::InsufficientLiquidity {
                current: self.current_liability,
                incremental,
                max: self.max_liability,
            });
        }
        self.pool(outcome).checked_add(amount).ok_or(WagerError::Overflow("pool"))?;
        self.potential_payout(outcome)
            .checked_add(payout)
            .ok_or(WagerError::Overflow("potential payout"))?;

        Ok(LiabilityQuote { outcome, amount, odds, payout, incremental })
    }

    /// Book a wager priced by `quote` on this same book
    pub fn accept(&mut self, quote: &LiabilityQuote) {
        let idx = quote.outcome as usize;
        self.pools[idx] = self.pools[idx].saturating_add(quote.amount);
        self.potential_payouts[idx] = self.potential_payouts[idx].saturating_add(quote.payout);
        self.current_liability = self.current_liability.saturating_add(quote.incremental);
    }
}
