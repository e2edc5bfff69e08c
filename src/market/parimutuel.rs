// ============================================================================
// Pari-mutuel Outcome Ledger
// ============================================================================
//
// Losing stakes fund winners proportionally after the platform fee.
//
//   place_bet  → pool[outcome] += amount, stake accumulates per (user, outcome)
//   settle     → total_pool, fee = total_pool · fee_bps / 10_000
//   claim      → stake · (total_pool − fee) / pool[winner], once per user
//
// The fee is only accounted at settlement. It leaves escrow together with the
// first successful claim (or the no-winners sweep) and never again.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::access::Role;
use crate::error::{WagerError, WagerResult};
use crate::market::claims::{parimutuel_fee, parimutuel_payout};
use crate::market::core::{
    BetReceipt, CallEnv, CallGuard, MatchCore, MatchParams, OUTCOME_AWAY, OUTCOME_DRAW, OUTCOME_HOME,
};
use crate::market::events::EventKind;
use crate::types::Address;

/// A participant's stakes in one match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Accumulated stake per outcome index
    pub stakes: Vec<u128>,
    pub claimed: bool,
    pub refunded: bool,
}

impl Position {
    fn new(outcomes: u8) -> Self {
        Self { stakes: vec![0; outcomes as usize], claimed: false, refunded: false }
    }

    pub fn total_staked(&self) -> u128 {
        self.stakes.iter().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParimutuelSettlement {
    pub winning_outcome: u8,
    pub total_pool: u128,
    pub fee_amount: u128,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParimutuelMatch {
    pub core: MatchCore,
    /// Sum of stakes per outcome
    pub pools: Vec<u128>,
    pub total_pool: u128,
    pub positions: BTreeMap<Address, Position>,
    pub settlement: Option<ParimutuelSettlement>,
    /// Fee has left escrow
    pub fee_paid: bool,
    pub swept: bool,
    /// Sum of all claim payouts
    pub paid_out: u128,
}

impl AsMut<MatchCore> for ParimutuelMatch {
    fn as_mut(&mut self) -> &mut MatchCore {
        &mut self.core
    }
}

impl ParimutuelMatch {
    /// Uninitialized instance (state Created)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(params: MatchParams, now: u64) -> WagerResult<Self> {
        let mut m = Self::new();
        m.initialize(params, now)?;
        Ok(m)
    }

    pub fn initialize(&mut self, params: MatchParams, now: u64) -> WagerResult<()> {
        let outcomes = params.outcomes_count as usize;
        self.core.initialize(params, now)?;
        self.pools = vec![0; outcomes];
        Ok(())
    }

    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> WagerResult<T>) -> WagerResult<T> {
        let mut guard = CallGuard::acquire(self)?;
        f(&mut *guard)
    }

    // ===== BETTING =====

    pub fn place_bet(&mut self, env: &mut CallEnv<'_>, outcome: u8, amount: u128) -> WagerResult<BetReceipt> {
        self.guarded(|m| m.place_bet_inner(env, outcome, amount))
    }

    pub fn bet_home(&mut self, env: &mut CallEnv<'_>, amount: u128) -> WagerResult<BetReceipt> {
        self.place_bet(env, OUTCOME_HOME, amount)
    }

    pub fn bet_draw(&mut self, env: &mut CallEnv<'_>, amount: u128) -> WagerResult<BetReceipt> {
        self.place_bet(env, OUTCOME_DRAW, amount)
    }

    pub fn bet_away(&mut self, env: &mut CallEnv<'_>, amount: u128) -> WagerResult<BetReceipt> {
        self.place_bet(env, OUTCOME_AWAY, amount)
    }

    fn place_bet_inner(&mut self, env: &mut CallEnv<'_>, outcome: u8, amount: u128) -> WagerResult<BetReceipt> {
        self.core.check_bet(env, outcome, amount)?;
        let idx = outcome as usize;

        let new_pool = self.pools[idx].checked_add(amount).ok_or(WagerError::Overflow("pool"))?;
        let new_total = self.total_pool.checked_add(amount).ok_or(WagerError::Overflow("total pool"))?;
        let existing = self.positions.get(&env.caller).map(|p| p.stakes[idx]).unwrap_or(0);
        let new_stake = existing.checked_add(amount).ok_or(WagerError::Overflow("stake"))?;

        self.core.collect_stake(env, amount)?;

        self.pools[idx] = new_pool;
        self.total_pool = new_total;
        let outcomes = self.core.params.outcomes_count;
        self.positions
            .entry(env.caller.clone())
            .or_insert_with(|| Position::new(outcomes))
            .stakes[idx] = new_stake;
        self.core.bets_placed += 1;

        self.core.emit(
            env.now,
            EventKind::BetPlaced {
                bettor: env.caller.clone(),
                outcome,
                amount,
                wager_id: None,
                locked_odds: None,
            },
        );
        info!(
            match_id = %self.core.match_id(),
            bettor = %env.caller.short(),
            outcome,
            amount,
            pool = new_pool,
            "🎯 pari-mutuel bet placed"
        );

        Ok(BetReceipt {
            match_id: self.core.match_id().to_string(),
            bettor: env.caller.clone(),
            outcome,
            amount,
            total_stake: new_stake,
            wager_id: None,
            locked_odds: None,
            potential_payout: None,
        })
    }

    // ===== SETTLEMENT =====

    pub fn settle(&mut self, env: &mut CallEnv<'_>, winning_outcome: u8) -> WagerResult<ParimutuelSettlement> {
        self.guarded(|m| m.settle_inner(env, winning_outcome))
    }

    fn settle_inner(&mut self, env: &mut CallEnv<'_>, winning_outcome: u8) -> WagerResult<ParimutuelSettlement> {
        self.core.require_role(env, Role::Settler)?;
        self.core.require_open()?;
        self.core.require_valid_outcome(winning_outcome)?;

        let total_pool = self
            .pools
            .iter()
            .try_fold(0u128, |acc, p| acc.checked_add(*p))
            .ok_or(WagerError::Overflow("total pool"))?;
        debug_assert_eq!(total_pool, self.total_pool);
        let fee_amount = parimutuel_fee(total_pool, self.core.params.fee_bps)?;

        let settlement = ParimutuelSettlement { winning_outcome, total_pool, fee_amount };
        self.core.mark_settled(winning_outcome);
        self.settlement = Some(settlement);

        self.core.emit(env.now, EventKind::Settled { winning_outcome, total_pool, fee_amount });
        info!(
            match_id = %self.core.match_id(),
            winning_outcome,
            total_pool,
            fee_amount,
            winning_pool = self.pools[winning_outcome as usize],
            "✅ pari-mutuel match settled"
        );
        Ok(settlement)
    }

    // ===== CLAIMS =====

    pub fn claim(&mut self, env: &mut CallEnv<'_>) -> WagerResult<u128> {
        self.guarded(|m| m.claim_inner(env))
    }

    fn claim_inner(&mut self, env: &mut CallEnv<'_>) -> WagerResult<u128> {
        self.core.require_not_paused()?;
        let winning = self.core.require_settled()? as usize;
        let settlement = self.settlement.ok_or(WagerError::NotSettled)?;

        let position = self.positions.get(&env.caller).ok_or(WagerError::NothingToClaim)?;
        if position.claimed {
            return Err(WagerError::AlreadyClaimed);
        }
        let stake = position.stakes[winning];
        if stake == 0 {
            return Err(WagerError::NothingToClaim);
        }
        let payout = parimutuel_payout(
            stake,
            settlement.total_pool,
            settlement.fee_amount,
            self.pools[winning],
        )?;
        let fee_due = if self.fee_paid { 0 } else { settlement.fee_amount };
        let new_paid_out = self.paid_out.checked_add(payout).ok_or(WagerError::Overflow("paid out"))?;

        // effects
        let fee_was_paid = self.fee_paid;
        let previous_paid_out = self.paid_out;
        self.set_claimed(&env.caller, true);
        self.fee_paid = true;
        self.paid_out = new_paid_out;

        // interactions
        let mut legs = Vec::with_capacity(2);
        if fee_due > 0 {
            legs.push((self.core.params.treasury.clone(), fee_due));
        }
        if payout > 0 {
            legs.push((env.caller.clone(), payout));
        }
        if !legs.is_empty() && !env.asset.transfer_batch(&self.core.escrow, &legs) {
            self.set_claimed(&env.caller, false);
            self.fee_paid = fee_was_paid;
            self.paid_out = previous_paid_out;
            warn!(match_id = %self.core.match_id(), claimant = %env.caller.short(), payout, "claim transfer failed");
            return Err(WagerError::TransferFailed { to: env.caller.to_string(), amount: payout });
        }

        self.core.emit(
            env.now,
            EventKind::Claimed { claimant: env.caller.clone(), amount: payout, fee_forwarded: fee_due },
        );
        info!(
            match_id = %self.core.match_id(),
            claimant = %env.caller.short(),
            payout,
            fee_forwarded = fee_due,
            "🏆 pari-mutuel claim paid"
        );
        Ok(payout)
    }

    fn set_claimed(&mut self, user: &Address, claimed: bool) {
        if let Some(position) = self.positions.get_mut(user) {
            position.claimed = claimed;
        }
    }

    /// Sends the whole escrow to the treasury when nobody backed the winner
    pub fn sweep_if_no_winners(&mut self, env: &mut CallEnv<'_>) -> WagerResult<u128> {
        self.guarded(|m| m.sweep_inner(env))
    }

    fn sweep_inner(&mut self, env: &mut CallEnv<'_>) -> WagerResult<u128> {
        self.core.require_role(env, Role::Admin)?;
        let winning = self.core.require_settled()? as usize;
        if self.pools[winning] != 0 {
            return Err(WagerError::WinnersExist);
        }
        if self.swept {
            return Err(WagerError::AlreadySwept);
        }

        let amount = self.core.escrow_balance(env);
        let fee_was_paid = self.fee_paid;
        self.swept = true;
        self.fee_paid = true;

        let treasury = self.core.params.treasury.clone();
        if amount > 0 && !env.asset.transfer(&self.core.escrow, &treasury, amount) {
            self.swept = false;
            self.fee_paid = fee_was_paid;
            return Err(WagerError::TransferFailed { to: treasury.to_string(), amount });
        }

        self.core.emit(env.now, EventKind::Swept { treasury: treasury.clone(), amount });
        info!(match_id = %self.core.match_id(), %treasury, amount, "🧹 no winners, escrow swept");
        Ok(amount)
    }

    // ===== CANCELLATION =====

    pub fn cancel_market(&mut self, env: &mut CallEnv<'_>) -> WagerResult<()> {
        self.guarded(|m| m.core.cancel(env))
    }

    /// Returns the caller's full principal after cancellation
    pub fn refund(&mut self, env: &mut CallEnv<'_>) -> WagerResult<u128> {
        self.guarded(|m| m.refund_inner(env))
    }

    fn refund_inner(&mut self, env: &mut CallEnv<'_>) -> WagerResult<u128> {
        self.core.require_not_paused()?;
        self.core.require_cancelled()?;
        let position = self.positions.get(&env.caller).ok_or(WagerError::NoWager)?;
        if position.refunded {
            return Err(WagerError::AlreadyClaimed);
        }
        let amount = position.total_staked();
        if amount == 0 {
            return Err(WagerError::NoWager);
        }

        if let Some(p) = self.positions.get_mut(&env.caller) {
            p.refunded = true;
        }
        if !env.asset.transfer(&self.core.escrow, &env.caller, amount) {
            if let Some(p) = self.positions.get_mut(&env.caller) {
                p.refunded = false;
            }
            return Err(WagerError::TransferFailed { to: env.caller.to_string(), amount });
        }

        self.core.emit(env.now, EventKind::Refunded { claimant: env.caller.clone(), amount });
        info!(match_id = %self.core.match_id(), claimant = %env.caller.short(), amount, "💸 refund paid");
        Ok(amount)
    }

    // ===== READERS =====

    pub fn pools(&self) -> &[u128] {
        &self.pools
    }

    pub fn pool(&self, outcome: u8) -> u128 {
        self.pools.get(outcome as usize).copied().unwrap_or(0)
    }

    pub fn total_pool(&self) -> u128 {
        self.total_pool
    }

    pub fn stake_of(&self, user: &Address, outcome: u8) -> u128 {
        self.positions
            .get(user)
            .and_then(|p| p.stakes.get(outcome as usize).copied())
            .unwrap_or(0)
    }

    pub fn position(&self, user: &Address) -> Option<&Position> {
        self.positions.get(user)
    }

    pub fn settlement(&self) -> Option<ParimutuelSettlement> {
        self.settlement
    }

    /// Amount `user` could still claim; zero before settlement, after claiming,
    /// or without a winning stake
    pub fn pending_payout(&self, user: &Address) -> u128 {
        let Some(settlement) = self.settlement else {
            return 0;
        };
        let Some(position) = self.positions.get(user) else {
            return 0;
        };
        if position.claimed {
            return 0;
        }
        let winning = settlement.winning_outcome as usize;
        parimutuel_payout(
            position.stakes[winning],
            settlement.total_pool,
            settlement.fee_amount,
            self.pools[winning],
        )
        .unwrap_or(0)
    }
}
