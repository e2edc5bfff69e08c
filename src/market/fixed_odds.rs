// ============================================================================
// Fixed-odds Match - house-underwritten wagers
// ============================================================================
//
// Each wager snapshots the odds on offer when it is accepted. Later odds
// changes only reprice future wagers.
//
//   place_bet → payout = amount · odds / 10_000, exposure += payout − amount
//   settle    → house_pnl = total_staked − potential_payout[winner]
//   claim     → Σ locked payouts of the caller's unclaimed winning wagers
//
// A losing house still settles. Claims then stay blocked until the escrow
// covers every outstanding obligation (see `fund_shortfall`).
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::access::Role;
use crate::asset::StakeAsset;
use crate::error::{WagerError, WagerResult};
use crate::market::core::{
    BetReceipt, CallEnv, CallGuard, MatchCore, MatchParams, OUTCOME_AWAY, OUTCOME_DRAW, OUTCOME_HOME,
};
use crate::market::events::EventKind;
use crate::market::liability::{FixedOddsParams, LiabilityBook};
use crate::market::state::MatchState;
use crate::types::Address;

/// One accepted fixed-odds wager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedWager {
    /// Sequential, starting at 1
    pub id: u64,
    pub owner: Address,
    pub outcome: u8,
    pub amount: u128,
    /// Odds snapshot taken at acceptance
    pub locked_odds: u32,
    /// amount · locked_odds / ODDS_SCALE
    pub payout: u128,
    pub claimed: bool,
    pub refunded: bool,
    pub placed_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedOddsSettlement {
    pub winning_outcome: u8,
    pub total_staked: u128,
    pub total_payouts_due: u128,
    /// Positive: earmarked for the treasury. Negative: shortfall.
    pub house_pnl: i128,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixedOddsMatch {
    pub core: MatchCore,
    pub book: LiabilityBook,
    pub wagers: Vec<FixedWager>,
    /// Wager ids per owner
    pub by_owner: BTreeMap<Address, Vec<u64>>,
    pub settlement: Option<FixedOddsSettlement>,
    /// Sum of all claim payouts
    pub paid_out: u128,
    pub surplus_withdrawn: u128,
    pub shortfall_funded: u128,
}

impl AsMut<MatchCore> for FixedOddsMatch {
    fn as_mut(&mut self) -> &mut MatchCore {
        &mut self.core
    }
}

impl FixedOddsMatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(params: MatchParams, fixed: FixedOddsParams, now: u64) -> WagerResult<Self> {
        let mut m = Self::new();
        m.initialize(params, fixed, now)?;
        Ok(m)
    }

    pub fn initialize(&mut self, params: MatchParams, fixed: FixedOddsParams, now: u64) -> WagerResult<()> {
        if self.core.state.is_initialized() {
            return Err(WagerError::AlreadyInitialized);
        }
        params.validate()?;
        let book = LiabilityBook::new(&fixed, params.outcomes_count)?;
        self.core.initialize(params, now)?;
        self.book = book;
        info!(
            match_id = %self.core.match_id(),
            max_liability = self.book.max_liability,
            max_bet = self.book.max_bet_amount,
            "fixed-odds book opened"
        );
        Ok(())
    }

    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> WagerResult<T>) -> WagerResult<T> {
        let mut guard = CallGuard::acquire(self)?;
        f(&mut *guard)
    }

    // ===== ODDS =====

    /// Reprice one outcome for future wagers; existing wagers keep their odds
    pub fn set_odds(&mut self, env: &mut CallEnv<'_>, outcome: u8, new_odds: u32) -> WagerResult<u32> {
        self.guarded(|m| {
            m.core.require_role(env, Role::OddsManager)?;
            m.core.require_open()?;
            m.core.require_valid_outcome(outcome)?;
            let old_odds = m.book.set_odds(outcome, new_odds)?;
            m.core.emit(env.now, EventKind::OddsAdjusted { outcome, old_odds, new_odds });
            info!(match_id = %m.core.match_id(), outcome, old_odds, new_odds, "📈 odds adjusted");
            Ok(old_odds)
        })
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
        let quote = self.book.quote(outcome, amount)?;

        self.core.collect_stake(env, amount)?;

        self.book.accept(&quote);
        let id = self.wagers.len() as u64 + 1;
        self.wagers.push(FixedWager {
            id,
            owner: env.caller.clone(),
            outcome,
            amount,
            locked_odds: quote.odds,
            payout: quote.payout,
            claimed: false,
            refunded: false,
            placed_at: env.now,
        });
        self.by_owner.entry(env.caller.clone()).or_default().push(id);
        self.core.bets_placed += 1;

        self.core.emit(
            env.now,
            EventKind::BetPlaced {
                bettor: env.caller.clone(),
                outcome,
                amount,
                wager_id: Some(id),
                locked_odds: Some(quote.odds),
            },
        );
        info!(
            match_id = %self.core.match_id(),
            wager_id = id,
            bettor = %env.caller.short(),
            outcome,
            amount,
            odds = quote.odds,
            liability = self.book.current_liability,
            "🎯 fixed-odds bet placed"
        );

        Ok(BetReceipt {
            match_id: self.core.match_id().to_string(),
            bettor: env.caller.clone(),
            outcome,
            amount,
            total_stake: self.stake_of(&env.caller, outcome),
            wager_id: Some(id),
            locked_odds: Some(quote.odds),
            potential_payout: Some(quote.payout),
        })
    }

    // ===== SETTLEMENT =====

    pub fn settle(&mut self, env: &mut CallEnv<'_>, winning_outcome: u8) -> WagerResult<FixedOddsSettlement> {
        self.guarded(|m| m.settle_inner(env, winning_outcome))
    }

    fn settle_inner(&mut self, env: &mut CallEnv<'_>, winning_outcome: u8) -> WagerResult<FixedOddsSettlement> {
        self.core.require_role(env, Role::Settler)?;
        self.core.require_open()?;
        self.core.require_valid_outcome(winning_outcome)?;

        let total_staked = self.book.total_staked();
        let total_payouts_due = self.book.potential_payout(winning_outcome);
        let staked = i128::try_from(total_staked).map_err(|_| WagerError::Overflow("house pnl"))?;
        let due = i128::try_from(total_payouts_due).map_err(|_| WagerError::Overflow("house pnl"))?;
        let house_pnl = staked - due;

        let settlement = FixedOddsSettlement { winning_outcome, total_staked, total_payouts_due, house_pnl };
        self.core.mark_settled(winning_outcome);
        self.settlement = Some(settlement);

        self.core.emit(
            env.now,
            EventKind::FixedOddsSettled { winning_outcome, total_staked, total_payouts_due, house_pnl },
        );
        if house_pnl < 0 {
            warn!(
                match_id = %self.core.match_id(),
                house_pnl,
                "⚠️ house lost, claims blocked until the shortfall is funded"
            );
        }
        info!(
            match_id = %self.core.match_id(),
            winning_outcome,
            total_staked,
            total_payouts_due,
            house_pnl,
            "✅ fixed-odds match settled"
        );
        Ok(settlement)
    }

    /// Payouts owed to winners who have not claimed yet
    pub fn outstanding_obligations(&self) -> u128 {
        self.settlement
            .map(|s| s.total_payouts_due.saturating_sub(self.paid_out))
            .unwrap_or(0)
    }

    /// How much the escrow is missing to cover every outstanding claim
    pub fn shortfall(&self, asset: &dyn StakeAsset) -> u128 {
        self.outstanding_obligations()
            .saturating_sub(asset.balance_of(&self.core.escrow))
    }

    // ===== CLAIMS =====

    pub fn claim(&mut self, env: &mut CallEnv<'_>) -> WagerResult<u128> {
        self.guarded(|m| m.claim_inner(env))
    }

    fn claim_inner(&mut self, env: &mut CallEnv<'_>) -> WagerResult<u128> {
        self.core.require_not_paused()?;
        let winning = self.core.require_settled()?;

        let winning_ids: Vec<u64> = self
            .wagers_of(&env.caller)
            .into_iter()
            .filter(|w| w.outcome == winning)
            .map(|w| w.id)
            .collect();
        if winning_ids.is_empty() {
            return Err(WagerError::NothingToClaim);
        }
        let unclaimed: Vec<u64> = winning_ids
            .into_iter()
            .filter(|id| !self.wagers[(*id - 1) as usize].claimed)
            .collect();
        if unclaimed.is_empty() {
            return Err(WagerError::NothingToClaim);
        }

        let payout = unclaimed
            .iter()
            .try_fold(0u128, |acc, id| acc.checked_add(self.wagers[(*id - 1) as usize].payout))
            .ok_or(WagerError::Overflow("claim payout"))?;

        let outstanding = self.outstanding_obligations();
        let available = self.core.escrow_balance(env);
        if available < outstanding || available < payout {
            warn!(
                match_id = %self.core.match_id(),
                claimant = %env.caller.short(),
                available,
                outstanding,
                "claim blocked: escrow underfunded"
            );
            return Err(WagerError::InsufficientBalance { available, required: outstanding.max(payout) });
        }

        // effects
        self.mark_claimed(&unclaimed, true);
        let previous_paid_out = self.paid_out;
        self.paid_out = self.paid_out.saturating_add(payout);

        // interactions
        if payout > 0 && !env.asset.transfer(&self.core.escrow, &env.caller, payout) {
            self.mark_claimed(&unclaimed, false);
            self.paid_out = previous_paid_out;
            return Err(WagerError::TransferFailed { to: env.caller.to_string(), amount: payout });
        }

        self.core.emit(
            env.now,
            EventKind::Claimed { claimant: env.caller.clone(), amount: payout, fee_forwarded: 0 },
        );
        info!(
            match_id = %self.core.match_id(),
            claimant = %env.caller.short(),
            wagers = unclaimed.len(),
            payout,
            "🏆 fixed-odds claim paid"
        );
        Ok(payout)
    }

    fn mark_claimed(&mut self, ids: &[u64], claimed: bool) {
        for id in ids {
            if let Some(w) = self.wagers.get_mut((*id - 1) as usize) {
                w.claimed = claimed;
            }
        }
    }

    // ===== TREASURY =====

    /// Top up escrow from the caller's balance; returns the new escrow balance
    pub fn fund_shortfall(&mut self, env: &mut CallEnv<'_>, amount: u128) -> WagerResult<u128> {
        self.guarded(|m| {
            m.core.require_initialized()?;
            if m.core.state == MatchState::Cancelled {
                return Err(WagerError::WrongState { state: MatchState::Cancelled });
            }
            if amount == 0 {
                return Err(WagerError::ZeroAmount);
            }
            m.core.collect_stake(env, amount)?;
            m.shortfall_funded = m.shortfall_funded.saturating_add(amount);

            let balance = m.core.escrow_balance(env);
            m.core.emit(env.now, EventKind::ShortfallFunded { funder: env.caller.clone(), amount });
            info!(
                match_id = %m.core.match_id(),
                funder = %env.caller.short(),
                amount,
                escrow_balance = balance,
                "🏦 shortfall funded"
            );
            Ok(balance)
        })
    }

    /// Send whatever escrow holds beyond outstanding obligations to the treasury
    pub fn withdraw_surplus(&mut self, env: &mut CallEnv<'_>) -> WagerResult<u128> {
        self.guarded(|m| {
            m.core.require_role(env, Role::Admin)?;
            m.core.require_settled()?;

            let balance = m.core.escrow_balance(env);
            let surplus = balance.saturating_sub(m.outstanding_obligations());
            if surplus == 0 {
                return Err(WagerError::NothingToSweep);
            }

            let treasury = m.core.params.treasury.clone();
            if !env.asset.transfer(&m.core.escrow, &treasury, surplus) {
                return Err(WagerError::TransferFailed { to: treasury.to_string(), amount: surplus });
            }
            m.surplus_withdrawn = m.surplus_withdrawn.saturating_add(surplus);

            m.core.emit(env.now, EventKind::SurplusWithdrawn { treasury: treasury.clone(), amount: surplus });
            info!(match_id = %m.core.match_id(), %treasury, amount = surplus, "💰 surplus withdrawn");
            Ok(surplus)
        })
    }

    // ===== CANCELLATION =====

    pub fn cancel_market(&mut self, env: &mut CallEnv<'_>) -> WagerResult<()> {
        self.guarded(|m| m.core.cancel(env))
    }

    /// Return the principal of every wager the caller placed
    pub fn refund(&mut self, env: &mut CallEnv<'_>) -> WagerResult<u128> {
        self.guarded(|m| m.refund_inner(env))
    }

    fn refund_inner(&mut self, env: &mut CallEnv<'_>) -> WagerResult<u128> {
        self.core.require_not_paused()?;
        self.core.require_cancelled()?;

        let owned = self.by_owner.get(&env.caller).cloned().unwrap_or_default();
        if owned.is_empty() {
            return Err(WagerError::NoWager);
        }
        let pending: Vec<u64> = owned
            .into_iter()
            .filter(|id| !self.wagers[(*id - 1) as usize].refunded)
            .collect();
        if pending.is_empty() {
            return Err(WagerError::AlreadyClaimed);
        }
        let amount: u128 = pending.iter().map(|id| self.wagers[(*id - 1) as usize].amount).sum();

        self.mark_refunded(&pending, true);
        if !env.asset.transfer(&self.core.escrow, &env.caller, amount) {
            self.mark_refunded(&pending, false);
            return Err(WagerError::TransferFailed { to: env.caller.to_string(), amount });
        }

        self.core.emit(env.now, EventKind::Refunded { claimant: env.caller.clone(), amount });
        info!(match_id = %self.core.match_id(), claimant = %env.caller.short(), amount, "💸 refund paid");
        Ok(amount)
    }

    fn mark_refunded(&mut self, ids: &[u64], refunded: bool) {
        for id in ids {
            if let Some(w) = self.wagers.get_mut((*id - 1) as usize) {
                w.refunded = refunded;
            }
        }
    }

    // ===== READERS =====

    pub fn wager(&self, id: u64) -> WagerResult<&FixedWager> {
        id.checked_sub(1)
            .and_then(|idx| self.wagers.get(idx as usize))
            .ok_or(WagerError::WagerNotFound(id))
    }

    pub fn wagers_of(&self, user: &Address) -> Vec<&FixedWager> {
        self.by_owner
            .get(user)
            .map(|ids| ids.iter().filter_map(|id| self.wager(*id).ok()).collect())
            .unwrap_or_default()
    }

    pub fn stake_of(&self, user: &Address, outcome: u8) -> u128 {
        self.wagers_of(user)
            .into_iter()
            .filter(|w| w.outcome == outcome)
            .map(|w| w.amount)
            .sum()
    }

    pub fn odds(&self) -> &[u32] {
        &self.book.odds
    }

    pub fn current_odds(&self, outcome: u8) -> u32 {
        self.book.current_odds(outcome)
    }

    pub fn potential_payout(&self, outcome: u8) -> u128 {
        self.book.potential_payout(outcome)
    }

    pub fn current_liability(&self) -> u128 {
        self.book.current_liability
    }

    pub fn pools(&self) -> &[u128] {
        &self.book.pools
    }

    pub fn total_staked(&self) -> u128 {
        self.book.total_staked()
    }

    pub fn settlement(&self) -> Option<FixedOddsSettlement> {
        self.settlement
    }

    /// Locked payouts of `user`'s unclaimed winning wagers; zero before settlement
    pub fn pending_payout(&self, user: &Address) -> u128 {
        let Some(settlement) = self.settlement else {
            return 0;
        };
        self.wagers_of(user)
            .into_iter()
            .filter(|w| w.outcome == settlement.winning_outcome && !w.claimed)
            .map(|w| w.payout)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::RoleTable;
    use crate::asset::InMemoryAsset;
    use crate::market::core::StakeMinimum;

    const CUTOFF: u64 = 50_000;

    struct Harness {
        asset: InMemoryAsset,
        roles: RoleTable,
        m: FixedOddsMatch,
    }

    impl Harness {
        fn new(odds: Vec<u32>, max_liability: u128) -> Self {
            let params = MatchParams {
                match_id: "nba_lal_bos".into(),
                owner: Address::new("OWNER"),
                cutoff: CUTOFF,
                fee_bps: 0,
                treasury: Address::new("TREASURY"),
                outcomes_count: odds.len() as u8,
                min_stake: StakeMinimum::Units(1),
            };
            let fixed = FixedOddsParams { initial_odds: odds, max_liability, max_bet_amount: 1_000 };
            let m = FixedOddsMatch::create(params, fixed, 0).unwrap();
            let mut asset = InMemoryAsset::new();
            for user in ["ALICE", "BOB", "OWNER"] {
                let addr = Address::new(user);
                asset.deposit(&addr, 10_000);
                asset.approve(&addr, &m.core.escrow, u128::MAX);
            }
            Self { asset, roles: RoleTable::with_owner(&Address::new("OWNER")), m }
        }

        fn bet(&mut self, who: &str, outcome: u8, amount: u128) -> WagerResult<BetReceipt> {
            let mut env = CallEnv::new(who, 100, &mut self.asset, &self.roles);
            self.m.place_bet(&mut env, outcome, amount)
        }

        fn as_owner<T>(&mut self, f: impl FnOnce(&mut FixedOddsMatch, &mut CallEnv<'_>) -> T) -> T {
            let mut env = CallEnv::new("OWNER", CUTOFF + 1, &mut self.asset, &self.roles);
            f(&mut self.m, &mut env)
        }

        fn claim(&mut self, who: &str) -> WagerResult<u128> {
            let mut env = CallEnv::new(who, CUTOFF + 2, &mut self.asset, &self.roles);
            self.m.claim(&mut env)
        }

        fn balance(&self, who: &str) -> u128 {
            self.asset.balance_of(&Address::new(who))
        }
    }

    #[test]
    fn test_odds_locked_at_bet_time() {
        let mut h = Harness::new(vec![20_000, 30_000], 100_000);
        let first = h.bet("ALICE", 0, 100).unwrap();
        assert_eq!(first.locked_odds, Some(20_000));
        assert_eq!(first.potential_payout, Some(200));

        let mut env = CallEnv::new("OWNER", 150, &mut h.asset, &h.roles);
        assert_eq!(h.m.set_odds(&mut env, 0, 30_000).unwrap(), 20_000);

        let second = h.bet("ALICE", 0, 100).unwrap();
        assert_eq!(second.locked_odds, Some(30_000));
        assert_eq!(h.m.wager(1).unwrap().locked_odds, 20_000);
        assert_eq!(h.m.potential_payout(0), 500);
        assert_eq!(h.m.current_liability(), 300);

        h.as_owner(|m, env| m.settle(env, 0)).unwrap();
        assert_eq!(h.m.pending_payout(&Address::new("ALICE")), 500);

        // escrow holds the 200 staked; the house covers the rest
        h.as_owner(|m, env| m.fund_shortfall(env, 300)).unwrap();
        let before = h.balance("ALICE");
        assert_eq!(h.claim("ALICE").unwrap(), 500);
        assert_eq!(h.balance("ALICE") - before, 100 * 2 + 100 * 3);
        assert_eq!(h.asset.balance_of(&h.m.core.escrow), 0);
    }

    #[test]
    fn test_set_odds_requires_odds_manager() {
        let mut h = Harness::new(vec![20_000, 30_000], 100_000);
        let mut env = CallEnv::new("ALICE", 150, &mut h.asset, &h.roles);
        assert!(matches!(h.m.set_odds(&mut env, 0, 25_000), Err(WagerError::Unauthorized { .. })));

        h.roles.grant(Role::OddsManager, &Address::new("TRADER"));
        let mut env = CallEnv::new("TRADER", 150, &mut h.asset, &h.roles);
        h.m.set_odds(&mut env, 1, 25_000).unwrap();
        assert_eq!(h.m.odds(), &[20_000, 25_000]);
        assert!(matches!(h.m.set_odds(&mut env, 2, 25_000), Err(WagerError::InvalidOutcome { .. })));
    }

    #[test]
    fn test_liability_cap_rejects_without_side_effects() {
        let mut h = Harness::new(vec![30_000, 15_000], 250);
        h.bet("ALICE", 0, 100).unwrap(); // +200
        let events_before = h.m.core.events().len();

        let err = h.bet("BOB", 0, 100).unwrap_err();
        assert_eq!(err, WagerError::InsufficientLiquidity { current: 200, incremental: 200, max: 250 });
        assert_eq!(h.balance("BOB"), 10_000);
        assert_eq!(h.m.current_liability(), 200);
        assert_eq!(h.m.wagers.len(), 1);
        assert_eq!(h.m.core.events().len(), events_before);

        // a cheaper outcome still fits
        h.bet("BOB", 1, 100).unwrap(); // +50
        assert_eq!(h.m.current_liability(), 250);
    }

    #[test]
    fn test_max_bet_amount_enforced() {
        let mut h = Harness::new(vec![20_000, 20_000], u128::MAX);
        assert!(matches!(h.bet("ALICE", 0, 1_001), Err(WagerError::AmountTooLarge { .. })));
        assert!(h.bet("ALICE", 0, 1_000).is_ok());
    }

    #[test]
    fn test_house_wins_and_withdraws_surplus() {
        let mut h = Harness::new(vec![20_000, 20_000], 10_000);
        h.bet("ALICE", 0, 300).unwrap();
        h.bet("BOB", 1, 500).unwrap();

        let s = h.as_owner(|m, env| m.settle(env, 0)).unwrap();
        assert_eq!(s.total_staked, 800);
        assert_eq!(s.total_payouts_due, 600);
        assert_eq!(s.house_pnl, 200);

        assert_eq!(h.as_owner(|m, env| m.withdraw_surplus(env)).unwrap(), 200);
        assert_eq!(h.as_owner(|m, env| m.withdraw_surplus(env)), Err(WagerError::NothingToSweep));
        assert_eq!(h.balance("TREASURY"), 200);

        assert_eq!(h.claim("ALICE").unwrap(), 600);
        assert_eq!(h.claim("ALICE"), Err(WagerError::NothingToClaim));
        assert_eq!(h.claim("BOB"), Err(WagerError::NothingToClaim));
        assert_eq!(h.m.outstanding_obligations(), 0);
    }

    #[test]
    fn test_underfunded_claims_wait_for_shortfall() {
        let mut h = Harness::new(vec![50_000, 20_000], 10_000);
        h.bet("ALICE", 0, 100).unwrap(); // owes 500
        h.bet("BOB", 1, 100).unwrap();

        let s = h.as_owner(|m, env| m.settle(env, 0)).unwrap();
        assert_eq!(s.house_pnl, -300);
        assert_eq!(h.m.shortfall(&h.asset), 300);

        assert_eq!(
            h.claim("ALICE"),
            Err(WagerError::InsufficientBalance { available: 200, required: 500 })
        );
        assert!(!h.m.wager(1).unwrap().claimed);
        assert_eq!(h.m.pending_payout(&Address::new("ALICE")), 500);

        assert_eq!(h.as_owner(|m, env| m.fund_shortfall(env, 300)).unwrap(), 500);
        assert_eq!(h.m.shortfall(&h.asset), 0);
        assert_eq!(h.claim("ALICE").unwrap(), 500);
        assert_eq!(h.balance("ALICE"), 10_400);
    }

    #[test]
    fn test_claim_aggregates_winning_wagers() {
        let mut h = Harness::new(vec![20_000, 40_000], 100_000);
        h.bet("ALICE", 0, 100).unwrap();
        h.bet("ALICE", 1, 100).unwrap();
        h.bet("ALICE", 0, 50).unwrap();
        assert_eq!(h.m.wagers_of(&Address::new("ALICE")).len(), 3);
        assert_eq!(h.m.stake_of(&Address::new("ALICE"), 0), 150);

        h.as_owner(|m, env| m.settle(env, 0)).unwrap();
        assert_eq!(h.m.shortfall(&h.asset), 50);
        h.as_owner(|m, env| m.fund_shortfall(env, 50)).unwrap();
        assert_eq!(h.claim("ALICE").unwrap(), 300);
        assert!(h.m.wager(1).unwrap().claimed);
        assert!(!h.m.wager(2).unwrap().claimed);
        assert!(h.m.wager(3).unwrap().claimed);

        // every winning wager paid; the losing one is not claimable
        assert_eq!(h.claim("ALICE"), Err(WagerError::NothingToClaim));
        assert_eq!(h.balance("ALICE"), 10_000 - 250 + 300);
    }

    #[test]
    fn test_failed_transfer_keeps_wagers_claimable() {
        let mut h = Harness::new(vec![20_000, 20_000], 10_000);
        h.bet("ALICE", 0, 100).unwrap();
        h.as_owner(|m, env| m.settle(env, 0)).unwrap();
        h.as_owner(|m, env| m.fund_shortfall(env, 100)).unwrap();

        h.asset.set_rejecting(&Address::new("ALICE"), true);
        assert!(matches!(h.claim("ALICE"), Err(WagerError::TransferFailed { .. })));
        assert!(!h.m.wager(1).unwrap().claimed);
        assert_eq!(h.m.paid_out, 0);

        h.asset.set_rejecting(&Address::new("ALICE"), false);
        assert_eq!(h.claim("ALICE").unwrap(), 200);
    }

    #[test]
    fn test_cancel_refunds_principal_only() {
        let mut h = Harness::new(vec![30_000, 20_000], 10_000);
        h.bet("ALICE", 0, 100).unwrap();
        h.bet("ALICE", 1, 200).unwrap();

        h.as_owner(|m, env| m.cancel_market(env)).unwrap();
        assert_eq!(h.bet("BOB", 0, 10), Err(WagerError::WrongState { state: MatchState::Cancelled }));
        assert!(h.as_owner(|m, env| m.fund_shortfall(env, 10)).is_err());

        let mut env = CallEnv::new("ALICE", 200, &mut h.asset, &h.roles);
        assert_eq!(h.m.refund(&mut env).unwrap(), 300);
        assert_eq!(h.m.refund(&mut env), Err(WagerError::AlreadyClaimed));
        assert_eq!(h.balance("ALICE"), 10_000);
    }

    #[test]
    fn test_wager_lookup() {
        let mut h = Harness::new(vec![20_000, 20_000], 10_000);
        h.bet("ALICE", 0, 10).unwrap();
        assert_eq!(h.m.wager(1).unwrap().owner, Address::new("ALICE"));
        assert_eq!(h.m.wager(0), Err(WagerError::WagerNotFound(0)));
        assert_eq!(h.m.wager(2), Err(WagerError::WagerNotFound(2)));
    }

    #[test]
    fn test_initialize_validates_book() {
        let params = MatchParams {
            match_id: "bad".into(),
            owner: Address::new("OWNER"),
            cutoff: CUTOFF,
            fee_bps: 0,
            treasury: Address::new("TREASURY"),
            outcomes_count: 3,
            min_stake: StakeMinimum::Units(0),
        };
        let fixed = FixedOddsParams { initial_odds: vec![20_000, 5_000, 20_000], max_liability: 1, max_bet_amount: 1 };
        let mut m = FixedOddsMatch::new();
        assert!(matches!(m.initialize(params, fixed, 0), Err(WagerError::InvalidOdds { .. })));
        assert_eq!(m.core.state, MatchState::Created);
    }
}
