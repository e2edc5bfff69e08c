// ============================================================================
// Settlement Engine - one entry point over both settlement models
// ============================================================================
//
// The settlement model is picked when a match is created and never changes.
// `MatchBook` forwards every shared operation to the underlying ledger and
// rejects model-specific ones (odds, sweeps, shortfall funding) with
// `UnsupportedOperation` when they do not apply.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{WagerError, WagerResult};
use crate::market::core::{BetReceipt, CallEnv, CallGuard, MatchCore, MatchParams};
use crate::market::events::LedgerEvent;
use crate::market::fixed_odds::{FixedOddsMatch, FixedOddsSettlement, FixedWager};
use crate::market::liability::FixedOddsParams;
use crate::market::parimutuel::{ParimutuelMatch, ParimutuelSettlement};
use crate::market::state::MatchState;
use crate::types::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementModel {
    Parimutuel,
    FixedOdds,
}

impl SettlementModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementModel::Parimutuel => "parimutuel",
            SettlementModel::FixedOdds => "fixed_odds",
        }
    }
}

impl fmt::Display for SettlementModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn unsupported(operation: &'static str, model: SettlementModel) -> WagerError {
    WagerError::UnsupportedOperation { operation, model }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementFact {
    Parimutuel(ParimutuelSettlement),
    FixedOdds(FixedOddsSettlement),
}

impl SettlementFact {
    pub fn winning_outcome(&self) -> u8 {
        match self {
            SettlementFact::Parimutuel(s) => s.winning_outcome,
            SettlementFact::FixedOdds(s) => s.winning_outcome,
        }
    }
}

/// Read-only snapshot of a match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSummary {
    pub match_id: String,
    pub model: SettlementModel,
    pub state: MatchState,
    pub outcomes_count: u8,
    pub cutoff: u64,
    pub fee_bps: u16,
    pub treasury: Address,
    pub escrow: Address,
    pub paused: bool,
    pub pools: Vec<u128>,
    pub total_pool: u128,
    pub bets_placed: u64,
    pub created_at: u64,
    pub winning_outcome: Option<u8>,
    pub settlement: Option<SettlementFact>,
    /// Fixed-odds only
    pub odds: Option<Vec<u32>>,
    pub potential_payouts: Option<Vec<u128>>,
    pub current_liability: Option<u128>,
    pub max_liability: Option<u128>,
    pub max_bet_amount: Option<u128>,
}

/// What one participant holds in a match
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticipantView {
    pub address: Address,
    /// Stake per outcome
    pub stakes: Vec<u128>,
    /// Fixed-odds wagers, empty for pari-mutuel matches
    pub wagers: Vec<FixedWager>,
    pub claimed: bool,
    pub refunded: bool,
    pub pending_payout: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBook {
    Parimutuel(ParimutuelMatch),
    FixedOdds(FixedOddsMatch),
}

impl MatchBook {
    /// Build and initialize a match; fixed-odds matches need `fixed`
    pub fn create(
        model: SettlementModel,
        params: MatchParams,
        fixed: Option<FixedOddsParams>,
        now: u64,
    ) -> WagerResult<Self> {
        match model {
            SettlementModel::Parimutuel => Ok(MatchBook::Parimutuel(ParimutuelMatch::create(params, now)?)),
            SettlementModel::FixedOdds => {
                let fixed = fixed.ok_or(WagerError::OddsCountMismatch {
                    expected: params.outcomes_count as usize,
                    got: 0,
                })?;
                Ok(MatchBook::FixedOdds(FixedOddsMatch::create(params, fixed, now)?))
            }
        }
    }

    pub fn model(&self) -> SettlementModel {
        match self {
            MatchBook::Parimutuel(_) => SettlementModel::Parimutuel,
            MatchBook::FixedOdds(_) => SettlementModel::FixedOdds,
        }
    }

    pub fn core(&self) -> &MatchCore {
        match self {
            MatchBook::Parimutuel(m) => &m.core,
            MatchBook::FixedOdds(m) => &m.core,
        }
    }

    fn core_mut(&mut self) -> &mut MatchCore {
        match self {
            MatchBook::Parimutuel(m) => &mut m.core,
            MatchBook::FixedOdds(m) => &mut m.core,
        }
    }

    pub fn match_id(&self) -> &str {
        self.core().match_id()
    }

    /// Run a core-only admin operation under the reentrancy guard
    fn guarded_core(
        &mut self,
        env: &CallEnv<'_>,
        f: impl FnOnce(&mut MatchCore, &CallEnv<'_>) -> WagerResult<()>,
    ) -> WagerResult<()> {
        let mut guard = CallGuard::acquire(self.core_mut())?;
        f(&mut *guard, env)
    }

    // ===== SHARED OPERATIONS =====

    pub fn place_bet(&mut self, env: &mut CallEnv<'_>, outcome: u8, amount: u128) -> WagerResult<BetReceipt> {
        match self {
            MatchBook::Parimutuel(m) => m.place_bet(env, outcome, amount),
            MatchBook::FixedOdds(m) => m.place_bet(env, outcome, amount),
        }
    }

    pub fn settle(&mut self, env: &mut CallEnv<'_>, winning_outcome: u8) -> WagerResult<SettlementFact> {
        match self {
            MatchBook::Parimutuel(m) => m.settle(env, winning_outcome).map(SettlementFact::Parimutuel),
            MatchBook::FixedOdds(m) => m.settle(env, winning_outcome).map(SettlementFact::FixedOdds),
        }
    }

    pub fn claim(&mut self, env: &mut CallEnv<'_>) -> WagerResult<u128> {
        match self {
            MatchBook::Parimutuel(m) => m.claim(env),
            MatchBook::FixedOdds(m) => m.claim(env),
        }
    }

    pub fn cancel_market(&mut self, env: &mut CallEnv<'_>) -> WagerResult<()> {
        match self {
            MatchBook::Parimutuel(m) => m.cancel_market(env),
            MatchBook::FixedOdds(m) => m.cancel_market(env),
        }
    }

    pub fn refund(&mut self, env: &mut CallEnv<'_>) -> WagerResult<u128> {
        match self {
            MatchBook::Parimutuel(m) => m.refund(env),
            MatchBook::FixedOdds(m) => m.refund(env),
        }
    }

    pub fn pause(&mut self, env: &CallEnv<'_>) -> WagerResult<()> {
        self.guarded_core(env, |core, env| core.pause(env))
    }

    pub fn unpause(&mut self, env: &CallEnv<'_>) -> WagerResult<()> {
        self.guarded_core(env, |core, env| core.unpause(env))
    }

    pub fn set_cutoff(&mut self, env: &CallEnv<'_>, new_cutoff: u64) -> WagerResult<()> {
        self.guarded_core(env, |core, env| core.set_cutoff(env, new_cutoff))
    }

    pub fn set_treasury(&mut self, env: &CallEnv<'_>, new_treasury: Address) -> WagerResult<()> {
        self.guarded_core(env, |core, env| core.set_treasury(env, new_treasury))
    }

    pub fn set_fee(&mut self, env: &CallEnv<'_>, new_fee_bps: u16) -> WagerResult<()> {
        self.guarded_core(env, |core, env| core.set_fee(env, new_fee_bps))
    }

    // ===== MODEL-SPECIFIC OPERATIONS =====

    pub fn set_odds(&mut self, env: &mut CallEnv<'_>, outcome: u8, new_odds: u32) -> WagerResult<u32> {
        match self {
            MatchBook::FixedOdds(m) => m.set_odds(env, outcome, new_odds),
            MatchBook::Parimutuel(_) => Err(unsupported("set_odds", SettlementModel::Parimutuel)),
        }
    }

    pub fn sweep_if_no_winners(&mut self, env: &mut CallEnv<'_>) -> WagerResult<u128> {
        match self {
            MatchBook::Parimutuel(m) => m.sweep_if_no_winners(env),
            MatchBook::FixedOdds(_) => Err(unsupported("sweep_if_no_winners", SettlementModel::FixedOdds)),
        }
    }

    pub fn fund_shortfall(&mut self, env: &mut CallEnv<'_>, amount: u128) -> WagerResult<u128> {
        match self {
            MatchBook::FixedOdds(m) => m.fund_shortfall(env, amount),
            MatchBook::Parimutuel(_) => Err(unsupported("fund_shortfall", SettlementModel::Parimutuel)),
        }
    }

    pub fn withdraw_surplus(&mut self, env: &mut CallEnv<'_>) -> WagerResult<u128> {
        match self {
            MatchBook::FixedOdds(m) => m.withdraw_surplus(env),
            MatchBook::Parimutuel(_) => Err(unsupported("withdraw_surplus", SettlementModel::Parimutuel)),
        }
    }

    // ===== READERS =====

    pub fn pools(&self) -> &[u128] {
        match self {
            MatchBook::Parimutuel(m) => m.pools(),
            MatchBook::FixedOdds(m) => m.pools(),
        }
    }

    pub fn total_pool(&self) -> u128 {
        match self {
            MatchBook::Parimutuel(m) => m.total_pool(),
            MatchBook::FixedOdds(m) => m.total_staked(),
        }
    }

    pub fn stake_of(&self, user: &Address, outcome: u8) -> u128 {
        match self {
            MatchBook::Parimutuel(m) => m.stake_of(user, outcome),
            MatchBook::FixedOdds(m) => m.stake_of(user, outcome),
        }
    }

    pub fn pending_payout(&self, user: &Address) -> u128 {
        match self {
            MatchBook::Parimutuel(m) => m.pending_payout(user),
            MatchBook::FixedOdds(m) => m.pending_payout(user),
        }
    }

    pub fn settlement(&self) -> Option<SettlementFact> {
        match self {
            MatchBook::Parimutuel(m) => m.settlement().map(SettlementFact::Parimutuel),
            MatchBook::FixedOdds(m) => m.settlement().map(SettlementFact::FixedOdds),
        }
    }

    pub fn events(&self) -> &[LedgerEvent] {
        self.core().events()
    }

    pub fn wager(&self, id: u64) -> WagerResult<FixedWager> {
        match self {
            MatchBook::FixedOdds(m) => m.wager(id).cloned(),
            MatchBook::Parimutuel(_) => Err(unsupported("wager", SettlementModel::Parimutuel)),
        }
    }

    pub fn participant(&self, user: &Address) -> ParticipantView {
        let outcomes = self.core().params.outcomes_count;
        let stakes = (0..outcomes).map(|o| self.stake_of(user, o)).collect();
        let pending_payout = self.pending_payout(user);
        match self {
            MatchBook::Parimutuel(m) => {
                let (claimed, refunded) = m
                    .position(user)
                    .map(|p| (p.claimed, p.refunded))
                    .unwrap_or((false, false));
                ParticipantView {
                    address: user.clone(),
                    stakes,
                    wagers: Vec::new(),
                    claimed,
                    refunded,
                    pending_payout,
                }
            }
            MatchBook::FixedOdds(m) => {
                let wagers: Vec<FixedWager> = m.wagers_of(user).into_iter().cloned().collect();
                let claimed = !wagers.is_empty() && wagers.iter().all(|w| w.claimed || w.refunded);
                let refunded = !wagers.is_empty() && wagers.iter().all(|w| w.refunded);
                ParticipantView { address: user.clone(), stakes, wagers, claimed, refunded, pending_payout }
            }
        }
    }

    pub fn summary(&self) -> MatchSummary {
        let core = self.core();
        let mut summary = MatchSummary {
            match_id: core.params.match_id.clone(),
            model: self.model(),
            state: core.state,
            outcomes_count: core.params.outcomes_count,
            cutoff: core.params.cutoff,
            fee_bps: core.params.fee_bps,
            treasury: core.params.treasury.clone(),
            escrow: core.escrow.clone(),
            paused: core.paused,
            pools: self.pools().to_vec(),
            total_pool: self.total_pool(),
            bets_placed: core.bets_placed,
            created_at: core.created_at,
            winning_outcome: core.winning_outcome,
            settlement: self.settlement(),
            odds: None,
            potential_payouts: None,
            current_liability: None,
            max_liability: None,
            max_bet_amount: None,
        };
        if let MatchBook::FixedOdds(m) = self {
            summary.odds = Some(m.odds().to_vec());
            summary.potential_payouts = Some(m.book.potential_payouts.clone());
            summary.current_liability = Some(m.current_liability());
            summary.max_liability = Some(m.book.max_liability);
            summary.max_bet_amount = Some(m.book.max_bet_amount);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::RoleTable;
    use crate::asset::InMemoryAsset;
    use crate::market::core::StakeMinimum;

    fn params(id: &str) -> MatchParams {
        MatchParams {
            match_id: id.into(),
            owner: Address::new("OWNER"),
            cutoff: 1_000,
            fee_bps: 500,
            treasury: Address::new("TREASURY"),
            outcomes_count: 2,
            min_stake: StakeMinimum::Units(0),
        }
    }

    #[test]
    fn test_fixed_odds_requires_book_params() {
        let err = MatchBook::create(SettlementModel::FixedOdds, params("f1"), None, 0).unwrap_err();
        assert_eq!(err, WagerError::OddsCountMismatch { expected: 2, got: 0 });
    }

    #[test]
    fn test_model_specific_operations_rejected() {
        let mut book = MatchBook::create(SettlementModel::Parimutuel, params("p1"), None, 0).unwrap();
        let mut asset = InMemoryAsset::new();
        let roles = RoleTable::with_owner(&Address::new("OWNER"));
        let mut env = CallEnv::new("OWNER", 10, &mut asset, &roles);

        assert_eq!(
            book.set_odds(&mut env, 0, 20_000),
            Err(WagerError::UnsupportedOperation { operation: "set_odds", model: SettlementModel::Parimutuel })
        );
        assert!(matches!(book.fund_shortfall(&mut env, 1), Err(WagerError::UnsupportedOperation { .. })));
        assert!(matches!(book.withdraw_surplus(&mut env), Err(WagerError::UnsupportedOperation { .. })));
    }

    #[test]
    fn test_fee_locked_after_first_bet() {
        let mut book = MatchBook::create(SettlementModel::Parimutuel, params("p2"), None, 0).unwrap();
        let mut asset = InMemoryAsset::new();
        let alice = Address::new("ALICE");
        asset.deposit(&alice, 100);
        asset.approve(&alice, &book.core().escrow.clone(), 100);
        let roles = RoleTable::with_owner(&Address::new("OWNER"));

        let env = CallEnv::new("OWNER", 10, &mut asset, &roles);
        book.set_fee(&env, 100).unwrap();

        let mut env = CallEnv::new("ALICE", 10, &mut asset, &roles);
        book.place_bet(&mut env, 1, 50).unwrap();

        let env = CallEnv::new("OWNER", 10, &mut asset, &roles);
        assert_eq!(book.set_fee(&env, 200), Err(WagerError::FeeLocked));
        assert_eq!(book.summary().fee_bps, 100);
    }

    #[test]
    fn test_summary_and_participant() {
        let fixed = FixedOddsParams { initial_odds: vec![18_500, 21_000], max_liability: 10_000, max_bet_amount: 500 };
        let mut book = MatchBook::create(SettlementModel::FixedOdds, params("f2"), Some(fixed), 0).unwrap();
        let mut asset = InMemoryAsset::new();
        let bob = Address::new("BOB");
        asset.deposit(&bob, 1_000);
        asset.approve(&bob, &book.core().escrow.clone(), 1_000);
        let roles = RoleTable::new();

        let mut env = CallEnv::new("BOB", 10, &mut asset, &roles);
        book.place_bet(&mut env, 1, 200).unwrap();

        let summary = book.summary();
        assert_eq!(summary.model, SettlementModel::FixedOdds);
        assert_eq!(summary.pools, vec![0, 200]);
        assert_eq!(summary.potential_payouts, Some(vec![0, 420]));
        assert_eq!(summary.current_liability, Some(220));

        let view = book.participant(&bob);
        assert_eq!(view.stakes, vec![0, 200]);
        assert_eq!(view.wagers.len(), 1);
        assert_eq!(view.pending_payout, 0);
    }

    #[test]
    fn test_book_round_trips_through_json() {
        let book = MatchBook::create(SettlementModel::Parimutuel, params("p3"), None, 0).unwrap();
        let json = serde_json::to_string(&book).unwrap();
        let restored: MatchBook = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.model(), SettlementModel::Parimutuel);
        assert_eq!(restored.match_id(), "p3");
        assert_eq!(restored.core().state, MatchState::Open);
    }
}
