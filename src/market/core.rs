// ============================================================================
// Match Core - parameters, guards and the shared state machine
// ============================================================================
//
// Both settlement models embed a `MatchCore`. It owns everything that does not
// depend on how payouts are computed:
//   - immutable parameters fixed by `initialize`
//   - lifecycle state, pause flag, reentrancy flag
//   - role checks against the injected `AccessControl`
//   - admin setters (cutoff, treasury, fee), pause, cancellation
//   - the append-only event log
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use tracing::info;

use crate::access::{AccessControl, Role};
use crate::asset::StakeAsset;
use crate::error::{WagerError, WagerResult};
use crate::market::events::{EventKind, LedgerEvent};
use crate::market::state::MatchState;
use crate::oracle::PriceConverter;
use crate::types::Address;

// ============================================================================
// CONSTANTS
// ============================================================================

pub const MIN_OUTCOMES: u8 = 2;
pub const MAX_OUTCOMES: u8 = 16;
pub const MAX_FEE_BPS: u16 = 1_000;

/// Outcome indices of the named three-way wrappers
pub const OUTCOME_HOME: u8 = 0;
pub const OUTCOME_DRAW: u8 = 1;
pub const OUTCOME_AWAY: u8 = 2;

// ============================================================================
// PARAMETERS
// ============================================================================

/// Minimum accepted stake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeMinimum {
    /// Compared directly against the stake amount
    Units(u128),
    /// Compared against the stake converted through the price feed
    StableValue(u128),
}

impl Default for StakeMinimum {
    fn default() -> Self {
        StakeMinimum::Units(0)
    }
}

/// Initialization parameters shared by both settlement models
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchParams {
    pub match_id: String,
    pub owner: Address,
    pub cutoff: u64,
    pub fee_bps: u16,
    pub treasury: Address,
    pub outcomes_count: u8,
    #[serde(default)]
    pub min_stake: StakeMinimum,
}

impl MatchParams {
    pub fn validate(&self) -> WagerResult<()> {
        if self.owner.is_zero() {
            return Err(WagerError::ZeroAddress { field: "owner" });
        }
        if self.treasury.is_zero() {
            return Err(WagerError::ZeroAddress { field: "treasury" });
        }
        if !(MIN_OUTCOMES..=MAX_OUTCOMES).contains(&self.outcomes_count) {
            return Err(WagerError::OutcomeCountOutOfBounds {
                count: self.outcomes_count,
                min: MIN_OUTCOMES,
                max: MAX_OUTCOMES,
            });
        }
        if self.fee_bps > MAX_FEE_BPS {
            return Err(WagerError::FeeOutOfBounds { fee_bps: self.fee_bps, max: MAX_FEE_BPS });
        }
        Ok(())
    }
}

/// Result of an accepted wager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetReceipt {
    pub match_id: String,
    pub bettor: Address,
    pub outcome: u8,
    pub amount: u128,
    /// Bettor's accumulated stake on this outcome after the bet
    pub total_stake: u128,
    /// Fixed-odds only
    pub wager_id: Option<u64>,
    pub locked_odds: Option<u32>,
    pub potential_payout: Option<u128>,
}

// ============================================================================
// CALL ENVIRONMENT
// ============================================================================

/// Everything a single call needs from outside the ledger
pub struct CallEnv<'a> {
    pub caller: Address,
    /// Caller-observed wall-clock time (unix seconds)
    pub now: u64,
    pub asset: &'a mut dyn StakeAsset,
    pub access: &'a dyn AccessControl,
    pub pricing: Option<&'a PriceConverter>,
}

impl<'a> CallEnv<'a> {
    pub fn new(
        caller: impl Into<Address>,
        now: u64,
        asset: &'a mut dyn StakeAsset,
        access: &'a dyn AccessControl,
    ) -> Self {
        Self { caller: caller.into(), now, asset, access, pricing: None }
    }

    pub fn with_pricing(mut self, pricing: &'a PriceConverter) -> Self {
        self.pricing = Some(pricing);
        self
    }
}

// ============================================================================
// MATCH CORE
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchCore {
    pub params: MatchParams,
    /// Account holding this match's funds
    pub escrow: Address,
    pub state: MatchState,
    /// One-way; set together with `winning_outcome`
    pub settled: bool,
    pub winning_outcome: Option<u8>,
    pub paused: bool,
    /// Wagers accepted so far (accumulating bets count once each)
    pub bets_placed: u64,
    pub created_at: u64,
    pub events: Vec<LedgerEvent>,
    #[serde(skip)]
    in_call: bool,
}

impl MatchCore {
    /// One-shot initialization: Created → Open
    pub fn initialize(&mut self, params: MatchParams, now: u64) -> WagerResult<()> {
        if self.state.is_initialized() {
            return Err(WagerError::AlreadyInitialized);
        }
        params.validate()?;

        self.escrow = Address::escrow_for(&params.match_id);
        self.created_at = now;
        self.state = MatchState::Open;
        let event = EventKind::Initialized {
            outcomes_count: params.outcomes_count,
            cutoff: params.cutoff,
            fee_bps: params.fee_bps,
        };
        self.params = params;
        self.emit(now, event);

        info!(
            match_id = %self.params.match_id,
            outcomes = self.params.outcomes_count,
            cutoff = self.params.cutoff,
            fee_bps = self.params.fee_bps,
            "match initialized"
        );
        Ok(())
    }

    pub fn match_id(&self) -> &str {
        &self.params.match_id
    }

    // ===== GUARDS =====

    pub(crate) fn enter(&mut self) -> WagerResult<()> {
        if self.in_call {
            return Err(WagerError::Reentrancy);
        }
        self.in_call = true;
        Ok(())
    }

    pub(crate) fn exit(&mut self) {
        self.in_call = false;
    }

    pub fn require_initialized(&self) -> WagerResult<()> {
        if !self.state.is_initialized() {
            return Err(WagerError::NotInitialized);
        }
        Ok(())
    }

    pub fn require_role(&self, env: &CallEnv<'_>, role: Role) -> WagerResult<()> {
        if !env.access.has_role(role, &env.caller) {
            return Err(WagerError::Unauthorized {
                caller: env.caller.to_string(),
                role: role.to_string(),
            });
        }
        Ok(())
    }

    pub fn require_not_paused(&self) -> WagerResult<()> {
        if self.paused {
            return Err(WagerError::Paused);
        }
        Ok(())
    }

    /// Open (not settled, not cancelled)
    pub fn require_open(&self) -> WagerResult<()> {
        self.require_initialized()?;
        match self.state {
            MatchState::Open => Ok(()),
            MatchState::Settled => Err(WagerError::AlreadySettled),
            state => Err(WagerError::WrongState { state }),
        }
    }

    pub fn require_settled(&self) -> WagerResult<u8> {
        self.require_initialized()?;
        match (self.state, self.winning_outcome) {
            (MatchState::Settled, Some(outcome)) => Ok(outcome),
            (MatchState::Cancelled, _) => Err(WagerError::WrongState { state: MatchState::Cancelled }),
            _ => Err(WagerError::NotSettled),
        }
    }

    pub fn require_cancelled(&self) -> WagerResult<()> {
        self.require_initialized()?;
        if self.state != MatchState::Cancelled {
            return Err(WagerError::WrongState { state: self.state });
        }
        Ok(())
    }

    pub fn require_valid_outcome(&self, outcome: u8) -> WagerResult<()> {
        if outcome >= self.params.outcomes_count {
            return Err(WagerError::InvalidOutcome {
                outcome,
                outcomes_count: self.params.outcomes_count,
            });
        }
        Ok(())
    }

    /// Shared place-bet preconditions: open, unpaused, before cutoff, valid outcome,
    /// positive amount, minimum stake
    pub fn check_bet(&self, env: &CallEnv<'_>, outcome: u8, amount: u128) -> WagerResult<()> {
        self.require_not_paused()?;
        self.require_open()?;
        if env.now >= self.params.cutoff {
            return Err(WagerError::BettingClosed { cutoff: self.params.cutoff, now: env.now });
        }
        self.require_valid_outcome(outcome)?;
        if amount == 0 {
            return Err(WagerError::ZeroAmount);
        }
        self.check_minimum(env, amount)
    }

    fn check_minimum(&self, env: &CallEnv<'_>, amount: u128) -> WagerResult<()> {
        match self.params.min_stake {
            StakeMinimum::Units(minimum) => {
                if amount < minimum {
                    return Err(WagerError::BelowMinimum { value: amount, minimum });
                }
            }
            StakeMinimum::StableValue(minimum) => {
                let pricing = env.pricing.ok_or(WagerError::MissingPriceFeed)?;
                let value = pricing.to_stable_value(amount, env.now)?;
                if value < minimum {
                    return Err(WagerError::BelowMinimum { value, minimum });
                }
            }
        }
        Ok(())
    }

    /// Pull the stake from the caller into escrow
    pub fn collect_stake(&self, env: &mut CallEnv<'_>, amount: u128) -> WagerResult<()> {
        let escrow = self.escrow.clone();
        let caller = env.caller.clone();
        if !env.asset.transfer_from(&escrow, &caller, &escrow, amount) {
            return Err(WagerError::TransferFailed { to: escrow.to_string(), amount });
        }
        Ok(())
    }

    pub fn escrow_balance(&self, env: &CallEnv<'_>) -> u128 {
        env.asset.balance_of(&self.escrow)
    }

    // ===== STATE TRANSITIONS =====

    pub(crate) fn mark_settled(&mut self, winning_outcome: u8) {
        debug_assert!(self.state.can_transition_to(MatchState::Settled));
        self.state = MatchState::Settled;
        self.settled = true;
        self.winning_outcome = Some(winning_outcome);
    }

    /// Admin cancellation: Open → Cancelled
    pub fn cancel(&mut self, env: &CallEnv<'_>) -> WagerResult<()> {
        self.require_role(env, Role::Admin)?;
        self.require_open()?;
        self.state = MatchState::Cancelled;
        self.emit(env.now, EventKind::Cancelled { by: env.caller.clone() });
        info!(match_id = %self.params.match_id, by = %env.caller.short(), "match cancelled");
        Ok(())
    }

    pub fn pause(&mut self, env: &CallEnv<'_>) -> WagerResult<()> {
        self.require_role(env, Role::Pauser)?;
        self.require_initialized()?;
        if self.paused {
            return Err(WagerError::Paused);
        }
        self.paused = true;
        self.emit(env.now, EventKind::Paused { by: env.caller.clone() });
        info!(match_id = %self.params.match_id, "match paused");
        Ok(())
    }

    pub fn unpause(&mut self, env: &CallEnv<'_>) -> WagerResult<()> {
        self.require_role(env, Role::Pauser)?;
        self.require_initialized()?;
        if !self.paused {
            return Err(WagerError::NotPaused);
        }
        self.paused = false;
        self.emit(env.now, EventKind::Unpaused { by: env.caller.clone() });
        info!(match_id = %self.params.match_id, "match unpaused");
        Ok(())
    }

    // ===== ADMIN SETTERS =====

    pub fn set_cutoff(&mut self, env: &CallEnv<'_>, new_cutoff: u64) -> WagerResult<()> {
        self.require_role(env, Role::Admin)?;
        self.require_open()?;
        if new_cutoff <= env.now {
            return Err(WagerError::InvalidCutoff { cutoff: new_cutoff, now: env.now });
        }
        let old_cutoff = self.params.cutoff;
        self.params.cutoff = new_cutoff;
        self.emit(env.now, EventKind::CutoffUpdated { old_cutoff, new_cutoff });
        info!(match_id = %self.params.match_id, old_cutoff, new_cutoff, "cutoff updated");
        Ok(())
    }

    pub fn set_treasury(&mut self, env: &CallEnv<'_>, new_treasury: Address) -> WagerResult<()> {
        self.require_role(env, Role::Admin)?;
        self.require_initialized()?;
        if new_treasury.is_zero() {
            return Err(WagerError::ZeroAddress { field: "treasury" });
        }
        let old_treasury = std::mem::replace(&mut self.params.treasury, new_treasury.clone());
        info!(match_id = %self.params.match_id, treasury = %new_treasury, "treasury updated");
        self.emit(env.now, EventKind::TreasuryUpdated { old_treasury, new_treasury });
        Ok(())
    }

    /// The fee is frozen once anyone has wagered
    pub fn set_fee(&mut self, env: &CallEnv<'_>, new_fee_bps: u16) -> WagerResult<()> {
        self.require_role(env, Role::Admin)?;
        self.require_open()?;
        if new_fee_bps > MAX_FEE_BPS {
            return Err(WagerError::FeeOutOfBounds { fee_bps: new_fee_bps, max: MAX_FEE_BPS });
        }
        if self.bets_placed > 0 {
            return Err(WagerError::FeeLocked);
        }
        let old_fee_bps = self.params.fee_bps;
        self.params.fee_bps = new_fee_bps;
        self.emit(env.now, EventKind::FeeUpdated { old_fee_bps, new_fee_bps });
        info!(match_id = %self.params.match_id, old_fee_bps, new_fee_bps, "fee updated");
        Ok(())
    }

    // ===== EVENTS =====

    pub(crate) fn emit(&mut self, now: u64, kind: EventKind) {
        let event = LedgerEvent {
            seq: self.events.len() as u64 + 1,
            match_id: self.params.match_id.clone(),
            timestamp: now,
            kind,
        };
        self.events.push(event);
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }
}

// ============================================================================
// CALL GUARD
// ============================================================================

/// Holds the reentrancy flag for one call and clears it on drop, unwinding included
pub(crate) struct CallGuard<'a, M: AsMut<MatchCore>> {
    target: &'a mut M,
}

impl<'a, M: AsMut<MatchCore>> CallGuard<'a, M> {
    pub(crate) fn acquire(target: &'a mut M) -> WagerResult<Self> {
        target.as_mut().enter()?;
        Ok(Self { target })
    }
}

impl<M: AsMut<MatchCore>> Deref for CallGuard<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.target
    }
}

impl<M: AsMut<MatchCore>> DerefMut for CallGuard<'_, M> {
    fn deref_mut(&mut self) -> &mut M {
        self.target
    }
}

impl<M: AsMut<MatchCore>> Drop for CallGuard<'_, M> {
    fn drop(&mut self) {
        self.target.as_mut().exit();
    }
}

impl AsMut<MatchCore> for MatchCore {
    fn as_mut(&mut self) -> &mut MatchCore {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::RoleTable;
    use crate::asset::InMemoryAsset;

    fn params() -> MatchParams {
        MatchParams {
            match_id: "m1".into(),
            owner: Address::new("OWNER"),
            cutoff: 1_000,
            fee_bps: 200,
            treasury: Address::new("TREASURY"),
            outcomes_count: 3,
            min_stake: StakeMinimum::Units(0),
        }
    }

    #[test]
    fn test_initialize_once() {
        let mut core = MatchCore::default();
        assert_eq!(core.require_open(), Err(WagerError::NotInitialized));
        core.initialize(params(), 10).unwrap();
        assert_eq!(core.state, MatchState::Open);
        assert_eq!(core.initialize(params(), 11), Err(WagerError::AlreadyInitialized));
        assert_eq!(core.events().len(), 1);
    }

    #[test]
    fn test_param_bounds() {
        let mut p = params();
        p.fee_bps = 1_001;
        assert!(matches!(p.validate(), Err(WagerError::FeeOutOfBounds { .. })));

        let mut p = params();
        p.outcomes_count = 1;
        assert!(matches!(p.validate(), Err(WagerError::OutcomeCountOutOfBounds { .. })));
        p.outcomes_count = 17;
        assert!(matches!(p.validate(), Err(WagerError::OutcomeCountOutOfBounds { .. })));

        let mut p = params();
        p.treasury = Address::zero();
        assert_eq!(p.validate(), Err(WagerError::ZeroAddress { field: "treasury" }));
    }

    #[test]
    fn test_reentrancy_flag() {
        let mut core = MatchCore::default();
        core.enter().unwrap();
        assert_eq!(core.enter(), Err(WagerError::Reentrancy));
        core.exit();
        assert!(core.enter().is_ok());
    }

    #[test]
    fn test_admin_setters_require_role() {
        let mut core = MatchCore::default();
        core.initialize(params(), 10).unwrap();
        let roles = RoleTable::with_owner(&Address::new("OWNER"));
        let mut asset = InMemoryAsset::new();

        let env = CallEnv::new("MALLORY", 20, &mut asset, &roles);
        assert!(matches!(core.set_cutoff(&env, 2_000), Err(WagerError::Unauthorized { .. })));

        let env = CallEnv::new("OWNER", 20, &mut asset, &roles);
        core.set_cutoff(&env, 2_000).unwrap();
        assert_eq!(core.params.cutoff, 2_000);
        assert!(matches!(core.set_cutoff(&env, 20), Err(WagerError::InvalidCutoff { .. })));
        core.set_fee(&env, 300).unwrap();
        assert!(matches!(core.set_fee(&env, 1_001), Err(WagerError::FeeOutOfBounds { .. })));
        assert!(core.set_treasury(&env, Address::zero()).is_err());
        core.set_treasury(&env, Address::new("NEW_TREASURY")).unwrap();
        assert_eq!(core.params.treasury, Address::new("NEW_TREASURY"));
    }

    #[test]
    fn test_pause_toggle() {
        let mut core = MatchCore::default();
        core.initialize(params(), 10).unwrap();
        let roles = RoleTable::with_owner(&Address::new("OWNER"));
        let mut asset = InMemoryAsset::new();
        let env = CallEnv::new("OWNER", 20, &mut asset, &roles);

        assert_eq!(core.unpause(&env), Err(WagerError::NotPaused));
        core.pause(&env).unwrap();
        assert_eq!(core.require_not_paused(), Err(WagerError::Paused));
        core.unpause(&env).unwrap();
        assert!(core.require_not_paused().is_ok());
    }

    #[test]
    fn test_cancel_is_terminal() {
        let mut core = MatchCore::default();
        core.initialize(params(), 10).unwrap();
        let roles = RoleTable::with_owner(&Address::new("OWNER"));
        let mut asset = InMemoryAsset::new();
        let env = CallEnv::new("OWNER", 20, &mut asset, &roles);

        core.cancel(&env).unwrap();
        assert_eq!(core.state, MatchState::Cancelled);
        assert!(core.cancel(&env).is_err());
        assert!(core.require_cancelled().is_ok());
        assert!(matches!(core.require_settled(), Err(WagerError::WrongState { .. })));
    }

    #[test]
    fn test_call_guard_blocks_nested_entry() {
        let mut core = MatchCore::default();
        let mut guard = CallGuard::acquire(&mut core).unwrap();
        assert_eq!(guard.enter(), Err(WagerError::Reentrancy));
        assert!(matches!(CallGuard::acquire(&mut *guard), Err(WagerError::Reentrancy)));
        drop(guard);
        assert!(CallGuard::acquire(&mut core).is_ok());
    }

    #[test]
    fn test_call_guard_clears_flag_on_panic() {
        let mut core = MatchCore::default();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = CallGuard::acquire(&mut core).unwrap();
            panic!("asset blew up mid-call");
        }));
        assert!(outcome.is_err());
        assert_eq!(core.enter(), Ok(()));
        core.exit();
    }
}
