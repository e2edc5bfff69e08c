/// Stake Asset Module
///
/// The value-transfer primitive the wager ledger consumes. A match never
/// moves funds itself; it asks a `StakeAsset` to do so and treats the
/// returned boolean as success/failure.
///
/// `InMemoryAsset` is the reference implementation used by the service and
/// the tests:
/// - Account balances and spending allowances
/// - Append-only transaction history
/// - Atomic batch transfers (all legs or none)
/// - Per-account failure switch for exercising transfer-failure paths

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::types::{unix_now, Address};

// ============================================================================
// COLLABORATOR TRAIT
// ============================================================================

pub trait StakeAsset: Send {
    /// Current balance of `holder`
    fn balance_of(&self, holder: &Address) -> u128;

    /// Push `amount` from `from` (an escrow the caller controls) to `to`
    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> bool;

    /// Pull `amount` from `from` into `to`, spending `spender`'s allowance
    fn transfer_from(&mut self, spender: &Address, from: &Address, to: &Address, amount: u128) -> bool;

    /// Push several legs out of `from`; either every leg lands or none does
    fn transfer_batch(&mut self, from: &Address, legs: &[(Address, u128)]) -> bool;
}

// ============================================================================
// TRANSACTION HISTORY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TxType {
    Deposit,
    Transfer,
    TransferFrom,
    Approval,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub tx_type: TxType,
    pub from: Address,
    pub to: Address,
    pub amount: u128,
    pub timestamp: u64,
}

impl Transaction {
    pub fn new(tx_type: TxType, from: &Address, to: &Address, amount: u128) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tx_type,
            from: from.clone(),
            to: to.clone(),
            amount,
            timestamp: unix_now(),
        }
    }
}

// ============================================================================
// IN-MEMORY ASSET
// ============================================================================

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct InMemoryAsset {
    /// Account balances (address -> amount)
    pub balances: HashMap<Address, u128>,
    /// Allowances keyed by owner, then spender
    pub allowances: HashMap<Address, HashMap<Address, u128>>,
    /// All transactions
    pub transactions: Vec<Transaction>,
    /// Accounts whose incoming transfers are refused
    #[serde(skip)]
    rejecting: HashSet<Address>,
}

impl InMemoryAsset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint funds into an account (development faucet)
    pub fn deposit(&mut self, to: &Address, amount: u128) -> u128 {
        let bal = self.balances.entry(to.clone()).or_insert(0);
        *bal = bal.saturating_add(amount);
        let new_balance = *bal;
        self.transactions.push(Transaction::new(TxType::Deposit, &Address::zero(), to, amount));
        debug!(account = %to.short(), amount, "deposit");
        new_balance
    }

    /// Let `spender` pull up to `amount` from `owner`
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: u128) {
        self.allowances
            .entry(owner.clone())
            .or_default()
            .insert(spender.clone(), amount);
        self.transactions.push(Transaction::new(TxType::Approval, owner, spender, amount));
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Make every transfer into `account` fail (or succeed again)
    pub fn set_rejecting(&mut self, account: &Address, reject: bool) {
        if reject {
            self.rejecting.insert(account.clone());
        } else {
            self.rejecting.remove(account);
        }
    }

    /// Get transactions touching an address
    pub fn get_transactions(&self, id: &Address) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|tx| &tx.from == id || &tx.to == id)
            .collect()
    }

    /// Get recent transactions
    pub fn recent_transactions(&self, limit: usize) -> Vec<&Transaction> {
        self.transactions.iter().rev().take(limit).collect()
    }

    pub fn total_supply(&self) -> u128 {
        self.balances.values().fold(0u128, |acc, b| acc.saturating_add(*b))
    }

    /// Whether crediting `amount` to `to` stays within the u128 range
    fn credit_fits(&self, to: &Address, amount: u128) -> bool {
        self.balance_of(to).checked_add(amount).is_some()
    }

    /// Callers validate balance and headroom first; nothing here can fail
    fn move_funds(&mut self, from: &Address, to: &Address, amount: u128) {
        if let Some(bal) = self.balances.get_mut(from) {
            *bal = bal.saturating_sub(amount);
        }
        let credited = self.balances.entry(to.clone()).or_insert(0);
        *credited = credited.saturating_add(amount);
    }
}

impl StakeAsset for InMemoryAsset {
    fn balance_of(&self, holder: &Address) -> u128 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> bool {
        if to.is_zero() || self.rejecting.contains(to) {
            warn!(to = %to.short(), amount, "transfer refused by recipient");
            return false;
        }
        if self.balance_of(from) < amount {
            warn!(from = %from.short(), amount, "transfer exceeds balance");
            return false;
        }
        if !self.credit_fits(to, amount) {
            warn!(to = %to.short(), amount, "transfer would overflow recipient balance");
            return false;
        }
        self.move_funds(from, to, amount);
        self.transactions.push(Transaction::new(TxType::Transfer, from, to, amount));
        true
    }

    fn transfer_from(&mut self, spender: &Address, from: &Address, to: &Address, amount: u128) -> bool {
        if to.is_zero() || self.rejecting.contains(to) {
            return false;
        }
        let allowance = self.allowance(from, spender);
        if allowance < amount || self.balance_of(from) < amount {
            warn!(from = %from.short(), amount, allowance, "transfer_from refused");
            return false;
        }
        if !self.credit_fits(to, amount) {
            warn!(to = %to.short(), amount, "transfer_from would overflow recipient balance");
            return false;
        }
        self.approve_silently(from, spender, allowance - amount);
        self.move_funds(from, to, amount);
        self.transactions.push(Transaction::new(TxType::TransferFrom, from, to, amount));
        true
    }

    fn transfer_batch(&mut self, from: &Address, legs: &[(Address, u128)]) -> bool {
        let mut total: u128 = 0;
        let mut credits: HashMap<&Address, u128> = HashMap::new();
        for (to, amount) in legs {
            if to.is_zero() || self.rejecting.contains(to) {
                return false;
            }
            total = match total.checked_add(*amount) {
                Some(t) => t,
                None => return false,
            };
            let credit = credits.entry(to).or_insert(0);
            *credit = match credit.checked_add(*amount) {
                Some(c) => c,
                None => return false,
            };
        }
        if self.balance_of(from) < total {
            return false;
        }
        if let Some((to, _)) = credits.iter().find(|(to, credit)| !self.credit_fits(to, **credit)) {
            warn!(to = %to.short(), "batch would overflow recipient balance");
            return false;
        }
        for (to, amount) in legs {
            self.move_funds(from, to, *amount);
            self.transactions.push(Transaction::new(TxType::Transfer, from, to, *amount));
        }
        true
    }
}

impl InMemoryAsset {
    fn approve_silently(&mut self, owner: &Address, spender: &Address, amount: u128) {
        self.allowances
            .entry(owner.clone())
            .or_default()
            .insert(spender.clone(), amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_and_transfer() {
        let mut asset = InMemoryAsset::new();
        let alice = Address::new("ALICE");
        let bob = Address::new("BOB");
        asset.deposit(&alice, 1_000);

        assert!(asset.transfer(&alice, &bob, 400));
        assert_eq!(asset.balance_of(&alice), 600);
        assert_eq!(asset.balance_of(&bob), 400);

        assert!(!asset.transfer(&alice, &bob, 601));
        assert_eq!(asset.balance_of(&alice), 600);
        assert_eq!(asset.get_transactions(&bob).len(), 1);
    }

    #[test]
    fn test_transfer_from_spends_allowance() {
        let mut asset = InMemoryAsset::new();
        let alice = Address::new("ALICE");
        let escrow = Address::escrow_for("m1");
        asset.deposit(&alice, 1_000);

        assert!(!asset.transfer_from(&escrow, &alice, &escrow, 100));
        asset.approve(&alice, &escrow, 150);
        assert!(asset.transfer_from(&escrow, &alice, &escrow, 100));
        assert_eq!(asset.allowance(&alice, &escrow), 50);
        assert!(!asset.transfer_from(&escrow, &alice, &escrow, 100));
        assert_eq!(asset.balance_of(&escrow), 100);
    }

    #[test]
    fn test_batch_is_atomic() {
        let mut asset = InMemoryAsset::new();
        let escrow = Address::new("ESCROW");
        let treasury = Address::new("TREASURY");
        let bob = Address::new("BOB");
        asset.deposit(&escrow, 100);

        asset.set_rejecting(&bob, true);
        assert!(!asset.transfer_batch(&escrow, &[(treasury.clone(), 10), (bob.clone(), 50)]));
        assert_eq!(asset.balance_of(&escrow), 100);
        assert_eq!(asset.balance_of(&treasury), 0);

        asset.set_rejecting(&bob, false);
        assert!(!asset.transfer_batch(&escrow, &[(treasury.clone(), 60), (bob.clone(), 50)]));
        assert!(asset.transfer_batch(&escrow, &[(treasury.clone(), 10), (bob.clone(), 50)]));
        assert_eq!(asset.balance_of(&escrow), 40);
        assert_eq!(asset.total_supply(), 100);
    }

    #[test]
    fn test_transfers_refuse_to_overflow_recipient() {
        let mut asset = InMemoryAsset::new();
        let escrow = Address::new("ESCROW");
        let treasury = Address::new("TREASURY");
        let bob = Address::new("BOB");
        asset.deposit(&escrow, 1_000);
        asset.deposit(&treasury, u128::MAX);

        assert!(!asset.transfer(&escrow, &treasury, 1));
        assert!(!asset.transfer_batch(&escrow, &[(bob.clone(), 50), (treasury.clone(), 10)]));
        asset.approve(&escrow, &bob, 100);
        assert!(!asset.transfer_from(&bob, &escrow, &treasury, 100));

        assert_eq!(asset.balance_of(&escrow), 1_000);
        assert_eq!(asset.balance_of(&bob), 0);
        assert_eq!(asset.balance_of(&treasury), u128::MAX);
        assert_eq!(asset.allowance(&escrow, &bob), 100);
        assert!(asset
            .get_transactions(&bob)
            .iter()
            .all(|tx| matches!(tx.tx_type, TxType::Approval)));
    }

    #[test]
    fn test_batch_sums_repeated_recipient() {
        let mut asset = InMemoryAsset::new();
        let escrow = Address::new("ESCROW");
        let carol = Address::new("CAROL");
        asset.deposit(&escrow, 100);
        asset.deposit(&carol, u128::MAX - 60);

        assert!(!asset.transfer_batch(&escrow, &[(carol.clone(), 40), (carol.clone(), 40)]));
        assert!(asset.transfer_batch(&escrow, &[(carol.clone(), 30), (carol.clone(), 30)]));
        assert_eq!(asset.balance_of(&carol), u128::MAX);
        assert_eq!(asset.balance_of(&escrow), 40);
    }
}
