// Application state management
//
// Lock order, always: match registry → one match → stake asset → role table.
// A match lock is held for the whole of a ledger call so calls on the same
// match never interleave; calls on different matches only meet at the asset.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

use crate::access::{AccessControl, Role, RoleTable};
use crate::asset::{InMemoryAsset, StakeAsset, Transaction};
use crate::config::LedgerConfig;
use crate::error::{ServiceError, ServiceResult, WagerError, WagerResult};
use crate::market::{CallEnv, FixedOddsParams, MatchBook, MatchParams, MatchSummary, SettlementModel};
use crate::oracle::{ManualPriceFeed, PriceConverter, PriceFeed, Quote, RoundData};
use crate::types::{unix_now, Address};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: LedgerConfig,
    matches: RwLock<HashMap<String, Arc<Mutex<MatchBook>>>>,
    asset: Mutex<InMemoryAsset>,
    roles: RwLock<RoleTable>,
    price_feed: Arc<ManualPriceFeed>,
    pricing: PriceConverter,
    activity: Mutex<Vec<String>>,
}

/// On-disk snapshot
#[derive(Serialize, Deserialize)]
struct PersistedState {
    saved_at: u64,
    matches: Vec<MatchBook>,
    asset: InMemoryAsset,
    roles: RoleTable,
    price_round: Option<RoundData>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AppState {
    /// Fresh state: empty registry, admin holds every role
    pub fn new(config: LedgerConfig) -> Self {
        let price_feed = Arc::new(ManualPriceFeed::new(config.oracle.feed_decimals));
        if let Some(price) = config.oracle.initial_price {
            price_feed.push(price as i128, unix_now());
        }
        let pricing = PriceConverter::new(price_feed.clone(), config.oracle_settings());
        let roles = RoleTable::with_owner(&Address::new(config.admin.address.clone()));

        Self {
            matches: RwLock::new(HashMap::new()),
            asset: Mutex::new(InMemoryAsset::new()),
            roles: RwLock::new(roles),
            price_feed,
            pricing,
            activity: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Restore the last snapshot when persistence is enabled, otherwise start fresh
    pub fn load_or_new(config: LedgerConfig) -> Self {
        let state = Self::new(config);
        if !state.config.storage.persist {
            return state;
        }
        match state.load_from_disk() {
            Ok(count) => info!(matches = count, "✅ loaded persisted state from disk"),
            Err(e) => info!(reason = %e, "ℹ️ no persisted state, starting fresh"),
        }
        state
    }

    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }

    // ===== MATCH REGISTRY =====

    pub fn create_match(
        &self,
        model: SettlementModel,
        params: MatchParams,
        fixed: Option<FixedOddsParams>,
        now: u64,
    ) -> ServiceResult<MatchSummary> {
        let mut matches = write(&self.matches);
        if matches.contains_key(&params.match_id) {
            return Err(ServiceError::MatchExists(params.match_id));
        }
        let book = MatchBook::create(model, params, fixed, now)?;
        let summary = book.summary();
        matches.insert(summary.match_id.clone(), Arc::new(Mutex::new(book)));
        drop(matches);

        self.log_activity(
            "📊",
            "MATCH_CREATED",
            &format!("{} ({}) | {} outcomes | cutoff {}", summary.match_id, model, summary.outcomes_count, summary.cutoff),
        );
        Ok(summary)
    }

    fn get_match(&self, match_id: &str) -> ServiceResult<Arc<Mutex<MatchBook>>> {
        read(&self.matches)
            .get(match_id)
            .cloned()
            .ok_or_else(|| ServiceError::MatchNotFound(match_id.to_string()))
    }

    pub fn match_count(&self) -> usize {
        read(&self.matches).len()
    }

    /// Summaries of every match, ordered by id
    pub fn summaries(&self) -> Vec<MatchSummary> {
        let books: Vec<Arc<Mutex<MatchBook>>> = read(&self.matches).values().cloned().collect();
        let mut summaries: Vec<MatchSummary> = books.iter().map(|b| lock(b).summary()).collect();
        summaries.sort_by(|a, b| a.match_id.cmp(&b.match_id));
        summaries
    }

    /// Run a read-only closure against one match
    pub fn read_match<T>(&self, match_id: &str, f: impl FnOnce(&MatchBook) -> T) -> ServiceResult<T> {
        let handle = self.get_match(match_id)?;
        let book = lock(&handle);
        Ok(f(&*book))
    }

    /// Run one ledger operation on behalf of `caller` at time `now`
    pub fn execute<T>(
        &self,
        match_id: &str,
        caller: &Address,
        now: u64,
        f: impl FnOnce(&mut MatchBook, &mut CallEnv<'_>) -> WagerResult<T>,
    ) -> ServiceResult<T> {
        let handle = self.get_match(match_id)?;
        let mut book = lock(&handle);
        let mut asset = lock(&self.asset);
        let roles = read(&self.roles);

        let mut env = CallEnv::new(caller.clone(), now, &mut *asset, &*roles).with_pricing(&self.pricing);
        f(&mut *book, &mut env).map_err(ServiceError::from)
    }

    // ===== STAKE ASSET =====

    pub fn deposit(&self, account: &Address, amount: u128) -> u128 {
        let balance = lock(&self.asset).deposit(account, amount);
        self.log_activity("💰", "DEPOSIT", &format!("{} +{} | balance {}", account, amount, balance));
        balance
    }

    /// Allow `owner`'s funds to be pulled into a match escrow
    pub fn approve(&self, owner: &Address, spender: &Address, amount: u128) {
        lock(&self.asset).approve(owner, spender, amount);
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        lock(&self.asset).allowance(owner, spender)
    }

    pub fn balance_of(&self, account: &Address) -> u128 {
        lock(&self.asset).balance_of(account)
    }

    pub fn transactions_of(&self, account: &Address) -> Vec<Transaction> {
        lock(&self.asset).get_transactions(account).into_iter().cloned().collect()
    }

    pub fn recent_transactions(&self, limit: usize) -> Vec<Transaction> {
        lock(&self.asset).recent_transactions(limit).into_iter().cloned().collect()
    }

    // ===== ROLES =====

    pub fn require_admin(&self, caller: &Address) -> ServiceResult<()> {
        if read(&self.roles).has_role(Role::Admin, caller) {
            return Ok(());
        }
        Err(WagerError::Unauthorized {
            caller: caller.to_string(),
            role: Role::Admin.to_string(),
        }
        .into())
    }

    pub fn grant_role(&self, caller: &Address, role: Role, account: &Address) -> ServiceResult<()> {
        self.require_admin(caller)?;
        let mut roles = write(&self.roles);
        roles.grant(role, account);
        drop(roles);
        self.log_activity("🔑", "ROLE_GRANTED", &format!("{} → {}", role, account));
        Ok(())
    }

    pub fn roles_of(&self, account: &Address) -> Vec<Role> {
        read(&self.roles).roles_of(account)
    }

    // ===== ORACLE =====

    /// Publish a new price round; admin only
    pub fn push_price(&self, caller: &Address, answer: i128, now: u64) -> ServiceResult<RoundData> {
        self.require_admin(caller)?;
        let round = self.price_feed.push(answer, now);
        info!(round_id = round.round_id, answer, "📡 price round published");
        Ok(round)
    }

    pub fn quote(&self, now: u64) -> ServiceResult<Quote> {
        Ok(self.pricing.get_quote(now)?)
    }

    pub fn pricing(&self) -> &PriceConverter {
        &self.pricing
    }

    // ===== ACTIVITY LOG =====

    pub fn log_activity(&self, emoji: &str, action: &str, details: &str) {
        let timestamp = chrono::Local::now().format("%H:%M:%S");
        let entry = format!("[{}] {} {} | {}", timestamp, emoji, action, details);
        info!(target: "activity", "{}", entry);
        let mut activity = lock(&self.activity);
        activity.push(entry);
        if activity.len() > 1000 {
            activity.remove(0);
        }
    }

    pub fn recent_activity(&self, limit: usize) -> Vec<String> {
        lock(&self.activity).iter().rev().take(limit).cloned().collect()
    }

    // ===== PERSISTENCE =====

    pub fn save_to_disk(&self) -> ServiceResult<()> {
        let books: Vec<Arc<Mutex<MatchBook>>> = read(&self.matches).values().cloned().collect();
        let matches: Vec<MatchBook> = books.iter().map(|b| lock(b).clone()).collect();
        let snapshot = PersistedState {
            saved_at: unix_now(),
            matches,
            asset: lock(&self.asset).clone(),
            roles: read(&self.roles).clone(),
            price_round: self.price_feed.latest_round_data(),
        };

        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| ServiceError::Persistence(format!("failed to serialize state: {e}")))?;

        let path = &self.config.storage.data_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ServiceError::Persistence(format!("failed to create {}: {e}", parent.display())))?;
        }
        std::fs::write(path, json)
            .map_err(|e| ServiceError::Persistence(format!("failed to write {}: {e}", path.display())))?;

        info!(path = %path.display(), matches = snapshot.matches.len(), "💾 state saved to disk");
        Ok(())
    }

    /// Replace in-memory state with the snapshot; returns the number of matches restored
    pub fn load_from_disk(&self) -> ServiceResult<usize> {
        let path = &self.config.storage.data_path;
        let json = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Persistence(format!("failed to read {}: {e}", path.display())))?;
        let snapshot: PersistedState = serde_json::from_str(&json)
            .map_err(|e| ServiceError::Persistence(format!("failed to deserialize state: {e}")))?;

        let count = snapshot.matches.len();
        {
            let mut matches = write(&self.matches);
            matches.clear();
            for book in snapshot.matches {
                matches.insert(book.match_id().to_string(), Arc::new(Mutex::new(book)));
            }
        }
        *lock(&self.asset) = snapshot.asset;
        {
            let mut roles = write(&self.roles);
            *roles = snapshot.roles;
            // the configured admin always keeps every role
            let admin = Address::new(self.config.admin.address.clone());
            for role in Role::ALL {
                roles.grant(role, &admin);
            }
        }
        if let Some(round) = snapshot.price_round {
            self.price_feed.restore(round);
        }
        if count == 0 {
            warn!(path = %path.display(), "snapshot contained no matches");
        }
        Ok(count)
    }
}
