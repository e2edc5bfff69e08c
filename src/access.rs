// Role checks consumed by the wager ledger.
//
// The ledger only ever asks "does this caller hold this role?"; who grants
// roles and how is the business of whatever sits around it.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::types::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Cancel, sweep, parameter setters
    Admin,
    /// Declares the winning outcome
    Settler,
    /// Adjusts fixed odds
    OddsManager,
    /// Pause / unpause
    Pauser,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Settler, Role::OddsManager, Role::Pauser];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Settler => "settler",
            Role::OddsManager => "odds_manager",
            Role::Pauser => "pauser",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait AccessControl: Send + Sync {
    fn has_role(&self, role: Role, caller: &Address) -> bool;
}

/// Grant table keyed by address
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleTable {
    grants: HashMap<Address, HashSet<Role>>,
}

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table where `owner` holds every role
    pub fn with_owner(owner: &Address) -> Self {
        let mut table = Self::new();
        for role in Role::ALL {
            table.grant(role, owner);
        }
        table
    }

    pub fn grant(&mut self, role: Role, account: &Address) {
        self.grants.entry(account.clone()).or_default().insert(role);
    }

    pub fn revoke(&mut self, role: Role, account: &Address) {
        if let Some(roles) = self.grants.get_mut(account) {
            roles.remove(&role);
        }
    }

    pub fn roles_of(&self, account: &Address) -> Vec<Role> {
        let mut roles: Vec<Role> = self
            .grants
            .get(account)
            .map(|r| r.iter().copied().collect())
            .unwrap_or_default();
        roles.sort_by_key(|r| r.as_str());
        roles
    }
}

impl AccessControl for RoleTable {
    fn has_role(&self, role: Role, caller: &Address) -> bool {
        self.grants
            .get(caller)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_holds_all_roles() {
        let owner = Address::new("OWNER");
        let table = RoleTable::with_owner(&owner);
        for role in Role::ALL {
            assert!(table.has_role(role, &owner));
        }
        assert!(!table.has_role(Role::Admin, &Address::new("ALICE")));
    }

    #[test]
    fn test_grant_and_revoke() {
        let mut table = RoleTable::new();
        let oracle = Address::new("ORACLE");
        table.grant(Role::Settler, &oracle);
        assert!(table.has_role(Role::Settler, &oracle));
        assert!(!table.has_role(Role::Admin, &oracle));
        table.revoke(Role::Settler, &oracle);
        assert!(table.roles_of(&oracle).is_empty());
    }
}
