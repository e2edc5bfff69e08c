use serde::{Deserialize, Serialize};
use std::fmt;

/// Match lifecycle
///
/// Flow: Created → Open → Settled
///                    ↓
///                 Cancelled
///
/// Both terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchState {
    /// Instance exists but `initialize` has not run
    /// - Nothing but `initialize` is valid
    #[default]
    Created,

    /// Parameters fixed, wagers accepted until the cutoff
    /// - Admin setters, odds changes and cancellation allowed
    Open,

    /// Winning outcome recorded
    /// - Claims (and sweeps) only
    Settled,

    /// Match called off by an admin
    /// - Refunds of principal only
    Cancelled,
}

impl MatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchState::Settled | MatchState::Cancelled)
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self, MatchState::Created)
    }

    pub fn can_transition_to(&self, next: MatchState) -> bool {
        matches!(
            (self, next),
            (MatchState::Created, MatchState::Open)
                | (MatchState::Open, MatchState::Settled)
                | (MatchState::Open, MatchState::Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchState::Created => "created",
            MatchState::Open => "open",
            MatchState::Settled => "settled",
            MatchState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
