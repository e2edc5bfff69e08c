//! Match ledgers
//!
//! - `core` - parameters, guards, admin setters and the event log shared by both models
//! - `parimutuel` - pooled wagers, fee taken at settlement
//! - `fixed_odds` + `liability` - house-underwritten wagers under an exposure cap
//! - `claims` - payout formulas
//! - `settlement` - `MatchBook`, the single entry point used by the service

pub mod claims;
pub mod core;
pub mod events;
pub mod fixed_odds;
pub mod liability;
pub mod parimutuel;
pub mod settlement;
pub mod state;

pub use self::core::{
    BetReceipt, CallEnv, MatchCore, MatchParams, StakeMinimum, MAX_FEE_BPS, MAX_OUTCOMES, MIN_OUTCOMES,
};
pub use events::{EventKind, LedgerEvent};
pub use fixed_odds::{FixedOddsMatch, FixedOddsSettlement, FixedWager};
pub use liability::{FixedOddsParams, LiabilityBook, MAX_ODDS, MIN_ODDS};
pub use parimutuel::{ParimutuelMatch, ParimutuelSettlement, Position};
pub use settlement::{MatchBook, MatchSummary, ParticipantView, SettlementFact, SettlementModel};
pub use state::MatchState;
