/// BlackBook Wager Ledger
/// Pari-mutuel and fixed-odds sports wagering with escrowed stakes

pub mod access;
pub mod app_state;
pub mod asset;
pub mod config;
pub mod error;
pub mod handlers;
pub mod market;
pub mod models;
pub mod oracle;
pub mod routes;
pub mod types;

pub use access::{AccessControl, Role, RoleTable};
pub use app_state::{AppState, SharedState};
pub use asset::{InMemoryAsset, StakeAsset, Transaction};
pub use config::{odds_from_decimal, odds_to_decimal, LedgerConfig};
pub use error::{ConfigError, ErrorKind, ServiceError, ServiceResult, WagerError, WagerResult};
pub use market::{
    BetReceipt, CallEnv, EventKind, FixedOddsMatch, FixedOddsParams, FixedOddsSettlement, FixedWager,
    LedgerEvent, LiabilityBook, MatchBook, MatchCore, MatchParams, MatchState, MatchSummary,
    ParimutuelMatch, ParimutuelSettlement, ParticipantView, Position, SettlementFact, SettlementModel,
    StakeMinimum, MAX_ODDS, MIN_ODDS,
};
pub use oracle::{ManualPriceFeed, OracleSettings, PriceConverter, PriceFeed, Quote, RoundData, StaticPriceFeed};
pub use routes::router;
pub use types::{unix_now, Address, ODDS_SCALE};
