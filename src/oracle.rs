// ============================================================================
// Oracle - Price Quotes & Stable-Value Conversion
// ============================================================================
//
// Consumes a round-based price feed and converts stake amounts between the
// native unit and a stable-value unit using integer fixed-point math only.
//
//   PriceFeed trait → Quote validation (round, sign, freshness)
//   → PriceConverter::{to_stable_value, to_native_value, meets_minimum}
//
// A quote that fails validation is never substituted with older data: every
// price-dependent operation fails until a fresh round arrives.
// ============================================================================

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::warn;

use crate::error::{WagerError, WagerResult};

/// Default freshness window (1 hour)
pub const DEFAULT_MAX_QUOTE_AGE_SECS: u64 = 3600;

/// Default decimals of the native stake unit
pub const DEFAULT_NATIVE_DECIMALS: u8 = 18;

/// Default decimals of the stable-value unit
pub const DEFAULT_STABLE_DECIMALS: u8 = 8;

// ============================================================================
// FEED TYPES
// ============================================================================

/// One reporting round as published by the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundData {
    pub round_id: u128,
    pub answer: i128,
    pub started_at: u64,
    pub updated_at: u64,
    pub answered_in_round: u128,
}

/// Trait for price sources
pub trait PriceFeed: Send + Sync {
    /// Latest round, or None if the feed has never reported
    fn latest_round_data(&self) -> Option<RoundData>;

    /// Decimals of `answer`
    fn decimals(&self) -> u8;

    fn description(&self) -> &str {
        "price feed"
    }
}

/// A validated quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub round_id: u128,
    pub price: u128,
    pub decimals: u8,
    pub updated_at: u64,
}

// ============================================================================
// FEED IMPLEMENTATIONS
// ============================================================================

/// Feed that always reports the same round
#[derive(Debug, Clone)]
pub struct StaticPriceFeed {
    round: RoundData,
    decimals: u8,
}

impl StaticPriceFeed {
    pub fn new(answer: i128, decimals: u8, updated_at: u64) -> Self {
        Self {
            round: RoundData {
                round_id: 1,
                answer,
                started_at: updated_at,
                updated_at,
                answered_in_round: 1,
            },
            decimals,
        }
    }

    pub fn from_round(round: RoundData, decimals: u8) -> Self {
        Self { round, decimals }
    }
}

impl PriceFeed for StaticPriceFeed {
    fn latest_round_data(&self) -> Option<RoundData> {
        Some(self.round)
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn description(&self) -> &str {
        "static"
    }
}

/// Push-updated feed; each `push` opens and answers a new round
#[derive(Debug)]
pub struct ManualPriceFeed {
    latest: RwLock<Option<RoundData>>,
    decimals: u8,
}

impl ManualPriceFeed {
    pub fn new(decimals: u8) -> Self {
        Self { latest: RwLock::new(None), decimals }
    }

    pub fn push(&self, answer: i128, updated_at: u64) -> RoundData {
        let mut guard = match self.latest.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let round_id = guard.map(|r| r.round_id + 1).unwrap_or(1);
        let round = RoundData {
            round_id,
            answer,
            started_at: updated_at,
            updated_at,
            answered_in_round: round_id,
        };
        *guard = Some(round);
        round
    }

    /// Reinstate a previously observed round (snapshot restore)
    pub fn restore(&self, round: RoundData) {
        let mut guard = match self.latest.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(round);
    }
}

impl PriceFeed for ManualPriceFeed {
    fn latest_round_data(&self) -> Option<RoundData> {
        match self.latest.read() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn description(&self) -> &str {
        "manual"
    }
}

// ============================================================================
// CONVERTER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    /// Maximum quote age in seconds
    pub max_age_secs: u64,
    /// Decimals of the native stake unit
    pub native_decimals: u8,
    /// Decimals of the stable-value unit
    pub stable_decimals: u8,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            max_age_secs: DEFAULT_MAX_QUOTE_AGE_SECS,
            native_decimals: DEFAULT_NATIVE_DECIMALS,
            stable_decimals: DEFAULT_STABLE_DECIMALS,
        }
    }
}

#[derive(Clone)]
pub struct PriceConverter {
    feed: Arc<dyn PriceFeed>,
    settings: OracleSettings,
}

impl std::fmt::Debug for PriceConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceConverter")
            .field("feed", &self.feed.description())
            .field("settings", &self.settings)
            .finish()
    }
}

impl PriceConverter {
    pub fn new(feed: Arc<dyn PriceFeed>, settings: OracleSettings) -> Self {
        Self { feed, settings }
    }

    pub fn settings(&self) -> &OracleSettings {
        &self.settings
    }

    /// Latest quote, validated for round consistency, sign and freshness
    pub fn get_quote(&self, now: u64) -> WagerResult<Quote> {
        let round = self
            .feed
            .latest_round_data()
            .ok_or_else(|| WagerError::InvalidQuote("feed has not reported".into()))?;

        if round.updated_at == 0 {
            return Err(WagerError::InvalidQuote(format!("round {} incomplete", round.round_id)));
        }
        if round.answered_in_round < round.round_id {
            return Err(WagerError::InvalidQuote(format!(
                "round {} answered in older round {}",
                round.round_id, round.answered_in_round
            )));
        }
        if round.answer <= 0 {
            return Err(WagerError::NonPositiveQuote(round.answer));
        }

        if round.updated_at > now {
            return Err(WagerError::InvalidQuote(format!(
                "round {} dated {}s in the future",
                round.round_id,
                round.updated_at - now
            )));
        }

        let age = now - round.updated_at;
        if age > self.settings.max_age_secs {
            warn!(age, max_age = self.settings.max_age_secs, "rejecting stale quote");
            return Err(WagerError::StaleQuote { age, max_age: self.settings.max_age_secs });
        }

        Ok(Quote {
            round_id: round.round_id,
            price: round.answer as u128,
            decimals: self.feed.decimals(),
            updated_at: round.updated_at,
        })
    }

    /// Native amount → stable value
    pub fn to_stable_value(&self, amount: u128, now: u64) -> WagerResult<u128> {
        let quote = self.get_quote(now)?;
        native_to_stable(amount, &quote, &self.settings)
    }

    /// Stable value → native amount
    pub fn to_native_value(&self, stable_amount: u128, now: u64) -> WagerResult<u128> {
        let quote = self.get_quote(now)?;
        stable_to_native(stable_amount, &quote, &self.settings)
    }

    pub fn meets_minimum(&self, amount: u128, min_stable_value: u128, now: u64) -> WagerResult<bool> {
        Ok(self.to_stable_value(amount, now)? >= min_stable_value)
    }
}

// ============================================================================
// FIXED-POINT HELPERS
// ============================================================================

fn pow10(exp: u32) -> WagerResult<u128> {
    10u128.checked_pow(exp).ok_or(WagerError::Overflow("decimal scale"))
}

/// value = amount · price · 10^stable / 10^(native + feed)
pub fn native_to_stable(amount: u128, quote: &Quote, settings: &OracleSettings) -> WagerResult<u128> {
    let product = amount
        .checked_mul(quote.price)
        .ok_or(WagerError::Overflow("amount * price"))?;
    let exp = settings.stable_decimals as i32 - settings.native_decimals as i32 - quote.decimals as i32;
    if exp >= 0 {
        product
            .checked_mul(pow10(exp as u32)?)
            .ok_or(WagerError::Overflow("stable scale"))
    } else {
        Ok(product / pow10((-exp) as u32)?)
    }
}

/// amount = value · 10^(native + feed) / (10^stable · price)
pub fn stable_to_native(value: u128, quote: &Quote, settings: &OracleSettings) -> WagerResult<u128> {
    let exp = settings.native_decimals as i32 + quote.decimals as i32 - settings.stable_decimals as i32;
    if exp >= 0 {
        let scaled = value
            .checked_mul(pow10(exp as u32)?)
            .ok_or(WagerError::Overflow("native scale"))?;
        Ok(scaled / quote.price)
    } else {
        let denominator = quote
            .price
            .checked_mul(pow10((-exp) as u32)?)
            .ok_or(WagerError::Overflow("price scale"))?;
        Ok(value / denominator)
    }
}
