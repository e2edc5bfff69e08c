// Observable facts emitted by mutating match operations.

use serde::{Deserialize, Serialize};

use crate::types::Address;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Initialized {
        outcomes_count: u8,
        cutoff: u64,
        fee_bps: u16,
    },
    BetPlaced {
        bettor: Address,
        outcome: u8,
        amount: u128,
        /// Fixed-odds only
        wager_id: Option<u64>,
        locked_odds: Option<u32>,
    },
    OddsAdjusted {
        outcome: u8,
        old_odds: u32,
        new_odds: u32,
    },
    Settled {
        winning_outcome: u8,
        total_pool: u128,
        fee_amount: u128,
    },
    FixedOddsSettled {
        winning_outcome: u8,
        total_staked: u128,
        total_payouts_due: u128,
        house_pnl: i128,
    },
    Claimed {
        claimant: Address,
        amount: u128,
        /// Fee forwarded to the treasury alongside this claim
        fee_forwarded: u128,
    },
    Refunded {
        claimant: Address,
        amount: u128,
    },
    Cancelled {
        by: Address,
    },
    Swept {
        treasury: Address,
        amount: u128,
    },
    SurplusWithdrawn {
        treasury: Address,
        amount: u128,
    },
    ShortfallFunded {
        funder: Address,
        amount: u128,
    },
    CutoffUpdated {
        old_cutoff: u64,
        new_cutoff: u64,
    },
    TreasuryUpdated {
        old_treasury: Address,
        new_treasury: Address,
    },
    FeeUpdated {
        old_fee_bps: u16,
        new_fee_bps: u16,
    },
    Paused {
        by: Address,
    },
    Unpaused {
        by: Address,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Position in this match's log, starting at 1
    pub seq: u64,
    pub match_id: String,
    pub timestamp: u64,
    pub kind: EventKind,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Initialized { .. } => "initialized",
            EventKind::BetPlaced { .. } => "bet_placed",
            EventKind::OddsAdjusted { .. } => "odds_adjusted",
            EventKind::Settled { .. } => "settled",
            EventKind::FixedOddsSettled { .. } => "fixed_odds_settled",
            EventKind::Claimed { .. } => "claimed",
            EventKind::Refunded { .. } => "refunded",
            EventKind::Cancelled { .. } => "cancelled",
            EventKind::Swept { .. } => "swept",
            EventKind::SurplusWithdrawn { .. } => "surplus_withdrawn",
            EventKind::ShortfallFunded { .. } => "shortfall_funded",
            EventKind::CutoffUpdated { .. } => "cutoff_updated",
            EventKind::TreasuryUpdated { .. } => "treasury_updated",
            EventKind::FeeUpdated { .. } => "fee_updated",
            EventKind::Paused { .. } => "paused",
            EventKind::Unpaused { .. } => "unpaused",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_tagged() {
        let event = LedgerEvent {
            seq: 3,
            match_id: "m1".into(),
            timestamp: 100,
            kind: EventKind::Claimed { claimant: Address::new("ALICE"), amount: 980, fee_forwarded: 20 },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"]["claimed"]["claimant"], "ALICE");
        assert_eq!(json["kind"]["claimed"]["amount"], 980);
        assert_eq!(json["seq"], 3);
        assert_eq!(event.kind.name(), "claimed");
    }
}
