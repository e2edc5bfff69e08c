// Routes module - organizes all HTTP endpoints
// Match endpoints live in `handlers`, account and feed endpoints in `accounts`

pub mod accounts;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::app_state::SharedState;
use crate::handlers::*;
use accounts::*;

pub fn router(state: SharedState) -> Router {
    Router::new()
        // ===== MATCH ENDPOINTS =====
        .route("/matches", get(list_matches).post(create_match))
        .route("/matches/:id", get(get_match))
        .route("/matches/:id/events", get(get_events))
        .route("/matches/:id/participants/:address", get(get_participant))
        .route("/matches/:id/payout/:address", get(get_pending_payout))
        .route("/matches/:id/wagers/:wager_id", get(get_wager))

        // ===== BETTING ENDPOINTS =====
        .route("/matches/:id/bet", post(place_bet))
        .route("/matches/:id/bet/:side", post(place_side_bet))
        .route("/matches/:id/odds", post(set_odds))

        // ===== SETTLEMENT ENDPOINTS =====
        .route("/matches/:id/settle", post(settle))
        .route("/matches/:id/claim", post(claim))
        .route("/matches/:id/cancel", post(cancel))
        .route("/matches/:id/refund", post(refund))
        .route("/matches/:id/sweep", post(sweep))
        .route("/matches/:id/surplus", post(withdraw_surplus))
        .route("/matches/:id/fund", post(fund_shortfall))

        // ===== ADMIN ENDPOINTS =====
        .route("/matches/:id/pause", post(pause))
        .route("/matches/:id/unpause", post(unpause))
        .route("/matches/:id/cutoff", post(set_cutoff))
        .route("/matches/:id/treasury", post(set_treasury))
        .route("/matches/:id/fee", post(set_fee))
        .route("/roles", post(grant_role))
        .route("/roles/:account", get(get_roles))

        // ===== LEDGER ENDPOINTS =====
        .route("/balance/:account", get(get_balance))
        .route("/deposit", post(deposit))
        .route("/approve", post(approve))
        .route("/transactions/:account", get(get_transactions))
        .route("/ledger", get(get_ledger_activity))

        // ===== PRICE FEED =====
        .route("/oracle/price", post(push_price))
        .route("/oracle/quote", get(get_quote))

        // ===== HEALTH CHECK =====
        .route("/", get(health_check))
        .route("/health", get(health_check))

        // Apply CORS and state
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
