// HTTP request handlers for the wager ledger API
//
// Handlers are thin: parse the body, hand one closure to `AppState::execute`,
// shape the JSON. No lock is held across an await point.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::app_state::SharedState;
use crate::config::{odds_from_decimal, odds_to_decimal};
use crate::error::{ErrorKind, ServiceError, WagerError};
use crate::market::core::{OUTCOME_AWAY, OUTCOME_DRAW, OUTCOME_HOME};
use crate::market::{FixedOddsParams, MatchParams, SettlementModel, StakeMinimum};
use crate::models::*;
use crate::types::{unix_now, Address};

// ===== ERRORS =====

/// Error half of every handler result
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

impl From<WagerError> for ApiError {
    fn from(err: WagerError) -> Self {
        ApiError(ServiceError::Wager(err))
    }
}

pub fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::MatchNotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::MatchExists(_) => StatusCode::CONFLICT,
        ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ServiceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ServiceError::Wager(WagerError::Unauthorized { .. }) => StatusCode::FORBIDDEN,
        ServiceError::Wager(e) => match e.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::State => StatusCode::CONFLICT,
            ErrorKind::Liquidity => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Transfer => StatusCode::BAD_GATEWAY,
            ErrorKind::Oracle => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Math => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let mut body = json!({
            "success": false,
            "error": self.0.to_string(),
        });
        if let ServiceError::Wager(e) = &self.0 {
            body["kind"] = json!(e.kind());
            body["retryable"] = json!(e.is_retryable());
        }
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self.0, "request failed");
        }
        (status, Json(body)).into_response()
    }
}

pub type ApiResult = Result<Json<Value>, ApiError>;

// ===== MATCH ENDPOINTS =====

pub async fn list_matches(State(state): State<SharedState>) -> Json<Value> {
    let matches = state.summaries();
    Json(json!({ "success": true, "count": matches.len(), "matches": matches }))
}

pub async fn create_match(
    State(state): State<SharedState>,
    Json(req): Json<CreateMatchRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let caller = Address::new(req.caller);
    state.require_admin(&caller)?;

    let defaults = &state.config.defaults;
    let params = MatchParams {
        match_id: req.match_id,
        owner: req.owner.map(Address::new).unwrap_or_else(|| caller.clone()),
        cutoff: req.cutoff,
        fee_bps: req.fee_bps.unwrap_or(defaults.fee_bps),
        treasury: Address::new(req.treasury.unwrap_or_else(|| defaults.treasury.clone())),
        outcomes_count: req.outcomes_count,
        min_stake: req.min_stake.unwrap_or(StakeMinimum::Units(defaults.min_stake as u128)),
    };

    let fixed = match (req.model, req.odds) {
        (SettlementModel::FixedOdds, Some(odds)) => Some(FixedOddsParams {
            initial_odds: odds.into_iter().map(odds_from_decimal).collect::<Result<_, _>>()?,
            max_liability: req.max_liability.unwrap_or(defaults.max_liability as u128),
            max_bet_amount: req.max_bet_amount.unwrap_or(defaults.max_bet_amount as u128),
        }),
        (SettlementModel::FixedOdds, None) => {
            return Err(ServiceError::InvalidRequest("fixed-odds match needs `odds`".into()).into())
        }
        (SettlementModel::Parimutuel, Some(_)) => {
            return Err(ServiceError::InvalidRequest("parimutuel match takes no `odds`".into()).into())
        }
        (SettlementModel::Parimutuel, None) => None,
    };

    let summary = state.create_match(req.model, params, fixed, unix_now())?;
    info!(match_id = %summary.match_id, model = %summary.model, "match created");
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "match": summary }))))
}

pub async fn get_match(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult {
    let summary = state.read_match(&id, |book| book.summary())?;
    let odds = summary
        .odds
        .as_ref()
        .map(|odds| odds.iter().map(|o| odds_to_decimal(*o)).collect::<Vec<_>>());
    Ok(Json(json!({ "success": true, "match": summary, "decimal_odds": odds })))
}

pub async fn get_events(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult {
    let events = state.read_match(&id, |book| book.events().to_vec())?;
    Ok(Json(json!({ "success": true, "match_id": id, "events": events })))
}

pub async fn get_participant(
    State(state): State<SharedState>,
    Path((id, address)): Path<(String, String)>,
) -> ApiResult {
    let user = Address::new(address);
    let view = state.read_match(&id, |book| book.participant(&user))?;
    Ok(Json(json!({ "success": true, "match_id": id, "participant": view })))
}

pub async fn get_pending_payout(
    State(state): State<SharedState>,
    Path((id, address)): Path<(String, String)>,
) -> ApiResult {
    let user = Address::new(address);
    let pending = state.read_match(&id, |book| book.pending_payout(&user))?;
    Ok(Json(json!({ "success": true, "match_id": id, "account": user, "pending_payout": pending })))
}

pub async fn get_wager(
    State(state): State<SharedState>,
    Path((id, wager_id)): Path<(String, u64)>,
) -> ApiResult {
    let wager = state.read_match(&id, |book| book.wager(wager_id))??;
    Ok(Json(json!({ "success": true, "match_id": id, "wager": wager })))
}

pub async fn place_bet(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<BetRequest>,
) -> ApiResult {
    bet(&state, &id, req.bettor, req.outcome, req.amount)
}

/// `/matches/:id/bet/:side` for three-way matches
pub async fn place_side_bet(
    State(state): State<SharedState>,
    Path((id, side)): Path<(String, String)>,
    Json(req): Json<SideBetRequest>,
) -> ApiResult {
    let outcome = match side.as_str() {
        "home" => OUTCOME_HOME,
        "draw" => OUTCOME_DRAW,
        "away" => OUTCOME_AWAY,
        other => return Err(ServiceError::InvalidRequest(format!("unknown side {other}")).into()),
    };
    bet(&state, &id, req.bettor, outcome, req.amount)
}

fn bet(state: &SharedState, id: &str, bettor: String, outcome: u8, amount: u128) -> ApiResult {
    let bettor = Address::new(bettor);
    let receipt = state.execute(id, &bettor, unix_now(), |book, env| book.place_bet(env, outcome, amount))?;
    state.log_activity(
        "🎲",
        "BET_PLACED",
        &format!("{} | {} staked {} on outcome {}", id, bettor.short(), amount, outcome),
    );
    Ok(Json(json!({ "success": true, "receipt": receipt })))
}

pub async fn set_odds(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<SetOddsRequest>,
) -> ApiResult {
    let new_odds = odds_from_decimal(req.odds)?;
    let caller = Address::new(req.caller);
    let old_odds =
        state.execute(&id, &caller, unix_now(), |book, env| book.set_odds(env, req.outcome, new_odds))?;
    Ok(Json(json!({
        "success": true,
        "outcome": req.outcome,
        "old_odds": odds_to_decimal(old_odds),
        "new_odds": odds_to_decimal(new_odds),
    })))
}

pub async fn settle(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<SettleRequest>,
) -> ApiResult {
    let caller = Address::new(req.caller);
    let fact = state.execute(&id, &caller, unix_now(), |book, env| book.settle(env, req.winning_outcome))?;
    state.log_activity("🏁", "MATCH_SETTLED", &format!("{} | winner {}", id, req.winning_outcome));
    Ok(Json(json!({ "success": true, "settlement": fact })))
}

pub async fn claim(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<CallerRequest>,
) -> ApiResult {
    let caller = Address::new(req.caller);
    let payout = state.execute(&id, &caller, unix_now(), |book, env| book.claim(env))?;
    state.log_activity("💸", "CLAIMED", &format!("{} | {} received {}", id, caller.short(), payout));
    Ok(Json(json!({ "success": true, "claimant": caller, "payout": payout })))
}

pub async fn cancel(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<CallerRequest>,
) -> ApiResult {
    let caller = Address::new(req.caller);
    state.execute(&id, &caller, unix_now(), |book, env| book.cancel_market(env))?;
    state.log_activity("🚫", "MATCH_CANCELLED", &id);
    Ok(Json(json!({ "success": true, "match_id": id, "state": "cancelled" })))
}

pub async fn refund(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<CallerRequest>,
) -> ApiResult {
    let caller = Address::new(req.caller);
    let amount = state.execute(&id, &caller, unix_now(), |book, env| book.refund(env))?;
    state.log_activity("↩️", "REFUNDED", &format!("{} | {} refunded {}", id, caller.short(), amount));
    Ok(Json(json!({ "success": true, "claimant": caller, "amount": amount })))
}

pub async fn sweep(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<CallerRequest>,
) -> ApiResult {
    let caller = Address::new(req.caller);
    let amount = state.execute(&id, &caller, unix_now(), |book, env| book.sweep_if_no_winners(env))?;
    state.log_activity("🧹", "SWEPT", &format!("{} | {} to treasury", id, amount));
    Ok(Json(json!({ "success": true, "amount": amount })))
}

pub async fn withdraw_surplus(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<CallerRequest>,
) -> ApiResult {
    let caller = Address::new(req.caller);
    let amount = state.execute(&id, &caller, unix_now(), |book, env| book.withdraw_surplus(env))?;
    state.log_activity("🏦", "SURPLUS_WITHDRAWN", &format!("{} | {}", id, amount));
    Ok(Json(json!({ "success": true, "amount": amount })))
}

pub async fn fund_shortfall(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<FundRequest>,
) -> ApiResult {
    let caller = Address::new(req.caller);
    let balance = state.execute(&id, &caller, unix_now(), |book, env| book.fund_shortfall(env, req.amount))?;
    state.log_activity("🛟", "SHORTFALL_FUNDED", &format!("{} | +{} by {}", id, req.amount, caller.short()));
    Ok(Json(json!({ "success": true, "escrow_balance": balance })))
}

// ===== ADMIN SETTERS =====

pub async fn pause(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<CallerRequest>,
) -> ApiResult {
    let caller = Address::new(req.caller);
    state.execute(&id, &caller, unix_now(), |book, env| book.pause(env))?;
    Ok(Json(json!({ "success": true, "paused": true })))
}

pub async fn unpause(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<CallerRequest>,
) -> ApiResult {
    let caller = Address::new(req.caller);
    state.execute(&id, &caller, unix_now(), |book, env| book.unpause(env))?;
    Ok(Json(json!({ "success": true, "paused": false })))
}

pub async fn set_cutoff(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<CutoffRequest>,
) -> ApiResult {
    let caller = Address::new(req.caller);
    state.execute(&id, &caller, unix_now(), |book, env| book.set_cutoff(env, req.cutoff))?;
    Ok(Json(json!({ "success": true, "cutoff": req.cutoff })))
}

pub async fn set_treasury(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<TreasuryRequest>,
) -> ApiResult {
    let caller = Address::new(req.caller);
    let treasury = Address::new(req.treasury);
    state.execute(&id, &caller, unix_now(), |book, env| book.set_treasury(env, treasury.clone()))?;
    Ok(Json(json!({ "success": true, "treasury": treasury })))
}

pub async fn set_fee(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<FeeRequest>,
) -> ApiResult {
    let caller = Address::new(req.caller);
    state.execute(&id, &caller, unix_now(), |book, env| book.set_fee(env, req.fee_bps))?;
    Ok(Json(json!({ "success": true, "fee_bps": req.fee_bps })))
}

// ===== HEALTH CHECK =====

pub async fn health_check(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "BlackBook Wager Ledger",
        "matches": state.match_count(),
        "timestamp": unix_now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let status = |e: WagerError| status_for(&ServiceError::Wager(e));
        assert_eq!(status(WagerError::ZeroAmount), StatusCode::BAD_REQUEST);
        assert_eq!(status(WagerError::AlreadyClaimed), StatusCode::CONFLICT);
        assert_eq!(status(WagerError::NothingToClaim), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status(WagerError::MissingPriceFeed), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status(WagerError::Unauthorized { caller: "X".into(), role: "admin".into() }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_for(&ServiceError::MatchNotFound("m".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&ServiceError::MatchExists("m".into())), StatusCode::CONFLICT);
    }
}
