// Account, role and price feed routes
//
// Deposits are a development faucet on the in-memory stake asset; approvals
// always name a match so the spender is that match's escrow.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::app_state::SharedState;
use crate::error::{ServiceError, WagerError};
use crate::handlers::ApiResult;
use crate::models::{ApproveRequest, DepositRequest, GrantRoleRequest, LimitQuery, PushPriceRequest};
use crate::types::{unix_now, Address};

// ===== BALANCES =====

/// GET /balance/:account
pub async fn get_balance(State(state): State<SharedState>, Path(account): Path<String>) -> Json<Value> {
    let balance = state.balance_of(&Address::new(account.clone()));
    Json(json!({ "account": account, "balance": balance }))
}

/// POST /deposit
pub async fn deposit(State(state): State<SharedState>, Json(req): Json<DepositRequest>) -> ApiResult {
    if req.amount == 0 {
        return Err(WagerError::ZeroAmount.into());
    }
    let account = Address::new(req.account);
    let balance = state.deposit(&account, req.amount);
    Ok(Json(json!({ "success": true, "account": account, "balance": balance })))
}

/// POST /approve
/// Sets (not adds to) the allowance of the match escrow over `owner`'s funds
pub async fn approve(State(state): State<SharedState>, Json(req): Json<ApproveRequest>) -> ApiResult {
    let escrow = state.read_match(&req.match_id, |book| book.core().escrow.clone())?;
    let owner = Address::new(req.owner);
    state.approve(&owner, &escrow, req.amount);
    info!(owner = %owner, escrow = %escrow, amount = %req.amount, "allowance set");
    Ok(Json(json!({
        "success": true,
        "owner": owner,
        "spender": escrow,
        "allowance": state.allowance(&owner, &escrow),
    })))
}

/// GET /transactions/:account
pub async fn get_transactions(State(state): State<SharedState>, Path(account): Path<String>) -> Json<Value> {
    let transactions = state.transactions_of(&Address::new(account.clone()));
    Json(json!({ "account": account, "count": transactions.len(), "transactions": transactions }))
}

/// GET /ledger?limit=N
pub async fn get_ledger_activity(State(state): State<SharedState>, Query(query): Query<LimitQuery>) -> Json<Value> {
    let limit = query.limit.unwrap_or(100);
    Json(json!({
        "activity": state.recent_activity(limit),
        "transactions": state.recent_transactions(limit),
    }))
}

// ===== ROLES =====

/// POST /roles
pub async fn grant_role(State(state): State<SharedState>, Json(req): Json<GrantRoleRequest>) -> ApiResult {
    let account = Address::new(req.account);
    state.grant_role(&Address::new(req.caller), req.role, &account)?;
    Ok(Json(json!({ "success": true, "account": account, "roles": state.roles_of(&account) })))
}

/// GET /roles/:account
pub async fn get_roles(State(state): State<SharedState>, Path(account): Path<String>) -> Json<Value> {
    let roles = state.roles_of(&Address::new(account.clone()));
    Json(json!({ "account": account, "roles": roles }))
}

// ===== PRICE FEED =====

/// POST /oracle/price
pub async fn push_price(State(state): State<SharedState>, Json(req): Json<PushPriceRequest>) -> ApiResult {
    if req.answer <= 0 {
        return Err(ServiceError::InvalidRequest("price must be positive".into()).into());
    }
    let round = state.push_price(&Address::new(req.caller), req.answer as i128, unix_now())?;
    Ok(Json(json!({ "success": true, "round": round })))
}

/// GET /oracle/quote
pub async fn get_quote(State(state): State<SharedState>) -> ApiResult {
    let quote = state.quote(unix_now())?;
    Ok(Json(json!({ "success": true, "quote": quote })))
}
