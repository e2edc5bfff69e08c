/// Integration tests driving the HTTP API with Alice, Bob and Carol
///
/// The router runs in-process through `tower::ServiceExt::oneshot`; no port is bound.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use blackbook_wager_ledger::{router, unix_now, AppState, LedgerConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

// ============================================================================
// TEST ACCOUNT CONSTANTS
// ============================================================================

const ADMIN: &str = "ADMIN";
const ALICE: &str = "L1ALICE000000001";
const BOB: &str = "L1BOB00000000001";
const CAROL: &str = "L1CAROL00000001";
const TREASURY: &str = "TREASURY";

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn app() -> Router {
    let mut config = LedgerConfig::default();
    config.storage.persist = false;
    router(AppState::new(config).shared())
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    call(app, "POST", uri, Some(body)).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    call(app, "GET", uri, None).await
}

/// Deposit and approve the match escrow for `amount`
async fn fund(app: &Router, match_id: &str, account: &str, amount: u64) {
    let (status, _) = post(app, "/deposit", json!({ "account": account, "amount": amount })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = post(
        app,
        "/approve",
        json!({ "owner": account, "match_id": match_id, "amount": amount }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowance"], amount);
}

async fn create_parimutuel(app: &Router, match_id: &str) {
    let (status, body) = post(
        app,
        "/matches",
        json!({
            "caller": ADMIN,
            "match_id": match_id,
            "model": "parimutuel",
            "cutoff": unix_now() + 3_600,
            "outcomes_count": 3,
            "fee_bps": 200,
            "treasury": TREASURY,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

async fn balance(app: &Router, account: &str) -> Value {
    let (_, body) = get(app, &format!("/balance/{account}")).await;
    body["balance"].clone()
}

// ============================================================================
// HEALTH
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = app();
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["matches"], 0);
}

// ============================================================================
// PARI-MUTUEL
// ============================================================================

#[tokio::test]
async fn test_parimutuel_match_flow() {
    let app = app();
    create_parimutuel(&app, "epl_ars_che").await;
    for who in [ALICE, BOB, CAROL] {
        fund(&app, "epl_ars_che", who, 1_000).await;
    }

    let (status, body) = post(&app, "/matches/epl_ars_che/bet/home", json!({ "bettor": ALICE, "amount": 500 })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["receipt"]["outcome"], 0);
    post(&app, "/matches/epl_ars_che/bet/draw", json!({ "bettor": BOB, "amount": 300 })).await;
    post(&app, "/matches/epl_ars_che/bet", json!({ "bettor": CAROL, "outcome": 2, "amount": 200 })).await;

    let (_, body) = get(&app, "/matches/epl_ars_che").await;
    assert_eq!(body["match"]["total_pool"], 1_000);
    assert_eq!(body["match"]["pools"], json!([500, 300, 200]));

    let (status, body) = post(&app, "/matches/epl_ars_che/settle", json!({ "caller": ADMIN, "winning_outcome": 0 })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["settlement"]["parimutuel"]["fee_amount"], 20);

    let (_, body) = get(&app, &format!("/matches/epl_ars_che/participants/{ALICE}")).await;
    assert_eq!(body["participant"]["pending_payout"], 980);

    let (status, body) = post(&app, "/matches/epl_ars_che/claim", json!({ "caller": ALICE })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["payout"], 980);
    assert_eq!(balance(&app, ALICE).await, 1_480);
    assert_eq!(balance(&app, TREASURY).await, 20);

    // second claim and losing claim
    let (status, _) = post(&app, "/matches/epl_ars_che/claim", json!({ "caller": ALICE })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, body) = post(&app, "/matches/epl_ars_che/claim", json!({ "caller": BOB })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "liquidity");

    let (_, body) = get(&app, "/matches/epl_ars_che/events").await;
    assert!(body["events"].as_array().unwrap().len() >= 6);
}

#[tokio::test]
async fn test_bet_without_allowance_leaves_no_trace() {
    let app = app();
    create_parimutuel(&app, "nba_lal_bos").await;
    post(&app, "/deposit", json!({ "account": BOB, "amount": 1_000 })).await;

    let (status, body) = post(&app, "/matches/nba_lal_bos/bet", json!({ "bettor": BOB, "outcome": 1, "amount": 100 })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY, "{body}");
    assert_eq!(body["kind"], "transfer");
    assert_eq!(balance(&app, BOB).await, 1_000);

    let (_, body) = get(&app, "/matches/nba_lal_bos").await;
    assert_eq!(body["match"]["total_pool"], 0);
    assert_eq!(body["match"]["bets_placed"], 0);
}

#[tokio::test]
async fn test_cancel_and_refund() {
    let app = app();
    create_parimutuel(&app, "ucl_rma_bay").await;
    fund(&app, "ucl_rma_bay", ALICE, 400).await;
    post(&app, "/matches/ucl_rma_bay/bet/away", json!({ "bettor": ALICE, "amount": 400 })).await;
    assert_eq!(balance(&app, ALICE).await, 0);

    let (status, _) = post(&app, "/matches/ucl_rma_bay/cancel", json!({ "caller": BOB })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = post(&app, "/matches/ucl_rma_bay/cancel", json!({ "caller": ADMIN })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(&app, "/matches/ucl_rma_bay/refund", json!({ "caller": ALICE })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["amount"], 400);
    assert_eq!(balance(&app, ALICE).await, 400);

    let (status, _) = post(&app, "/matches/ucl_rma_bay/refund", json!({ "caller": ALICE })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// ============================================================================
// FIXED ODDS
// ============================================================================

#[tokio::test]
async fn test_fixed_odds_shortfall_flow() {
    let app = app();
    let (status, body) = post(
        &app,
        "/matches",
        json!({
            "caller": ADMIN,
            "match_id": "nfl_kc_phi",
            "model": "fixed_odds",
            "cutoff": unix_now() + 3_600,
            "outcomes_count": 2,
            "odds": ["3.0", "1.5"],
            "max_liability": 10_000,
            "max_bet_amount": 1_000,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["match"]["odds"], json!([30_000, 15_000]));

    fund(&app, "nfl_kc_phi", ALICE, 100).await;
    let (status, body) = post(&app, "/matches/nfl_kc_phi/bet", json!({ "bettor": ALICE, "outcome": 0, "amount": 100 })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["receipt"]["locked_odds"], 30_000);
    assert_eq!(body["receipt"]["potential_payout"], 300);

    // later odds changes do not touch the locked wager
    let (status, body) = post(&app, "/matches/nfl_kc_phi/odds", json!({ "caller": ADMIN, "outcome": 0, "odds": "2.5" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (_, body) = get(&app, "/matches/nfl_kc_phi/wagers/1").await;
    assert_eq!(body["wager"]["locked_odds"], 30_000);
    assert_eq!(body["wager"]["payout"], 300);

    post(&app, "/matches/nfl_kc_phi/settle", json!({ "caller": ADMIN, "winning_outcome": 0 })).await;

    // escrow holds 100 against 300 owed
    let (status, body) = post(&app, "/matches/nfl_kc_phi/claim", json!({ "caller": ALICE })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(body["retryable"], true);

    fund(&app, "nfl_kc_phi", ADMIN, 200).await;
    let (status, body) = post(&app, "/matches/nfl_kc_phi/fund", json!({ "caller": ADMIN, "amount": 200 })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["escrow_balance"], 300);

    let (status, body) = post(&app, "/matches/nfl_kc_phi/claim", json!({ "caller": ALICE })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["payout"], 300);
    assert_eq!(balance(&app, ALICE).await, 300);

    let (status, body) = post(&app, "/matches/nfl_kc_phi/claim", json!({ "caller": ALICE })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(body["error"], "nothing to claim");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_model_specific_endpoints_rejected() {
    let app = app();
    create_parimutuel(&app, "mlb_nyy_bos").await;
    let (status, body) = post(&app, "/matches/mlb_nyy_bos/odds", json!({ "caller": ADMIN, "outcome": 0, "odds": "2.0" })).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    let (status, _) = get(&app, "/matches/mlb_nyy_bos/wagers/1").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// ============================================================================
// REQUEST VALIDATION
// ============================================================================

#[tokio::test]
async fn test_create_match_validation() {
    let app = app();
    let cutoff = unix_now() + 3_600;

    let (status, _) = post(
        &app,
        "/matches",
        json!({ "caller": ALICE, "match_id": "m1", "model": "parimutuel", "cutoff": cutoff, "outcomes_count": 2 }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post(
        &app,
        "/matches",
        json!({ "caller": ADMIN, "match_id": "m1", "model": "fixed_odds", "cutoff": cutoff, "outcomes_count": 2 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, _) = post(
        &app,
        "/matches",
        json!({ "caller": ADMIN, "match_id": "m1", "model": "fixed_odds", "cutoff": cutoff,
                "outcomes_count": 2, "odds": ["0.5", "2.0"] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    create_parimutuel(&app, "m1").await;
    let (status, _) = post(
        &app,
        "/matches",
        json!({ "caller": ADMIN, "match_id": "m1", "model": "parimutuel", "cutoff": cutoff, "outcomes_count": 2 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = get(&app, "/matches/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_granted_settler_can_settle() {
    let app = app();
    create_parimutuel(&app, "nhl_tor_mtl").await;

    let (status, _) = post(&app, "/matches/nhl_tor_mtl/settle", json!({ "caller": CAROL, "winning_outcome": 1 })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post(&app, "/roles", json!({ "caller": ADMIN, "role": "settler", "account": CAROL })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["roles"], json!(["settler"]));

    let (status, body) = post(&app, "/matches/nhl_tor_mtl/settle", json!({ "caller": CAROL, "winning_outcome": 1 })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["settlement"]["parimutuel"]["winning_outcome"], 1);
}

#[tokio::test]
async fn test_price_feed_round_trip() {
    let app = app();
    let (status, _) = get(&app, "/oracle/quote").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = post(&app, "/oracle/price", json!({ "caller": BOB, "answer": 300_000_000_000i64 })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post(&app, "/oracle/price", json!({ "caller": ADMIN, "answer": 300_000_000_000i64 })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, body) = get(&app, "/oracle/quote").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quote"]["price"], 300_000_000_000i64);
}
