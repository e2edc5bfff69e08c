// BlackBook Wager Ledger - Main Entry Point

use blackbook_wager_ledger::{router, AppState, LedgerConfig, SharedState};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = match LedgerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    config.logging.init();

    info!("═══════════════════════════════════════════════");
    info!("     🎲 BlackBook Wager Ledger");
    info!("═══════════════════════════════════════════════");

    let bind = config.server.bind.clone();
    let persist = config.storage.persist;

    // Initialize application state
    let state: SharedState = AppState::load_or_new(config).shared();

    // Clone state for shutdown handler before moving into router
    let shutdown_state = state.clone();

    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(bind = %bind, error = %e, "❌ failed to bind");
            std::process::exit(1);
        }
    };

    info!(bind = %bind, "🚀 server running");
    warn!("⚠️  development service: callers are named in request bodies and are NOT authenticated");
    warn!("⚠️  anyone who can reach this address can act as any account, admin included");
    info!("📋 GET  /matches                    - List matches");
    info!("📋 POST /matches                    - Create a parimutuel or fixed-odds match");
    info!("📋 POST /matches/:id/bet            - Place a wager");
    info!("📋 POST /matches/:id/settle         - Declare the winning outcome");
    info!("📋 POST /matches/:id/claim          - Collect winnings");
    info!("📋 POST /matches/:id/refund         - Refund a cancelled match");
    info!("📋 GET  /balance/:account           - Stake asset balance");

    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
        info!("🛑 shutdown signal received");
        if persist {
            info!("💾 saving state to disk...");
            match shutdown_state.save_to_disk() {
                Ok(()) => info!("✅ state saved"),
                Err(e) => error!(error = %e, "❌ failed to save state"),
            }
        }
        info!("👋 goodbye");
    };

    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }
}
