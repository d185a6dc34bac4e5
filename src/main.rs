use affiliate_ledger::{
    api, config::Config, db::init_db, CommissionLedger, OutboxProcessor, Repository,
    WithdrawalLedger,
};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let commission_ledger = CommissionLedger::new(repo.clone());
    let withdrawal_ledger = WithdrawalLedger::new(repo.clone());
    let outbox = Arc::new(OutboxProcessor::new(
        repo.clone(),
        commission_ledger,
        config.outbox_poll_interval_ms,
        config.outbox_max_attempts,
    ));
    tokio::spawn(outbox.clone().run());

    // Create router
    let app = api::create_router(api::AppState::new(repo, withdrawal_ledger, outbox));

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
