//! Wheelhouse - Reservation and settlement core for vehicle rentals

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wheelhouse::{
    config::Args,
    server,
    settlement::{HttpGateway, SettlementGateway, StubGateway},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("wheelhouse={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Wheelhouse - Rental Reservation Core");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Gateway: {}", args.gateway_url);
    info!(
        "Rate gate: {} attempts / {}s, attempt TTL {}s",
        args.rate_limit_attempts, args.rate_limit_window_secs, args.attempt_ttl_secs
    );
    info!("======================================");

    // Wire the payment gateway (stubbed in dev mode)
    let gateway: Arc<dyn SettlementGateway> = if args.dev_mode {
        warn!("Dev mode: using in-process stub gateway, payments auto-complete");
        Arc::new(StubGateway::new())
    } else {
        let secret = args
            .gateway_secret
            .clone()
            .expect("validated above: secret required in production");
        Arc::new(HttpGateway::new(
            &args.gateway_url,
            &secret,
            &args.gateway_return_url,
            args.gateway_timeout(),
        )?)
    };

    // Create application state and run the server
    let state = Arc::new(server::AppState::new(args, gateway));

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
