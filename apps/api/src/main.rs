use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use booking_cell::services::booking::BookingService;
use shared_config::AppConfig;
use shared_database::Db;
use shared_models::state::AppState;

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Home Care booking API server");

    // Load configuration and open the data store
    let config = AppConfig::from_env();
    let db = match Db::open(&config.database_path) {
        Ok(db) => db,
        Err(e) => {
            error!("failed to open database: {e:#}");
            std::process::exit(1);
        }
    };

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Create shared state
    let sweep_interval = config.no_show_sweep_interval_secs;
    let state = Arc::new(AppState::new(config, db));

    // Periodic no-show sweep; idempotent, so overlap with manual runs is fine
    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(sweep_interval));
        loop {
            ticker.tick().await;
            let service = BookingService::new(sweep_state.clone());
            match service.run_no_show_sweep(Utc::now()) {
                Ok(0) => {}
                Ok(n) => info!("no-show sweep marked {} bookings", n),
                Err(e) => error!("no-show sweep failed: {}", e),
            }
        }
    });

    // Build the application router
    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
