use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use messaging_cell::MessagingState;
use notification_cell::{spawn_content_poller, NotificationState};
use shared_config::AppConfig;
use shared_utils::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ward portal API server");

    let config = AppConfig::from_env();
    let port = config.port;
    let sweep_every = Duration::from_secs(config.typing_sweep_interval_secs.max(1));
    let poll_every = Duration::from_secs(config.notification_interval_minutes.max(1) * 60);

    let app_state = AppState::from_config(config);
    let messaging = MessagingState::new(app_state.clone());
    let notifications = NotificationState::new(app_state.clone());

    // Background tasks
    messaging.typing.clone().spawn_sweeper(sweep_every);
    spawn_content_poller(notifications.clone(), poll_every);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(app_state, messaging, notifications)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
