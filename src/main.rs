use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use gatepass_server::config::Config;
use gatepass_server::routes::create_routes;
use gatepass_server::services::{
    LogNotifier, NotificationDispatcher, Notifier, SvgQrRenderer, TelegramNotifier,
};
use gatepass_server::state::AppState;
use gatepass_server::store::{PgCounterStore, PgTicketStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    tracing::info!("Successfully connected to database");

    sqlx::migrate!().run(&pool).await?;

    tracing::info!("Migrations run successfully");

    let counters = PgCounterStore::new(pool.clone());
    counters.ensure_initialized().await?;

    let notifier: Arc<dyn Notifier> = match &config.telegram_bot_token {
        Some(token) => Arc::new(TelegramNotifier::new(&config.telegram_api_url, token)?),
        None => {
            tracing::info!("TELEGRAM_BOT_TOKEN not set, notifications go to the log");
            Arc::new(LogNotifier)
        }
    };

    let state = AppState::new(
        Arc::new(PgTicketStore::new(pool)),
        Arc::new(counters),
        NotificationDispatcher::new(notifier, config.admin_ids.clone()),
        Arc::new(SvgQrRenderer::default()),
    );
    let app = create_routes(state, &config);

    let addr = config.socket_addr()?;
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
