use std::net::SocketAddr;

use agentchat::config::AppConfig;
use agentchat::models::chat::ChatState;
use agentchat::services::llm::LlmClient;
use agentchat::services::queue;
use agentchat::AppState;
use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentchat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration");

    let pool = agentchat::db::create_pool(&config.database_url, config.database_max_connections)
        .await?;
    agentchat::db::run_migrations(&pool).await?;

    let redis = redis::Client::open(config.redis_url.as_str())?;
    let llm = LlmClient::new(&config);

    let state = AppState {
        db: pool,
        redis,
        config: config.clone(),
        llm,
        chat: ChatState::new(),
    };

    // Background worker consuming the Redis task queue.
    tokio::spawn(queue::run_worker(state.clone()));

    let addr = SocketAddr::new(config.host.parse()?, config.port);
    tracing::info!(host = %addr, "Starting agentchat API server");

    let app = agentchat::router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
