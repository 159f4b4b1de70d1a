use std::sync::Arc;

use study_deck::ai::OpenAiClient;
use study_deck::config::Config;
use study_deck::{app, db, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("study_deck=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    if config.ai.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; generation requests will fail");
    }

    let pool = db::init_db(&config.database_url).await?;
    db::migrate(&pool).await?;

    let ai = OpenAiClient::new(config.ai.clone())?;
    let state = AppState::new(pool, Arc::new(ai));

    let listener = tokio::net::TcpListener::bind(config.bind_addr.as_str()).await?;
    tracing::info!(addr = %config.bind_addr, "study-deck listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
