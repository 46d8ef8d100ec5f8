use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use news_digest::client::ApiClient;
use news_digest::config::Config;
use news_digest::proxy::ProxyState;
use news_digest::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "news_digest=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("DIGEST_CONFIG").unwrap_or_else(|_| "digest.toml".to_string());
    let config = Config::load_or_default(&config_path)?.with_env_overrides();
    info!("Loaded configuration from {}", config_path);

    let client = ApiClient::from_config(&config)?;
    let proxy = ProxyState::new(config.proxy_origin())?;
    info!(
        "Backend API at {}, proxying /api to {}",
        client.base_url(),
        proxy.origin()
    );

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState { client, config });
    let app = routes::router(state, proxy);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server starting on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
