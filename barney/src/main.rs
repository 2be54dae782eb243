use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use barney::api::{create_router, AppState};
use barney::config::Config;
use barney::embeddings::EmbeddingApiClient;
use barney::llm::{AzureChatClient, ChatCompletion};
use barney::search::{AzureSearchClient, PassageSearch};

#[derive(Parser)]
#[command(name = "barney")]
#[command(about = "Barney is your personal sommelier")]
struct Args {
    /// Address to bind, overrides BARNEY_HOST
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on, overrides BARNEY_PORT
    #[arg(long)]
    port: Option<u16>,

    /// Validate configuration and exit
    #[arg(long)]
    check_config: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "barney=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let mut config = Config::from_env().map_err(|e| {
        tracing::error!("Refusing to start: {}", e);
        e
    })?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if args.check_config {
        tracing::info!(
            search_index = %config.search.index_name,
            chat_deployment = %config.chat.deployment,
            embedding_model = %config.embeddings.model,
            "Configuration is valid"
        );
        return Ok(());
    }

    tracing::info!(
        "Using embedding model: {} ({} dimensions)",
        config.embeddings.model,
        config.embeddings.dimensions
    );
    let embeddings = EmbeddingApiClient::new(&config.embeddings)?;

    tracing::info!("Using search index: {}", config.search.index_name);
    let search: Arc<dyn PassageSearch> =
        Arc::new(AzureSearchClient::new(&config.search, embeddings)?);

    tracing::info!("Using chat deployment: {}", config.chat.deployment);
    let chat: Arc<dyn ChatCompletion> = Arc::new(AzureChatClient::new(&config.chat)?);

    let state = AppState::new(config.clone(), search, chat);

    let cancel_token = CancellationToken::new();

    tracing::info!(
        "Starting session sweeper... (interval={}s, ttl={}s)",
        config.session.sweep_interval_secs,
        config.session.ttl_secs
    );
    let sessions = state.sessions.clone();
    let interval = Duration::from_secs(config.session.sweep_interval_secs.max(1));
    let token = cancel_token.child_token();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Session sweeper shutting down...");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let purged = sessions.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, remaining = sessions.len(), "Expired sessions purged");
                    }
                }
            }
        }
    });

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Barney starting on http://{}", addr);
    tracing::info!("  Ask:          POST http://{}/ask", addr);
    tracing::info!("  Health check: http://{}/health", addr);
    tracing::info!("  API docs:     http://{}/docs", addr);
    tracing::info!("  OpenAPI spec: http://{}/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling background tasks...");
    cancel_token.cancel();
}
