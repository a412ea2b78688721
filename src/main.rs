use std::sync::Arc;

use anyhow::Context;

use onboarding_agent::agent::Agent;
use onboarding_agent::channels::{ChannelManager, CliChannel, WebchatChannel};
use onboarding_agent::config::AppConfig;
use onboarding_agent::llm::create_provider;
use onboarding_agent::onboarding::{
    DialogueEngine, LlmExecutor, OnboardingManager, OnboardingRouteState, onboarding_routes,
};
use onboarding_agent::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    eprintln!("🤖 Onboarding Agent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {} ({:?})", config.llm.model, config.llm.backend);
    eprintln!("   Chat WS: ws://0.0.0.0:{}/ws/chat", config.http_port);
    eprintln!(
        "   Onboarding API: http://0.0.0.0:{}/api/conversations/{{id}}/onboarding",
        config.http_port
    );

    // Create LLM provider
    let llm = create_provider(&config.llm)?;

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Onboarding ───────────────────────────────────────────────────────
    let engine = DialogueEngine::new(Arc::new(LlmExecutor::new(llm)));
    let manager = Arc::new(OnboardingManager::new(Arc::clone(&db), engine));

    // Web chat channel (needs to exist before router build)
    let webchat = WebchatChannel::new(Arc::clone(&db));
    let app = onboarding_routes(OnboardingRouteState {
        manager: Arc::clone(&manager),
    })
    .merge(webchat.router());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.http_port))?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP server stopped: {}", e);
        }
    });
    tracing::info!(port = config.http_port, "HTTP server started");

    // ── Channels ─────────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();
    channels.add(Box::new(webchat));
    if config.enable_cli {
        eprintln!("   Type a message and press Enter. Numbers pick an option.");
        channels.add(Box::new(CliChannel::new()));
    }
    eprintln!("   Channels: {}\n", channels.names().join(", "));

    let agent = Agent::new(config.agent, manager, channels);
    agent.run().await?;

    Ok(())
}
