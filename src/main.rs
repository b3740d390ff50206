use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invite_tracker::config::Config;
use invite_tracker::engine::Orchestrator;
use invite_tracker::events::PlatformEvent;
use invite_tracker::notify::LifecycleNotifier;
use invite_tracker::persistence::MembershipStore;
use invite_tracker::platform::HttpPlatformClient;
use invite_tracker::server::{AppState, build_router};
use invite_tracker::settings::FileSettingsStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "invite_tracker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("loading configuration")?;
    tracing::info!(?config, "Starting invite tracker");

    let store = Arc::new(
        MembershipStore::open(&config.state_dir).context("opening membership store")?,
    );
    let settings = Arc::new(
        FileSettingsStore::open(config.settings_path()).context("opening settings store")?,
    );
    let client = Arc::new(
        HttpPlatformClient::from_token(config.api_base.clone(), &config.bot_token)
            .context("building platform client")?,
    );

    let notifier = LifecycleNotifier::new(settings, Arc::clone(&client), Arc::clone(&client));
    let engine = Orchestrator::new(config.engine.clone(), client, store, notifier);

    let shutdown = CancellationToken::new();
    let maintenance = {
        let engine = engine.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { engine.run(shutdown).await })
    };

    // Snapshot every community up front instead of waiting for the gateway.
    engine.dispatch(PlatformEvent::Ready);

    let app = build_router(AppState::new(engine, config.webhook_secret.as_bytes()));
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "Listening");

    let serve_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            serve_shutdown.cancel();
        })
        .await
        .context("serving HTTP")?;

    shutdown.cancel();
    maintenance.await.context("joining maintenance task")?;
    tracing::info!("Shut down cleanly");
    Ok(())
}
