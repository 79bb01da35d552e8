//! # penlink-client
//!
//! Headless PenLink messaging client. Resolves the stored session, keeps the
//! notification socket alive, reconciles pushed messages and notifications,
//! and writes every user-visible cue to the log.

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use penlink_client::dispatcher::{Dispatcher, NoDesktop, TracingToasts};
use penlink_client::events::TracingEvents;
use penlink_client::{
    spawn_session, BridgeConfig, ClientConfig, ClientSession, SessionOptions, SessionStore,
};
use penlink_net::{ApiClient, ConnectionManager, Endpoints};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("penlink_client=debug,penlink_net=debug,warn")),
        )
        .init();

    info!("Starting PenLink client v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Configuration and stored session
    // -----------------------------------------------------------------------
    let config = ClientConfig::from_env();
    info!(
        backend = %config.backend_url,
        heartbeat_secs = config.heartbeat.as_secs(),
        token_override = config.token.is_some(),
        "Loaded configuration"
    );

    let store = match &config.data_dir {
        Some(dir) => SessionStore::open_at(dir),
        None => SessionStore::new()?,
    };

    let token = match config.token.clone() {
        Some(token) => {
            store.save(&token)?;
            token
        }
        None => store
            .load()?
            .context("No stored session; set PENLINK_TOKEN to log in")?,
    };

    // -----------------------------------------------------------------------
    // 3. Resolve the user
    // -----------------------------------------------------------------------
    let endpoints = Endpoints::from_backend_url(&config.backend_url)?;
    let api = ApiClient::new(endpoints.clone()).with_token(token);

    let me = match api.current_user().await {
        Ok(me) => me,
        Err(e) if e.is_unauthorized() => {
            store.clear()?;
            anyhow::bail!("Stored session rejected by the backend; log in again");
        }
        Err(e) => return Err(e).context("Could not resolve the current user"),
    };
    info!(user = %me.id, username = %me.username, "Logged in");

    // -----------------------------------------------------------------------
    // 4. Session
    // -----------------------------------------------------------------------
    let dispatcher = Dispatcher::new(
        Box::new(TracingToasts),
        Box::new(NoDesktop),
        config.toast_lifetime,
    );
    let mut session = ClientSession::new(
        api,
        me,
        dispatcher,
        Box::new(TracingEvents),
        SessionOptions {
            typing_window: config.typing_window,
        },
    );

    // REST keeps working without the socket, and vice versa.
    if let Err(e) = session.bootstrap().await {
        warn!(error = %e, "Initial load failed; waiting for the push channel");
    }

    let (manager, notif_rx) = ConnectionManager::new(endpoints, config.connection());
    let (handle, task) = spawn_session(
        session,
        manager,
        notif_rx,
        BridgeConfig {
            typing_idle: config.typing_idle,
            notification_poll: config.notification_poll,
        },
    );

    // -----------------------------------------------------------------------
    // 5. Run until Ctrl+C
    // -----------------------------------------------------------------------
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    if handle.shutdown().await.is_err() {
        warn!("Session task already stopped");
    }
    task.await?;

    Ok(())
}
