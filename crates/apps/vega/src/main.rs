//! Vega - Gmail wait/read service
//!
//! HTTP entry point: accounts, linked Gmail mailboxes, the wait-for-email and
//! read-last-email operations, and Google Sheets helpers.

use std::sync::Arc;

use anyhow::{Context, Result};
use courier::{
    AccountStore, CredentialStore, GmailClient, GoogleCredentials, GoogleOAuth, RefreshGate,
    SheetsClient, SqliteStore,
};
use log::{error, info, warn};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

mod cors;
mod error;
mod notify;
mod routes;
mod session;
mod settings;
mod state;

use notify::{LogNotifier, ResendNotifier, ResetNotifier};
use settings::ServerSettings;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let settings = ServerSettings::load().context("Failed to load server settings")?;

    let loaded = match &settings.google_credentials_path {
        Some(path) => GoogleCredentials::from_file(path),
        None => GoogleCredentials::load(),
    };
    let credentials = match loaded {
        Ok(creds) => creds,
        Err(e) => {
            if let Some(path) = GoogleCredentials::default_credentials_path() {
                warn!(
                    "To configure Google access, either:\n\
                     1. Place your Google OAuth web client credentials at: {}\n\
                     2. Or set environment variables: GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET",
                    path.display()
                );
            }
            return Err(e.context("Google credentials not found"));
        }
    };

    let db_path = settings.database_path()?;
    let store = Arc::new(SqliteStore::new(&db_path)?);
    info!("Using database at {}", db_path.display());

    let notifier: Arc<dyn ResetNotifier> = match &settings.resend_api_key {
        Some(key) => Arc::new(ResendNotifier::new(key.clone(), settings.reset_sender.clone())),
        None => {
            warn!("RESEND_API_KEY not set; password reset links will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let oauth = Arc::new(GoogleOAuth::new(credentials));
    let accounts: Arc<dyn AccountStore> = store.clone();
    let mailboxes: Arc<dyn CredentialStore> = store;
    let shutdown = CancellationToken::new();

    let state = Arc::new(AppState {
        accounts,
        mailboxes,
        mail: Arc::new(GmailClient::new()),
        oauth: oauth.clone(),
        refresher: oauth,
        refresh_gate: Arc::new(RefreshGate::new()),
        sheets: Arc::new(SheetsClient::new()),
        notifier,
        settings: settings.clone(),
        shutdown: shutdown.clone(),
    });

    let listener = TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind_addr))?;
    info!("Vega listening on http://{}", listener.local_addr()?);

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    info!("Vega stopped");
    Ok(())
}

/// Resolve on Ctrl-C, cancelling in-flight waits first
async fn shutdown_signal(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
    shutdown.cancel();
}
