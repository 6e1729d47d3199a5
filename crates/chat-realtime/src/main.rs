//! Chat sync client entry point
//!
//! Run with:
//! ```bash
//! CHAT_TOKEN=... CHAT_USER_ID=1 cargo run -p chat-realtime --bin chat-sync
//! ```
//!
//! Configuration is loaded from environment variables. Lines typed on stdin
//! are sent to the active chat.

use anyhow::Context;
use chat_common::{
    try_init_tracing_with_config, ClientConfig, StaticCredentials, TracingConfig,
};
use chat_core::{ChatId, UserId, UserStatus};
use chat_realtime::{SyncNotice, Synchronizer, TungsteniteConnector};
use chat_rest::HttpChatApi;
use chat_store::SessionSnapshot;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env();

    // Tracing follows APP_ENV when the configuration loaded, LOG_FORMAT wins
    let env = config.as_ref().map(|c| c.app.env).unwrap_or_default();
    let tracing_config = TracingConfig::for_environment(env).with_env_overrides();
    if let Err(e) = try_init_tracing_with_config(tracing_config) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    let config = config.map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        app = %config.app.name,
        env = ?config.app.env,
        api = %config.api.base_url,
        ws = %config.realtime.ws_base_url,
        "Configuration loaded"
    );

    run(config).await
}

async fn run(config: ClientConfig) -> anyhow::Result<()> {
    let token = std::env::var("CHAT_TOKEN").context("CHAT_TOKEN is not set")?;
    let user_id = UserId::parse(&std::env::var("CHAT_USER_ID").context("CHAT_USER_ID is not set")?)
        .context("CHAT_USER_ID is not a valid id")?;
    let active_chat = std::env::var("CHAT_ACTIVE_CHAT")
        .ok()
        .map(|raw| ChatId::parse(&raw))
        .transpose()
        .context("CHAT_ACTIVE_CHAT is not a valid id")?;

    let credentials = StaticCredentials::shared(token);
    let api = HttpChatApi::new(&config.api, credentials.clone())?;
    let sync = Synchronizer::new(
        &config.realtime,
        Arc::new(api),
        credentials,
        Arc::new(TungsteniteConnector::new()),
    );

    sync.start_session(user_id).await?;
    if let Some(chat_id) = active_chat {
        sync.activate_chat(chat_id).await?;
    }

    let mut snapshots = sync.observe();
    let mut notices = sync.subscribe_notices();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                log_snapshot(&snapshot);
            }
            notice = notices.recv() => match notice {
                Ok(SyncNotice::UnknownFrame(frame)) => info!(%frame, "Unknown frame"),
                Ok(SyncNotice::Error(notice)) => warn!(code = %notice.code, message = %notice.message, "Sync error"),
                Ok(SyncNotice::SessionExpired) => {
                    error!("Session expired, exiting");
                    return Ok(());
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Notice stream lagged"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(text)) => on_input(&sync, &text),
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    stdin_open = false;
                }
            },
        }
    }

    sync.end_session();
    info!("Chat sync stopped");
    Ok(())
}

fn on_input(sync: &Synchronizer, text: &str) {
    let result = match text.trim() {
        "/online" => sync.set_status(UserStatus::Online),
        "/away" => sync.set_status(UserStatus::Away),
        "/dismiss" => {
            sync.dismiss_error();
            Ok(())
        }
        content => sync.send(content).map(|_| ()),
    };

    if let Err(e) = result {
        warn!(error = %e, code = e.error_code(), "Command failed");
    }
}

fn log_snapshot(snapshot: &SessionSnapshot) {
    let online = snapshot
        .presence
        .values()
        .filter(|entry| entry.status == UserStatus::Online)
        .count();

    info!(
        chats = snapshot.chats.len(),
        users = snapshot.users.len(),
        active_chat = ?snapshot.active_chat_id.map(|id| id.into_inner()),
        messages = snapshot.messages.len(),
        pending = snapshot.pending_count(),
        failed = snapshot.failed_count(),
        online,
        "Session updated"
    );

    if let Some(last_error) = &snapshot.last_error {
        warn!(error = %last_error, "Last error");
    }
}
