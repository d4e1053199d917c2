//! Telegram command interface: /watch, /unwatch, /list.
//!
//! Long-polls `getUpdates` and runs simple CRUD against the
//! subscription store. Deliberately outside the core pipeline, which
//! only ever reads subscriptions.

use crate::config::file::TelegramConfig;
use kanau::processor::Processor;
use serde::Deserialize;
use swapwatch_core::entities::subscriptions::{
    AddSubscription, ListSubscriptionsBySubscriber, RemoveSubscription,
};
use swapwatch_core::framework::DatabaseProcessor;
use tokio::sync::watch;
use tracing::{error, info, warn};

const LONG_POLL_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Run the command loop until shutdown is signaled.
pub async fn run_command_loop(
    db: DatabaseProcessor,
    telegram: TelegramConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(LONG_POLL_SECS + 10))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());
    let mut offset: i64 = 0;

    info!("Command interface started");

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                // A dropped sender counts as shutdown too.
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Command interface received shutdown signal");
                    break;
                }
            }

            result = poll_updates(&http, &telegram, offset) => {
                match result {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            let Some(message) = update.message else { continue };
                            let Some(text) = message.text else { continue };

                            let reply = handle_command(&db, message.chat.id, text.trim()).await;
                            if let Err(error) =
                                send_reply(&http, &telegram, message.chat.id, &reply).await
                            {
                                warn!(chat_id = message.chat.id, %error, "Failed to send reply");
                            }
                        }
                    }
                    Err(error) => {
                        warn!(%error, "getUpdates failed, backing off");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                }
            }
        }
    }

    info!("Command interface shutdown complete");
}

async fn poll_updates(
    http: &reqwest::Client,
    telegram: &TelegramConfig,
    offset: i64,
) -> Result<Vec<Update>, reqwest::Error> {
    let url = format!(
        "{}/bot{}/getUpdates",
        telegram.api_base, telegram.bot_token
    );
    let response: UpdatesResponse = http
        .get(&url)
        .query(&[
            ("offset", offset.to_string()),
            ("timeout", LONG_POLL_SECS.to_string()),
        ])
        .send()
        .await?
        .json()
        .await?;
    if !response.ok {
        warn!("getUpdates answered ok=false");
        return Ok(Vec::new());
    }
    Ok(response.result)
}

async fn send_reply(
    http: &reqwest::Client,
    telegram: &TelegramConfig,
    chat_id: i64,
    text: &str,
) -> Result<(), reqwest::Error> {
    let url = format!(
        "{}/bot{}/sendMessage",
        telegram.api_base, telegram.bot_token
    );
    http.post(&url)
        .json(&serde_json::json!({ "chat_id": chat_id, "text": text }))
        .send()
        .await?;
    Ok(())
}

/// Parse and execute one command, returning the reply text.
async fn handle_command(db: &DatabaseProcessor, chat_id: i64, text: &str) -> String {
    let subscriber_id = chat_id.to_string();
    let mut parts = text.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("/watch"), Some(address)) => {
            let insert = AddSubscription {
                subscriber_id,
                watched_address: address.to_string(),
            };
            match db.process(insert).await {
                Ok(true) => format!("Watching {address}. You will be notified about its swaps."),
                Ok(false) => format!("Already watching {address}."),
                Err(error) => {
                    error!(%error, "AddSubscription failed");
                    "Something went wrong, try again later.".to_string()
                }
            }
        }
        (Some("/unwatch"), Some(address)) => {
            let delete = RemoveSubscription {
                subscriber_id,
                watched_address: address.to_string(),
            };
            match db.process(delete).await {
                Ok(true) => format!("Stopped watching {address}."),
                Ok(false) => format!("You were not watching {address}."),
                Err(error) => {
                    error!(%error, "RemoveSubscription failed");
                    "Something went wrong, try again later.".to_string()
                }
            }
        }
        (Some("/list"), None) => {
            match db.process(ListSubscriptionsBySubscriber { subscriber_id }).await {
                Ok(subscriptions) if subscriptions.is_empty() => {
                    "You are not watching any address. Use /watch <address>.".to_string()
                }
                Ok(subscriptions) => subscriptions
                    .iter()
                    .map(|s| s.watched_address.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
                Err(error) => {
                    error!(%error, "ListSubscriptionsBySubscriber failed");
                    "Something went wrong, try again later.".to_string()
                }
            }
        }
        _ => "Commands:\n/watch <address>\n/unwatch <address>\n/list".to_string(),
    }
}
