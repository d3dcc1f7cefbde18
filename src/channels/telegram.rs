//! Telegram channel: long-polls the Bot API for updates.
//!
//! Text messages arrive as text payloads; inline-keyboard clicks
//! (`callback_query`) arrive as selections carrying the button's
//! `callback_data`. Menus are rendered as one-button-per-row inline keyboards.

use async_trait::async_trait;
use serde_json::Value;

use crate::channels::{Channel, IncomingMessage, MenuPrompt, MessageStream};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Long-poll timeout passed to getUpdates, in seconds.
const LONG_POLL_TIMEOUT_SECS: u64 = 30;

/// Back-off after a failed poll.
const POLL_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

/// Telegram channel: connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    /// POST a JSON body to a Bot API method, mapping failures to `SendFailed`.
    async fn call(&self, method: &str, body: &Value) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("{method} returned {status}: {err}"),
            });
        }
        Ok(())
    }
}

fn api_url(bot_token: &str, method: &str) -> String {
    format!("https://api.telegram.org/bot{bot_token}/{method}")
}

/// Build the sendMessage body for a menu: banner text plus an inline keyboard.
fn menu_body(chat_id: &str, menu: &MenuPrompt) -> Value {
    let rows: Vec<Value> = menu
        .options
        .iter()
        .map(|o| {
            serde_json::json!([{
                "text": format!("{} - {}", o.id, o.label),
                "callback_data": o.id,
            }])
        })
        .collect();

    serde_json::json!({
        "chat_id": chat_id,
        "text": menu.banner,
        "reply_markup": { "inline_keyboard": rows },
    })
}

/// Convert one getUpdates result into a message.
///
/// Returns the message and, for button clicks, the callback query id that
/// must be answered.
fn parse_update(update: &Value) -> Option<(IncomingMessage, Option<String>)> {
    if let Some(message) = update.get("message") {
        let chat_id = message
            .get("chat")
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64)?
            .to_string();
        let text = message.get("text").and_then(Value::as_str)?;
        let from_self = message
            .get("from")
            .and_then(|f| f.get("is_bot"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let msg = IncomingMessage::text("telegram", chat_id, text).with_from_self(from_self);
        return Some((msg, None));
    }

    if let Some(query) = update.get("callback_query") {
        let query_id = query.get("id").and_then(Value::as_str)?.to_string();
        let data = query.get("data").and_then(Value::as_str)?;
        // Replies go to the chat the keyboard was posted in, falling back to the user.
        let chat_id = query
            .get("message")
            .and_then(|m| m.get("chat"))
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64)
            .or_else(|| query.get("from").and_then(|f| f.get("id")).and_then(Value::as_i64))?
            .to_string();

        let msg = IncomingMessage::selection("telegram", chat_id, data);
        return Some((msg, Some(query_id)));
    }

    None
}

/// Extract the update list from a getUpdates response.
///
/// A non-success status, `"ok": false` or a missing `result` array is an error
/// carrying Telegram's description when present.
fn poll_results(status: reqwest::StatusCode, data: &Value) -> Result<&[Value], String> {
    let ok = data.get("ok").and_then(Value::as_bool).unwrap_or(false);
    if !status.is_success() || !ok {
        let description = data
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("no description");
        return Err(format!("getUpdates returned {status}: {description}"));
    }
    data.get("result")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| "getUpdates response has no result array".to_string())
}

/// Split text into chunks of at most `max_len` bytes, preferring newline or
/// space boundaries and never cutting inside a UTF-8 character.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut limit = max_len;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }

        let chunk = &remaining[..limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(limit);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { limit } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let bot_token = self.bot_token.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": LONG_POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client
                    .post(api_url(&bot_token, "getUpdates"))
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let status = resp.status();
                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error ({status}): {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let results = match poll_results(status, &data) {
                    Ok(results) => results,
                    Err(reason) => {
                        tracing::warn!("Telegram poll rejected: {reason}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some((incoming, callback_id)) = parse_update(update) else {
                        continue;
                    };

                    if let Some(id) = callback_id {
                        // Clears the button's loading state; failures are cosmetic.
                        let _ = client
                            .post(api_url(&bot_token, "answerCallbackQuery"))
                            .json(&serde_json::json!({ "callback_query_id": id }))
                            .send()
                            .await;
                    }

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            let body = serde_json::json!({ "chat_id": recipient, "text": chunk });
            self.call("sendMessage", &body).await?;
        }
        Ok(())
    }

    async fn send_menu(&self, recipient: &str, menu: &MenuPrompt) -> Result<(), ChannelError> {
        if menu.banner.len() > TELEGRAM_MAX_MESSAGE_LENGTH {
            return self.send_text(recipient, &menu.to_plain_text()).await;
        }
        self.call("sendMessage", &menu_body(recipient, menu)).await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
