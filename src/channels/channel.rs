//! Channel trait and the message types that cross the transport boundary.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::intake::payload::InboundPayload;

/// Stream of inbound messages produced by a started channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// Inbound message event, as delivered by a transport adapter.
///
/// Carries the raw `text` / `selection_id` fields; [`IncomingMessage::payload`]
/// normalizes them into an [`InboundPayload`] so nothing downstream inspects
/// transport shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Name of the channel that produced the message ("cli", "telegram").
    pub channel: String,
    /// Stable, transport-assigned sender address. Also the reply address.
    pub sender: String,
    /// Whether the message was authored by this bot (self-echo).
    pub from_self: bool,
    /// Plain text body, if any.
    pub text: Option<String>,
    /// Structured selection identifier from a list/button reply, if any.
    pub selection_id: Option<String>,
}

impl IncomingMessage {
    /// A plain text message.
    pub fn text(channel: impl Into<String>, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            sender: sender.into(),
            from_self: false,
            text: Some(text.into()),
            selection_id: None,
        }
    }

    /// A structured selection (button / list click).
    pub fn selection(
        channel: impl Into<String>,
        sender: impl Into<String>,
        selection_id: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            sender: sender.into(),
            from_self: false,
            text: None,
            selection_id: Some(selection_id.into()),
        }
    }

    pub fn with_from_self(mut self, from_self: bool) -> Self {
        self.from_self = from_self;
        self
    }

    /// Normalized payload, or `None` when both fields are empty/whitespace.
    pub fn payload(&self) -> Option<InboundPayload> {
        InboundPayload::normalize(self.text.as_deref(), self.selection_id.as_deref())
    }
}

/// One selectable row of an interactive menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub label: String,
    /// Canonical selection id echoed back by the transport on click.
    pub id: String,
    pub description: String,
}

/// Interactive menu: a banner followed by selectable options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuPrompt {
    pub banner: String,
    pub options: Vec<MenuEntry>,
}

impl MenuPrompt {
    /// Plain-text rendering for transports without structured replies.
    ///
    /// ```text
    /// <banner>
    ///
    /// 1 - Label
    /// 2 - Label
    /// ```
    pub fn to_plain_text(&self) -> String {
        let mut text = self.banner.trim_end().to_string();
        if !self.options.is_empty() {
            text.push_str("\n\n");
            let lines: Vec<String> = self
                .options
                .iter()
                .map(|o| format!("{} - {}", o.id, o.label))
                .collect();
            text.push_str(&lines.join("\n"));
        }
        text
    }
}

/// A transport the intake desk can talk through.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name for logging.
    fn name(&self) -> &str;

    /// Start receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send a single text message to `recipient`.
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ChannelError>;

    /// Send an interactive menu. Transports without list/button support
    /// fall back to the plain-text banner.
    async fn send_menu(&self, recipient: &str, menu: &MenuPrompt) -> Result<(), ChannelError> {
        self.send_text(recipient, &menu.to_plain_text()).await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
