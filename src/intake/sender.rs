//! Scripted reply sender: paced, strictly ordered, fail-stop delivery.

use std::sync::Arc;

use tracing::{debug, error};

use crate::channels::{Channel, MenuPrompt};
use crate::config::JitterRange;
use crate::error::ChannelError;

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundItem {
    Text(String),
    Menu(MenuPrompt),
}

impl OutboundItem {
    fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Menu(_) => "menu",
        }
    }
}

/// A send that failed partway through a sequence.
#[derive(Debug, thiserror::Error)]
#[error("sequence aborted at item {index} of {total}: {source}")]
pub struct SequenceAborted {
    /// Zero-based index of the failing item, which is also how many were delivered.
    pub index: usize,
    pub total: usize,
    #[source]
    pub source: ChannelError,
}

/// Sends outbound items one at a time through a channel.
#[derive(Clone)]
pub struct ScriptedSender {
    channel: Arc<dyn Channel>,
    pacing: JitterRange,
}

impl ScriptedSender {
    pub fn new(channel: Arc<dyn Channel>, pacing: JitterRange) -> Self {
        Self { channel, pacing }
    }

    /// The transport this sender delivers through.
    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// Deliver `items` to `recipient` in order, sleeping a jittered delay
    /// before each send. Stops at the first failure.
    ///
    /// Returns the number of items delivered.
    pub async fn send_sequence(
        &self,
        recipient: &str,
        items: &[OutboundItem],
    ) -> Result<usize, SequenceAborted> {
        let total = items.len();
        for (index, item) in items.iter().enumerate() {
            let delay = self.pacing.sample();
            tokio::time::sleep(delay).await;

            let result = match item {
                OutboundItem::Text(text) => self.channel.send_text(recipient, text).await,
                OutboundItem::Menu(menu) => self.channel.send_menu(recipient, menu).await,
            };

            match result {
                Ok(()) => debug!(
                    recipient = %recipient,
                    index,
                    total,
                    kind = item.kind(),
                    delay_ms = delay.as_millis() as u64,
                    "Sent"
                ),
                Err(source) => {
                    error!(
                        recipient = %recipient,
                        channel = self.channel.name(),
                        index,
                        total,
                        error = %source,
                        "Send failed; abandoning the rest of this sequence"
                    );
                    return Err(SequenceAborted {
                        index,
                        total,
                        source,
                    });
                }
            }
        }
        Ok(total)
    }
}
