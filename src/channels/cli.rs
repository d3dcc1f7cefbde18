//! CLI channel: stdin/stdout REPL for local testing.
//!
//! Input lines:
//! - `hello`: text from the default sender (`local-user`)
//! - `@alice 1`: text `1` from sender `alice`
//! - `#2` / `@alice #2`: a menu selection with id `2`

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, IncomingMessage, MessageStream};
use crate::error::ChannelError;

const DEFAULT_SENDER: &str = "local-user";

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one input line into a message. `None` for blank lines.
fn parse_line(line: &str) -> Option<IncomingMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (sender, body) = match line.strip_prefix('@') {
        Some(rest) => {
            let (name, body) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            (name, body.trim())
        }
        None => (DEFAULT_SENDER, line),
    };
    if sender.is_empty() {
        return None;
    }

    let msg = match body.strip_prefix('#') {
        Some(id) => IncomingMessage::selection("cli", sender, id.trim()),
        None => IncomingMessage::text("cli", sender, body),
    };
    Some(msg)
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(msg) = parse_line(&line) else {
                            eprint!("> ");
                            continue;
                        };
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
        println!("\n[{recipient}] {text}\n");
        eprint!("> ");
        Ok(())
    }
}
