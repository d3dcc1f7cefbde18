//! Normalized inbound payload.

use serde::{Deserialize, Serialize};

/// What the customer sent, independent of the transport's native shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InboundPayload {
    /// Free text typed by the customer.
    Text(String),
    /// Identifier of a clicked list row or button.
    Selection(String),
}

impl InboundPayload {
    /// Build a payload from the raw transport fields.
    ///
    /// A non-blank selection wins over text. Values are trimmed. Returns
    /// `None` when both are missing or whitespace-only.
    pub fn normalize(text: Option<&str>, selection_id: Option<&str>) -> Option<Self> {
        if let Some(id) = non_blank(selection_id) {
            return Some(Self::Selection(id.to_string()));
        }
        non_blank(text).map(|t| Self::Text(t.to_string()))
    }

    /// The trimmed token carried by the payload.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) | Self::Selection(s) => s,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
