//! Error types for the intake desk.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send message on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Intake script content errors.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Reply sequence for option {option} is empty")]
    EmptySequence { option: String },

    #[error("Ticket notice template is missing the {{ticket_id}} placeholder")]
    MissingTicketPlaceholder,

    #[error("Failed to read script file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse script file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias for the intake desk.
pub type Result<T> = std::result::Result<T, Error>;
