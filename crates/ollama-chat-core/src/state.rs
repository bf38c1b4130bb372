//! UI-agnostic application state types
//!
//! This module contains the data structures shared between the conversation
//! store, the inference client and whatever front end renders them. None of
//! them depend on a specific UI framework.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "gemma3:1b";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(120_000);

/// Greeting that seeds every fresh or cleared conversation.
pub const WELCOME_MESSAGE: &str =
    "Hello! I'm your local AI assistant powered by Ollama. How can I help you today?";

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
    System,
}

/// How a message should be presented. Errors are authored by `System`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Assistant,
    Error,
}

/// A single entry in the conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
}

impl Message {
    fn new(sender: Sender, kind: MessageKind, content: impl Into<String>) -> Self {
        let timestamp = Utc::now();
        Self {
            id: generate_id(timestamp),
            sender,
            content: content.into(),
            timestamp,
            kind,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, MessageKind::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, MessageKind::Assistant, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Sender::System, MessageKind::Error, content)
    }

    pub fn is_error(&self) -> bool {
        self.kind == MessageKind::Error
    }
}

/// `msg_<unix millis>_<random base36 suffix>`
fn generate_id(timestamp: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("msg_{}_{}", timestamp.timestamp_millis(), suffix)
}

/// Reachability of the inference server as seen by the last probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectivityStatus {
    /// Short style tag for the status indicator
    pub fn css_class(&self) -> &'static str {
        match self {
            ConnectivityStatus::Connected => "status-connected",
            ConnectivityStatus::Connecting => "status-connecting",
            ConnectivityStatus::Disconnected => "status-disconnected",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectivityStatus::Connected => "Connected",
            ConnectivityStatus::Connecting => "Connecting...",
            ConnectivityStatus::Disconnected => "Disconnected",
        }
    }
}

/// Where generate and probe requests go, and with which model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn constructors_stamp_sender_and_kind() {
        let user = Message::user("hi");
        assert_eq!((user.sender, user.kind), (Sender::User, MessageKind::User));

        let ai = Message::assistant("hello");
        assert_eq!((ai.sender, ai.kind), (Sender::Assistant, MessageKind::Assistant));

        let err = Message::error("boom");
        assert_eq!((err.sender, err.kind), (Sender::System, MessageKind::Error));
        assert!(err.is_error());
    }

    #[test]
    fn content_is_kept_verbatim() {
        assert_eq!(Message::user("").content, "");
        let long = "x".repeat(100_000);
        assert_eq!(Message::assistant(long.clone()).content, long);
        assert_eq!(Message::user("  <b>raw</b>  ").content, "  <b>raw</b>  ");
    }

    #[test]
    fn ids_are_unique_across_rapid_creation() {
        let ids: HashSet<String> = (0..1000).map(|_| Message::user("x").id).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn id_has_time_and_suffix() {
        let msg = Message::user("x");
        let parts: Vec<&str> = msg.id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "msg");
        assert_eq!(parts[1].parse::<i64>().unwrap(), msg.timestamp.timestamp_millis());
        assert_eq!(parts[2].len(), ID_SUFFIX_LEN);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn status_mappings_are_total() {
        assert_eq!(ConnectivityStatus::default(), ConnectivityStatus::Connecting);
        assert_eq!(ConnectivityStatus::Connected.css_class(), "status-connected");
        assert_eq!(ConnectivityStatus::Connecting.css_class(), "status-connecting");
        assert_eq!(ConnectivityStatus::Disconnected.css_class(), "status-disconnected");
        assert_eq!(ConnectivityStatus::Connected.label(), "Connected");
        assert_eq!(ConnectivityStatus::Connecting.label(), "Connecting...");
        assert_eq!(ConnectivityStatus::Disconnected.label(), "Disconnected");
    }

    #[test]
    fn message_serializes_with_snake_case_tags() {
        let json = serde_json::to_value(Message::error("nope")).unwrap();
        assert_eq!(json["sender"], "system");
        assert_eq!(json["kind"], "error");
    }

    #[test]
    fn endpoint_defaults() {
        let config = EndpointConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.model, "gemma3:1b");
        assert_eq!(config.timeout, Duration::from_millis(120_000));
    }
}
