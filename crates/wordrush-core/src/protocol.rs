//! Wire protocol for the newline-delimited JSON transport.
//!
//! Both directions carry one JSON object per line, UTF-8 encoded:
//!
//! - **Client → server**: a [`Handshake`] as the very first line, then
//!   gameplay messages parsed into [`ClientCommand`]s.
//! - **Server → client**: [`ServerEvent`] records, all shaped
//!   `{ type, player?, message?, data? }` with absent fields omitted.
//!
//! Gameplay parsing is deliberately forgiving: a line that is not a JSON
//! object is skipped silently, while an object that carries none of the
//! recognized fields is a protocol error the client is told about.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Client → server
// ─────────────────────────────────────────────────────────────────────────────

/// The mandatory first message of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Self-asserted client identifier (opaque, bounded length).
    pub uuid: String,
    /// Display name shown to other players.
    pub name: String,
}

/// Handshake validation failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    /// The line was not a JSON object.
    #[error("invalid format")]
    Malformed,
    /// A required field was absent or not a string.
    #[error("missing or invalid field: {field}")]
    Missing {
        /// Offending field name.
        field: &'static str,
    },
    /// A required field was empty.
    #[error("empty field: {field}")]
    Empty {
        /// Offending field name.
        field: &'static str,
    },
    /// A field exceeded its length bound.
    #[error("field too long: {field} (max {max} chars)")]
    TooLong {
        /// Offending field name.
        field: &'static str,
        /// Maximum accepted length.
        max: usize,
    },
}

impl Handshake {
    /// Parse and validate the first line of a connection.
    pub fn parse(line: &str, max_id_len: usize, max_name_len: usize) -> Result<Self, HandshakeError> {
        let value: Value = serde_json::from_str(line).map_err(|_| HandshakeError::Malformed)?;
        let object = value.as_object().ok_or(HandshakeError::Malformed)?;

        let uuid = Self::bounded_field(object, "uuid", max_id_len)?;
        let name = Self::bounded_field(object, "name", max_name_len)?;
        Ok(Self { uuid, name })
    }

    fn bounded_field(
        object: &serde_json::Map<String, Value>,
        field: &'static str,
        max: usize,
    ) -> Result<String, HandshakeError> {
        let raw = object
            .get(field)
            .and_then(Value::as_str)
            .ok_or(HandshakeError::Missing { field })?;
        if raw.is_empty() {
            return Err(HandshakeError::Empty { field });
        }
        if raw.chars().count() > max {
            return Err(HandshakeError::TooLong { field, max });
        }
        Ok(raw.to_string())
    }
}

/// A parsed gameplay message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Voluntary leave, spelled either `{"type":"disconnect"}` or
    /// `{"disconnect":true}`.
    Disconnect,
    /// A submitted word.
    Word(String),
    /// A JSON object carrying no recognized field.
    Invalid,
}

impl ClientCommand {
    /// Parse one gameplay line. `None` means the line was not a JSON object
    /// and should be skipped without comment.
    pub fn parse(line: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(line).ok()?;
        let object = value.as_object()?;

        let type_disconnect = object
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| t == "disconnect");
        let flag_disconnect = object
            .get("disconnect")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if type_disconnect || flag_disconnect {
            return Some(Self::Disconnect);
        }

        match object.get("word").and_then(Value::as_str) {
            Some(word) => Some(Self::Word(word.to_string())),
            None => Some(Self::Invalid),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server → client
// ─────────────────────────────────────────────────────────────────────────────

/// Discriminant of a [`ServerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Protocol or capacity failure.
    Error,
    /// Lobby placement acknowledgment.
    Lobby,
    /// Pre-race countdown tick (`data.value` = ticks remaining).
    Countdown,
    /// Race activation carrying the full sequence (`data.words`).
    Words,
    /// Live words-per-minute update (`data.value`).
    Wpm,
    /// All words completed.
    Completed,
    /// Grace-period reminder (`data.remaining` = seconds left).
    TimeoutWarning,
    /// Grace window elapsed.
    Timeout,
    /// Kicked for post-start inactivity.
    InactiveTimeout,
    /// The session is over (hard limit reached).
    SessionEnd,
    /// Acknowledged voluntary disconnect.
    Bye,
}

/// Structured payload of a [`ServerEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventData {
    /// A single numeric value (countdown ticks remaining, WPM).
    Value {
        /// The value.
        value: u32,
    },
    /// The race's full word sequence.
    Words {
        /// Words in race order.
        words: Vec<String>,
    },
    /// Seconds remaining in the grace window.
    Remaining {
        /// Whole seconds left.
        remaining: u64,
    },
}

/// One server-to-client event line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEvent {
    /// Event discriminant.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Player the event concerns, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    /// Human-readable context, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Structured payload, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EventData>,
}

impl ServerEvent {
    fn new(kind: EventKind) -> Self {
        Self {
            kind,
            player: None,
            message: None,
            data: None,
        }
    }

    /// Protocol or capacity failure with a reason.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(EventKind::Error)
        }
    }

    /// Lobby placement acknowledgment.
    pub fn lobby(player: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            player: Some(player.into()),
            message: Some(message.into()),
            ..Self::new(EventKind::Lobby)
        }
    }

    /// Countdown tick with the remaining count.
    pub fn countdown(value: u32) -> Self {
        Self {
            data: Some(EventData::Value { value }),
            ..Self::new(EventKind::Countdown)
        }
    }

    /// Race activation carrying the full word sequence.
    pub fn words(words: Vec<String>) -> Self {
        Self {
            data: Some(EventData::Words { words }),
            ..Self::new(EventKind::Words)
        }
    }

    /// Live WPM update for a player.
    pub fn wpm(player: impl Into<String>, value: u32) -> Self {
        Self {
            player: Some(player.into()),
            data: Some(EventData::Value { value }),
            ..Self::new(EventKind::Wpm)
        }
    }

    /// All words completed.
    pub fn completed(player: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            player: Some(player.into()),
            message: Some(message.into()),
            ..Self::new(EventKind::Completed)
        }
    }

    /// Grace-period reminder with seconds remaining.
    pub fn timeout_warning(remaining: u64) -> Self {
        Self {
            data: Some(EventData::Remaining { remaining }),
            ..Self::new(EventKind::TimeoutWarning)
        }
    }

    /// Grace window elapsed.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(EventKind::Timeout)
        }
    }

    /// Kicked for post-start inactivity.
    pub fn inactive_timeout(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(EventKind::InactiveTimeout)
        }
    }

    /// The session is over.
    pub fn session_end(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(EventKind::SessionEnd)
        }
    }

    /// Acknowledged voluntary disconnect.
    pub fn bye(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(EventKind::Bye)
        }
    }

    /// Serialize to one wire line (without the trailing newline).
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
