//! Wire types for the arena protocol.
//!
//! Every frame is a JSON object tagged by a lowercase `"type"` field.
//! Clients send [`ClientCommand`]s; the server answers with
//! [`ServerEvent`]s, some addressed to the sender and some broadcast to
//! the other mages in the arena.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A command sent by a client.
///
/// Missing string fields decode as empty strings so that validation,
/// not decoding, decides what an incomplete command means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientCommand {
    /// Create an account.
    Register {
        #[serde(default)]
        username: String,
        #[serde(default)]
        password: String,
    },

    /// Authenticate and enter the arena.
    Join {
        #[serde(default)]
        username: String,
        #[serde(default)]
        password: String,
    },

    /// Attack another mage in the arena.
    Fireball {
        #[serde(default)]
        target: String,
    },

    /// Any well-formed frame whose `type` is not a known command.
    #[serde(other)]
    Unknown,
}

impl ClientCommand {
    /// The wire name of the command, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Join { .. } => "join",
            Self::Fireball { .. } => "fireball",
            Self::Unknown => "unknown",
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// An event pushed by the server to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    /// The roster at connection time.
    Mages { mages: Vec<String> },

    /// A command succeeded and has nothing else to say.
    Response { message: String },

    /// A command failed; the connection stays open.
    Error { message: String },

    /// Someone entered the arena.
    Joined { username: String },

    /// Someone left the arena.
    Left { username: String },

    /// Sent to a mage after a successful join.
    Health { hp: i32, mages: Vec<String> },

    /// The receiving mage was hit.
    Attack {
        from: String,
        #[serde(rename = "currentHP")]
        current_hp: i32,
    },

    /// A mage died. The victim gets `by` and `message`; everyone else
    /// gets `username` and `killer`.
    Died {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        by: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        killer: Option<String>,
    },
}

impl ServerEvent {
    /// `{type:"response", message:"ok"}`.
    pub fn ok() -> Self {
        Self::Response {
            message: "ok".to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn joined(username: impl Into<String>) -> Self {
        Self::Joined {
            username: username.into(),
        }
    }

    pub fn left(username: impl Into<String>) -> Self {
        Self::Left {
            username: username.into(),
        }
    }

    pub fn attack(from: impl Into<String>, current_hp: i32) -> Self {
        Self::Attack {
            from: from.into(),
            current_hp,
        }
    }

    /// The notice delivered to the mage that just died.
    pub fn slain(by: impl Into<String>) -> Self {
        Self::Died {
            by: Some(by.into()),
            message: Some("busted".to_string()),
            username: None,
            killer: None,
        }
    }

    /// The notice broadcast to everyone else when a mage dies.
    pub fn died(username: impl Into<String>, killer: impl Into<String>) -> Self {
        Self::Died {
            by: None,
            message: None,
            username: Some(username.into()),
            killer: Some(killer.into()),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
