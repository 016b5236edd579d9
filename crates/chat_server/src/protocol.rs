//! Wire envelopes: newline-delimited UTF-8 JSON objects, in both directions.
//!
//! Client to server:
//!   {"type":"command","command":"/join #general","nickname":"alice","timestamp":...}
//! Server to client:
//!   {"type":"response","success":true,"message":"..."}
//!   {"type":"event","event":"message","nickname":...,"channel":...,...}

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One client->server command envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub timestamp: f64,
}

impl CommandEnvelope {
    pub fn new(command: impl Into<String>, nickname: impl Into<String>) -> Self {
        CommandEnvelope {
            kind: "command".to_owned(),
            command: command.into(),
            nickname: nickname.into(),
            timestamp: unix_timestamp(),
        }
    }

    pub fn is_command(&self) -> bool {
        self.kind == "command"
    }
}

/// One server->client frame.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Response { success: bool, message: String },
    Event(Event),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Message {
        nickname: String,
        channel: String,
        message: String,
        timestamp: f64,
    },
    UserJoined {
        nickname: String,
        channel: String,
    },
    UserLeft {
        nickname: String,
        channel: String,
    },
    NickChange {
        old_nickname: String,
        new_nickname: String,
        channel: String,
    },
    ChannelList {
        channels: Vec<ChannelSummary>,
    },
}

/// One `/list` entry: channel name plus member count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelSummary {
    pub name: String,
    pub users: usize,
}

impl ServerFrame {
    pub fn success(message: impl Into<String>) -> Self {
        ServerFrame::Response {
            success: true,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Response {
            success: false,
            message: message.into(),
        }
    }

    /// Serializes the frame as one newline-terminated wire line.
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }
}

/// Seconds since the Unix epoch, fractional.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
