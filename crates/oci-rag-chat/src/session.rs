//! Conversation log owned by the caller
//!
//! Turns are appended in user/assistant pairs only, so the log always has even
//! length and strictly alternates. Nothing is ever removed or reordered.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry in the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Append-only conversation log for one interactive session
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatSession {
    turns: Vec<Turn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed exchange
    pub fn record(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.turns.reserve(2);
        self.turns.push(Turn {
            role: Role::User,
            content: user.into(),
        });
        self.turns.push(Turn {
            role: Role::Assistant,
            content: assistant.into(),
        });
    }

    /// All turns in order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Completed user/assistant exchanges
    pub fn exchanges(&self) -> impl Iterator<Item = (&Turn, &Turn)> {
        self.turns.chunks_exact(2).map(|pair| (&pair[0], &pair[1]))
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent assistant reply
    pub fn last_assistant(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant)
            .map(|t| t.content.as_str())
    }

    /// Write the log as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.turns)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
