//! Conversation messages passed to an operation as prior history.
//!
//! Messages are plain role/content pairs. They are hashed as part of a
//! cache key, so they deliberately carry no ids or timestamps: two identical
//! histories must serialize to identical bytes.

use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Assistant messages that only carry a keyword-extraction payload.
    fn is_keyword_extraction(&self) -> bool {
        self.role == Role::Assistant
            && (self.content.starts_with("{ \"high_level_keywords\"")
                || self.content.starts_with("{'high_level_keywords'"))
    }
}

/// Render the most recent `num_turns` complete user/assistant turns.
///
/// Keyword-extraction replies are skipped. Messages are then paired two at a
/// time; a pair counts as a turn only if it holds one user and one assistant
/// message (in either order), and the user side is always printed first.
pub fn conversation_turns(history: &[Message], num_turns: usize) -> String {
    if num_turns == 0 {
        return String::new();
    }

    let messages: Vec<&Message> = history
        .iter()
        .filter(|m| !m.is_keyword_extraction())
        .collect();

    let mut turns: Vec<(&Message, &Message)> = Vec::new();
    for pair in messages.chunks_exact(2) {
        match (pair[0].role, pair[1].role) {
            (Role::User, Role::Assistant) => turns.push((pair[0], pair[1])),
            (Role::Assistant, Role::User) => turns.push((pair[1], pair[0])),
            _ => {}
        }
    }

    let skip = turns.len().saturating_sub(num_turns);
    turns[skip..]
        .iter()
        .flat_map(|(user, assistant)| {
            [
                format!("user: {}", user.content),
                format!("assistant: {}", assistant.content),
            ]
        })
        .collect::<Vec<_>>()
        .join("\n")
}
