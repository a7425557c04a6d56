//! Conversation model: an identifier-keyed, append-only sequence of turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// System prompt seeded as the first turn of every new conversation.
pub const SYSTEM_PROMPT: &str = "You are a helpful chatbot. Use the conversation history to maintain context and remember important information shared by the user, including their name, preferences, and any details they've mentioned. Be conversational and helpful while building on previous exchanges.";

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A stored conversation, in its wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,

    /// Turns in append order.
    pub messages: Vec<Turn>,

    /// Assigned at first write, rendered as RFC 3339 with millisecond precision.
    #[serde(with = "rfc3339_millis")]
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a conversation record stamped with the current time.
    pub fn new(conversation_id: impl Into<String>, messages: Vec<Turn>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            messages,
            created_at: Utc::now(),
        }
    }

    /// Turns a brand-new conversation starts from.
    pub fn initial_turns() -> Vec<Turn> {
        vec![Turn::system(SYSTEM_PROMPT)]
    }

    /// Whether the turns follow the append discipline: one leading system
    /// turn followed by complete user/assistant pairs.
    pub fn is_well_formed(&self) -> bool {
        let Some((first, rest)) = self.messages.split_first() else {
            return false;
        };

        first.role == Role::System
            && rest.len() % 2 == 0
            && rest.chunks(2).all(|pair| {
                pair[0].role == Role::User && pair[1].role == Role::Assistant
            })
    }
}

mod rfc3339_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
