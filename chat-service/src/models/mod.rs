//! Domain models for the chat service.

pub mod conversation;

pub use conversation::{Conversation, Role, Turn, SYSTEM_PROMPT};
