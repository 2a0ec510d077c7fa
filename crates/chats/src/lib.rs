//! # CircleUp Chats Crate
//!
//! Message persistence for 1:1 conversations and group chats.
//!
//! A conversation stores its two participants as a canonical ordered pair,
//! so the same unordered pair always resolves to one row; the storage-level
//! uniqueness constraint settles concurrent first contact. Messages are
//! immutable once written and paginate reverse-chronologically with a
//! `before` cursor. Realtime fan-out happens above this crate, after the
//! write commits.

pub mod entities;
pub mod services;
pub mod types;

pub use entities::{
    Conversation, ConversationSummary, GroupMessage, Message, MessageSnippet, SendMessageRequest,
};
pub use types::{ChatError, ChatResult};

/// Default page size for message history queries. Callers may pass any
/// limit; no maximum is enforced.
pub const DEFAULT_MESSAGE_LIMIT: i64 = 50;
