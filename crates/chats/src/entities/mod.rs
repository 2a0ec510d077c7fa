mod conversation;
mod message;

pub use conversation::{Conversation, ConversationSummary, OtherUser};
pub use message::{GroupMessage, Message, MessageSnippet, SendMessageRequest};
