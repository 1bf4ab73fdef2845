//! Conversation Messages
//!
//! Ordered turn history exchanged with the model. Messages are immutable
//! once appended; ordering is the sole source of conversational context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (model) response
    Assistant,
    /// Tool result fed back as context
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content
    pub content: String,

    /// Timestamp of append
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Tool bookkeeping (tool-role messages only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

/// Metadata attached to tool-role messages
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// ID of the invocation this result answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Name of the tool that produced this result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Whether the tool execution succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool result message
    pub fn tool(
        content: impl Into<String>,
        tool_name: impl Into<String>,
        tool_call_id: Option<String>,
        success: bool,
    ) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.metadata = Some(MessageMetadata {
            tool_call_id,
            tool_name: Some(tool_name.into()),
            success: Some(success),
        });
        msg
    }

    /// Estimate token count (rough ~4 chars per token)
    pub fn estimate_tokens(&self) -> u32 {
        (self.content.len() / 4) as u32 + 4
    }
}

/// Conversation history with explicit reset semantics
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut conv = Self::new();
        conv.push(Message::system(prompt));
        conv
    }

    /// Append a message (messages are never edited or reordered)
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a whole committed round at once
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    /// Get all messages in append order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Clear the conversation to empty. The only destructive mutation.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// Estimate total tokens in the conversation
    pub fn estimate_tokens(&self) -> u32 {
        self.messages.iter().map(Message::estimate_tokens).sum()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether the conversation starts with a system message
    pub fn has_system_prompt(&self) -> bool {
        self.messages.first().map(|m| m.role) == Some(Role::System)
    }

    /// Insert the system prompt at the head if none is present
    pub fn ensure_system_prompt(&mut self, prompt: impl Into<String>) {
        if !self.has_system_prompt() {
            self.messages.insert(0, Message::system(prompt));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(msg.metadata.is_none());
    }

    #[test]
    fn test_tool_message_metadata() {
        let msg = Message::tool("output", "web_search", Some("call-1".into()), true);
        let meta = msg.metadata.unwrap();
        assert_eq!(meta.tool_name.as_deref(), Some("web_search"));
        assert_eq!(meta.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(meta.success, Some(true));
    }

    #[test]
    fn test_ordering_preserved() {
        let mut conv = Conversation::with_system_prompt("You are helpful.");
        conv.push(Message::user("Hi"));
        conv.push(Message::assistant("Hello!"));

        assert_eq!(conv.len(), 3);
        assert_eq!(conv.messages()[1].role, Role::User);
        assert_eq!(conv.last().unwrap().role, Role::Assistant);
    }

    #[test]
    fn test_reset_yields_empty_regardless_of_length() {
        let mut conv = Conversation::with_system_prompt("sys");
        for i in 0..50 {
            conv.push(Message::user(format!("msg {}", i)));
        }
        conv.reset();
        assert!(conv.is_empty());
        assert_eq!(conv.len(), 0);

        let mut empty = Conversation::new();
        empty.reset();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_ensure_system_prompt_idempotent() {
        let mut conv = Conversation::new();
        conv.push(Message::user("hi"));
        conv.ensure_system_prompt("sys");
        conv.ensure_system_prompt("other");
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[0].content, "sys");
    }
}
