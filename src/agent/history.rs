//! Conversation history owned by one agent

use crate::llm::{Message, Role};

/// Ordered, role-tagged messages. The optional leading system message
/// survives [`reset`](ConversationHistory::reset).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    /// History seeded with a system message; a blank prompt seeds nothing
    pub fn new(system_prompt: &str) -> Self {
        let mut messages = Vec::new();
        if !system_prompt.trim().is_empty() {
            messages.push(Message::system(system_prompt));
        }
        Self { messages }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Drop everything after the first `len` messages
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Back to just the system message, if there is one
    pub fn reset(&mut self) {
        let keep = usize::from(self.messages.first().is_some_and(|m| m.role == Role::System));
        self.messages.truncate(keep);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}
