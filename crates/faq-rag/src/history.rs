//! Local conversation history for chat mode

use crate::providers::{Message, Role};

/// Ordered, role-tagged transcript seeded with one system entry
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    system: Message,
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            system: Message::system(system_instruction),
            messages: Vec::new(),
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    pub fn push_model(&mut self, text: impl Into<String>) {
        self.messages.push(Message::model(text));
    }

    /// Drop a trailing user message that never got an answer
    pub fn rollback_unanswered(&mut self) -> Option<Message> {
        match self.messages.last() {
            Some(last) if last.role == Role::User => self.messages.pop(),
            _ => None,
        }
    }

    /// Keep at most `max` recent messages, opening on a user turn
    pub fn retain_recent(&mut self, max: usize) {
        let start = self.messages.len().saturating_sub(max);
        let skip = self.messages[start..]
            .iter()
            .take_while(|m| m.role != Role::User)
            .count();
        self.messages.drain(..start + skip);
    }

    /// Forget everything except the system entry
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// All messages, system entry first
    pub fn messages(&self) -> Vec<Message> {
        std::iter::once(self.system.clone())
            .chain(self.messages.iter().cloned())
            .collect()
    }

    /// System entry plus at most `max` recent messages, starting on a user turn
    pub fn window(&self, max: usize) -> Vec<Message> {
        let start = self.messages.len().saturating_sub(max);
        let recent = self.messages[start..]
            .iter()
            .skip_while(|m| m.role != Role::User);

        std::iter::once(self.system.clone())
            .chain(recent.cloned())
            .collect()
    }

    /// Number of messages excluding the system entry
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
