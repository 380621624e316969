//! Turn history for a single query.

use crate::types::Message;

/// Append-only sequence of turns scoped to one query or task.
///
/// Turns are only ever pushed; the whole value is dropped when the query
/// completes.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Start a conversation with the user's opening turn.
    pub fn new(query: &str) -> Self {
        Self {
            messages: vec![Message::user(query)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
