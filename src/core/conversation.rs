//! Mutation-guarded conversation history.
//!
//! The history is read by an in-flight network call (as a snapshot) while the
//! foreground may be appending or clearing, so every operation goes through
//! one mutex and readers only ever see defensive copies. The lock is never
//! held across I/O; all critical sections are short memory operations.

use std::sync::Mutex;

use crate::core::message::{Message, Role};

#[derive(Debug, Default)]
pub struct Conversation {
    messages: Mutex<Vec<Message>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, message: Message) {
        self.messages.lock().unwrap().push(message);
    }

    /// Ordered copy of the history. The in-flight stream operates on this
    /// fixed view even if the foreground mutates the conversation before the
    /// call completes.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    /// Replaces the history wholesale. Snapshots taken before the clear
    /// remain valid.
    pub fn clear(&self) {
        *self.messages.lock().unwrap() = Vec::new();
    }

    /// Removes the most recent message if it is a user turn. Called when a
    /// turn's network call fails, so retrying the same input does not
    /// duplicate it in history.
    pub fn rollback_user(&self) {
        let mut messages = self.messages.lock().unwrap();
        if messages.last().is_some_and(|m| m.role == Role::User) {
            messages.pop();
        }
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_snapshot() {
        let conv = Conversation::new();
        conv.append(Message::user("hi"));
        conv.append(Message::assistant("hello"));

        let snap = conv.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].content, "hi");
        assert_eq!(snap[1].role, Role::Assistant);
    }

    #[test]
    fn snapshot_is_a_defensive_copy() {
        let conv = Conversation::new();
        conv.append(Message::user("hi"));

        let snap = conv.snapshot();
        conv.clear();

        // The earlier snapshot is unaffected by the clear.
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].content, "hi");
        assert!(conv.is_empty());
    }

    #[test]
    fn rollback_removes_only_a_trailing_user_turn() {
        let conv = Conversation::new();
        conv.append(Message::user("hi"));
        conv.append(Message::assistant("hello"));
        conv.rollback_user();
        assert_eq!(conv.len(), 2);

        conv.append(Message::user("again"));
        conv.rollback_user();
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.snapshot()[1].role, Role::Assistant);
    }

    #[test]
    fn rollback_on_empty_history_is_a_no_op() {
        let conv = Conversation::new();
        conv.rollback_user();
        assert!(conv.is_empty());
    }
}
