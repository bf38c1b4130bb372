//! Conversation history and the "response pending" flag.
//!
//! Both values live in `tokio::sync::watch` channels, so every observer sees
//! the latest snapshot as soon as it subscribes and every later mutation
//! after that.

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use crate::state::{Message, WELCOME_MESSAGE};

pub struct ConversationStore {
    messages: watch::Sender<Vec<Message>>,
    pending: watch::Sender<bool>,
}

impl ConversationStore {
    /// A new store always holds exactly the greeting message.
    pub fn new() -> Self {
        let (messages, _) = watch::channel(vec![Message::assistant(WELCOME_MESSAGE)]);
        let (pending, _) = watch::channel(false);
        Self { messages, pending }
    }

    pub fn observe_messages(&self) -> watch::Receiver<Vec<Message>> {
        self.messages.subscribe()
    }

    pub fn observe_pending(&self) -> watch::Receiver<bool> {
        self.pending.subscribe()
    }

    /// Stream yielding the current snapshot first, then one item per mutation
    pub fn message_stream(&self) -> WatchStream<Vec<Message>> {
        WatchStream::new(self.observe_messages())
    }

    pub fn pending_stream(&self) -> WatchStream<bool> {
        WatchStream::new(self.observe_pending())
    }

    pub fn create_user_message(&self, content: impl Into<String>) -> Message {
        Message::user(content)
    }

    pub fn create_assistant_message(&self, content: impl Into<String>) -> Message {
        Message::assistant(content)
    }

    pub fn create_error_message(&self, content: impl Into<String>) -> Message {
        Message::error(content)
    }

    pub fn append(&self, message: Message) {
        debug!(id = %message.id, kind = ?message.kind, "appending message");
        self.messages.send_modify(|messages| messages.push(message));
    }

    /// Drop the history and reseed it with the greeting, in one emission.
    pub fn clear(&self) {
        debug!("clearing conversation");
        self.messages
            .send_replace(vec![Message::assistant(WELCOME_MESSAGE)]);
    }

    pub fn set_pending(&self, pending: bool) {
        self.pending.send_replace(pending);
    }

    pub fn is_pending(&self) -> bool {
        *self.pending.borrow()
    }

    pub fn get_messages(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{MessageKind, Sender};
    use futures_util::StreamExt;

    #[test]
    fn starts_with_greeting() {
        let store = ConversationStore::new();
        let messages = store.get_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, Sender::Assistant);
        assert!(messages[0].content.contains("Hello"));
        assert!(!store.is_pending());
    }

    #[test]
    fn append_keeps_insertion_order() {
        let store = ConversationStore::new();
        let first = store.create_user_message("one");
        let second = store.create_assistant_message("two");
        let third = store.create_error_message("three");
        store.append(first.clone());
        store.append(second.clone());
        store.append(third.clone());

        let messages = store.get_messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1..], [first, second, third]);
    }

    #[test]
    fn duplicate_content_is_not_deduplicated() {
        let store = ConversationStore::new();
        store.append(store.create_user_message("same"));
        store.append(store.create_user_message("same"));
        assert_eq!(store.get_messages().len(), 3);
    }

    #[test]
    fn clear_reseeds_greeting() {
        let store = ConversationStore::new();
        for i in 0..5 {
            store.append(store.create_user_message(format!("msg {i}")));
        }
        store.clear();

        let messages = store.get_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, Sender::Assistant);
        assert_eq!(messages[0].kind, MessageKind::Assistant);
        assert_eq!(messages[0].content, WELCOME_MESSAGE);
    }

    #[test]
    fn late_subscriber_sees_current_snapshot() {
        let store = ConversationStore::new();
        store.append(store.create_user_message("before subscribe"));

        let rx = store.observe_messages();
        assert_eq!(rx.borrow().len(), 2);
        assert_eq!(rx.borrow()[1].content, "before subscribe");
    }

    #[test]
    fn receivers_are_notified_on_mutation() {
        let store = ConversationStore::new();
        let mut messages = store.observe_messages();
        let mut pending = store.observe_pending();
        assert!(!messages.has_changed().unwrap());
        assert!(!pending.has_changed().unwrap());

        store.append(store.create_user_message("x"));
        store.set_pending(true);

        assert!(messages.has_changed().unwrap());
        assert_eq!(messages.borrow_and_update().len(), 2);
        assert!(pending.has_changed().unwrap());
        assert!(*pending.borrow_and_update());
    }

    #[tokio::test]
    async fn stream_replays_latest_then_updates() {
        let store = ConversationStore::new();
        store.append(store.create_user_message("already here"));

        let mut stream = store.message_stream();
        let first = stream.next().await.unwrap();
        assert_eq!(first.len(), 2);

        store.clear();
        let second = stream.next().await.unwrap();
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn pending_stream_replays_latest() {
        let store = ConversationStore::new();
        store.set_pending(true);

        let mut stream = store.pending_stream();
        assert!(stream.next().await.unwrap());

        store.set_pending(false);
        assert!(!stream.next().await.unwrap());
    }
}
