//! Orchestration of a chat session.
//!
//! `ChatSession` turns user actions into store and client operations. It
//! owns the presentation-facing input buffer and model selection, and holds
//! the session's subscriptions so that a front end can render from it.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ai::OllamaClient;
use crate::state::{ConnectivityStatus, Message};
use crate::store::ConversationStore;

pub const FALLBACK_ERROR: &str = "An error occurred while processing your request.";

/// Keys the session reacts to. Everything else is left to the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitKey {
    Enter,
    Other,
}

pub struct ChatSession {
    store: Arc<ConversationStore>,
    client: OllamaClient,

    /// Text typed but not yet sent
    pub input: String,
    /// Model picked in the front end; pushed to the client by `change_model`
    pub selected_model: String,

    messages: Option<watch::Receiver<Vec<Message>>>,
    pending: Option<watch::Receiver<bool>>,
    connectivity: Option<watch::Receiver<ConnectivityStatus>>,

    cancel: CancellationToken,
    in_flight: Option<AbortHandle>,
}

impl ChatSession {
    /// Takes ownership of the client; tearing the session down also stops
    /// the client's probes.
    pub fn new(store: Arc<ConversationStore>, client: OllamaClient) -> Self {
        let selected_model = client.get_current_model();
        Self {
            messages: Some(store.observe_messages()),
            pending: Some(store.observe_pending()),
            connectivity: Some(client.observe_connectivity()),
            store,
            client,
            input: String::new(),
            selected_model,
            cancel: CancellationToken::new(),
            in_flight: None,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn client(&self) -> &OllamaClient {
        &self.client
    }

    /// Send the current input. Returns the handle of the generate task, or
    /// `None` when the input is blank, a response is pending, or the session
    /// was torn down.
    pub fn submit(&mut self) -> Option<JoinHandle<()>> {
        let prompt = self.input.trim().to_string();
        if prompt.is_empty() || self.store.is_pending() || self.cancel.is_cancelled() {
            return None;
        }

        self.store.append(self.store.create_user_message(prompt.clone()));
        self.input.clear();
        self.store.set_pending(true);

        let store = self.store.clone();
        let client = self.client.clone();
        let model = self.selected_model.clone();
        let cancel = self.cancel.clone();

        info!(%model, prompt_len = prompt.len(), "submitting prompt");
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("generate dropped by teardown");
                }
                result = client.generate(&prompt, Some(&model)) => {
                    let message = match result {
                        Ok(text) => store.create_assistant_message(text),
                        Err(err) => {
                            warn!(error = %err, "generate failed");
                            store.create_error_message(error_text(&err.to_string()))
                        }
                    };
                    store.append(message);
                    store.set_pending(false);
                }
            }
        });
        self.in_flight = Some(handle.abort_handle());
        Some(handle)
    }

    /// Returns `true` when the key was consumed. Shift+Enter is left to the
    /// front end so it can insert a newline.
    pub fn handle_key_submit(&mut self, key: SubmitKey, shift_held: bool) -> bool {
        if key == SubmitKey::Enter && !shift_held {
            self.submit();
            true
        } else {
            false
        }
    }

    /// Clears the conversation only if `confirm` answers yes.
    pub fn request_clear(&self, confirm: impl FnOnce() -> bool) -> bool {
        if !confirm() {
            return false;
        }
        info!("conversation cleared");
        self.store.clear();
        true
    }

    pub fn change_model(&self) {
        self.client.set_model(self.selected_model.clone());
    }

    pub fn refresh_connectivity(&self) {
        self.client.check_connectivity();
    }

    pub fn connectivity(&self) -> ConnectivityStatus {
        self.connectivity
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or_default()
    }

    pub fn status_class(&self) -> &'static str {
        self.connectivity().css_class()
    }

    pub fn status_label(&self) -> &'static str {
        self.connectivity().label()
    }

    /// Latest conversation snapshot; empty once torn down.
    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .as_ref()
            .map(|rx| rx.borrow().clone())
            .unwrap_or_default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves when any observed value changes. Never resolves after teardown.
    pub async fn changed(&mut self) {
        match (&mut self.messages, &mut self.pending, &mut self.connectivity) {
            (Some(messages), Some(pending), Some(connectivity)) => {
                tokio::select! {
                    _ = messages.changed() => {}
                    _ = pending.changed() => {}
                    _ = connectivity.changed() => {}
                }
            }
            _ => std::future::pending().await,
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drops all subscriptions and cancels the in-flight generate call and
    /// any probes. Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        debug!("tearing down chat session");
        self.cancel.cancel();
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        self.client.shutdown();
        self.messages = None;
        self.pending = None;
        self.connectivity = None;
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn error_text(message: &str) -> String {
    if message.trim().is_empty() {
        FALLBACK_ERROR.to_string()
    } else {
        message.to_string()
    }
}
