use std::sync::Arc;

use ollama_chat_core::{
    ChatSession, Config, ConversationStore, EndpointConfig, InferenceError, Message, OllamaClient,
};
use ratatui::widgets::ListState;
use tokio::sync::mpsc;
use tracing::warn;

pub type ModelListing = Result<Vec<String>, InferenceError>;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    pub should_quit: bool,
    pub session: ChatSession,

    // Input cursor, in characters into `session.input`
    pub cursor: usize,

    // Chat scroll state
    pub chat_scroll: u16,
    pub follow_tail: bool,
    pub chat_height: u16,
    pub chat_width: u16,

    pub animation_frame: u8,

    // Popups
    pub show_clear_confirm: bool,
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,
    /// A `list_models` call is running in the background
    pub loading_models: bool,
    model_listing_tx: mpsc::UnboundedSender<ModelListing>,
    /// Finished model listings, drained by the event loop
    pub model_listings: mpsc::UnboundedReceiver<ModelListing>,

    /// One-line message shown in the footer until the next key press
    pub notice: Option<String>,
}

impl App {
    /// Must be called inside the tokio runtime: the client probes on creation.
    pub fn new(endpoint: EndpointConfig) -> Self {
        let store = Arc::new(ConversationStore::new());
        let client = OllamaClient::new(endpoint);
        let (model_listing_tx, model_listings) = mpsc::unbounded_channel();

        Self {
            should_quit: false,
            session: ChatSession::new(store, client),
            cursor: 0,
            chat_scroll: 0,
            follow_tail: true,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
            show_clear_confirm: false,
            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),
            loading_models: false,
            model_listing_tx,
            model_listings,
            notice: None,
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.session.messages()
    }

    // Input editing
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.session.input, self.cursor);
        self.session.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, text: &str) {
        // Pasted CRLF shows up as two line breaks otherwise
        for c in text.chars().filter(|c| *c != '\r') {
            self.insert_char(c);
        }
    }

    pub fn delete_before_cursor(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.session.input, self.cursor);
            self.session.input.remove(byte_pos);
        }
    }

    pub fn delete_at_cursor(&mut self) {
        if self.cursor < self.input_len() {
            let byte_pos = char_to_byte_index(&self.session.input, self.cursor);
            self.session.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input_len());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input_len();
    }

    fn input_len(&self) -> usize {
        self.session.input.chars().count()
    }

    /// Keeps the cursor inside the buffer after the session consumed it.
    pub fn sync_cursor(&mut self) {
        self.cursor = self.cursor.min(self.input_len());
    }

    /// (row, column) of the cursor within the input text
    pub fn cursor_position(&self) -> (usize, usize) {
        let before: String = self.session.input.chars().take(self.cursor).collect();
        let row = before.matches('\n').count();
        let col = before.rsplit('\n').next().map_or(0, |line| line.chars().count());
        (row, col)
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Chat scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_tail = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }

    // Clear confirmation
    pub fn answer_clear(&mut self, confirmed: bool) {
        self.show_clear_confirm = false;
        if self.session.request_clear(|| confirmed) {
            self.chat_scroll = 0;
            self.follow_tail = true;
        }
    }

    // Model picker methods

    /// Starts fetching the installed models. The result arrives on
    /// `model_listings` and goes to [`finish_model_listing`](Self::finish_model_listing).
    pub fn request_models(&mut self) {
        if self.loading_models {
            return;
        }
        self.loading_models = true;
        self.notice = Some("Loading models...".to_string());

        let client = self.session.client().clone();
        let tx = self.model_listing_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(client.list_models().await);
        });
    }

    pub fn finish_model_listing(&mut self, listing: ModelListing) {
        self.loading_models = false;
        self.notice = None;
        match listing {
            Ok(models) => self.open_model_picker(models),
            Err(err) => self.notice = Some(err.to_string()),
        }
    }

    pub fn open_model_picker(&mut self, models: Vec<String>) {
        if models.is_empty() {
            self.notice = Some("No models installed. Pull one with: ollama pull <model>".to_string());
            return;
        }
        // Select current model if in list, otherwise first
        let current_idx = models
            .iter()
            .position(|m| m == &self.session.selected_model)
            .unwrap_or(0);
        self.available_models = models;
        self.model_picker_state.select(Some(current_idx));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        if let Some(i) = self.model_picker_state.selected() {
            if let Some(model) = self.available_models.get(i) {
                self.session.selected_model = model.clone();
                self.session.change_model();
                self.show_model_picker = false;
                if let Err(err) = Config::save_default_model(model) {
                    warn!(error = %err, "could not persist default model");
                }
            }
        }
    }
}
