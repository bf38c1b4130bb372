pub mod ai;
pub mod config;
pub mod session;
pub mod state;
pub mod store;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use ai::{InferenceError, OllamaClient};
pub use config::Config;
pub use session::{ChatSession, SubmitKey};
pub use state::{ConnectivityStatus, EndpointConfig, Message, MessageKind, Sender, WELCOME_MESSAGE};
pub use store::ConversationStore;
