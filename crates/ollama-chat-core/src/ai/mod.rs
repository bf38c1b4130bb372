pub mod error;
pub mod ollama;

pub use error::InferenceError;
pub use ollama::OllamaClient;
