//! Ollama backend client for Emberchat.

mod ollama;

pub use ollama::OllamaBackend;
