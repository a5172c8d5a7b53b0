// src/services/mod.rs
pub mod gemini;
pub mod media_encoder;
pub mod orchestrator;
pub mod session_store;
pub mod templates;

pub use gemini::{GeminiClient, GenerativeApi};
pub use media_encoder::MediaEncoder;
pub use orchestrator::Orchestrator;
pub use session_store::{SessionStore, SharedSession};
