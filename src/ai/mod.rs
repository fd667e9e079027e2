mod backend;
mod generator;
mod prompt;

pub use backend::{GeminiBackend, GenerationBackend, DEFAULT_GEMINI_MODEL};
pub use generator::ContentGenerator;
