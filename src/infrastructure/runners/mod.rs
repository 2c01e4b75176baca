pub mod ollama;

pub use ollama::Ollama;
