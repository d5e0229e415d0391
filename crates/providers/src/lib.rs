//! Provider implementations for Taskloom.
//!
//! - [`http::HttpGenerativeProvider`] — OpenAI-compatible completions
//! - [`embedding::HttpEmbeddingProvider`] — OpenAI-compatible embeddings
//! - [`local`] — deterministic in-process providers (no network)

pub mod embedding;
pub mod http;
pub mod local;

pub use embedding::HttpEmbeddingProvider;
pub use http::HttpGenerativeProvider;
pub use local::{HashEmbedder, StaticProvider, UnavailableEmbedder, UnavailableProvider};
