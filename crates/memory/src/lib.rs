//! Memory system for Taskloom — namespace-scoped persistence across a
//! relational store and a vector index.
//!
//! Backends:
//! - [`SqliteStore`] — production store for tasks, records, events, approvals
//! - [`InMemoryStore`] — ephemeral store for tests
//! - [`InMemoryVectorIndex`] — in-process fixed-dimension vector collections
//!
//! [`MemoryManager`] is the facade all agents go through.

pub mod in_memory;
pub mod manager;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod vector_index;

pub use in_memory::InMemoryStore;
pub use manager::MemoryManager;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use vector_index::{InMemoryVectorIndex, cosine_similarity};
