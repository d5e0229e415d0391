//! # Taskloom Core
//!
//! Domain types, traits, and error definitions for the Taskloom multi-agent
//! coordination runtime. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod artifact;
pub mod error;
pub mod event;
pub mod namespace;
pub mod provider;
pub mod record;
pub mod store;
pub mod task;
pub mod vector;

// Re-export key types at crate root for ergonomics
pub use artifact::{ArtifactClass, classify_path, collection_for_path};
pub use error::{
    AgentError, CoordinatorError, Error, ProviderError, Result, StorageError,
};
pub use event::{DomainEvent, EventBus};
pub use namespace::Namespace;
pub use provider::{EmbeddingProvider, GenerativeProvider};
pub use record::{
    ApprovalRequest, FileChangeEvent, MemoryKind, MemoryRecord, ProjectState,
};
pub use store::{ClaimOutcome, RecordStore, TaskStore, VectorStore};
pub use task::{ExecutionReport, Task, TaskPayload, TaskStatus, TaskType};
pub use vector::{Collection, VectorEntry, VectorMatch, VectorPayload};
