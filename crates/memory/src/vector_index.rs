//! In-process vector index — named collections of fixed-dimension vectors.
//!
//! Pure-Rust cosine ranking over namespace-filtered payloads. The dimension
//! recorded at collection creation is authoritative: an upsert or search
//! with any other length fails loudly. A mixed-dimension collection is
//! corrupt, and silently accepting one vector of the wrong size would make
//! every similarity score in that collection meaningless.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use taskloom_core::error::StorageError;
use taskloom_core::namespace::Namespace;
use taskloom_core::store::VectorStore;
use taskloom_core::vector::{Collection, VectorEntry, VectorMatch};
use tokio::sync::RwLock;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 =
/// opposite. Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

struct CollectionData {
    dimension: usize,
    entries: HashMap<String, VectorEntry>,
}

/// An in-process [`VectorStore`].
#[derive(Default)]
pub struct InMemoryVectorIndex {
    collections: Arc<RwLock<HashMap<Collection, CollectionData>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create every known collection with one shared dimension.
    pub async fn with_all_collections(dimension: usize) -> Result<Self, StorageError> {
        let index = Self::new();
        for collection in Collection::all() {
            index.create_collection(collection, dimension).await?;
        }
        Ok(index)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create_collection(
        &self,
        collection: Collection,
        dimension: usize,
    ) -> Result<(), StorageError> {
        let mut collections = self.collections.write().await;
        match collections.get(&collection) {
            Some(existing) if existing.dimension == dimension => Ok(()),
            Some(existing) => Err(StorageError::DimensionMismatch {
                collection: collection.as_str().into(),
                expected: existing.dimension,
                actual: dimension,
            }),
            None => {
                collections.insert(
                    collection,
                    CollectionData {
                        dimension,
                        entries: HashMap::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn upsert(&self, collection: Collection, entry: VectorEntry) -> Result<(), StorageError> {
        let mut collections = self.collections.write().await;
        let data = collections
            .get_mut(&collection)
            .ok_or_else(|| StorageError::UnknownCollection(collection.as_str().into()))?;

        if entry.vector.len() != data.dimension {
            return Err(StorageError::DimensionMismatch {
                collection: collection.as_str().into(),
                expected: data.dimension,
                actual: entry.vector.len(),
            });
        }

        data.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn search(
        &self,
        collection: Collection,
        namespace: &Namespace,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorMatch>, StorageError> {
        let collections = self.collections.read().await;
        let data = collections
            .get(&collection)
            .ok_or_else(|| StorageError::UnknownCollection(collection.as_str().into()))?;

        if query.len() != data.dimension {
            return Err(StorageError::DimensionMismatch {
                collection: collection.as_str().into(),
                expected: data.dimension,
                actual: query.len(),
            });
        }

        let mut matches: Vec<VectorMatch> = data
            .entries
            .values()
            .filter(|e| e.payload.namespace == *namespace)
            .map(|e| VectorMatch {
                id: e.id.clone(),
                score: cosine_similarity(&e.vector, query),
                payload: e.payload.clone(),
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn delete(&self, collection: Collection, ids: &[String]) -> Result<usize, StorageError> {
        let mut collections = self.collections.write().await;
        let data = collections
            .get_mut(&collection)
            .ok_or_else(|| StorageError::UnknownCollection(collection.as_str().into()))?;

        let mut removed = 0;
        for id in ids {
            if data.entries.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
