//! Embedder trait and vector utilities.
//!
//! Defines the [`Embedder`] trait used by the
//! [`VectorIndex`](crate::similarity::VectorIndex), the deterministic
//! [`HashEmbedder`] that ships as the default implementation, and pure
//! helpers for similarity computation and BLOB serialization.
//!
//! The hashed bag-of-words embedding is a stand-in for a learned model:
//! each token's count is added to slot `H(token) mod dim`, where `H` is the
//! first eight bytes of the token's SHA-256 digest. The hash is stable
//! across processes and platforms, so the same text always embeds to the
//! same vector.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::text::tokenize;

/// Default vector dimensionality for [`HashEmbedder`].
pub const DEFAULT_EMBEDDING_DIM: usize = 256;

/// Trait for embedding backends.
///
/// Implementations must be deterministic: embedding the same text twice
/// yields the same vector, and every vector has length [`dims`](Embedder::dims).
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"hash-bow-256"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed one text.
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Hashed bag-of-words embedder.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
    model_name: String,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            model_name: format!("hash-bow-{}", dims),
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIM)
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        hash_embedding(text, self.dims)
    }
}

/// Scatter token counts of `text` into a `dim`-length vector.
///
/// Returns an empty vector when `dim == 0`.
///
/// ```rust
/// use lextree_core::embedding::hash_embedding;
///
/// let v = hash_embedding("fine fine penalty", 256);
/// assert_eq!(v.len(), 256);
/// assert_eq!(v.iter().sum::<f32>(), 3.0);
/// ```
pub fn hash_embedding(text: &str, dim: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dim];
    if dim == 0 {
        return vector;
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }

    for (token, count) in counts {
        let slot = (token_hash(&token) % dim as u64) as usize;
        vector[slot] += count as f32;
    }
    vector
}

/// Stable 64-bit token hash.
fn token_hash(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use lextree_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`]. Trailing partial values are dropped.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, and
/// zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
