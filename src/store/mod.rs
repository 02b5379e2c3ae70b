pub mod canonical;
pub mod vector;

pub use canonical::CanonicalStore;
pub use vector::{claim_key, evidence_key, Embedder, HttpEmbedder, VectorMatch, VectorStore};
