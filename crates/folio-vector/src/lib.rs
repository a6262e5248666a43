//! Folio Vector - Embedding and similarity search
//!
//! Provides the embedding boundary, an exact inner-product vector store
//! persisted as a vector blob plus a metadata file, and the registry of
//! portfolio, resume and per-repository indexes.

pub mod embedding;
pub mod flat_store;
pub mod index_manager;
#[cfg(feature = "local-model")]
pub mod local_model;

pub use embedding::{
    build_embedding_client, create_embedding_client, l2_normalize, EmbeddingClient,
    HashingEmbedding, LazyEmbedder, OllamaEmbedding, OpenAiEmbedding,
};
pub use flat_store::FlatStore;
pub use index_manager::{IndexManager, IndexSizes};
#[cfg(feature = "local-model")]
pub use local_model::{MiniLmEmbedding, ModelFiles};
