pub mod compression;
pub mod embedding;
pub mod index;

pub use compression::{cosine_similarity, CompressedVector, QuantizationBits, ScalarQuantizer, SparseRandomProjection};
pub use embedding::{Embedding, EmbeddingService, HashingEmbeddingService};
pub use index::VectorIndex;
