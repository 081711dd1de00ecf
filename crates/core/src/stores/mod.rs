pub mod opensearch;
pub mod qdrant;

pub use opensearch::{OpenSearchAuth, OpenSearchStore};
pub use qdrant::QdrantStore;
