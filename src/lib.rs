//! Face identification over a precomputed embedding gallery.
//!
//! A gallery holds one or more unit-normalized embeddings per identity. The
//! [`SimilarityIndex`] ranks gallery slots by inner product against a query;
//! [`Gallery`] turns that raw ranking into the top-k *distinct* identities.

pub mod builder;
pub mod config;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod index;
pub mod metrics;
pub mod search;
pub mod storage;
pub mod store;
pub mod types;

pub use builder::{build_index, BuildReport, BuildStats, IndexBuilder};
pub use config::{BuildParams, Config, Params, SearchParams};
pub use error::{Error, Result};
pub use extractor::{extract_query, EmbeddingExtractor, SidecarExtractor};
pub use identity::{load_identity_map, parse_identity_map, IdentityMap};
pub use index::SimilarityIndex;
pub use search::{compare, compare_images, dedup_top_k, query, Gallery};
pub use storage::ArtifactPaths;
pub use store::EmbeddingStore;
pub use types::{
    CompareResponse, Comparison, Hit, Identity, IndexKind, Metadata, QueryResponse, SearchResult,
    Slot,
};
