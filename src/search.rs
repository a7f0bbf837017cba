//! Top-k search over distinct identities.
//!
//! The index is asked for `overfetch` raw hits; the scan keeps the first hit
//! of each identity, in rank order, until `desired_k` identities are found.
//! Fewer results than `desired_k` is a successful answer: the overfetch is
//! fixed and never widened on shortfall.

use rayon::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::SearchParams;
use crate::error::{Error, Result};
use crate::extractor::{extract_query, EmbeddingExtractor};
use crate::index::SimilarityIndex;
use crate::metrics::{normalize, similarity};
use crate::storage;
use crate::types::{
    CompareResponse, Comparison, Hit, Identity, Metadata, QueryResponse, SearchResult,
};

/// Keeps the first hit of each identity, in order, up to `desired_k`.
pub fn dedup_top_k(
    hits: &[Hit],
    metadata: &Metadata,
    desired_k: usize,
) -> Result<Vec<SearchResult>> {
    let mut seen: HashSet<Identity> = HashSet::with_capacity(desired_k);
    let mut results = Vec::with_capacity(desired_k);
    for hit in hits {
        if results.len() == desired_k {
            break;
        }
        let (Some(identity), Some(source)) =
            (metadata.identity(hit.slot), metadata.source(hit.slot))
        else {
            return Err(Error::ArtifactInconsistency(format!(
                "slot {} has no metadata ({} entries)",
                hit.slot,
                metadata.len()
            )));
        };
        if seen.insert(identity) {
            results.push(SearchResult {
                slot: hit.slot,
                source: source.to_string(),
                identity,
                score: hit.score,
            });
        }
    }
    Ok(results)
}

pub fn query(
    embedding: &[f32],
    desired_k: usize,
    overfetch_n: usize,
    index: &SimilarityIndex,
    metadata: &Metadata,
) -> Result<Vec<SearchResult>> {
    if desired_k == 0 {
        return Err(Error::InvalidK("desired_k must be at least 1".into()));
    }
    if overfetch_n < desired_k {
        return Err(Error::InvalidK(format!(
            "overfetch ({overfetch_n}) must be >= desired_k ({desired_k})"
        )));
    }
    let hits = index.search(embedding, overfetch_n)?;
    let results = dedup_top_k(&hits, metadata, desired_k)?;
    if results.len() < desired_k {
        debug!(
            "{} distinct identities among {} raw hits, wanted {}",
            results.len(),
            hits.len(),
            desired_k
        );
    }
    Ok(results)
}

/// Cosine similarity of two embeddings, normalizing both first.
pub fn compare(a: &[f32], b: &[f32]) -> Result<Comparison> {
    if a.len() != b.len() {
        return Err(Error::dimension(a.len(), b.len()));
    }
    let (mut a, mut b) = (a.to_vec(), b.to_vec());
    if !normalize(&mut a) || !normalize(&mut b) {
        return Err(Error::InvalidVector("zero or non-finite norm".into()));
    }
    let s = similarity(&a, &b);
    Ok(Comparison {
        similarity: s,
        match_percentage: s * 100.0,
    })
}

pub fn compare_images<E: EmbeddingExtractor + ?Sized>(
    extractor: &E,
    a: &Path,
    b: &Path,
) -> CompareResponse {
    match compare_paths(extractor, a, b) {
        Ok(c) => CompareResponse::compared(c),
        Err(Error::ExtractionFailure(_)) => {
            CompareResponse::failure("Could not extract face from one or both images")
        }
        Err(e) => CompareResponse::failure(e.to_string()),
    }
}

fn compare_paths<E: EmbeddingExtractor + ?Sized>(
    extractor: &E,
    a: &Path,
    b: &Path,
) -> Result<Comparison> {
    let ea = extract_query(extractor, a)?;
    let eb = extract_query(extractor, b)?;
    compare(&ea, &eb)
}

/// Read-only snapshot of a built index and its metadata. Safe to share
/// across threads; queries take `&self`.
pub struct Gallery {
    index: SimilarityIndex,
    metadata: Metadata,
    params: SearchParams,
}

impl Gallery {
    pub fn new(index: SimilarityIndex, metadata: Metadata, params: SearchParams) -> Result<Self> {
        if index.len() != metadata.len() {
            return Err(Error::ArtifactInconsistency(format!(
                "index holds {} vectors but metadata holds {} entries",
                index.len(),
                metadata.len()
            )));
        }
        Ok(Self {
            index,
            metadata,
            params,
        })
    }

    pub fn open<P: AsRef<Path>>(dir: P, params: SearchParams) -> Result<Self> {
        let (index, metadata) = storage::load(dir)?;
        Self::new(index, metadata, params)
    }

    pub fn query(&self, embedding: &[f32]) -> Result<Vec<SearchResult>> {
        self.query_with(embedding, self.params.top_k, self.params.overfetch)
    }

    pub fn query_with(
        &self,
        embedding: &[f32],
        desired_k: usize,
        overfetch_n: usize,
    ) -> Result<Vec<SearchResult>> {
        query(embedding, desired_k, overfetch_n, &self.index, &self.metadata)
    }

    pub fn query_batch(&self, embeddings: &[Vec<f32>]) -> Result<Vec<Vec<SearchResult>>> {
        embeddings.par_iter().map(|e| self.query(e)).collect()
    }

    /// Searches with a raw embedding, normalizing it first.
    pub fn query_embedding(&self, embedding: &[f32]) -> QueryResponse {
        let mut vector = embedding.to_vec();
        if !normalize(&mut vector) {
            return QueryResponse::failure("embedding has zero or non-finite norm");
        }
        match self.query(&vector) {
            Ok(results) => QueryResponse::matches(None, results),
            Err(e) => QueryResponse::failure(e.to_string()),
        }
    }

    /// Extracts the query embedding from `image` and searches with it.
    /// Failures are reported in the response, never as a panic or `Err`.
    pub fn query_image<E: EmbeddingExtractor + ?Sized>(
        &self,
        extractor: &E,
        image: &Path,
    ) -> QueryResponse {
        let outcome = extract_query(extractor, image).and_then(|e| self.query(&e));
        match outcome {
            Ok(results) => QueryResponse::matches(Some(image.display().to_string()), results),
            Err(Error::ExtractionFailure(msg)) => {
                warn!("{msg}");
                QueryResponse::failure("Could not extract face from image")
            }
            Err(e) => QueryResponse::failure(e.to_string()),
        }
    }

    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
