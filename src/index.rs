//! Inner-product similarity index over unit vectors.
//!
//! Results are ordered by descending score, ties broken by ascending slot.
//! The HNSW backend only proposes candidates; their scores are recomputed
//! exactly so both backends rank the same way.

use hnsw::Searcher;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use space::Neighbor;
use std::cmp::Ordering;
use tracing::{debug, info};

use crate::config::Params;
use crate::error::{Error, Result};
use crate::metrics::{check_unit, similarity, Graph, InnerProductMetric};
use crate::types::{Hit, IndexKind, Slot};

pub const MAGIC: [u8; 4] = *b"FMX0";
pub const VERSION: u8 = 1;

const M: usize = 12;
const M0: usize = 24;

enum Backend {
    Flat(Vec<Vec<f32>>),
    Hnsw(Box<Graph<M, M0>>),
}

#[derive(Serialize, Deserialize)]
struct StoredIndex {
    magic: [u8; 4],
    version: u8,
    params: Params,
    vectors: Vec<Vec<f32>>,
}

pub struct SimilarityIndex {
    params: Params,
    len: usize,
    backend: Backend,
}

impl SimilarityIndex {
    pub fn build(vectors: Vec<Vec<f32>>, params: Params) -> Result<Self> {
        if vectors.is_empty() {
            return Err(Error::EmptyInput);
        }
        for (slot, v) in vectors.iter().enumerate() {
            check_unit(v, params.dim, params.norm_epsilon)
                .map_err(|e| Error::InvalidVector(format!("slot {slot}: {e}")))?;
        }
        let len = vectors.len();
        let backend = match params.kind {
            IndexKind::Flat => Backend::Flat(vectors),
            IndexKind::Hnsw => {
                let hnsw_params = hnsw::Params::new().ef_construction(params.ef_construction);
                let mut graph = Graph::<M, M0>::new_params(InnerProductMetric, hnsw_params);
                let mut searcher = Searcher::default();
                for v in vectors {
                    graph.insert(v, &mut searcher);
                }
                Backend::Hnsw(Box::new(graph))
            }
        };
        info!(
            "Built {:?} index: {} vectors, dim={}",
            params.kind, len, params.dim
        );
        Ok(Self {
            params,
            len,
            backend,
        })
    }

    /// Top `k` hits for `query`. `k` larger than the index is clamped to its size.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
        if k == 0 {
            return Err(Error::InvalidK("k must be at least 1".into()));
        }
        check_unit(query, self.params.dim, self.params.norm_epsilon)?;
        let real_k = k.min(self.len);
        let mut hits: Vec<Hit> = match &self.backend {
            Backend::Flat(vectors) => vectors
                .par_iter()
                .enumerate()
                .map(|(slot, v)| Hit {
                    slot,
                    score: similarity(query, v),
                })
                .collect(),
            Backend::Hnsw(graph) => {
                let mut neighbors = vec![
                    Neighbor {
                        index: !0,
                        distance: !0
                    };
                    real_k
                ];
                let mut searcher = Searcher::default();
                let q = query.to_vec();
                let found = graph.nearest(
                    &q,
                    self.params.ef_search.max(real_k),
                    &mut searcher,
                    &mut neighbors,
                );
                found
                    .iter()
                    .filter(|n| n.index < self.len)
                    .map(|n| Hit {
                        slot: n.index,
                        score: similarity(query, graph.feature(n.index)),
                    })
                    .collect()
            }
        };
        top_k(&mut hits, real_k);
        debug!("search returned {} of {} requested hits", hits.len(), k);
        Ok(hits)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dimension(&self) -> usize {
        self.params.dim
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn vector(&self, slot: Slot) -> Option<&[f32]> {
        if slot >= self.len {
            return None;
        }
        match &self.backend {
            Backend::Flat(vectors) => Some(vectors[slot].as_slice()),
            Backend::Hnsw(graph) => Some(graph.feature(slot).as_slice()),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let vectors = (0..self.len)
            .filter_map(|slot| self.vector(slot).map(<[f32]>::to_vec))
            .collect();
        let stored = StoredIndex {
            magic: MAGIC,
            version: VERSION,
            params: self.params,
            vectors,
        };
        Ok(bincode::serialize(&stored)?)
    }

    /// Rebuilds the index from a blob. Graph construction is seeded, so the
    /// rebuilt HNSW graph matches the serialized one.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let stored: StoredIndex = bincode::deserialize(bytes)?;
        if stored.magic != MAGIC {
            return Err(Error::ArtifactInconsistency("invalid index magic".into()));
        }
        if stored.version != VERSION {
            return Err(Error::ArtifactInconsistency(format!(
                "unsupported index version {}",
                stored.version
            )));
        }
        Self::build(stored.vectors, stored.params)
    }
}

/// Score descending, then slot ascending. Slots are unique, so this is a
/// strict total order and the selected top `k` set is unambiguous.
fn by_rank(a: &Hit, b: &Hit) -> Ordering {
    OrderedFloat(b.score)
        .cmp(&OrderedFloat(a.score))
        .then(a.slot.cmp(&b.slot))
}

/// Keeps the best `k` hits in rank order without sorting the whole scan.
fn top_k(hits: &mut Vec<Hit>, k: usize) {
    if k == 0 {
        hits.clear();
        return;
    }
    if k < hits.len() {
        hits.select_nth_unstable_by(k - 1, by_rank);
        hits.truncate(k);
    }
    hits.sort_by(by_rank);
}
