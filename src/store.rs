use crate::config::Params;
use crate::error::{Error, Result};
use crate::metrics::{check_unit, normalize};
use crate::types::{Identity, Slot};

/// Slot-indexed parallel arrays filled during a build.
///
/// A failed append leaves the store unchanged.
pub struct EmbeddingStore {
    dim: usize,
    epsilon: f32,
    vectors: Vec<Vec<f32>>,
    identities: Vec<Identity>,
    sources: Vec<String>,
}

impl EmbeddingStore {
    pub fn new(dim: usize) -> Self {
        Self::with_params(&Params::with_dim(dim))
    }

    pub fn with_params(params: &Params) -> Self {
        Self {
            dim: params.dim,
            epsilon: params.norm_epsilon,
            vectors: Vec::new(),
            identities: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Appends an already unit-normalized vector.
    pub fn append(
        &mut self,
        vector: Vec<f32>,
        identity: Identity,
        source: impl Into<String>,
    ) -> Result<Slot> {
        check_unit(&vector, self.dim, self.epsilon)?;
        let slot = self.vectors.len();
        self.vectors.push(vector);
        self.identities.push(identity);
        self.sources.push(source.into());
        Ok(slot)
    }

    /// Normalizes `vector` first, then appends it.
    pub fn append_normalized(
        &mut self,
        mut vector: Vec<f32>,
        identity: Identity,
        source: impl Into<String>,
    ) -> Result<Slot> {
        if vector.len() != self.dim {
            return Err(Error::dimension(self.dim, vector.len()));
        }
        if !normalize(&mut vector) {
            return Err(Error::InvalidVector("zero or non-finite norm".into()));
        }
        self.append(vector, identity, source)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Hands over the vectors, identities and sources, all indexed by slot.
    pub fn finalize(self) -> (Vec<Vec<f32>>, Vec<Identity>, Vec<String>) {
        (self.vectors, self.identities, self.sources)
    }
}
