use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Dense position of an entry inside the index and its metadata arrays.
pub type Slot = usize;

/// Label grouping every image of one person.
pub type Identity = i64;

#[repr(u8)]
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Exact brute-force scan.
    #[default]
    Flat = 1,
    /// Approximate HNSW graph.
    Hnsw = 2,
}

/// A raw hit returned by the similarity index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub slot: Slot,
    pub score: f32,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SearchResult {
    pub slot: Slot,
    pub source: String,
    pub identity: Identity,
    pub score: f32,
}

/// Slot-indexed identity labels and source references.
///
/// Both arrays always have the same length; the constructor enforces it.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Metadata {
    identities: Vec<Identity>,
    sources: Vec<String>,
}

impl Metadata {
    pub fn new(identities: Vec<Identity>, sources: Vec<String>) -> Result<Self> {
        if identities.len() != sources.len() {
            return Err(Error::ArtifactInconsistency(format!(
                "{} identities but {} sources",
                identities.len(),
                sources.len()
            )));
        }
        Ok(Self { identities, sources })
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn identity(&self, slot: Slot) -> Option<Identity> {
        self.identities.get(slot).copied()
    }

    pub fn source(&self, slot: Slot) -> Option<&str> {
        self.sources.get(slot).map(String::as_str)
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }
}

/// JSON envelope for a query: `{"success": true, "results": [...]}` or
/// `{"success": false, "error": "..."}`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct QueryResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SearchResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    pub fn matches(query: Option<String>, results: Vec<SearchResult>) -> Self {
        Self {
            success: true,
            results: Some(results),
            query,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            results: None,
            query: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Comparison {
    pub similarity: f32,
    pub match_percentage: f32,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct CompareResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_percentage: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompareResponse {
    pub fn compared(c: Comparison) -> Self {
        Self {
            success: true,
            similarity_score: Some(c.similarity),
            match_percentage: Some(c.match_percentage),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            similarity_score: None,
            match_percentage: None,
            error: Some(error.into()),
        }
    }
}
