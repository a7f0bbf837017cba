//! Boundary to the external face-embedding model.

use std::path::Path;

use crate::error::{Error, Result};
use crate::metrics::normalize;

/// Produces one embedding for the most prominent face in an image.
///
/// `Ok(None)` means no face was found or the image could not be decoded.
/// An `Err` is treated as a failure of that one image only.
pub trait EmbeddingExtractor: Send + Sync {
    fn extract(&self, image: &Path) -> anyhow::Result<Option<Vec<f32>>>;

    /// Whether a file found while listing a source directory is an image
    /// this extractor should be given.
    fn accepts(&self, _path: &Path) -> bool {
        true
    }
}

impl<F> EmbeddingExtractor for F
where
    F: Fn(&Path) -> anyhow::Result<Option<Vec<f32>>> + Send + Sync,
{
    fn extract(&self, image: &Path) -> anyhow::Result<Option<Vec<f32>>> {
        self(image)
    }
}

/// Reads precomputed embeddings from `<image>.json` files holding a JSON
/// array of floats. A missing sidecar counts as "no face".
#[derive(Clone, Debug, Default)]
pub struct SidecarExtractor;

impl SidecarExtractor {
    pub fn sidecar_path(image: &Path) -> std::path::PathBuf {
        let mut path = image.as_os_str().to_owned();
        path.push(".json");
        path.into()
    }
}

impl EmbeddingExtractor for SidecarExtractor {
    fn extract(&self, image: &Path) -> anyhow::Result<Option<Vec<f32>>> {
        let path = Self::sidecar_path(image);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let vector: Vec<f32> = serde_json::from_str(&content)?;
        Ok(if vector.is_empty() { None } else { Some(vector) })
    }

    fn accepts(&self, path: &Path) -> bool {
        !path.extension().is_some_and(|ext| ext == "json")
    }
}

/// Extracts and normalizes the embedding of a single query image.
pub fn extract_query<E: EmbeddingExtractor + ?Sized>(
    extractor: &E,
    image: &Path,
) -> Result<Vec<f32>> {
    let mut vector = match extractor.extract(image) {
        Ok(Some(v)) => v,
        Ok(None) => {
            return Err(Error::ExtractionFailure(format!(
                "could not extract face from {}",
                image.display()
            )))
        }
        Err(e) => {
            return Err(Error::ExtractionFailure(format!(
                "extractor failed on {}: {e}",
                image.display()
            )))
        }
    };
    if !normalize(&mut vector) {
        return Err(Error::InvalidVector("zero or non-finite norm".into()));
    }
    Ok(vector)
}
