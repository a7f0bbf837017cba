//! Batch ingestion: images -> embeddings -> store -> index -> artifacts.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extractor::EmbeddingExtractor;
use crate::identity::IdentityMap;
use crate::index::SimilarityIndex;
use crate::storage::{self, ArtifactPaths};
use crate::store::EmbeddingStore;
use crate::types::{Identity, Metadata};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    pub listed: usize,
    pub indexed: usize,
    pub unlabeled: usize,
    pub no_face: usize,
    pub failed: usize,
    pub rejected: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub stats: BuildStats,
    pub artifacts: ArtifactPaths,
}

pub struct IndexBuilder<'a, E: EmbeddingExtractor + ?Sized> {
    extractor: &'a E,
    config: Config,
}

impl<'a, E: EmbeddingExtractor + ?Sized> IndexBuilder<'a, E> {
    pub fn new(extractor: &'a E, config: Config) -> Self {
        Self { extractor, config }
    }

    /// Regular files directly under `dir` that the extractor accepts, sorted
    /// by file name so slot assignment does not depend on directory order.
    pub fn list_images<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        let mut images = Vec::new();
        for entry in WalkDir::new(dir.as_ref())
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if !self.extractor.accepts(entry.path()) {
                continue;
            }
            images.push(entry.into_path());
        }
        if let Some(max) = self.config.build.max_images {
            images.truncate(max);
        }
        Ok(images)
    }

    /// Extracts embeddings on a bounded worker pool and appends them in
    /// listing order. Per-image failures are counted, never fatal.
    pub fn ingest(
        &self,
        images: &[PathBuf],
        identities: &IdentityMap,
    ) -> Result<(EmbeddingStore, BuildStats)> {
        let mut stats = BuildStats {
            listed: images.len(),
            ..BuildStats::default()
        };

        let labeled: Vec<(&PathBuf, Identity)> = images
            .iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?;
                match identities.get(name) {
                    Some(id) => Some((path, *id)),
                    None => {
                        debug!("no identity for {}", path.display());
                        None
                    }
                }
            })
            .collect();
        stats.unlabeled = images.len() - labeled.len();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.build.workers)
            .build()
            .map_err(|e| Error::Config(format!("worker pool: {e}")))?;
        let extracted: Vec<_> = pool.install(|| {
            labeled
                .par_iter()
                .map(|(path, id)| (*path, *id, self.extract_one(path)))
                .collect()
        });

        let mut store = EmbeddingStore::with_params(&self.config.index);
        for (path, identity, outcome) in extracted {
            match outcome {
                Ok(Some(vector)) => {
                    let source = path.display().to_string();
                    match store.append_normalized(vector, identity, source) {
                        Ok(_) => stats.indexed += 1,
                        Err(e) => {
                            warn!("rejected {}: {e}", path.display());
                            stats.rejected += 1;
                        }
                    }
                }
                Ok(None) => {
                    debug!("no face in {}", path.display());
                    stats.no_face += 1;
                }
                Err(e) => {
                    warn!("extraction failed for {}: {e}", path.display());
                    stats.failed += 1;
                }
            }
        }
        Ok((store, stats))
    }

    /// A panicking extractor fails only the image it was given.
    fn extract_one(&self, image: &Path) -> anyhow::Result<Option<Vec<f32>>> {
        panic::catch_unwind(AssertUnwindSafe(|| self.extractor.extract(image))).unwrap_or_else(
            |payload| {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(anyhow::anyhow!("extractor panicked: {msg}"))
            },
        )
    }

    pub fn build<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        source_dir: P,
        identities: &IdentityMap,
        artifact_dir: Q,
    ) -> Result<BuildReport> {
        let images = self.list_images(source_dir.as_ref())?;
        info!(
            "Indexing {} images from {}",
            images.len(),
            source_dir.as_ref().display()
        );
        let (store, stats) = self.ingest(&images, identities)?;
        let (vectors, ids, sources) = store.finalize();
        let index = SimilarityIndex::build(vectors, self.config.index)?;
        let metadata = Metadata::new(ids, sources)?;
        let artifacts = storage::save(artifact_dir, &index, &metadata)?;
        info!(
            "Indexed {} faces ({} unlabeled, {} without face, {} failed, {} rejected)",
            stats.indexed, stats.unlabeled, stats.no_face, stats.failed, stats.rejected
        );
        Ok(BuildReport { stats, artifacts })
    }
}

pub fn build_index<E, P, Q>(
    extractor: &E,
    config: Config,
    source_dir: P,
    identities: &IdentityMap,
    artifact_dir: Q,
) -> Result<BuildReport>
where
    E: EmbeddingExtractor + ?Sized,
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    IndexBuilder::new(extractor, config).build(source_dir, identities, artifact_dir)
}
