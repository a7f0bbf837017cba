//! On-disk artifacts: one index blob plus two slot-indexed metadata arrays.
//!
//! Every file is written to a temporary sibling and renamed into place.
//! All three headers carry the same build stamp, a blake3 digest over the
//! whole build, and `load` refuses files whose stamps disagree. A reader
//! racing a rebuild, or a rebuild that failed halfway, gets an error
//! instead of metadata paired with the wrong index.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::index::SimilarityIndex;
use crate::types::{Identity, Metadata};

pub const MAGIC: [u8; 4] = *b"FMM1";
pub const VERSION: u8 = 2;

pub const INDEX_FILE: &str = "index.bin";
pub const IDENTITIES_FILE: &str = "identities.bin";
pub const SOURCES_FILE: &str = "sources.bin";

type Stamp = [u8; 32];

#[derive(Serialize, Deserialize)]
struct Header {
    magic: [u8; 4],
    version: u8,
    stamp: Stamp,
    len: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub index: PathBuf,
    pub identities: PathBuf,
    pub sources: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            index: dir.join(INDEX_FILE),
            identities: dir.join(IDENTITIES_FILE),
            sources: dir.join(SOURCES_FILE),
        }
    }
}

pub fn save<P: AsRef<Path>>(
    dir: P,
    index: &SimilarityIndex,
    metadata: &Metadata,
) -> Result<ArtifactPaths> {
    if index.len() != metadata.len() {
        return Err(Error::ArtifactInconsistency(format!(
            "index holds {} vectors but metadata holds {} entries",
            index.len(),
            metadata.len()
        )));
    }
    fs::create_dir_all(dir.as_ref())?;
    let paths = ArtifactPaths::in_dir(dir);
    info!("Saving {} entries to {}", index.len(), paths.index.display());

    let blob = index.to_bytes()?;
    let identities = bincode::serialize(metadata.identities())?;
    let sources = bincode::serialize(metadata.sources())?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(&blob);
    hasher.update(&identities);
    hasher.update(&sources);
    let stamp: Stamp = *hasher.finalize().as_bytes();
    let len = index.len() as u64;

    write_atomic(&paths.identities, &header(stamp, len), &identities)?;
    write_atomic(&paths.sources, &header(stamp, len), &sources)?;
    write_atomic(&paths.index, &header(stamp, len), &blob)?;

    info!("Artifacts saved");
    Ok(paths)
}

pub fn load<P: AsRef<Path>>(dir: P) -> Result<(SimilarityIndex, Metadata)> {
    let paths = ArtifactPaths::in_dir(dir);
    info!("Loading artifacts from {}", paths.index.display());

    let (index_header, blob) = read_artifact(&paths.index)?;
    let (id_header, identities) = read_artifact(&paths.identities)?;
    let (src_header, sources) = read_artifact(&paths.sources)?;

    if id_header.stamp != index_header.stamp || src_header.stamp != index_header.stamp {
        return Err(Error::ArtifactInconsistency(
            "artifacts come from different builds".into(),
        ));
    }

    let index = SimilarityIndex::from_bytes(&blob)?;
    let identities: Vec<Identity> = decode_array(&identities, &id_header, &paths.identities)?;
    let sources: Vec<String> = decode_array(&sources, &src_header, &paths.sources)?;

    if index_header.len != index.len() as u64
        || identities.len() != index.len()
        || sources.len() != index.len()
    {
        return Err(Error::ArtifactInconsistency(format!(
            "index holds {} vectors, identities {}, sources {}",
            index.len(),
            identities.len(),
            sources.len()
        )));
    }
    let metadata = Metadata::new(identities, sources)?;
    info!("Loaded {} entries", index.len());
    Ok((index, metadata))
}

fn header(stamp: Stamp, len: u64) -> Header {
    Header {
        magic: MAGIC,
        version: VERSION,
        stamp,
        len,
    }
}

fn write_atomic(path: &Path, header: &Header, body: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let written =
        write_file(&tmp, header, body).and_then(|()| fs::rename(&tmp, path).map_err(Error::from));
    if written.is_err() {
        if let Err(e) = fs::remove_file(&tmp) {
            warn!("could not remove {}: {e}", tmp.display());
        }
    }
    written
}

fn write_file(path: &Path, header: &Header, body: &[u8]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, header)?;
    writer.write_all(body)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

fn read_artifact(path: &Path) -> Result<(Header, Vec<u8>)> {
    let mut reader = BufReader::new(File::open(path)?);
    let header: Header = bincode::deserialize_from(&mut reader)?;
    if header.magic != MAGIC {
        return Err(Error::ArtifactInconsistency(format!(
            "invalid magic in {}",
            path.display()
        )));
    }
    if header.version != VERSION {
        return Err(Error::ArtifactInconsistency(format!(
            "unsupported version {} in {}",
            header.version,
            path.display()
        )));
    }
    let mut body = Vec::new();
    reader.read_to_end(&mut body)?;
    Ok((header, body))
}

fn decode_array<T: DeserializeOwned>(body: &[u8], header: &Header, path: &Path) -> Result<Vec<T>> {
    let items: Vec<T> = bincode::deserialize(body)?;
    if items.len() as u64 != header.len {
        return Err(Error::ArtifactInconsistency(format!(
            "{} declares {} entries but holds {}",
            path.display(),
            header.len,
            items.len()
        )));
    }
    Ok(items)
}
