use anyhow::Result;
use facematch::storage::{self, ArtifactPaths};
use facematch::{Error, Gallery, IndexKind, Metadata, Params, SearchParams, SimilarityIndex};
use std::fs;

fn unit(angle_deg: f32) -> Vec<f32> {
    let r = angle_deg.to_radians();
    vec![r.cos(), r.sin()]
}

fn sample(n: usize, kind: IndexKind) -> Result<(SimilarityIndex, Metadata)> {
    let vectors: Vec<Vec<f32>> = (0..n).map(|i| unit(i as f32 * 7.0)).collect();
    let identities = (0..n as i64).map(|i| i / 2).collect();
    let sources = (0..n).map(|i| format!("faces/{i:06}.jpg")).collect();
    let params = Params {
        kind,
        ..Params::with_dim(2)
    };
    Ok((SimilarityIndex::build(vectors, params)?, Metadata::new(identities, sources)?))
}

#[test]
fn blob_round_trip_preserves_results() -> Result<()> {
    for kind in [IndexKind::Flat, IndexKind::Hnsw] {
        let (index, _) = sample(40, kind)?;
        let restored = SimilarityIndex::from_bytes(&index.to_bytes()?)?;
        assert_eq!(restored.len(), index.len());
        assert_eq!(restored.params(), index.params());
        for slot in 0..index.len() {
            assert_eq!(restored.vector(slot), index.vector(slot));
        }
        for angle in [0.0, 33.0, 101.0, 250.0] {
            assert_eq!(restored.search(&unit(angle), 10)?, index.search(&unit(angle), 10)?);
        }
    }
    Ok(())
}

#[test]
fn artifacts_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (index, metadata) = sample(12, IndexKind::Flat)?;
    let expected = facematch::query(&unit(14.0), 3, 8, &index, &metadata)?;

    let paths = storage::save(dir.path(), &index, &metadata)?;
    assert_eq!(paths, ArtifactPaths::in_dir(dir.path()));
    assert!(paths.index.exists() && paths.identities.exists() && paths.sources.exists());

    let gallery = Gallery::open(dir.path(), SearchParams { top_k: 3, overfetch: 8 })?;
    assert_eq!(gallery.metadata(), &metadata);
    assert_eq!(gallery.query(&unit(14.0))?, expected);
    Ok(())
}

#[test]
fn no_temp_files_remain() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (index, metadata) = sample(4, IndexKind::Flat)?;
    storage::save(dir.path(), &index, &metadata)?;
    let leftovers = fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);
    Ok(())
}

#[test]
fn mismatched_artifacts_are_rejected() -> Result<()> {
    let big = tempfile::tempdir()?;
    let small = tempfile::tempdir()?;
    let (index, metadata) = sample(6, IndexKind::Flat)?;
    storage::save(big.path(), &index, &metadata)?;
    let (index, metadata) = sample(3, IndexKind::Flat)?;
    let small_paths = storage::save(small.path(), &index, &metadata)?;

    fs::copy(&small_paths.identities, big.path().join(storage::IDENTITIES_FILE))?;
    let err = storage::load(big.path()).err();
    assert!(matches!(err, Some(Error::ArtifactInconsistency(_))));
    Ok(())
}

#[test]
fn save_refuses_out_of_sync_metadata() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (index, _) = sample(4, IndexKind::Flat)?;
    let metadata = Metadata::new(vec![1], vec!["a.jpg".into()])?;
    let err = storage::save(dir.path(), &index, &metadata).err();
    assert!(matches!(err, Some(Error::ArtifactInconsistency(_))));
    assert!(!ArtifactPaths::in_dir(dir.path()).index.exists());
    Ok(())
}

#[test]
fn missing_artifacts_are_io_errors() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let err = Gallery::open(dir.path(), SearchParams::default()).err();
    assert!(matches!(err, Some(Error::Io(_))));
    Ok(())
}

#[test]
fn corrupted_index_is_not_loaded() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (index, metadata) = sample(4, IndexKind::Flat)?;
    let paths = storage::save(dir.path(), &index, &metadata)?;
    fs::write(&paths.index, b"garbage")?;
    assert!(storage::load(dir.path()).is_err());
    Ok(())
}

#[test]
fn half_written_rebuild_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let params = Params::with_dim(2);

    let first = SimilarityIndex::build(vec![unit(0.0), unit(90.0)], params)?;
    let first_meta = Metadata::new(vec![1, 2], vec!["a0".into(), "a1".into()])?;
    storage::save(dir.path(), &first, &first_meta)?;

    // the index rename cannot happen; metadata files are already replaced
    fs::create_dir(dir.path().join(format!("{}.tmp", storage::INDEX_FILE)))?;
    let second = SimilarityIndex::build(vec![unit(90.0), unit(0.0)], params)?;
    let second_meta = Metadata::new(vec![2, 1], vec!["b0".into(), "b1".into()])?;
    assert!(storage::save(dir.path(), &second, &second_meta).is_err());

    let err = Gallery::open(dir.path(), SearchParams { top_k: 1, overfetch: 2 }).err();
    assert!(matches!(err, Some(Error::ArtifactInconsistency(_))));
    Ok(())
}

#[test]
fn failed_write_removes_temp_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let blocked = dir.path().join(storage::INDEX_FILE);
    fs::create_dir(&blocked)?;
    fs::write(blocked.join("keep"), b"x")?;

    let (index, metadata) = sample(2, IndexKind::Flat)?;
    assert!(storage::save(dir.path(), &index, &metadata).is_err());
    assert!(!dir.path().join(format!("{}.tmp", storage::INDEX_FILE)).exists());
    Ok(())
}
