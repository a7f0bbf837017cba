use anyhow::Result;
use facematch::{EmbeddingStore, Error, IndexKind, Params, SimilarityIndex};

fn unit(angle_deg: f32) -> Vec<f32> {
    let r = angle_deg.to_radians();
    vec![r.cos(), r.sin()]
}

/// Deterministic pseudo-random unit vectors (xorshift).
fn gallery(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407) | 1;
    (0..n)
        .map(|_| {
            let mut v: Vec<f32> = (0..dim)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    (state >> 40) as f32 / (1u64 << 24) as f32 - 0.5
                })
                .collect();
            facematch::metrics::normalize(&mut v);
            v
        })
        .collect()
}

fn params(dim: usize, kind: IndexKind) -> Params {
    Params {
        kind,
        ..Params::with_dim(dim)
    }
}

#[test]
fn exact_query_hits_itself_first() -> Result<()> {
    let vectors = vec![vec![1.0, 0.0], unit(36.87), unit(53.13), vec![0.0, 1.0], vec![-1.0, 0.0]];
    let index = SimilarityIndex::build(vectors, Params::with_dim(2))?;
    let hits = index.search(&[1.0, 0.0], 5)?;
    let slots: Vec<usize> = hits.iter().map(|h| h.slot).collect();
    assert_eq!(slots, vec![0, 1, 2, 3, 4]);
    assert_eq!(hits[0].score, 1.0);
    assert_eq!(hits[4].score, -1.0);
    Ok(())
}

#[test]
fn scores_stay_in_unit_range() -> Result<()> {
    for kind in [IndexKind::Flat, IndexKind::Hnsw] {
        let vectors = gallery(200, 16, 1);
        let queries = gallery(20, 16, 2);
        let index = SimilarityIndex::build(vectors, params(16, kind))?;
        for q in &queries {
            let hits = index.search(q, 30)?;
            assert!(!hits.is_empty());
            for h in &hits {
                assert!((-1.0..=1.0).contains(&h.score), "score {} out of range", h.score);
            }
            for pair in hits.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
        }
    }
    Ok(())
}

#[test]
fn equal_scores_order_by_slot() -> Result<()> {
    let vectors = vec![unit(90.0), unit(10.0), unit(10.0), unit(10.0)];
    let index = SimilarityIndex::build(vectors, Params::with_dim(2))?;
    let hits = index.search(&unit(10.0), 4)?;
    let slots: Vec<usize> = hits.iter().map(|h| h.slot).collect();
    assert_eq!(slots, vec![1, 2, 3, 0]);
    Ok(())
}

#[test]
fn hnsw_finds_indexed_vectors() -> Result<()> {
    let vectors = gallery(100, 8, 3);
    let index = SimilarityIndex::build(vectors.clone(), params(8, IndexKind::Hnsw))?;
    for (slot, v) in vectors.iter().enumerate().step_by(7) {
        let hits = index.search(v, 1)?;
        assert_eq!(hits[0].slot, slot);
    }
    Ok(())
}

#[test]
fn build_is_idempotent() -> Result<()> {
    for kind in [IndexKind::Flat, IndexKind::Hnsw] {
        let a = SimilarityIndex::build(gallery(64, 8, 4), params(8, kind))?;
        let b = SimilarityIndex::build(gallery(64, 8, 4), params(8, kind))?;
        for slot in 0..64 {
            assert_eq!(a.vector(slot), b.vector(slot));
        }
        for q in gallery(5, 8, 5) {
            assert_eq!(a.search(&q, 10)?, b.search(&q, 10)?);
        }
    }
    Ok(())
}

#[test]
fn empty_build_fails() {
    let err = SimilarityIndex::build(Vec::new(), Params::with_dim(2)).unwrap_err();
    assert!(matches!(err, Error::EmptyInput));
    let err = SimilarityIndex::build(Vec::new(), params(2, IndexKind::Hnsw)).unwrap_err();
    assert!(matches!(err, Error::EmptyInput));
}

#[test]
fn invalid_queries_are_rejected() -> Result<()> {
    let index = SimilarityIndex::build(vec![vec![1.0, 0.0], vec![0.0, 1.0]], Params::with_dim(2))?;
    assert!(matches!(index.search(&[1.0, 0.0, 0.0], 1), Err(Error::InvalidVector(_))));
    assert!(matches!(index.search(&[3.0, 4.0], 1), Err(Error::InvalidVector(_))));
    assert!(matches!(index.search(&[f32::NAN, 1.0], 1), Err(Error::InvalidVector(_))));
    assert!(matches!(index.search(&[1.0, 0.0], 0), Err(Error::InvalidK(_))));
    // the index is still usable
    assert_eq!(index.search(&[1.0, 0.0], 1)?[0].slot, 0);
    Ok(())
}

#[test]
fn k_is_clamped_to_index_size() -> Result<()> {
    let index = SimilarityIndex::build(vec![vec![1.0, 0.0], vec![0.0, 1.0]], Params::with_dim(2))?;
    assert_eq!(index.search(&[1.0, 0.0], 10)?.len(), 2);
    Ok(())
}

#[test]
fn non_unit_vectors_are_rejected_at_build() {
    let err = SimilarityIndex::build(vec![vec![1.0, 0.0], vec![2.0, 0.0]], Params::with_dim(2));
    assert!(matches!(err, Err(Error::InvalidVector(_))));
}

#[test]
fn store_feeds_index() -> Result<()> {
    let mut store = EmbeddingStore::new(2);
    store.append_normalized(vec![10.0, 0.0], 1, "a.jpg")?;
    store.append(unit(45.0), 2, "b.jpg")?;
    assert!(store.append(vec![1.0], 3, "c.jpg").is_err());
    let (vectors, identities, sources) = store.finalize();
    assert_eq!(identities, vec![1, 2]);
    assert_eq!(sources.len(), 2);
    let index = SimilarityIndex::build(vectors, Params::with_dim(2))?;
    assert_eq!(index.len(), 2);
    assert_eq!(index.search(&unit(44.0), 1)?[0].slot, 1);
    Ok(())
}
