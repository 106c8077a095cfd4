//! Hybrid search combining full-text and vector rankings
//!
//! Reciprocal Rank Fusion merges the two ranked lists into one. Each
//! document receives `sum_r weight_r / (k + rank_r)` where `rank_r` is its
//! 1-based position in ranker `r` and `k` (default 60) keeps top ranks
//! from dominating. Only the first occurrence of a document within a
//! single list counts; a document in both lists gets both contributions.

use std::collections::BTreeMap;

use crate::storage::{SearchResult, StorageBackend};

/// Standard RRF smoothing constant.
pub const DEFAULT_RRF_K: usize = 60;

/// Run hybrid search against `storage`, fusing BM25 and vector rankings.
///
/// Each ranker is asked for `3 * limit` candidates. When the lexical
/// ranker returns nothing, a fuzzy name search substitutes for it. When
/// `query_embedding` is `None` only the lexical side contributes.
pub fn hybrid_search(
    query: &str,
    storage: &dyn StorageBackend,
    query_embedding: Option<&[f32]>,
    limit: usize,
    fts_weight: f32,
    vector_weight: f32,
    rrf_k: usize,
) -> Vec<SearchResult> {
    if limit == 0 {
        return Vec::new();
    }

    let candidate_limit = limit * 3;

    let mut fts_results = storage.fts_search(query, candidate_limit);
    if fts_results.is_empty() {
        fts_results = storage.fuzzy_search(query, candidate_limit, 2);
    }

    let vector_results = match query_embedding {
        Some(vector) => storage.vector_search(vector, candidate_limit),
        None => Vec::new(),
    };

    let mut scores: BTreeMap<String, f32> = BTreeMap::new();
    let mut metadata: BTreeMap<String, SearchResult> = BTreeMap::new();

    accumulate_ranks(&fts_results, fts_weight, rrf_k, &mut scores, &mut metadata);
    accumulate_ranks(&vector_results, vector_weight, rrf_k, &mut scores, &mut metadata);

    let mut merged: Vec<SearchResult> = scores
        .into_iter()
        .filter_map(|(node_id, score)| {
            metadata.remove(&node_id).map(|mut r| {
                r.score = score;
                r
            })
        })
        .collect();

    merged.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    merged.truncate(limit);
    merged
}

/// Add RRF contributions from a single ranked list. Duplicate node ids
/// within the list are ignored after their first occurrence, but ranks
/// keep counting positions.
fn accumulate_ranks(
    results: &[SearchResult],
    weight: f32,
    k: usize,
    scores: &mut BTreeMap<String, f32>,
    metadata: &mut BTreeMap<String, SearchResult>,
) {
    let mut seen: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();
    for (position, result) in results.iter().enumerate() {
        if !seen.insert(result.node_id.as_str()) {
            continue;
        }
        let rank = position + 1;
        *scores.entry(result.node_id.clone()).or_insert(0.0) += weight / (k + rank) as f32;
        metadata
            .entry(result.node_id.clone())
            .or_insert_with(|| result.clone());
    }
}
