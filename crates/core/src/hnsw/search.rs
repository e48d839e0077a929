//! HNSW search: single-layer beam search and multi-layer top-k.
//!
//! Both pools are binary heaps: a best-first candidate heap and a bounded
//! results heap that evicts its worst entry, so no per-expansion sorting
//! happens in the hot loop. Scores are higher-is-better throughout.
//!
//! Comparison counting is local to each search and returned in the
//! [`SearchOutcome`]; searches run under a shared lock, so nothing shared is
//! mutated mid-traversal. The struct-level counter is only published once,
//! at the end, for [`HnswStats`](crate::hnsw::HnswStats).

use crate::document::Document;
use crate::hnsw::graph::HnswIndex;
use crate::hnsw::visited::VisitedSet;
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// A search result: matched document plus its similarity score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Similarity score under the collection metric. Higher is better.
    pub score: f64,
    /// The matched document (shared reference).
    pub document: Arc<Document>,
}

/// Everything a top-k search produces.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Matches sorted by descending score, at most `k`.
    pub hits: Vec<SearchHit>,
    /// Score computations performed during this search.
    pub comparisons: u64,
}

/// Candidate pool entry. Max-heap: best score pops first.
#[derive(Debug, PartialEq, Eq)]
struct Candidate {
    score: OrderedFloat<f64>,
    id: u32,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score.cmp(&other.score)
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Results pool entry. Reversed ordering turns `BinaryHeap` into a min-heap,
/// so the worst result pops first when the pool is over capacity.
#[derive(Debug, PartialEq, Eq)]
struct ResultEntry {
    score: OrderedFloat<f64>,
    id: u32,
}

impl Ord for ResultEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.score.cmp(&self.score)
    }
}

impl PartialOrd for ResultEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Beam search over a single layer.
///
/// Returns up to `ef` nodes closest to the query at `layer`, sorted by
/// descending score. Terminates when the best remaining candidate scores
/// strictly below the worst retained result of a full pool. Score
/// computations are tallied into `comparisons`.
pub(crate) fn search_layer(
    index: &HnswIndex,
    query: &[f64],
    entry_points: &[u32],
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
    comparisons: &mut u64,
) -> Vec<(f64, u32)> {
    visited.reset();
    let mut candidates: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<ResultEntry> = BinaryHeap::with_capacity(ef + 1);
    // Cached worst retained score — avoids repeated heap peeks in the hot loop
    let mut worst_score = f64::NEG_INFINITY;

    for &ep in entry_points {
        if visited.mark(ep) {
            let score = index.score_to_query(query, ep, comparisons);
            candidates.push(Candidate {
                score: OrderedFloat(score),
                id: ep,
            });
            results.push(ResultEntry {
                score: OrderedFloat(score),
                id: ep,
            });
            if results.len() >= ef {
                worst_score = results.peek().map_or(f64::NEG_INFINITY, |r| r.score.0);
            }
        }
    }

    while let Some(candidate) = candidates.pop() {
        let c_score = candidate.score.0;

        // Best remaining candidate is worse than everything retained: done.
        if results.len() >= ef && c_score < worst_score {
            break;
        }

        let node = candidate.id as usize;
        let Some(neighbor_list) = index.neighbors[node].get(layer) else {
            continue;
        };

        for &neighbor in neighbor_list {
            if !visited.mark(neighbor) {
                continue;
            }

            let score = index.score_to_query(query, neighbor, comparisons);
            if results.len() < ef || score > worst_score {
                candidates.push(Candidate {
                    score: OrderedFloat(score),
                    id: neighbor,
                });
                results.push(ResultEntry {
                    score: OrderedFloat(score),
                    id: neighbor,
                });
                if results.len() > ef {
                    results.pop(); // evict worst
                }
                if results.len() >= ef {
                    worst_score = results.peek().map_or(f64::NEG_INFINITY, |r| r.score.0);
                }
            }
        }
    }

    // Reversed Ord makes the ascending sort come out descending by score.
    results
        .into_sorted_vec()
        .into_iter()
        .map(|r| (r.score.0, r.id))
        .collect()
}

impl HnswIndex {
    /// Top-k approximate nearest neighbor search.
    ///
    /// Greedily descends from the entry point to layer 1 with beam width 1,
    /// then runs a layer-0 beam search with width `max(ef, k)` where `ef`
    /// defaults to the configured `ef_search`. Callers performing
    /// post-filter over-fetch pass an enlarged `k` and `ef`.
    ///
    /// The comparison count in the outcome covers exactly this search; the
    /// published stats counter is overwritten with it once, at the end.
    pub fn search(&self, query: &[f64], k: usize, ef: Option<usize>) -> SearchOutcome {
        let Some(entry_point) = self.entry_point else {
            self.comparisons.store(0, Ordering::Relaxed);
            return SearchOutcome {
                hits: Vec::new(),
                comparisons: 0,
            };
        };

        let mut comparisons = 0u64;
        let mut visited = VisitedSet::new(self.docs.len());
        let mut current = entry_point;

        // Greedy width-1 descent through the shortcut layers
        for layer in (1..=self.max_level).rev() {
            let nearest = search_layer(self, query, &[current], 1, layer, &mut visited, &mut comparisons);
            if let Some(&(_, best)) = nearest.first() {
                current = best;
            }
        }

        let ef = ef.unwrap_or(self.config.ef_search).max(k);
        let mut ranked = search_layer(self, query, &[current], ef, 0, &mut visited, &mut comparisons);
        ranked.truncate(k);

        self.comparisons.store(comparisons, Ordering::Relaxed);

        SearchOutcome {
            hits: ranked
                .into_iter()
                .map(|(score, internal)| SearchHit {
                    score,
                    document: Arc::clone(self.doc(internal)),
                })
                .collect(),
            comparisons,
        }
    }

    /// Score computations published by the most recent search (plus insert
    /// work since), as exposed in stats.
    pub fn last_query_comparisons(&self) -> u64 {
        self.comparisons.load(Ordering::Relaxed)
    }
}
