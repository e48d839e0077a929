//! HNSW insertion.
//!
//! Three phases: greedy descent through the shortcut layers, per-layer beam
//! search with diversity-aware neighbor selection, then bidirectional edge
//! insertion with re-pruning of neighbors pushed over capacity.

use crate::document::Document;
use crate::hnsw::graph::HnswIndex;
use crate::hnsw::search::search_layer;
use crate::hnsw::visited::VisitedSet;
use std::sync::Arc;

impl HnswIndex {
    /// Insert a document into the graph.
    ///
    /// The caller must have removed any existing node with the same external
    /// id — re-insertion of a live id is delete-then-insert at the
    /// collection boundary.
    pub fn insert(&mut self, doc: Arc<Document>) {
        debug_assert!(
            !self.id_to_internal.contains_key(&doc.id),
            "duplicate node id '{}'",
            doc.id
        );

        let level = self.random_level();
        let internal = self.docs.len() as u32;

        // First node: becomes the entry point, no edges to build.
        if self.entry_point.is_none() {
            self.register(doc, internal, level, vec![Vec::new(); level + 1]);
            self.entry_point = Some(internal);
            self.max_level = level;
            return;
        }

        let entry_point = self
            .entry_point
            .expect("entry_point is Some after is_none() guard");

        let mut comparisons = 0u64;
        let mut visited = VisitedSet::new(self.docs.len());
        let mut current = entry_point;

        // Phase 1: greedy width-1 descent down to the node's level + 1
        for layer in (level + 1..=self.max_level).rev() {
            let nearest = search_layer(
                self,
                &doc.vector,
                &[current],
                1,
                layer,
                &mut visited,
                &mut comparisons,
            );
            if let Some(&(_, best)) = nearest.first() {
                current = best;
            }
        }

        // Phase 2: beam search each layer the node participates in and pick
        // its neighbors. Layers above max_level (if any) stay empty.
        let top = level.min(self.max_level);
        let mut layer_links: Vec<Vec<u32>> = vec![Vec::new(); level + 1];
        for layer in (0..=top).rev() {
            let candidates = search_layer(
                self,
                &doc.vector,
                &[current],
                self.config.ef_construction,
                layer,
                &mut visited,
                &mut comparisons,
            );
            layer_links[layer] =
                self.select_diverse(&candidates, self.max_connections(layer), &mut comparisons);
            // Best candidate seeds the next (lower) layer
            if let Some(&(_, best)) = candidates.first() {
                current = best;
            }
        }

        self.register(doc, internal, level, layer_links);

        // Phase 3: make edges bidirectional, pruning neighbors over capacity
        for layer in 0..=top {
            let m_max = self.max_connections(layer);
            let links = self.neighbors[internal as usize][layer].clone();
            for &neighbor in &links {
                let nid = neighbor as usize;
                self.neighbors[nid][layer].push(internal);

                if self.neighbors[nid][layer].len() > m_max {
                    let mut candidates: Vec<(f64, u32)> = self.neighbors[nid][layer]
                        .iter()
                        .map(|&c| (self.score_nodes(neighbor, c, &mut comparisons), c))
                        .collect();
                    candidates.sort_by(|a, b| {
                        b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal)
                    });
                    let kept = self.select_diverse(&candidates, m_max, &mut comparisons);
                    // Edges stay bidirectional: unlink the reverse edge of
                    // every neighbor the pruning dropped.
                    for &(_, c) in &candidates {
                        if !kept.contains(&c) {
                            self.neighbors[c as usize][layer].retain(|&x| x != neighbor);
                        }
                    }
                    self.neighbors[nid][layer] = kept;
                }
            }
        }

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(internal);
        }

        self.note_insert_comparisons(comparisons);
    }

    /// Append the node's arena slots and id mapping.
    fn register(&mut self, doc: Arc<Document>, internal: u32, level: usize, links: Vec<Vec<u32>>) {
        self.id_to_internal.insert(doc.id.clone(), internal);
        self.docs.push(Some(doc));
        self.levels.push(level as u8);
        self.neighbors.push(links);
    }

    /// Diversity-aware neighbor selection.
    ///
    /// `candidates` are `(score_to_base, id)` pairs sorted by descending
    /// score. The first `m_max / 2` slots are filled unconditionally; after
    /// that a candidate is accepted only if it is closer to the base than to
    /// every already-accepted neighbor, which spreads edges across clusters
    /// instead of stacking near-duplicates.
    fn select_diverse(
        &self,
        candidates: &[(f64, u32)],
        m_max: usize,
        comparisons: &mut u64,
    ) -> Vec<u32> {
        let mut selected: Vec<u32> = Vec::with_capacity(m_max);
        for &(score_to_base, candidate) in candidates {
            if selected.len() >= m_max {
                break;
            }
            if selected.len() < m_max / 2 {
                selected.push(candidate);
                continue;
            }
            let shadowed = selected
                .iter()
                .any(|&s| self.score_nodes(candidate, s, comparisons) > score_to_base);
            if !shadowed {
                selected.push(candidate);
            }
        }
        selected
    }
}
