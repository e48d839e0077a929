//! HNSW deletion.
//!
//! Deletion is a hard unlink: the node's edges are removed from every
//! neighbor's list on every layer it participates in, its arena slot is
//! vacated, and the entry point is re-elected if it was deleted. Surviving
//! neighbors are not re-linked, so graph quality degrades gradually under
//! deletion churn; rebuilding (snapshot + restore) is the caller's remedy
//! when stats indicate disconnection.

use crate::hnsw::graph::HnswIndex;

impl HnswIndex {
    /// Remove the node with the given external id.
    ///
    /// Returns `false` if no such node exists.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(&internal) = self.id_to_internal.get(id) else {
            return false;
        };
        let idx = internal as usize;
        let level = self.levels[idx] as usize;

        // Unlink both directions on every layer the node participates in
        for layer in 0..=level {
            let links = std::mem::take(&mut self.neighbors[idx][layer]);
            for &neighbor in &links {
                self.neighbors[neighbor as usize][layer].retain(|&x| x != internal);
            }
        }

        self.docs[idx] = None;
        self.id_to_internal.remove(id);

        if self.entry_point == Some(internal) {
            self.elect_entry_point();
        }
        true
    }

    /// Pick any remaining node with the highest level as the new entry point,
    /// or clear it when the graph is empty.
    fn elect_entry_point(&mut self) {
        let mut best: Option<(u32, u8)> = None;
        for (idx, slot) in self.docs.iter().enumerate() {
            if slot.is_none() {
                continue;
            }
            let level = self.levels[idx];
            if best.is_none_or(|(_, best_level)| level > best_level) {
                best = Some((idx as u32, level));
            }
        }
        match best {
            Some((node, level)) => {
                self.entry_point = Some(node);
                self.max_level = level as usize;
            }
            None => {
                self.entry_point = None;
                self.max_level = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, Metadata};
    use crate::hnsw::graph::HnswConfig;
    use crate::vector::Metric;
    use std::sync::Arc;

    fn doc(id: &str, vector: Vec<f64>) -> Arc<Document> {
        Arc::new(Document::new(id, vector, Metadata::new()))
    }

    #[test]
    fn test_remove_unknown_id() {
        let mut index = HnswIndex::new(2, Metric::Cosine, HnswConfig::default());
        assert!(!index.remove("ghost"));
    }

    #[test]
    fn test_remove_excludes_from_search() {
        let mut index = HnswIndex::new(4, Metric::Cosine, HnswConfig::default());
        index.insert(doc("a", vec![1.0, 0.0, 0.0, 0.0]));
        index.insert(doc("b", vec![0.0, 1.0, 0.0, 0.0]));
        assert!(index.remove("a"));
        assert_eq!(index.len(), 1);

        let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 2, None).hits;
        assert!(hits.iter().all(|h| h.document.id != "a"));
        assert!(!index.contains("a"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut index = HnswIndex::new(2, Metric::Cosine, HnswConfig::default());
        index.insert(doc("a", vec![1.0, 0.0]));
        assert!(index.remove("a"));
        assert!(!index.remove("a"));
        assert!(index.is_empty());
    }

    #[test]
    fn test_remove_entry_point_reelects() {
        let mut index = HnswIndex::new(2, Metric::Cosine, HnswConfig::default());
        for i in 0..30 {
            let angle = i as f64 * 0.2;
            index.insert(doc(&format!("n{i}"), vec![angle.cos(), angle.sin()]));
        }
        let entry = index.entry_point.unwrap();
        let entry_id = index.doc(entry).id.clone();
        assert!(index.remove(&entry_id));

        let new_entry = index.entry_point.unwrap();
        assert_ne!(new_entry, entry);
        assert_eq!(index.levels[new_entry as usize] as usize, index.max_level);
        // Remaining nodes are still searchable
        assert_eq!(index.search(&[1.0, 0.0], 5, None).hits.len(), 5);
    }

    #[test]
    fn test_remove_last_node_clears_entry() {
        let mut index = HnswIndex::new(2, Metric::Cosine, HnswConfig::default());
        index.insert(doc("only", vec![1.0, 0.0]));
        assert!(index.remove("only"));
        assert!(index.entry_point.is_none());
        assert_eq!(index.max_level, 0);
        assert!(index.search(&[1.0, 0.0], 1, None).hits.is_empty());
    }

    #[test]
    fn test_no_dangling_edges_after_remove() {
        let mut index = HnswIndex::new(3, Metric::Euclidean, HnswConfig::default());
        for i in 0..40 {
            let f = i as f64;
            index.insert(doc(&format!("n{i}"), vec![f, f * 0.5, 40.0 - f]));
        }
        let removed = *index.id_to_internal.get("n7").unwrap();
        assert!(index.remove("n7"));

        for (idx, slot) in index.docs.iter().enumerate() {
            if slot.is_none() {
                continue;
            }
            for links in &index.neighbors[idx] {
                assert!(
                    !links.contains(&removed),
                    "node {idx} still links to removed node"
                );
            }
        }
    }
}
