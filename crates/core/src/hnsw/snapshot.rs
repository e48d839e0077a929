//! HNSW snapshot format and byte encoding.
//!
//! A snapshot is a plain structure keyed by external string ids: graph
//! parameters, the entry point, and one record per live node carrying its
//! vector, metadata, level, and per-layer neighbor lists. Restoring a
//! snapshot reconstructs an equivalent graph — searches over the restored
//! index return the same results as the original.
//!
//! Byte encoding is bincode with a `[payload][magic][CRC32 BE]` footer for
//! integrity verification.

use crate::document::{Document, Metadata};
use crate::hnsw::graph::{HnswConfig, HnswIndex};
use crate::vector::Metric;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use thiserror::Error;

/// Magic bytes appended before the CRC32 footer.
const SNAPSHOT_MAGIC: &[u8; 4] = b"EGR1";

/// Errors produced while restoring or decoding a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Structurally invalid snapshot (bad dimension, level, or entry point).
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),

    /// A neighbor list references an id with no node record.
    #[error("node '{node}' references unknown neighbor '{neighbor}'")]
    UnknownNeighbor { node: String, neighbor: String },

    /// The CRC32 footer does not match the payload.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// bincode failed to decode the payload.
    #[error("decode failed: {0}")]
    Decode(String),
}

/// One node record in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// External document id.
    pub id: String,
    /// Embedding vector.
    pub vector: Vec<f64>,
    /// Document metadata.
    pub metadata: Metadata,
    /// Top layer the node participates in.
    pub level: usize,
    /// Neighbor ids per layer, for layers `0..=level`.
    pub neighbors: BTreeMap<usize, Vec<String>>,
}

/// A complete, self-contained image of an HNSW index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswSnapshot {
    pub dimension: usize,
    pub metric: Metric,
    pub m: usize,
    pub m_max0: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    /// External id of the entry point, or `None` for an empty graph.
    pub entry_point: Option<String>,
    pub max_level: usize,
    pub nodes: Vec<NodeSnapshot>,
}

impl HnswIndex {
    /// Produce a snapshot of the live graph.
    ///
    /// Vacant slots left by deletions are compacted away; node order follows
    /// internal id order so a delete-free round trip is structurally
    /// identical.
    pub fn snapshot(&self) -> HnswSnapshot {
        let nodes = self
            .docs
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                let doc = slot.as_ref()?;
                let neighbors = self.neighbors[idx]
                    .iter()
                    .enumerate()
                    .map(|(layer, links)| {
                        let ids = links.iter().map(|&n| self.doc(n).id.clone()).collect();
                        (layer, ids)
                    })
                    .collect();
                Some(NodeSnapshot {
                    id: doc.id.clone(),
                    vector: doc.vector.clone(),
                    metadata: doc.metadata.clone(),
                    level: self.levels[idx] as usize,
                    neighbors,
                })
            })
            .collect();

        HnswSnapshot {
            dimension: self.dimension,
            metric: self.metric,
            m: self.config.m,
            m_max0: self.config.m_max0,
            ef_construction: self.config.ef_construction,
            ef_search: self.config.ef_search,
            entry_point: self.entry_point.map(|ep| self.doc(ep).id.clone()),
            max_level: self.max_level,
            nodes,
        }
    }

    /// Reconstruct an index from a snapshot.
    ///
    /// Internal ids are re-assigned densely in snapshot node order.
    pub fn restore(snapshot: &HnswSnapshot) -> Result<Self, SnapshotError> {
        let config = HnswConfig {
            m: snapshot.m,
            m_max0: snapshot.m_max0,
            ef_construction: snapshot.ef_construction,
            ef_search: snapshot.ef_search,
            max_layers: HnswConfig::default().max_layers.max(snapshot.max_level + 1),
        };

        let mut id_to_internal: HashMap<String, u32> = HashMap::with_capacity(snapshot.nodes.len());
        for (idx, node) in snapshot.nodes.iter().enumerate() {
            if node.vector.len() != snapshot.dimension {
                return Err(SnapshotError::Corrupt(format!(
                    "node '{}' has dimension {}, expected {}",
                    node.id,
                    node.vector.len(),
                    snapshot.dimension
                )));
            }
            if id_to_internal.insert(node.id.clone(), idx as u32).is_some() {
                return Err(SnapshotError::Corrupt(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        let mut docs = Vec::with_capacity(snapshot.nodes.len());
        let mut levels = Vec::with_capacity(snapshot.nodes.len());
        let mut neighbors = Vec::with_capacity(snapshot.nodes.len());

        for node in &snapshot.nodes {
            let mut layer_links: Vec<Vec<u32>> = vec![Vec::new(); node.level + 1];
            for (&layer, ids) in &node.neighbors {
                if layer > node.level {
                    return Err(SnapshotError::Corrupt(format!(
                        "node '{}' has neighbors at layer {layer} above its level {}",
                        node.id, node.level
                    )));
                }
                let links = ids
                    .iter()
                    .map(|id| {
                        id_to_internal.get(id).copied().ok_or_else(|| {
                            SnapshotError::UnknownNeighbor {
                                node: node.id.clone(),
                                neighbor: id.clone(),
                            }
                        })
                    })
                    .collect::<Result<Vec<u32>, _>>()?;
                layer_links[layer] = links;
            }
            docs.push(Some(Arc::new(Document::new(
                node.id.clone(),
                node.vector.clone(),
                node.metadata.clone(),
            ))));
            levels.push(node.level as u8);
            neighbors.push(layer_links);
        }

        let entry_point = match &snapshot.entry_point {
            Some(id) => Some(*id_to_internal.get(id).ok_or_else(|| {
                SnapshotError::Corrupt(format!("entry point '{id}' has no node record"))
            })?),
            None => None,
        };

        Ok(HnswIndex {
            config,
            metric: snapshot.metric,
            dimension: snapshot.dimension,
            docs,
            levels,
            neighbors,
            id_to_internal,
            entry_point,
            max_level: snapshot.max_level,
            comparisons: AtomicU64::new(0),
        })
    }
}

/// Encode a snapshot as `[bincode payload][magic "EGR1"][CRC32 BE]`.
pub fn encode_snapshot(snapshot: &HnswSnapshot) -> Vec<u8> {
    let payload = bincode::serialize(snapshot).expect("snapshot types serialize infallibly");
    let crc = crc32fast::hash(&payload);
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(&payload);
    out.extend_from_slice(SNAPSHOT_MAGIC);
    out.extend_from_slice(&crc.to_be_bytes());
    out
}

/// Decode snapshot bytes, verifying the magic footer and CRC32 checksum.
pub fn decode_snapshot(bytes: &[u8]) -> Result<HnswSnapshot, SnapshotError> {
    if bytes.len() < 8 || &bytes[bytes.len() - 8..bytes.len() - 4] != SNAPSHOT_MAGIC {
        return Err(SnapshotError::Corrupt("missing snapshot footer".into()));
    }
    let payload = &bytes[..bytes.len() - 8];
    let stored = u32::from_be_bytes(
        bytes[bytes.len() - 4..]
            .try_into()
            .expect("footer slice is 4 bytes"),
    );
    let actual = crc32fast::hash(payload);
    if stored != actual {
        return Err(SnapshotError::ChecksumMismatch {
            expected: stored,
            actual,
        });
    }
    bincode::deserialize(payload).map_err(|e| SnapshotError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, vector: Vec<f64>) -> Arc<Document> {
        Arc::new(Document::new(id, vector, Metadata::new()))
    }

    fn build_index(n: usize) -> HnswIndex {
        let mut index = HnswIndex::new(3, Metric::Cosine, HnswConfig::default());
        for i in 0..n {
            let f = i as f64;
            index.insert(doc(
                &format!("n{i}"),
                vec![(f * 0.37).sin(), (f * 0.53).cos(), f / n as f64],
            ));
        }
        index
    }

    #[test]
    fn test_empty_snapshot_roundtrip() {
        let index = HnswIndex::new(3, Metric::Cosine, HnswConfig::default());
        let restored = HnswIndex::restore(&index.snapshot()).unwrap();
        assert!(restored.is_empty());
        assert!(restored.entry_point.is_none());
    }

    #[test]
    fn test_roundtrip_preserves_search_results() {
        let index = build_index(60);
        let restored = HnswIndex::restore(&index.snapshot()).unwrap();
        assert_eq!(restored.len(), index.len());

        for query in [
            vec![1.0, 0.0, 0.0],
            vec![0.2, -0.5, 0.8],
            vec![-0.3, 0.3, 0.1],
        ] {
            let original: Vec<(String, f64)> = index
                .search(&query, 10, None)
                .hits
                .into_iter()
                .map(|h| (h.document.id.clone(), h.score))
                .collect();
            let roundtrip: Vec<(String, f64)> = restored
                .search(&query, 10, None)
                .hits
                .into_iter()
                .map(|h| (h.document.id.clone(), h.score))
                .collect();
            assert_eq!(original, roundtrip);
        }
    }

    #[test]
    fn test_roundtrip_after_deletions() {
        let mut index = build_index(40);
        index.remove("n5");
        index.remove("n17");
        let restored = HnswIndex::restore(&index.snapshot()).unwrap();
        assert_eq!(restored.len(), 38);
        assert!(!restored.contains("n5"));
        assert!(restored.contains("n6"));
    }

    #[test]
    fn test_encode_decode_bytes() {
        let index = build_index(20);
        let snapshot = index.snapshot();
        let bytes = encode_snapshot(&snapshot);
        let decoded = decode_snapshot(&bytes).unwrap();
        assert_eq!(decoded.nodes.len(), 20);
        assert_eq!(decoded.entry_point, snapshot.entry_point);
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let index = build_index(5);
        let mut bytes = encode_snapshot(&index.snapshot());
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xff;
        assert!(matches!(
            decode_snapshot(&bytes),
            Err(SnapshotError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_truncated() {
        assert!(matches!(
            decode_snapshot(&[1, 2, 3]),
            Err(SnapshotError::Corrupt(_))
        ));
    }

    #[test]
    fn test_restore_rejects_unknown_neighbor() {
        let index = build_index(3);
        let mut snapshot = index.snapshot();
        snapshot.nodes[0]
            .neighbors
            .get_mut(&0)
            .unwrap()
            .push("ghost".into());
        assert!(matches!(
            HnswIndex::restore(&snapshot),
            Err(SnapshotError::UnknownNeighbor { .. })
        ));
    }

    #[test]
    fn test_restore_rejects_dimension_mismatch() {
        let index = build_index(3);
        let mut snapshot = index.snapshot();
        snapshot.nodes[1].vector.push(0.0);
        assert!(matches!(
            HnswIndex::restore(&snapshot),
            Err(SnapshotError::Corrupt(_))
        ));
    }
}
