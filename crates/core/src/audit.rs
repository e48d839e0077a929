//! Structured audit logging for engine operations.
//!
//! [`AuditLog`] is an append-only ring buffer of at most `max_entries`
//! records; the oldest entries are dropped to reclaim space. Every recorded
//! entry is also emitted as a `tracing` event with `target: "audit"`, so
//! operators can filter/route audit events via `RUST_LOG=audit=info`.

use crate::config;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// One audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// Monotonically increasing id, never reused within a log.
    pub id: u64,
    /// Epoch milliseconds at record time.
    pub timestamp: i64,
    /// ISO-8601 rendering of `timestamp`, for human consumption.
    pub iso_time: String,
    /// Action name, e.g. `insert`, `query`, `ttl_sweep`.
    pub action: String,
    /// Who performed the action (engine, tenant id, or a higher-layer name).
    pub actor: String,
    /// Target collection.
    pub collection: String,
    /// Number of documents touched.
    pub document_count: usize,
    /// Wall-clock duration of the operation, when measured.
    pub duration_ms: Option<u64>,
    /// Free-form context.
    pub details: Option<String>,
}

/// Filter for [`AuditLog::query`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub action: Option<String>,
    pub actor: Option<String>,
    pub collection: Option<String>,
    /// Inclusive lower bound on `timestamp` (epoch ms).
    pub since: Option<i64>,
    /// Inclusive upper bound on `timestamp` (epoch ms).
    pub until: Option<i64>,
    /// Maximum entries returned (newest first).
    pub limit: Option<usize>,
}

/// Aggregate counts over the retained entries.
#[derive(Debug, Clone, Serialize)]
pub struct AuditStats {
    pub total: usize,
    pub by_action: HashMap<String, usize>,
    pub by_actor: HashMap<String, usize>,
}

#[derive(Debug)]
struct Ring {
    entries: VecDeque<AuditEntry>,
    next_id: u64,
    max_entries: usize,
}

/// Append-only bounded audit log.
///
/// Interior-locked; all methods take `&self` so the log can be shared
/// behind an `Arc` by the engine and higher-layer collaborators.
#[derive(Debug)]
pub struct AuditLog {
    ring: Mutex<Ring>,
}

impl AuditLog {
    /// Creates a log retaining at most `max_entries` records.
    pub fn new(max_entries: usize) -> Self {
        Self {
            ring: Mutex::new(Ring {
                entries: VecDeque::with_capacity(max_entries.min(1024)),
                next_id: 1,
                max_entries: max_entries.max(1),
            }),
        }
    }

    /// Record an event. Returns the assigned entry id.
    pub fn record(
        &self,
        action: &str,
        actor: &str,
        collection: &str,
        document_count: usize,
        duration_ms: Option<u64>,
        details: Option<String>,
    ) -> u64 {
        let now = Utc::now();
        let timestamp = now.timestamp_millis();

        tracing::info!(
            target: "audit",
            action = %action,
            actor = %actor,
            collection = %collection,
            document_count = document_count,
            duration_ms = ?duration_ms,
            "audit"
        );

        let mut ring = self.ring.lock();
        let id = ring.next_id;
        ring.next_id += 1;
        if ring.entries.len() >= ring.max_entries {
            ring.entries.pop_front();
        }
        ring.entries.push_back(AuditEntry {
            id,
            timestamp,
            iso_time: now.to_rfc3339(),
            action: action.to_string(),
            actor: actor.to_string(),
            collection: collection.to_string(),
            document_count,
            duration_ms,
            details,
        });
        id
    }

    /// Query retained entries, newest first.
    pub fn query(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        let ring = self.ring.lock();
        let limit = query.limit.unwrap_or(usize::MAX);
        ring.entries
            .iter()
            .rev()
            .filter(|e| {
                query.action.as_deref().is_none_or(|a| e.action == a)
                    && query.actor.as_deref().is_none_or(|a| e.actor == a)
                    && query.collection.as_deref().is_none_or(|c| e.collection == c)
                    && query.since.is_none_or(|s| e.timestamp >= s)
                    && query.until.is_none_or(|u| e.timestamp <= u)
            })
            .take(limit)
            .cloned()
            .collect()
    }

    /// Aggregate per-action and per-actor counts over retained entries.
    pub fn stats(&self) -> AuditStats {
        let ring = self.ring.lock();
        let mut by_action: HashMap<String, usize> = HashMap::new();
        let mut by_actor: HashMap<String, usize> = HashMap::new();
        for entry in &ring.entries {
            *by_action.entry(entry.action.clone()).or_insert(0) += 1;
            *by_actor.entry(entry.actor.clone()).or_insert(0) += 1;
        }
        AuditStats {
            total: ring.entries.len(),
            by_action,
            by_actor,
        }
    }

    /// Export all retained entries as a JSON array, oldest first.
    pub fn export_json(&self) -> String {
        let ring = self.ring.lock();
        let entries: Vec<&AuditEntry> = ring.entries.iter().collect();
        serde_json::to_string(&entries).expect("audit entries serialize infallibly")
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.ring.lock().entries.len()
    }

    /// Whether the log holds no entries.
    pub fn is_empty(&self) -> bool {
        self.ring.lock().entries.is_empty()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(config::AUDIT_DEFAULT_MAX_ENTRIES)
    }
}
