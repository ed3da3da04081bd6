//! Append-only, in-memory record of query/response pairs.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::ChatError;

/// One recorded exchange. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub query: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: u64,
}

/// Aggregate view over the log, computed on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_entries: usize,
    pub total_processing_time_ms: u64,
    pub avg_processing_time_ms: f64,
    pub earliest_timestamp: Option<DateTime<Utc>>,
    pub latest_timestamp: Option<DateTime<Utc>>,
}

impl HistoryStats {
    fn from_entries(entries: &[HistoryEntry]) -> Self {
        let total_processing_time_ms: u64 =
            entries.iter().map(|e| e.processing_time_ms).sum();
        let avg_processing_time_ms = if entries.is_empty() {
            0.0
        } else {
            total_processing_time_ms as f64 / entries.len() as f64
        };

        Self {
            total_entries: entries.len(),
            total_processing_time_ms,
            avg_processing_time_ms,
            earliest_timestamp: entries.first().map(|e| e.timestamp),
            latest_timestamp: entries.last().map(|e| e.timestamp),
        }
    }
}

/// Thread-safe append-only history.
///
/// Writers hold the lock only for a single push, so a reader always sees
/// either the whole entry or none of it. A poisoned lock is recovered
/// because no mutation can leave the `Vec` half-written.
#[derive(Debug, Default)]
pub struct HistoryLog {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an exchange and return the stored entry.
    ///
    /// Timestamps never go backwards in insertion order, even if the wall
    /// clock does.
    pub fn append(
        &self,
        query: &str,
        response: &str,
        processing_time_ms: u64,
    ) -> Result<HistoryEntry, ChatError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .try_reserve(1)
            .map_err(|e| ChatError::HistoryUnavailable(e.to_string()))?;

        let now = Utc::now();
        let timestamp = entries.last().map_or(now, |last| last.timestamp.max(now));
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            query: query.to_string(),
            response: response.to_string(),
            timestamp,
            processing_time_ms,
        };
        entries.push(entry.clone());

        info!(
            id = %entry.id,
            query_len = query.len(),
            processing_time_ms,
            "Added chat entry to history"
        );
        Ok(entry)
    }

    /// The last `min(limit, len)` entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let from = entries.len().saturating_sub(limit);
        entries[from..].to_vec()
    }

    pub fn all(&self) -> Vec<HistoryEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically empty the log; returns how many entries were dropped.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let cleared = entries.len();
        entries.clear();
        info!(cleared, "Cleared chat history");
        cleared
    }

    pub fn stats(&self) -> HistoryStats {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        HistoryStats::from_entries(&entries)
    }

    /// Entries and statistics taken from the same snapshot.
    pub fn snapshot(&self, limit: usize) -> (Vec<HistoryEntry>, HistoryStats) {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let from = entries.len().saturating_sub(limit);
        (entries[from..].to_vec(), HistoryStats::from_entries(&entries))
    }
}
