//! Append-only audit trail of order status changes.
//!
//! Entries carry a per-order `sequence` that strictly increases and a
//! `recorded_at` that never goes backwards, even if the clock does. There is
//! no API to remove or edit an entry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{OrderStatus, StatusHistoryEntry},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StatusHistory(Vec<StatusHistoryEntry>);

impl StatusHistory {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Rebuilds a history read back from storage, rejecting rows that break ordering.
    pub fn from_entries(mut entries: Vec<StatusHistoryEntry>) -> AppResult<Self> {
        entries.sort_by_key(|e| e.sequence);
        for pair in entries.windows(2) {
            if pair[0].sequence == pair[1].sequence || pair[1].recorded_at < pair[0].recorded_at {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "status history for order {} is out of order at sequence {}",
                    pair[1].order_id,
                    pair[1].sequence
                )));
            }
        }
        Ok(Self(entries))
    }

    pub fn append(
        &mut self,
        order_id: Uuid,
        status: OrderStatus,
        updated_by: Option<Uuid>,
        now: DateTime<Utc>,
        note: impl Into<String>,
    ) -> &StatusHistoryEntry {
        let (sequence, recorded_at) = match self.0.last() {
            Some(last) => (last.sequence + 1, now.max(last.recorded_at)),
            None => (1, now),
        };
        self.0.push(StatusHistoryEntry {
            id: Uuid::new_v4(),
            order_id,
            sequence,
            status,
            updated_by,
            recorded_at,
            note: note.into(),
        });
        &self.0[self.0.len() - 1]
    }

    pub fn entries(&self) -> &[StatusHistoryEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&StatusHistoryEntry> {
        self.0.last()
    }

    pub fn last_sequence(&self) -> i32 {
        self.0.last().map(|e| e.sequence).unwrap_or(0)
    }

    /// Entries appended after `sequence`.
    pub fn since(&self, sequence: i32) -> &[StatusHistoryEntry] {
        let start = self.0.partition_point(|e| e.sequence <= sequence);
        &self.0[start..]
    }

    /// True when `self` keeps every entry of `base` unchanged and only adds more.
    pub fn extends(&self, base: &StatusHistory) -> bool {
        self.0.len() >= base.0.len() && self.0[..base.0.len()] == base.0[..]
    }
}
