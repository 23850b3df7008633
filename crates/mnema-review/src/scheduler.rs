//! The review scheduler: single writer for all health state.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use mnema_core::{MemoryStrength, MnemaResult, ReviewDifficulty};

use crate::health::{MemoryHealth, ReviewEvent, DEFAULT_IMPORTANCE};
use crate::journal::{HealthJournal, NullHealthJournal};

/// A due-queue entry with its computed priority.
#[derive(Debug, Clone)]
pub struct DueReview {
    /// Snapshot of the health record at queue-build time.
    pub health: MemoryHealth,
    /// Whole days past the scheduled review, zero when merely due.
    pub days_overdue: i64,
    /// Ordering score blending importance, staleness, and forgetting risk.
    pub priority: f64,
}

/// Tracks health records and applies the scheduling algorithm.
///
/// Records live behind a per-memory mutex so concurrent reviews of the
/// same memory serialize while different memories proceed in parallel.
/// Every mutation is written through to the journal before it is
/// visible to readers of a fresh scheduler.
pub struct ReviewScheduler {
    health: RwLock<HashMap<Uuid, Arc<Mutex<MemoryHealth>>>>,
    events: RwLock<Vec<ReviewEvent>>,
    journal: Arc<dyn HealthJournal>,
}

impl ReviewScheduler {
    /// Creates a scheduler with no persistence.
    pub fn in_memory() -> Self {
        Self {
            health: RwLock::new(HashMap::new()),
            events: RwLock::new(Vec::new()),
            journal: Arc::new(NullHealthJournal),
        }
    }

    /// Creates a scheduler on a journal, replaying any existing state.
    pub async fn with_journal(journal: Arc<dyn HealthJournal>) -> MnemaResult<Self> {
        let (snapshots, events) = journal.load().await?;
        let health = snapshots
            .into_iter()
            .map(|h| (h.memory_id, Arc::new(Mutex::new(h))))
            .collect();
        Ok(Self {
            health: RwLock::new(health),
            events: RwLock::new(events),
            journal,
        })
    }

    /// Number of tracked memories.
    pub async fn tracked_count(&self) -> usize {
        self.health.read().await.len()
    }

    /// Starts tracking a memory, or returns the existing record if it is
    /// already tracked. Tracking never transitions back to untracked.
    pub async fn initialize_memory(
        &self,
        memory_id: Uuid,
        importance: f64,
    ) -> MnemaResult<MemoryHealth> {
        let entry = self.entry(memory_id, importance).await?;
        let snapshot = entry.lock().await.clone();
        Ok(snapshot)
    }

    /// Current health snapshot for a memory, if tracked.
    pub async fn get_health(&self, memory_id: Uuid) -> Option<MemoryHealth> {
        let entry = {
            let map = self.health.read().await;
            map.get(&memory_id).cloned()
        };
        match entry {
            Some(entry) => Some(entry.lock().await.clone()),
            None => None,
        }
    }

    /// Records an active review. An untracked id is initialized first,
    /// since "never reviewed" is a valid state rather than a fault.
    pub async fn record_review(
        &self,
        memory_id: Uuid,
        difficulty: ReviewDifficulty,
    ) -> MnemaResult<MemoryHealth> {
        let entry = self.entry(memory_id, DEFAULT_IMPORTANCE).await?;
        let now = Utc::now();

        let mut guard = entry.lock().await;
        let previous_interval = guard.apply_review(difficulty, now);
        let snapshot = guard.clone();
        let event = ReviewEvent {
            memory_id,
            difficulty,
            timestamp: now,
            previous_interval_days: previous_interval,
        };
        self.journal.record_health(&snapshot).await?;
        self.journal.record_event(&event).await?;
        drop(guard);

        debug!(
            %memory_id,
            quality = difficulty.quality(),
            interval_days = snapshot.interval_days,
            "recorded review"
        );
        self.events.write().await.push(event);
        Ok(snapshot)
    }

    /// Records a passive access (view, search hit). Weak and fading
    /// memories get a one-day schedule nudge; everything else just
    /// counts the exposure.
    pub async fn record_access(&self, memory_id: Uuid) -> MnemaResult<MemoryHealth> {
        let entry = self.entry(memory_id, DEFAULT_IMPORTANCE).await?;
        let now = Utc::now();

        let mut guard = entry.lock().await;
        guard.apply_access(now);
        let snapshot = guard.clone();
        self.journal.record_health(&snapshot).await?;
        drop(guard);

        Ok(snapshot)
    }

    /// Builds the due queue: every tracked memory whose next review is at
    /// or before `now`, ordered by priority descending. Ties keep their
    /// relative order. Items more than a day past due count as overdue;
    /// `include_overdue` admits them explicitly, though an overdue item is
    /// by definition also due.
    pub async fn get_due_reviews(
        &self,
        limit: usize,
        include_overdue: bool,
    ) -> MnemaResult<Vec<DueReview>> {
        let now = Utc::now();
        let mut due = Vec::new();
        for snapshot in self.snapshots().await {
            let is_due = snapshot.next_review <= now;
            if !(is_due || (include_overdue && is_overdue(&snapshot, now))) {
                continue;
            }
            let overdue_days = (now - snapshot.next_review).num_days();
            let retention = snapshot.retention_score(now);
            let priority = 0.4 * snapshot.importance
                + 0.4 * ((overdue_days as f64 / 7.0).min(1.0))
                + 0.2 * (1.0 - retention);
            due.push(DueReview {
                health: snapshot,
                days_overdue: overdue_days.max(0),
                priority,
            });
        }

        due.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        due.truncate(limit);
        Ok(due)
    }

    /// All tracked memories currently in the given strength bucket.
    pub async fn get_memories_by_strength(
        &self,
        strength: MemoryStrength,
        limit: usize,
    ) -> Vec<MemoryHealth> {
        let now = Utc::now();
        self.snapshots()
            .await
            .into_iter()
            .filter(|h| h.strength(now) == strength)
            .take(limit)
            .collect()
    }

    pub(crate) async fn snapshots(&self) -> Vec<MemoryHealth> {
        let entries: Vec<Arc<Mutex<MemoryHealth>>> = {
            let map = self.health.read().await;
            map.values().cloned().collect()
        };
        let mut snapshots = Vec::with_capacity(entries.len());
        for entry in entries {
            snapshots.push(entry.lock().await.clone());
        }
        snapshots
    }

    pub(crate) async fn events_snapshot(&self) -> Vec<ReviewEvent> {
        self.events.read().await.clone()
    }

    #[cfg(test)]
    pub(crate) async fn test_health_map(&self) -> HashMap<Uuid, Arc<Mutex<MemoryHealth>>> {
        self.health.read().await.clone()
    }

    async fn entry(
        &self,
        memory_id: Uuid,
        importance: f64,
    ) -> MnemaResult<Arc<Mutex<MemoryHealth>>> {
        {
            let map = self.health.read().await;
            if let Some(entry) = map.get(&memory_id) {
                return Ok(entry.clone());
            }
        }

        let mut map = self.health.write().await;
        // Double-check under the write lock; another task may have won.
        if let Some(entry) = map.get(&memory_id) {
            return Ok(entry.clone());
        }
        let health = MemoryHealth::new(memory_id, importance, Utc::now());
        self.journal.record_health(&health).await?;
        let entry = Arc::new(Mutex::new(health));
        map.insert(memory_id, entry.clone());
        debug!(%memory_id, "started tracking memory");
        Ok(entry)
    }
}

/// True when the record's scheduled review is more than one day past.
pub fn is_overdue(health: &MemoryHealth, now: DateTime<Utc>) -> bool {
    health.next_review < now - Duration::days(1)
}
