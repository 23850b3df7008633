//! Durability for health records and the review log.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use mnema_core::{MnemaError, MnemaResult};

use crate::health::{MemoryHealth, ReviewEvent};

/// Write-through persistence for the scheduler's state.
///
/// Health snapshots are last-write-wins per memory; review events are
/// append-only and never rewritten.
#[async_trait]
pub trait HealthJournal: Send + Sync {
    /// Persists the current state of one health record.
    async fn record_health(&self, health: &MemoryHealth) -> MnemaResult<()>;

    /// Persists one review event.
    async fn record_event(&self, event: &ReviewEvent) -> MnemaResult<()>;

    /// Replays the journal into the latest health snapshot per memory and
    /// the full event log, in write order.
    async fn load(&self) -> MnemaResult<(Vec<MemoryHealth>, Vec<ReviewEvent>)>;
}

/// Journal that persists nothing. For tests and ephemeral schedulers.
#[derive(Debug, Default)]
pub struct NullHealthJournal;

#[async_trait]
impl HealthJournal for NullHealthJournal {
    async fn record_health(&self, _health: &MemoryHealth) -> MnemaResult<()> {
        Ok(())
    }

    async fn record_event(&self, _event: &ReviewEvent) -> MnemaResult<()> {
        Ok(())
    }

    async fn load(&self) -> MnemaResult<(Vec<MemoryHealth>, Vec<ReviewEvent>)> {
        Ok((Vec::new(), Vec::new()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum JournalLine {
    Health(MemoryHealth),
    Event(ReviewEvent),
}

/// JSONL-backed journal. Every write appends one line; load replays the
/// whole file, keeping the last health snapshot per memory.
pub struct JsonlHealthJournal {
    path: PathBuf,
    // Serializes appends so concurrent writers cannot interleave lines.
    write_lock: Mutex<()>,
}

impl JsonlHealthJournal {
    /// Opens or creates a journal at the given path.
    pub async fn new(path: PathBuf) -> MnemaResult<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    async fn append(&self, line: &JournalLine) -> MnemaResult<()> {
        let mut serialized = serde_json::to_string(line)?;
        serialized.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(serialized.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl HealthJournal for JsonlHealthJournal {
    async fn record_health(&self, health: &MemoryHealth) -> MnemaResult<()> {
        self.append(&JournalLine::Health(health.clone())).await
    }

    async fn record_event(&self, event: &ReviewEvent) -> MnemaResult<()> {
        self.append(&JournalLine::Event(event.clone())).await
    }

    async fn load(&self) -> MnemaResult<(Vec<MemoryHealth>, Vec<ReviewEvent>)> {
        if !self.path.exists() {
            return Ok((Vec::new(), Vec::new()));
        }

        let data = tokio::fs::read_to_string(&self.path).await?;
        let mut latest: HashMap<Uuid, MemoryHealth> = HashMap::new();
        let mut events = Vec::new();
        for line in data.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let parsed: JournalLine = serde_json::from_str(line)
                .map_err(|e| MnemaError::Store(format!("invalid journal line: {e}")))?;
            match parsed {
                JournalLine::Health(health) => {
                    latest.insert(health.memory_id, health);
                }
                JournalLine::Event(event) => events.push(event),
            }
        }
        Ok((latest.into_values().collect(), events))
    }
}
