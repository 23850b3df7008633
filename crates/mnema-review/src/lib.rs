//! Spaced-repetition scheduling and memory-health tracking.
//!
//! [`ReviewScheduler`] owns one [`MemoryHealth`] record per tracked memory
//! and is its single writer. Active reviews move the schedule with an SM-2
//! variant; passive accesses give a smaller nudge. Retention is modeled
//! with the Ebbinghaus forgetting curve and drives strength buckets, the
//! due queue, and the dashboard aggregates.

pub mod dashboard;
pub mod health;
pub mod journal;
pub mod scheduler;

pub use dashboard::{HealthDashboard, SessionFocus, StudySession};
pub use health::{MemoryHealth, ReviewEvent};
pub use journal::{HealthJournal, JsonlHealthJournal, NullHealthJournal};
pub use scheduler::{DueReview, ReviewScheduler};
