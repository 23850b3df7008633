//! Dashboard aggregation and study-session suggestion.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use mnema_core::{MemoryStrength, MnemaResult};

use crate::scheduler::{DueReview, ReviewScheduler};

/// Estimated minutes spent per reviewed item.
const MINUTES_PER_REVIEW: u32 = 2;

/// Fixed coaching tips attached to every suggested session.
const STUDY_TIPS: [&str; 3] = [
    "Take your time with each memory",
    "Try to recall before revealing the full content",
    "Rate honestly - it helps the algorithm",
];

/// Aggregate health statistics over all tracked memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDashboard {
    /// Number of tracked memories.
    pub total_memories: usize,
    /// Weighted 0-100 score over strength buckets.
    pub health_score: u32,
    /// Mean retention across tracked memories, as a percentage.
    pub average_retention: f64,
    /// Count of memories per strength bucket.
    pub strength_distribution: HashMap<MemoryStrength, usize>,
    /// Reviews scheduled for today that are now due.
    pub reviews_due_today: usize,
    /// Reviews whose scheduled day has already passed.
    pub overdue_reviews: usize,
    /// Consecutive calendar days with at least one review, ending today.
    pub review_streak: u32,
    /// Review counts for the trailing seven days, today first, keyed by
    /// weekday abbreviation.
    pub weekly_review_stats: Vec<(String, usize)>,
}

/// What a suggested session concentrates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFocus {
    /// Weak and fading memories first.
    WeakMemories,
    /// Plain due-queue order.
    DueReviews,
}

/// A suggested study session sized to a time budget.
#[derive(Debug, Clone)]
pub struct StudySession {
    /// The caller's time budget.
    pub duration_minutes: u32,
    /// How many reviews fit in the budget.
    pub estimated_reviews: usize,
    /// The selected items, in suggested order.
    pub memories: Vec<DueReview>,
    /// The ordering strategy used.
    pub focus: SessionFocus,
    /// Fixed coaching tips.
    pub tips: Vec<&'static str>,
}

impl ReviewScheduler {
    /// Computes the aggregate health dashboard.
    pub async fn get_memory_health_dashboard(&self) -> HealthDashboard {
        let now = Utc::now();
        let snapshots = self.snapshots().await;
        let total = snapshots.len();

        let mut distribution: HashMap<MemoryStrength, usize> =
            MemoryStrength::all().into_iter().map(|s| (s, 0)).collect();
        let mut weighted_sum: u64 = 0;
        let mut retention_sum = 0.0;
        let mut due_today = 0;
        let mut overdue = 0;

        for health in &snapshots {
            let strength = health.strength(now);
            *distribution.entry(strength).or_insert(0) += 1;
            weighted_sum += u64::from(strength.health_weight());
            retention_sum += health.retention_score(now);

            if health.next_review <= now {
                if health.next_review.date_naive() == now.date_naive() {
                    due_today += 1;
                } else {
                    overdue += 1;
                }
            }
        }

        let average_retention = if total > 0 {
            (retention_sum / total as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        let health_score = (weighted_sum as f64 / total.max(1) as f64).round() as u32;

        let events = self.events_snapshot().await;

        // Streak: walk back from today, one calendar day at a time,
        // stopping at the first day without a review.
        let review_days: std::collections::HashSet<chrono::NaiveDate> =
            events.iter().map(|e| e.timestamp.date_naive()).collect();
        let mut review_streak = 0;
        let mut expected = now.date_naive();
        while review_days.contains(&expected) {
            review_streak += 1;
            expected -= Duration::days(1);
        }

        let mut weekly = vec![0usize; 7];
        for event in &events {
            let days_ago = (now - event.timestamp).num_days();
            if (0..7).contains(&days_ago) {
                weekly[days_ago as usize] += 1;
            }
        }
        let weekly_review_stats = weekly
            .into_iter()
            .enumerate()
            .map(|(days_ago, count)| {
                let day = now - Duration::days(days_ago as i64);
                (day.format("%a").to_string(), count)
            })
            .collect();

        HealthDashboard {
            total_memories: total,
            health_score,
            average_retention,
            strength_distribution: distribution,
            reviews_due_today: due_today,
            overdue_reviews: overdue,
            review_streak,
            weekly_review_stats,
        }
    }

    /// Suggests a study session for the given time budget, drawing twice
    /// the capacity from the due queue so weak-first ordering has slack
    /// to choose from.
    pub async fn suggest_study_session(
        &self,
        duration_minutes: u32,
        focus_weak: bool,
    ) -> MnemaResult<StudySession> {
        let now = Utc::now();
        let capacity = (duration_minutes / MINUTES_PER_REVIEW) as usize;
        let due = self.get_due_reviews(capacity * 2, true).await?;

        let ordered = if focus_weak {
            let (mut weak, rest): (Vec<DueReview>, Vec<DueReview>) =
                due.into_iter().partition(|d| {
                    matches!(
                        d.health.strength(now),
                        MemoryStrength::Weak | MemoryStrength::Fading
                    )
                });
            weak.extend(rest);
            weak
        } else {
            due
        };

        let memories: Vec<DueReview> = ordered.into_iter().take(capacity).collect();
        Ok(StudySession {
            duration_minutes,
            estimated_reviews: memories.len(),
            memories,
            focus: if focus_weak {
                SessionFocus::WeakMemories
            } else {
                SessionFocus::DueReviews
            },
            tips: STUDY_TIPS.to_vec(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mnema_core::ReviewDifficulty;
    use uuid::Uuid;

    #[tokio::test]
    async fn empty_dashboard_is_all_zero()  {
        let scheduler = ReviewScheduler::in_memory();
        let dashboard = scheduler.get_memory_health_dashboard().await;
        assert_eq!(dashboard.total_memories, 0);
        assert_eq!(dashboard.health_score, 0);
        assert_eq!(dashboard.average_retention, 0.0);
        assert_eq!(dashboard.review_streak, 0);
        assert_eq!(dashboard.weekly_review_stats.len(), 7);
    }

    #[tokio::test]
    async fn dashboard_counts_fresh_memories_at_full_score() {
        let scheduler = ReviewScheduler::in_memory();
        for _ in 0..3 {
            scheduler
                .record_review(Uuid::new_v4(), ReviewDifficulty::Good)
                .await
                .unwrap();
        }

        let dashboard = scheduler.get_memory_health_dashboard().await;
        assert_eq!(dashboard.total_memories, 3);
        // Just-reviewed memories are all fresh.
        assert_eq!(dashboard.health_score, 100);
        assert_eq!(dashboard.strength_distribution[&MemoryStrength::Fresh], 3);
        assert!(dashboard.average_retention > 99.0);
        // Reviews recorded right now count toward today's streak.
        assert_eq!(dashboard.review_streak, 1);
        assert_eq!(dashboard.weekly_review_stats[0].1, 3);
    }

    #[tokio::test]
    async fn study_session_respects_capacity() {
        let scheduler = ReviewScheduler::in_memory();
        for _ in 0..20 {
            let id = Uuid::new_v4();
            scheduler.initialize_memory(id, 0.5).await.unwrap();
        }
        {
            let snapshots = scheduler.snapshots().await;
            assert_eq!(snapshots.len(), 20);
        }
        // Backdate everything so it is due.
        backdate_all(&scheduler, 2).await;

        let session = scheduler.suggest_study_session(10, false).await.unwrap();
        assert_eq!(session.duration_minutes, 10);
        assert_eq!(session.estimated_reviews, 5);
        assert_eq!(session.memories.len(), 5);
        assert_eq!(session.focus, SessionFocus::DueReviews);
        assert_eq!(session.tips.len(), 3);
    }

    #[tokio::test]
    async fn focus_weak_puts_fading_memories_first() {
        let scheduler = ReviewScheduler::in_memory();
        let strong_id = Uuid::new_v4();
        let fading_id = Uuid::new_v4();
        // High importance so the strong memory would otherwise lead.
        scheduler.initialize_memory(strong_id, 1.0).await.unwrap();
        scheduler.initialize_memory(fading_id, 0.0).await.unwrap();
        backdate_all(&scheduler, 1).await;
        {
            let map = scheduler_health(&scheduler).await;
            let mut h = map.get(&fading_id).unwrap().lock().await;
            h.last_reviewed = Some(Utc::now() - Duration::days(400));
        }

        let session = scheduler.suggest_study_session(10, true).await.unwrap();
        assert_eq!(session.focus, SessionFocus::WeakMemories);
        assert_eq!(session.memories[0].health.memory_id, fading_id);
    }

    async fn backdate_all(scheduler: &ReviewScheduler, days: i64) {
        let map = scheduler_health(scheduler).await;
        for entry in map.values() {
            let mut h = entry.lock().await;
            h.next_review = Utc::now() - Duration::days(days);
        }
    }

    async fn scheduler_health(
        scheduler: &ReviewScheduler,
    ) -> std::collections::HashMap<Uuid, std::sync::Arc<tokio::sync::Mutex<crate::health::MemoryHealth>>>
    {
        scheduler.test_health_map().await
    }
}
