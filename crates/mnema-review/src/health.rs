//! Per-memory health state and the scheduling math that mutates it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mnema_core::{MemoryStrength, ReviewDifficulty};

/// Default SM-2 ease factor for a freshly tracked memory.
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
/// Lower bound on the ease factor.
pub const MIN_EASE_FACTOR: f64 = 1.3;
/// Default importance weight when the caller does not supply one.
pub const DEFAULT_IMPORTANCE: f64 = 0.5;

/// The scheduling state of one tracked memory.
///
/// Mutated exclusively through [`apply_review`](Self::apply_review) and
/// [`apply_access`](Self::apply_access); strength is always derived from
/// the retention score at read time and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHealth {
    /// The memory this record tracks.
    pub memory_id: Uuid,
    /// SM-2 ease factor, at least [`MIN_EASE_FACTOR`].
    pub ease_factor: f64,
    /// Current inter-review interval, at least one day.
    pub interval_days: i64,
    /// Consecutive successful reviews since the last failure.
    pub repetitions: u32,
    /// Importance weight in `[0, 1]`, set at initialization.
    pub importance: f64,
    /// Passive access counter.
    pub access_count: u64,
    /// When tracking started.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent active review, if any.
    pub last_reviewed: Option<DateTime<Utc>>,
    /// Timestamp of the most recent passive access, if any.
    pub last_accessed: Option<DateTime<Utc>>,
    /// When the next review is scheduled.
    pub next_review: DateTime<Utc>,
}

impl MemoryHealth {
    /// Starts tracking a memory with default scheduling state.
    pub fn new(memory_id: Uuid, importance: f64, now: DateTime<Utc>) -> Self {
        Self {
            memory_id,
            ease_factor: DEFAULT_EASE_FACTOR,
            interval_days: 1,
            repetitions: 0,
            importance: importance.clamp(0.0, 1.0),
            access_count: 0,
            created_at: now,
            last_reviewed: None,
            last_accessed: None,
            next_review: now + Duration::days(1),
        }
    }

    /// Retention estimate from the Ebbinghaus forgetting curve,
    /// `R = exp(-t / stability)` with stability growing with interval
    /// and ease. Clamped to `[0, 1]`; a degenerate stability yields a
    /// neutral 0.5.
    pub fn retention_score(&self, now: DateTime<Utc>) -> f64 {
        let reference = self.last_reviewed.unwrap_or(self.created_at);
        let days_elapsed = (now - reference).num_seconds().max(0) as f64 / 86_400.0;
        let stability = self.interval_days as f64 * (self.ease_factor / DEFAULT_EASE_FACTOR);
        if stability <= 0.0 {
            return 0.5;
        }
        (-days_elapsed / stability).exp().clamp(0.0, 1.0)
    }

    /// Current strength bucket, derived lazily from retention.
    pub fn strength(&self, now: DateTime<Utc>) -> MemoryStrength {
        MemoryStrength::from_retention(self.retention_score(now))
    }

    /// Applies an active review (SM-2 variant) and returns the interval
    /// that was in effect before the review.
    ///
    /// Successful recall walks the interval ladder 1, 6, then
    /// `round(interval * ease)`; failure restarts the ladder. The ease
    /// factor moves on every review and never drops below the floor.
    pub fn apply_review(&mut self, difficulty: ReviewDifficulty, now: DateTime<Utc>) -> i64 {
        let previous_interval = self.interval_days;
        let quality = difficulty.quality();

        if quality >= 3 {
            self.interval_days = match self.repetitions {
                0 => 1,
                1 => 6,
                _ => (self.interval_days as f64 * self.ease_factor).round() as i64,
            };
            self.repetitions += 1;
        } else {
            self.repetitions = 0;
            self.interval_days = 1;
        }

        let miss = f64::from(5 - quality);
        self.ease_factor =
            (self.ease_factor + 0.1 - miss * (0.08 + miss * 0.02)).max(MIN_EASE_FACTOR);

        self.last_reviewed = Some(now);
        self.next_review = now + Duration::days(self.interval_days);
        previous_interval
    }

    /// Applies a passive access. Counts the exposure; when the memory is
    /// already weak or fading it also pulls the next review one day
    /// closer, a smaller boost than an active review grants.
    pub fn apply_access(&mut self, now: DateTime<Utc>) {
        self.access_count += 1;
        self.last_accessed = Some(now);

        if matches!(
            self.strength(now),
            MemoryStrength::Weak | MemoryStrength::Fading
        ) {
            self.interval_days = (self.interval_days - 1).max(1);
            self.next_review = now + Duration::days(self.interval_days);
        }
    }
}

/// One entry in the immutable review log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEvent {
    /// The reviewed memory.
    pub memory_id: Uuid,
    /// The recall rating given.
    pub difficulty: ReviewDifficulty,
    /// When the review happened.
    pub timestamp: DateTime<Utc>,
    /// The interval in effect before this review was applied.
    pub previous_interval_days: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn tracked(now: DateTime<Utc>) -> MemoryHealth {
        MemoryHealth::new(Uuid::new_v4(), DEFAULT_IMPORTANCE, now)
    }

    #[test]
    fn new_health_defaults() {
        let now = Utc::now();
        let health = tracked(now);
        assert!((health.ease_factor - 2.5).abs() < f64::EPSILON);
        assert_eq!(health.interval_days, 1);
        assert_eq!(health.repetitions, 0);
        assert_eq!(health.next_review, now + Duration::days(1));
        assert_eq!(health.strength(now), MemoryStrength::Fresh);
    }

    #[test]
    fn good_reviews_walk_the_interval_ladder() {
        let now = Utc::now();
        let mut health = tracked(now);

        health.apply_review(ReviewDifficulty::Good, now);
        assert_eq!((health.repetitions, health.interval_days), (1, 1));

        health.apply_review(ReviewDifficulty::Good, now);
        assert_eq!((health.repetitions, health.interval_days), (2, 6));

        let ease_before = health.ease_factor;
        health.apply_review(ReviewDifficulty::Good, now);
        assert_eq!(health.repetitions, 3);
        assert_eq!(health.interval_days, (6.0 * ease_before).round() as i64);
    }

    #[test]
    fn intervals_never_decrease_under_good_reviews() {
        let now = Utc::now();
        let mut health = tracked(now);
        let mut previous = health.interval_days;
        for _ in 0..10 {
            health.apply_review(ReviewDifficulty::Good, now);
            assert!(health.interval_days >= previous);
            previous = health.interval_days;
        }
    }

    #[test]
    fn forgot_resets_the_schedule() {
        let now = Utc::now();
        let mut health = tracked(now);
        for _ in 0..4 {
            health.apply_review(ReviewDifficulty::Good, now);
        }
        assert!(health.interval_days > 6);

        let previous = health.apply_review(ReviewDifficulty::Forgot, now);
        assert!(previous > 6);
        assert_eq!(health.repetitions, 0);
        assert_eq!(health.interval_days, 1);
        assert_eq!(health.next_review, now + Duration::days(1));
    }

    #[test]
    fn ease_factor_never_drops_below_floor() {
        let now = Utc::now();
        let mut health = tracked(now);
        for _ in 0..50 {
            health.apply_review(ReviewDifficulty::Forgot, now);
        }
        assert!(health.ease_factor >= MIN_EASE_FACTOR);
        assert!((health.ease_factor - MIN_EASE_FACTOR).abs() < 1e-9);
    }

    #[test]
    fn first_easy_review_still_starts_at_one_day() {
        let now = Utc::now();
        let mut health = tracked(now);
        health.apply_review(ReviewDifficulty::Easy, now);
        assert_eq!(health.repetitions, 1);
        assert_eq!(health.interval_days, 1);
        assert!(health.ease_factor >= DEFAULT_EASE_FACTOR);
    }

    #[test]
    fn retention_decays_toward_zero() {
        let now = Utc::now();
        let mut health = tracked(now - Duration::days(400));
        health.last_reviewed = Some(now - Duration::days(400));

        let retention = health.retention_score(now);
        assert!(retention < 0.01);
        assert_eq!(health.strength(now), MemoryStrength::Fading);
    }

    #[test]
    fn retention_uses_created_at_when_never_reviewed() {
        let now = Utc::now();
        let health = MemoryHealth::new(Uuid::new_v4(), 0.5, now - Duration::days(2));
        let aged = health.retention_score(now);
        assert!(aged < 0.5, "two days on a one-day stability has decayed");
        assert!(aged > 0.0);
    }

    #[test]
    fn retention_degenerate_stability_is_neutral() {
        let now = Utc::now();
        let mut health = tracked(now);
        health.interval_days = 0;
        assert!((health.retention_score(now) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn access_nudges_only_weak_memories() {
        let now = Utc::now();

        // Fresh memory: access counts but the schedule is untouched.
        let mut fresh = tracked(now);
        fresh.interval_days = 5;
        fresh.next_review = now + Duration::days(5);
        fresh.last_reviewed = Some(now);
        fresh.apply_access(now);
        assert_eq!(fresh.access_count, 1);
        assert_eq!(fresh.interval_days, 5);

        // Fading memory: interval shrinks by one day, floored at one.
        let mut fading = tracked(now);
        fading.interval_days = 3;
        fading.last_reviewed = Some(now - Duration::days(300));
        fading.apply_access(now);
        assert_eq!(fading.interval_days, 2);
        assert_eq!(fading.next_review, now + Duration::days(2));

        fading.interval_days = 1;
        fading.apply_access(now);
        assert_eq!(fading.interval_days, 1, "interval floors at one day");
    }
}
