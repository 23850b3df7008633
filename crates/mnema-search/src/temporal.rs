//! Temporal window resolution and recency decay.

use chrono::{DateTime, Duration, Utc};

use mnema_core::{SearchQuery, TemporalFilter};

/// Normalizes exponential decay so that `temporal_decay = 0.1` halves the
/// boost roughly every 300 days.
const DECAY_PERIOD_DAYS: f64 = 30.0;

/// Resolves a query's temporal filter into concrete window bounds.
///
/// Presets are anchored at `now`; `Custom` passes the caller's bounds
/// through and `All` yields no bounds.
pub fn resolve_window(
    query: &SearchQuery,
    now: DateTime<Utc>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    match query.temporal_filter {
        TemporalFilter::All => (None, None),
        TemporalFilter::Today => {
            let start_of_day = now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc());
            (start_of_day, Some(now))
        }
        TemporalFilter::Week => (Some(now - Duration::days(7)), Some(now)),
        TemporalFilter::Month => (Some(now - Duration::days(30)), Some(now)),
        TemporalFilter::Quarter => (Some(now - Duration::days(90)), Some(now)),
        TemporalFilter::Year => (Some(now - Duration::days(365)), Some(now)),
        TemporalFilter::Custom => (query.date_from, query.date_to),
    }
}

/// Multiplier applied to a candidate's score based on its age.
///
/// Decays from 1.0 toward an asymptotic floor of 0.5, so recency reorders
/// close calls without letting old content vanish entirely.
pub fn decay_multiplier(created_at: DateTime<Utc>, now: DateTime<Utc>, decay_rate: f32) -> f32 {
    let age_days = (now - created_at).num_seconds().max(0) as f64 / 86_400.0;
    let decayed = (-age_days * f64::from(decay_rate) / DECAY_PERIOD_DAYS).exp();
    (0.5 + 0.5 * decayed) as f32
}
