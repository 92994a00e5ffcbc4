//! Session history and metric queries.
//!
//! Read-only views over stored sessions and metrics: recent-session windows,
//! aggregate statistics and the latest measurement of a kind.

use crate::{SessionStatus, UserMetric, UserMetricType, WorkoutSession};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

/// When a session happened: its start, else its planned date
pub fn session_time(session: &WorkoutSession) -> Option<DateTime<Utc>> {
    session.start_time().or(session.planned_date())
}

/// A user's sessions from the last `days` days, newest first
///
/// A window reaching past the earliest representable time covers everything.
pub fn recent_sessions<'a>(
    sessions: impl IntoIterator<Item = &'a WorkoutSession>,
    user_id: Uuid,
    days: u32,
    now: DateTime<Utc>,
) -> Vec<&'a WorkoutSession> {
    let cutoff = Duration::try_days(i64::from(days))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut recent: Vec<&WorkoutSession> = sessions
        .into_iter()
        .filter(|s| s.user_id() == user_id)
        .filter(|s| session_time(s).is_some_and(|t| t >= cutoff))
        .collect();

    recent.sort_by(|a, b| session_time(b).cmp(&session_time(a)));

    tracing::debug!(
        "Found {} sessions for user {} in the last {} days",
        recent.len(),
        user_id,
        days
    );
    recent
}

/// Aggregate figures over a set of sessions
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub completed: usize,
    pub abandoned: usize,
    pub cancelled: usize,
    pub in_progress: usize,
    pub planned: usize,
    pub total_duration_seconds: u64,
    pub total_calories: u64,
    pub total_sets: usize,
    pub total_volume: f64,
    /// Mean performance score of completed sessions
    pub average_score: Option<f64>,
    pub best_score: Option<f64>,
}

impl SessionStats {
    /// Share of finished sessions (completed or abandoned) that were completed
    pub fn completion_rate(&self) -> Option<f64> {
        let finished = self.completed + self.abandoned;
        (finished > 0).then(|| self.completed as f64 / finished as f64)
    }
}

/// Statistics for one user's sessions
pub fn session_stats<'a>(
    sessions: impl IntoIterator<Item = &'a WorkoutSession>,
    user_id: Uuid,
) -> SessionStats {
    let mut stats = SessionStats::default();
    let mut scores = Vec::new();

    for session in sessions.into_iter().filter(|s| s.user_id() == user_id) {
        stats.total_sessions += 1;
        match session.status() {
            SessionStatus::Completed => {
                stats.completed += 1;
                scores.push(session.calculate_performance_score());
            }
            SessionStatus::Abandoned => stats.abandoned += 1,
            SessionStatus::Cancelled => stats.cancelled += 1,
            SessionStatus::InProgress => stats.in_progress += 1,
            SessionStatus::Planned => stats.planned += 1,
        }

        stats.total_duration_seconds += u64::from(session.total_duration_seconds().unwrap_or(0));
        stats.total_calories += u64::from(session.calories_estimated().unwrap_or(0));
        for exercise in session.exercises() {
            stats.total_sets += exercise.sets().len();
            stats.total_volume += exercise.total_volume();
        }
    }

    if !scores.is_empty() {
        stats.average_score = Some(scores.iter().sum::<f64>() / scores.len() as f64);
        stats.best_score = scores.iter().copied().reduce(f64::max);
    }

    stats
}

/// A user's metrics of one kind, oldest first
pub fn metric_history<'a>(
    metrics: impl IntoIterator<Item = &'a UserMetric>,
    user_id: Uuid,
    metric_type: UserMetricType,
) -> Vec<&'a UserMetric> {
    let mut history: Vec<&UserMetric> = metrics
        .into_iter()
        .filter(|m| m.user_id() == user_id && m.metric_type() == metric_type)
        .collect();
    history.sort_by_key(|m| m.recorded_at());
    history
}

/// Most recently recorded metric of one kind
pub fn latest_metric<'a>(
    metrics: impl IntoIterator<Item = &'a UserMetric>,
    user_id: Uuid,
    metric_type: UserMetricType,
) -> Option<&'a UserMetric> {
    metric_history(metrics, user_id, metric_type).pop()
}

/// Highest personal record value
pub fn personal_best<'a>(
    metrics: impl IntoIterator<Item = &'a UserMetric>,
    user_id: Uuid,
) -> Option<&'a UserMetric> {
    metric_history(metrics, user_id, UserMetricType::PersonalRecord)
        .into_iter()
        .max_by(|a, b| a.value().total_cmp(&b.value()))
}
