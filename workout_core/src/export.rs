//! CSV export of finished sessions.
//!
//! Each export writes a complete snapshot of the finished sessions and
//! atomically replaces the previous file, so exporting twice never repeats
//! rows.

use crate::{Error, PerceivedDifficulty, Result, SessionStatus, WorkoutSession};
use std::path::Path;
use tempfile::NamedTempFile;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    user_id: String,
    workout_id: String,
    status: SessionStatus,
    start_time: Option<String>,
    end_time: Option<String>,
    duration_seconds: Option<u32>,
    calories: Option<u32>,
    perceived_difficulty: Option<PerceivedDifficulty>,
    exercises: usize,
    sets: usize,
    total_volume: f64,
    performance_score: f64,
    program_id: Option<String>,
}

impl From<&WorkoutSession> for CsvRow {
    fn from(session: &WorkoutSession) -> Self {
        let summary = session.performance_summary();
        CsvRow {
            id: session.id().to_string(),
            user_id: session.user_id().to_string(),
            workout_id: session.workout_id().to_string(),
            status: session.status(),
            start_time: session.start_time().map(|t| t.to_rfc3339()),
            end_time: session.end_time().map(|t| t.to_rfc3339()),
            duration_seconds: session.total_duration_seconds(),
            calories: session.calories_estimated(),
            perceived_difficulty: session.perceived_difficulty(),
            exercises: summary.exercise_count,
            sets: summary.total_sets,
            total_volume: summary.total_volume,
            performance_score: summary.performance_score,
            program_id: session.program_id().map(|id| id.to_string()),
        }
    }
}

/// Write every completed or abandoned session to `csv_path`
///
/// Sessions are written oldest first, with a header. The rows go to a temp
/// file in the same directory that is synced and renamed over `csv_path`.
/// Returns the number of rows written; with none, the file is left alone.
pub fn export_sessions_csv<'a>(
    sessions: impl IntoIterator<Item = &'a WorkoutSession>,
    csv_path: &Path,
) -> Result<usize> {
    let mut finished: Vec<&WorkoutSession> = sessions
        .into_iter()
        .filter(|s| s.status().has_ended())
        .collect();

    if finished.is_empty() {
        tracing::info!("No finished sessions to export");
        return Ok(0);
    }
    finished.sort_by_key(|s| (s.end_time(), s.id()));

    let parent = match csv_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    // Temp file in the same directory so the rename stays atomic
    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(true)
            .from_writer(temp.as_file());
        for session in &finished {
            writer.serialize(CsvRow::from(*session))?;
        }
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(csv_path).map_err(|e| Error::Io(e.error))?;

    tracing::info!("Exported {} sessions to {:?}", finished.len(), csv_path);
    Ok(finished.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CalorieModel, NewSession};
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn finished_session(abandon: bool) -> WorkoutSession {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap();
        let mut session = WorkoutSession::new(
            NewSession {
                user_id: Uuid::new_v4(),
                workout_id: Uuid::new_v4(),
                ..Default::default()
            },
            start,
        )
        .unwrap();
        let end = start + Duration::minutes(30);
        if abandon {
            session.abandon(Some("rain"), end).unwrap();
        } else {
            session
                .complete(
                    PerceivedDifficulty::Hard,
                    None,
                    &CalorieModel::default(),
                    end,
                )
                .unwrap();
        }
        session
    }

    fn planned_session() -> WorkoutSession {
        WorkoutSession::new(
            NewSession {
                user_id: Uuid::new_v4(),
                workout_id: Uuid::new_v4(),
                planned_date: Some(Utc::now()),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_export_creates_file_with_header() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("out").join("sessions.csv");

        let sessions = vec![finished_session(false), finished_session(true), planned_session()];
        let count = export_sessions_csv(&sessions, &csv_path).unwrap();
        assert_eq!(count, 2);

        let contents = std::fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,user_id,workout_id,status"));
        assert!(contents.contains("completed"));
        assert!(contents.contains("abandoned"));
        assert!(contents.contains(",1800,"));
    }

    #[test]
    fn test_export_twice_writes_each_session_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("sessions.csv");
        let session = finished_session(false);

        export_sessions_csv([&session], &csv_path).unwrap();
        export_sessions_csv([&session], &csv_path).unwrap();

        let contents = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert_eq!(contents.matches("id,user_id").count(), 1);
        assert_eq!(contents.matches(&session.id().to_string()).count(), 1);
    }

    #[test]
    fn test_export_replaces_previous_snapshot() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("sessions.csv");
        let first = finished_session(false);
        let second = finished_session(true);

        export_sessions_csv([&first], &csv_path).unwrap();
        let count = export_sessions_csv([&first, &second], &csv_path).unwrap();
        assert_eq!(count, 2);

        let contents = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert_eq!(contents.matches(&first.id().to_string()).count(), 1);
        assert!(contents.contains(&second.id().to_string()));
    }

    #[test]
    fn test_export_nothing_finished() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("sessions.csv");

        assert_eq!(export_sessions_csv(&[planned_session()], &csv_path).unwrap(), 0);
        assert!(!csv_path.exists());
    }
}
