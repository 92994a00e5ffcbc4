//! Scheduled workouts.
//!
//! A planned workout has a lifecycle of its own. It can exist long before any
//! session is tracked and refers to the session it spawned by id only.

use crate::session::check_program;
use crate::{Error, PlannedStatus, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "PlannedWorkoutRecord")]
pub struct PlannedWorkout {
    id: Uuid,
    user_id: Uuid,
    workout_id: Uuid,
    scheduled_date: NaiveDate,
    status: PlannedStatus,
    is_from_program: bool,
    program_id: Option<Uuid>,
    workout_session_id: Option<Uuid>,
}

/// Stored shape of a planned workout, validated on load
#[derive(Clone, Debug, Deserialize)]
pub struct PlannedWorkoutRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub workout_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub status: PlannedStatus,
    pub is_from_program: bool,
    pub program_id: Option<Uuid>,
    pub workout_session_id: Option<Uuid>,
}

impl TryFrom<PlannedWorkoutRecord> for PlannedWorkout {
    type Error = Error;

    fn try_from(record: PlannedWorkoutRecord) -> Result<Self> {
        PlannedWorkout::rehydrate(record)
    }
}

impl PlannedWorkout {
    pub fn new(
        user_id: Uuid,
        workout_id: Uuid,
        scheduled_date: NaiveDate,
        program_id: Option<Uuid>,
    ) -> Result<Self> {
        if user_id.is_nil() {
            return Err(Error::validation("user id must not be empty"));
        }
        if workout_id.is_nil() {
            return Err(Error::validation("workout id must not be empty"));
        }
        check_program(program_id.is_some(), program_id)?;

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            workout_id,
            scheduled_date,
            status: PlannedStatus::Planned,
            is_from_program: program_id.is_some(),
            program_id,
            workout_session_id: None,
        })
    }

    pub fn rehydrate(record: PlannedWorkoutRecord) -> Result<Self> {
        let planned = Self {
            id: record.id,
            user_id: record.user_id,
            workout_id: record.workout_id,
            scheduled_date: record.scheduled_date,
            status: record.status,
            is_from_program: record.is_from_program,
            program_id: record.program_id,
            workout_session_id: record.workout_session_id,
        };

        if planned.id.is_nil() || planned.user_id.is_nil() || planned.workout_id.is_nil() {
            return Err(Error::validation(format!(
                "planned workout {} has an empty identifier",
                planned.id
            )));
        }
        check_program(planned.is_from_program, planned.program_id)?;
        // Only a started schedule can point at a session
        let linked = matches!(
            planned.status,
            PlannedStatus::InProgress | PlannedStatus::Completed | PlannedStatus::Abandoned
        );
        if linked != planned.workout_session_id.is_some() {
            return Err(Error::validation(format!(
                "planned workout {} in state {:?} has inconsistent session link",
                planned.id, planned.status
            )));
        }
        Ok(planned)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn workout_id(&self) -> Uuid {
        self.workout_id
    }

    pub fn scheduled_date(&self) -> NaiveDate {
        self.scheduled_date
    }

    pub fn status(&self) -> PlannedStatus {
        self.status
    }

    pub fn is_from_program(&self) -> bool {
        self.is_from_program
    }

    pub fn program_id(&self) -> Option<Uuid> {
        self.program_id
    }

    /// Session started from this schedule, if any
    pub fn workout_session_id(&self) -> Option<Uuid> {
        self.workout_session_id
    }

    /// Planned → InProgress, linking the tracked session
    pub fn mark_as_started(&mut self, session_id: Uuid) -> Result<()> {
        if session_id.is_nil() {
            return Err(Error::validation("session id must not be empty"));
        }
        self.require_status(PlannedStatus::Planned, "start")?;
        self.status = PlannedStatus::InProgress;
        self.workout_session_id = Some(session_id);
        tracing::debug!("Planned workout {} started as session {}", self.id, session_id);
        Ok(())
    }

    /// InProgress → Completed
    pub fn mark_as_completed(&mut self) -> Result<()> {
        self.require_status(PlannedStatus::InProgress, "complete")?;
        self.status = PlannedStatus::Completed;
        Ok(())
    }

    /// Planned → Cancelled
    pub fn cancel(&mut self) -> Result<()> {
        self.require_status(PlannedStatus::Planned, "cancel")?;
        self.status = PlannedStatus::Cancelled;
        Ok(())
    }

    /// InProgress → Abandoned
    pub fn mark_as_abandoned(&mut self) -> Result<()> {
        self.require_status(PlannedStatus::InProgress, "abandon")?;
        self.status = PlannedStatus::Abandoned;
        Ok(())
    }

    /// Move to another date while still Planned
    pub fn reschedule(&mut self, new_date: NaiveDate) -> Result<()> {
        self.require_status(PlannedStatus::Planned, "reschedule")?;
        tracing::debug!(
            "Planned workout {} moved from {} to {}",
            self.id,
            self.scheduled_date,
            new_date
        );
        self.scheduled_date = new_date;
        Ok(())
    }

    /// Still planned and the date has passed
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == PlannedStatus::Planned && self.scheduled_date < today
    }

    /// Still planned and the date is today or later
    pub fn is_upcoming(&self, today: NaiveDate) -> bool {
        self.status == PlannedStatus::Planned && self.scheduled_date >= today
    }

    pub fn is_scheduled_for_today(&self, today: NaiveDate) -> bool {
        self.scheduled_date == today
    }

    /// Signed number of days until the scheduled date (negative when past)
    pub fn days_until_scheduled(&self, today: NaiveDate) -> i64 {
        (self.scheduled_date - today).num_days()
    }

    fn require_status(&self, expected: PlannedStatus, action: &str) -> Result<()> {
        if self.status != expected {
            return Err(Error::validation(format!(
                "cannot {} planned workout {} in state {:?} (requires {:?})",
                action, self.id, self.status, expected
            )));
        }
        Ok(())
    }
}
