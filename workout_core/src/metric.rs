//! Personal measurements recorded over time (weight, height, records).

use crate::{Error, Result, UserMetricType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "UserMetricRecord")]
pub struct UserMetric {
    id: Uuid,
    user_id: Uuid,
    metric_type: UserMetricType,
    value: f64,
    unit: String,
    recorded_at: DateTime<Utc>,
    notes: Option<String>,
}

/// Stored shape of a metric, validated on load
#[derive(Clone, Debug, Deserialize)]
pub struct UserMetricRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub metric_type: UserMetricType,
    pub value: f64,
    pub unit: String,
    pub recorded_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl TryFrom<UserMetricRecord> for UserMetric {
    type Error = Error;

    fn try_from(record: UserMetricRecord) -> Result<Self> {
        if record.id.is_nil() || record.user_id.is_nil() {
            return Err(Error::validation(format!(
                "metric {} has an empty identifier",
                record.id
            )));
        }
        check_value(record.value)?;
        Ok(Self {
            id: record.id,
            user_id: record.user_id,
            metric_type: record.metric_type,
            value: record.value,
            unit: record.unit,
            recorded_at: record.recorded_at,
            notes: record.notes,
        })
    }
}

impl UserMetric {
    /// Create a metric; a missing or blank unit falls back to the type's default
    pub fn new(
        user_id: Uuid,
        metric_type: UserMetricType,
        value: f64,
        unit: Option<&str>,
        recorded_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<Self> {
        if user_id.is_nil() {
            return Err(Error::validation("user id must not be empty"));
        }
        check_value(value)?;

        let unit = unit
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| metric_type.default_unit())
            .to_string();

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            metric_type,
            value,
            unit,
            recorded_at,
            notes,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn metric_type(&self) -> UserMetricType {
        self.metric_type
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// True when the notes carry `marker`
    pub fn has_marker(&self, marker: &str) -> bool {
        self.notes.as_deref().is_some_and(|n| n.contains(marker))
    }

    pub fn update_value(&mut self, value: f64) -> Result<()> {
        check_value(value)?;
        self.value = value;
        Ok(())
    }

    pub fn update_recorded_at(&mut self, recorded_at: DateTime<Utc>) {
        self.recorded_at = recorded_at;
    }
}

fn check_value(value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::validation(format!(
            "metric value must be a non-negative number, got {}",
            value
        )));
    }
    Ok(())
}
