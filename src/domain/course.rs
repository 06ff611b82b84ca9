use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The sellable unit. Session specs are stored as a JSON column; the
/// purchase core reads them to drive per-session seat provisioning and
/// never mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price_cents: i64,
    pub currency: String,
    pub sessions: Vec<CourseSession>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One schedulable session of a course (e.g. a cohort or timetable track).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseSession {
    pub session_id: String,
    pub name: String,
    pub time_blocks: Vec<TimeBlock>,
}

impl CourseSession {
    /// Sessions without a single time block are definitions-in-progress
    /// and are skipped by provisioning.
    pub fn is_schedulable(&self) -> bool {
        !self.time_blocks.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeBlock {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}
