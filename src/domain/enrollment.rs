use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authoritative record that a user has access to a course. Created
/// only as a consequence of a payment reaching Succeeded; cancelled on
/// refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub status: EnrollmentStatus,
    /// 0-100; hitting 100 flips the enrollment to Completed.
    pub progress: i32,
    pub enrolled_at: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Cancelled,
}

impl EnrollmentStatus {
    /// Live enrollments block a second purchase of the same course.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Active | Self::Completed)
    }
}
