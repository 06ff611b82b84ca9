use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-(course, session) roster plus one delivery flag per time block.
/// Created lazily on the first seat grant for a session. The delivered
/// flags gate downstream feedback collection; roster rows are never deleted,
/// even after a refund, so attendance history survives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSchedule {
    pub id: Uuid,
    pub course_id: Uuid,
    pub session_id: String,
    pub slots_delivered: Vec<bool>,
    pub roster: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of provisioning one session for one student. Partial success
/// across a course's sessions is an explicit, reportable value, not a
/// silent side effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionProvision {
    pub session_id: String,
    pub outcome: ProvisionOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Provisioned,
    AlreadyProvisioned,
    Failed(String),
}

impl SessionProvision {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ProvisionOutcome::Failed(_))
    }
}
