use crate::SessionId;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// An agent's authenticated presence, established out of band before the
/// agent submits or reviews any request.
///
/// `session_key` is the symmetric secret used to sign reviews; it is never
/// logged or included in any outward-facing event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub agent_name: String,
    pub model: String,
    pub program: String,
    pub project_path: String,
    #[serde(skip_serializing)]
    pub session_key: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}
