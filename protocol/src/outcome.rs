use crate::OutcomeId;
use crate::RequestId;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Post-execution feedback, recorded purely for offline analytics; never
/// consulted by the review service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub id: OutcomeId,
    pub request_id: RequestId,
    pub caused_problems: bool,
    pub problem_description: Option<String>,
    pub human_rating: Option<u8>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
