use crate::RequestId;
use crate::ReviewId;
use crate::SessionId;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;
use strum_macros::EnumString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// The four free-text prompts every reviewer answers, kept as distinct
/// columns (rather than an opaque blob) so they can be queried and audited
/// individually.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredResponses {
    pub reason: String,
    pub effect: String,
    pub goal: String,
    pub safety: String,
}

/// A single reviewer's vote on a request, as persisted by the state store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub request_id: RequestId,
    pub reviewer_session_id: SessionId,
    pub reviewer_agent: String,
    pub reviewer_model: String,
    pub decision: ReviewDecision,
    pub comments: String,
    pub responses: StructuredResponses,
    pub signature: String,
    pub created_at: DateTime<Utc>,
}
