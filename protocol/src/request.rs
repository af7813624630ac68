use crate::Command;
use crate::RequestId;
use crate::SessionId;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;
use strum_macros::EnumString;

/// Classification assigned by the (external) command classifier.
///
/// `Safe` commands never reach the store: the classifier tells the caller
/// to execute immediately. The remaining three tiers gate on quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskTier {
    Safe,
    Caution,
    Dangerous,
    Critical,
}

/// Lifecycle state of a request. See the transition table in the review
/// service for which moves are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
    ExecutionFailed,
    Timeout,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 7] = [
        RequestStatus::Pending,
        RequestStatus::Approved,
        RequestStatus::Rejected,
        RequestStatus::Executed,
        RequestStatus::ExecutionFailed,
        RequestStatus::Timeout,
        RequestStatus::Cancelled,
    ];

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Pending, Timeout)
                | (Approved, Executed)
                | (Approved, ExecutionFailed)
        )
    }

    /// All statuses from which `target` is directly reachable. Used by the
    /// store to guard an update with a single `WHERE status IN (...)`
    /// clause instead of a read-then-write.
    pub fn predecessors_of(target: RequestStatus) -> Vec<RequestStatus> {
        RequestStatus::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(target))
            .collect()
    }
}

/// Where rollback state (if any) has been captured for an executed request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Rollback {
    pub path: String,
    pub rolled_back_at: Option<DateTime<Utc>>,
}

/// A request as persisted by the state store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRequest {
    pub id: RequestId,
    pub requestor_session_id: SessionId,
    pub requestor_agent: String,
    pub requestor_model: String,
    pub command: Command,
    pub risk_tier: RiskTier,
    pub min_approvals: u32,
    pub require_different_model: bool,
    pub project_path: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub rollback: Option<Rollback>,
}

impl StoredRequest {
    pub fn is_pending(&self) -> bool {
        crate::is_pending(self.status)
    }
}
