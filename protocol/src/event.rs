use crate::RequestId;
use crate::RiskTier;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// One line of the JSONL stream emitted by the watcher (and relayed by the
/// daemon's subscription RPC). Field set is stable across both the
/// daemon-attached and polling watcher implementations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RequestStreamEvent {
    RequestPending(RequestEventBody),
    RequestApproved(RequestEventBody),
    RequestRejected(RequestEventBody),
    RequestExecuted(RequestEventBody),
    RequestTimeout(RequestEventBody),
    RequestCancelled(RequestEventBody),
    /// Emitted when the watcher's auto-approve vote could not be submitted.
    AutoApproveError(AutoApproveErrorBody),
    /// Emitted by the daemon when it had to shed buffered events because
    /// the state store was unreachable and has since recovered.
    DaemonDegraded(DaemonDegradedBody),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestEventBody {
    pub request_id: RequestId,
    pub risk_tier: RiskTier,
    pub command: String,
    pub requestor_agent: String,
    pub approvals: u32,
    pub rejections: u32,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoApproveErrorBody {
    pub request_id: RequestId,
    pub message: String,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonDegradedBody {
    pub dropped_events: u64,
    pub ts: DateTime<Utc>,
}

impl RequestStreamEvent {
    /// The request this event concerns, when it concerns one.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            RequestStreamEvent::RequestPending(b)
            | RequestStreamEvent::RequestApproved(b)
            | RequestStreamEvent::RequestRejected(b)
            | RequestStreamEvent::RequestExecuted(b)
            | RequestStreamEvent::RequestTimeout(b)
            | RequestStreamEvent::RequestCancelled(b) => Some(b.request_id),
            RequestStreamEvent::AutoApproveError(b) => Some(b.request_id),
            RequestStreamEvent::DaemonDegraded(_) => None,
        }
    }

    /// Serialize as the single JSON line clients expect on stdout.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn request_pending_round_trips_through_json() {
        let event = RequestStreamEvent::RequestPending(RequestEventBody {
            request_id: Uuid::nil().into(),
            risk_tier: RiskTier::Caution,
            command: "git push".to_string(),
            requestor_agent: "agent-a".to_string(),
            approvals: 0,
            rejections: 0,
            ts: DateTime::from_timestamp(0, 0).expect("valid timestamp"),
        });
        let line = event.to_jsonl().expect("serialize");
        assert!(line.contains("\"event\":\"request_pending\""));
        let parsed: RequestStreamEvent = serde_json::from_str(&line).expect("deserialize");
        assert_eq!(parsed, event);
    }

    #[test]
    fn daemon_degraded_has_no_request_id() {
        let event = RequestStreamEvent::DaemonDegraded(DaemonDegradedBody {
            dropped_events: 3,
            ts: DateTime::from_timestamp(0, 0).expect("valid timestamp"),
        });
        assert_eq!(event.request_id(), None);
    }
}
