use crate::decision::EventKind;
use crate::decision::PendingTracker;
use chrono::Utc;
use slb_protocol::AutoApproveErrorBody;
use slb_protocol::RequestEventBody;
use slb_protocol::RequestId;
use slb_protocol::RequestStreamEvent;
use slb_protocol::ReviewDecision;
use slb_protocol::StoredRequest;
use slb_state::StateRuntime;
use slb_state::StoreResult;
use std::collections::HashSet;

/// Which requests a [`RequestPoller`] watches.
pub enum PollScope {
    Project(String),
    AllProjects,
}

/// Shared polling engine behind both the daemon's internal event bridge and
/// the watcher's fallback poller: lists pending requests, feeds each one
/// through a [`PendingTracker`], and separately detects requests that left
/// the pending set between polls (which the pending list alone can't show,
/// since a request stops being pending the moment it transitions).
pub struct RequestPoller {
    state: StateRuntime,
    scope: PollScope,
    tracker: PendingTracker,
    previously_pending: HashSet<RequestId>,
}

impl RequestPoller {
    pub fn new(state: StateRuntime, scope: PollScope) -> Self {
        Self {
            state,
            scope,
            tracker: PendingTracker::new(),
            previously_pending: HashSet::new(),
        }
    }

    async fn list_pending(&self) -> StoreResult<Vec<StoredRequest>> {
        match &self.scope {
            PollScope::Project(path) => self.state.list_pending_requests(path).await,
            PollScope::AllProjects => self.state.list_pending_requests_all_projects().await,
        }
    }

    async fn build_event(
        &self,
        kind: EventKind,
        request: &StoredRequest,
    ) -> StoreResult<RequestStreamEvent> {
        let reviews = self.state.list_reviews_for_request(request.id).await?;
        let approvals = reviews
            .iter()
            .filter(|r| r.decision == ReviewDecision::Approve)
            .count() as u32;
        let rejections = reviews
            .iter()
            .filter(|r| r.decision == ReviewDecision::Reject)
            .count() as u32;
        let body = RequestEventBody {
            request_id: request.id,
            risk_tier: request.risk_tier,
            command: request.command.display().to_string(),
            requestor_agent: request.requestor_agent.clone(),
            approvals,
            rejections,
            ts: Utc::now(),
        };
        Ok(match kind {
            EventKind::RequestPending => RequestStreamEvent::RequestPending(body),
            EventKind::RequestApproved => RequestStreamEvent::RequestApproved(body),
            EventKind::RequestRejected => RequestStreamEvent::RequestRejected(body),
            EventKind::RequestExecuted => RequestStreamEvent::RequestExecuted(body),
            EventKind::RequestTimeout => RequestStreamEvent::RequestTimeout(body),
            EventKind::RequestCancelled => RequestStreamEvent::RequestCancelled(body),
        })
    }

    /// Build an `auto_approve_error` event for a request whose auto-approve
    /// vote could not be submitted. Does not consult the tracker: the
    /// caller decides when this fires.
    pub fn auto_approve_error_event(request_id: RequestId, message: String) -> RequestStreamEvent {
        RequestStreamEvent::AutoApproveError(AutoApproveErrorBody {
            request_id,
            message,
            ts: Utc::now(),
        })
    }

    /// Run one poll cycle, returning every event it produced in causal
    /// (store-commit) order.
    pub async fn poll_once(&mut self) -> StoreResult<Vec<RequestStreamEvent>> {
        let pending = self.list_pending().await?;
        let mut events = Vec::new();
        let mut current_ids = HashSet::with_capacity(pending.len());

        for request in &pending {
            current_ids.insert(request.id);
            if let Some(kind) = self.tracker.observe(request.id, request.status) {
                events.push(self.build_event(kind, request).await?);
            }
        }

        let departed: Vec<RequestId> = self
            .previously_pending
            .difference(&current_ids)
            .copied()
            .collect();
        for id in departed {
            if let Some(request) = self.state.get_request(id).await? {
                if let Some(kind) = self.tracker.observe(id, request.status) {
                    events.push(self.build_event(kind, &request).await?);
                }
            }
        }

        self.previously_pending = current_ids;
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slb_protocol::RiskTier;
    use slb_state::test_support::temp_runtime;
    use slb_state::test_support::test_request;
    use slb_state::test_support::test_session;

    #[tokio::test]
    async fn first_poll_emits_pending_for_existing_request() {
        let (_dir, state) = temp_runtime().await;
        let requestor = test_session("agent-a", "model-a", "/repo");
        state.create_session(&requestor).await.expect("create session");
        let request = test_request(&requestor, RiskTier::Caution, 1, false);
        state.create_request(&request).await.expect("create request");

        let mut poller = RequestPoller::new(state, PollScope::Project("/repo".to_string()));
        let events = poller.poll_once().await.expect("poll");
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], RequestStreamEvent::RequestPending(_)));
    }

    #[tokio::test]
    async fn second_poll_with_no_changes_emits_nothing() {
        let (_dir, state) = temp_runtime().await;
        let requestor = test_session("agent-a", "model-a", "/repo");
        state.create_session(&requestor).await.expect("create session");
        let request = test_request(&requestor, RiskTier::Caution, 1, false);
        state.create_request(&request).await.expect("create request");

        let mut poller = RequestPoller::new(state, PollScope::Project("/repo".to_string()));
        poller.poll_once().await.expect("first poll");
        let events = poller.poll_once().await.expect("second poll");
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn approval_after_leaving_pending_list_is_detected() {
        let (_dir, state) = temp_runtime().await;
        let requestor = test_session("agent-a", "model-a", "/repo");
        state.create_session(&requestor).await.expect("create session");
        let request = test_request(&requestor, RiskTier::Caution, 1, false);
        state.create_request(&request).await.expect("create request");

        let mut poller = RequestPoller::new(state.clone(), PollScope::Project("/repo".to_string()));
        poller.poll_once().await.expect("first poll");

        state
            .update_request_status(request.id, slb_protocol::RequestStatus::Approved, None)
            .await
            .expect("approve");

        let events = poller.poll_once().await.expect("second poll");
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], RequestStreamEvent::RequestApproved(_)));
    }
}
