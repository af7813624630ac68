use crate::config::TierTimeouts;
use crate::error::RequestError;
use crate::notifier::Notifier;
use crate::retry::with_retry;
use chrono::Utc;
use slb_protocol::RequestId;
use slb_protocol::RequestStatus;
use slb_protocol::SessionId;
use slb_protocol::StoredRequest;
use slb_state::StateRuntime;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Non-review request lifecycle operations: submission, cancellation,
/// rollback attachment, execution recording, and a background sweep that
/// times out stale pending requests.
pub struct RequestService {
    state: StateRuntime,
    notifier: Arc<dyn Notifier>,
}

impl RequestService {
    pub fn new(state: StateRuntime, notifier: Arc<dyn Notifier>) -> Self {
        Self { state, notifier }
    }

    pub async fn submit_request(&self, request: StoredRequest) -> Result<(), RequestError> {
        with_retry(RequestError::is_transient, || async {
            self.state.create_request(&request).await.map_err(RequestError::from)
        })
        .await?;
        self.notifier.notify_new_request(&request).await;
        Ok(())
    }

    /// Cancel `request_id`, but only on behalf of the session that created
    /// it and only while it is still pending.
    pub async fn cancel_request(
        &self,
        request_id: RequestId,
        requestor_session_id: SessionId,
    ) -> Result<(), RequestError> {
        let request = self
            .state
            .get_request(request_id)
            .await?
            .ok_or(RequestError::RequestNotFound(request_id))?;
        if request.requestor_session_id != requestor_session_id {
            return Err(RequestError::NotRequestor(request_id));
        }
        if !request.is_pending() {
            return Err(RequestError::RequestNotPending(request.id, request.status));
        }
        let updated = with_retry(RequestError::is_transient, || async {
            self.state
                .update_request_status(request_id, RequestStatus::Cancelled, Some(Utc::now()))
                .await
                .map_err(RequestError::from)
        })
        .await?;
        if !updated {
            return Err(RequestError::RequestNotPending(request.id, request.status));
        }
        Ok(())
    }

    /// Attach a rollback script path to a request. Fails if one is already
    /// attached; rollback attachment is write-once.
    pub async fn attach_rollback(
        &self,
        request_id: RequestId,
        rollback_path: &str,
    ) -> Result<(), RequestError> {
        self.state
            .get_request(request_id)
            .await?
            .ok_or(RequestError::RequestNotFound(request_id))?;
        let attached = with_retry(RequestError::is_transient, || async {
            self.state
                .update_request_rollback(request_id, rollback_path)
                .await
                .map_err(RequestError::from)
        })
        .await?;
        if !attached {
            return Err(RequestError::RollbackAlreadyAttached(request_id));
        }
        Ok(())
    }

    /// Record the outcome of running an approved request's command.
    /// `exit_code == 0` moves the request to `executed`; anything else moves
    /// it to `execution_failed`.
    pub async fn record_execution_result(
        &self,
        request_id: RequestId,
        exit_code: i32,
    ) -> Result<RequestStatus, RequestError> {
        let request = self
            .state
            .get_request(request_id)
            .await?
            .ok_or(RequestError::RequestNotFound(request_id))?;
        if request.status != RequestStatus::Approved {
            return Err(RequestError::RequestNotApproved(request.id, request.status));
        }
        let new_status = if exit_code == 0 {
            RequestStatus::Executed
        } else {
            RequestStatus::ExecutionFailed
        };
        let updated = with_retry(RequestError::is_transient, || async {
            self.state
                .update_request_status(request_id, new_status, Some(Utc::now()))
                .await
                .map_err(RequestError::from)
        })
        .await?;
        if !updated {
            return Err(RequestError::RequestNotApproved(request.id, request.status));
        }
        Ok(new_status)
    }

    /// Sweep every pending request across all projects, moving any whose
    /// age exceeds its risk tier's timeout to `timeout`. Returns the number
    /// of requests swept.
    pub async fn sweep_timed_out_requests(
        &self,
        timeouts: &TierTimeouts,
    ) -> Result<usize, RequestError> {
        let pending = self.state.list_pending_requests_all_projects().await?;
        let now = Utc::now();
        let mut swept = 0usize;
        for request in pending {
            let Some(timeout) = timeouts.for_tier(request.risk_tier) else {
                continue;
            };
            let age = now.signed_duration_since(request.created_at);
            let Ok(age) = age.to_std() else {
                continue;
            };
            if age < timeout {
                continue;
            }
            let updated = with_retry(RequestError::is_transient, || async {
                self.state
                    .update_request_status(request.id, RequestStatus::Timeout, Some(now))
                    .await
                    .map_err(RequestError::from)
            })
            .await?;
            if updated {
                swept += 1;
                tracing::info!(request_id = %request.id, "request timed out awaiting review");
            }
        }
        Ok(swept)
    }

    /// Spawn a background task that calls [`Self::sweep_timed_out_requests`]
    /// on `interval`, stopping when `cancellation` is triggered.
    pub fn spawn_timeout_sweeper(
        self: Arc<Self>,
        timeouts: TierTimeouts,
        interval: Duration,
        cancellation: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = self.sweep_timed_out_requests(&timeouts).await {
                            tracing::warn!("timeout sweep failed: {err}");
                        }
                    }
                    _ = cancellation.cancelled() => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::TracingNotifier;
    use slb_protocol::RiskTier;
    use slb_state::test_support::temp_runtime;
    use slb_state::test_support::test_request;
    use slb_state::test_support::test_session;

    fn service(state: StateRuntime) -> RequestService {
        RequestService::new(state, Arc::new(TracingNotifier))
    }

    #[tokio::test]
    async fn cancel_by_non_requestor_is_rejected() {
        let (_dir, state) = temp_runtime().await;
        let requestor = test_session("agent-a", "model-a", "/repo");
        state.create_session(&requestor).await.expect("create session");
        let request = test_request(&requestor, RiskTier::Caution, 1, false);
        state.create_request(&request).await.expect("create request");

        let other = slb_protocol::SessionId::new();
        let service = service(state);
        let err = service
            .cancel_request(request.id, other)
            .await
            .expect_err("not requestor");
        assert!(matches!(err, RequestError::NotRequestor(_)));
    }

    #[tokio::test]
    async fn cancel_by_requestor_moves_to_cancelled() {
        let (_dir, state) = temp_runtime().await;
        let requestor = test_session("agent-a", "model-a", "/repo");
        state.create_session(&requestor).await.expect("create session");
        let request = test_request(&requestor, RiskTier::Caution, 1, false);
        state.create_request(&request).await.expect("create request");

        let service = service(state.clone());
        service
            .cancel_request(request.id, requestor.id)
            .await
            .expect("cancel");

        let stored = state.get_request(request.id).await.expect("get").expect("exists");
        assert_eq!(stored.status, RequestStatus::Cancelled);
    }

    #[tokio::test]
    async fn rollback_attachment_is_write_once() {
        let (_dir, state) = temp_runtime().await;
        let requestor = test_session("agent-a", "model-a", "/repo");
        state.create_session(&requestor).await.expect("create session");
        let request = test_request(&requestor, RiskTier::Caution, 1, false);
        state.create_request(&request).await.expect("create request");

        let service = service(state);
        service
            .attach_rollback(request.id, "/repo/.slb/rollback/1.sh")
            .await
            .expect("first attach succeeds");
        let err = service
            .attach_rollback(request.id, "/repo/.slb/rollback/2.sh")
            .await
            .expect_err("second attach rejected");
        assert!(matches!(err, RequestError::RollbackAlreadyAttached(_)));
    }

    #[tokio::test]
    async fn execution_result_requires_approved_status() {
        let (_dir, state) = temp_runtime().await;
        let requestor = test_session("agent-a", "model-a", "/repo");
        state.create_session(&requestor).await.expect("create session");
        let request = test_request(&requestor, RiskTier::Caution, 1, false);
        state.create_request(&request).await.expect("create request");

        let service = service(state);
        let err = service
            .record_execution_result(request.id, 0)
            .await
            .expect_err("not approved yet");
        assert!(matches!(err, RequestError::RequestNotApproved(_, _)));
    }

    #[tokio::test]
    async fn nonzero_exit_code_marks_execution_failed() {
        let (_dir, state) = temp_runtime().await;
        let requestor = test_session("agent-a", "model-a", "/repo");
        state.create_session(&requestor).await.expect("create session");
        let request = test_request(&requestor, RiskTier::Caution, 1, false);
        state.create_request(&request).await.expect("create request");
        state
            .update_request_status(request.id, RequestStatus::Approved, None)
            .await
            .expect("approve");

        let service = service(state.clone());
        let new_status = service
            .record_execution_result(request.id, 1)
            .await
            .expect("record result");
        assert_eq!(new_status, RequestStatus::ExecutionFailed);

        let stored = state.get_request(request.id).await.expect("get").expect("exists");
        assert_eq!(stored.status, RequestStatus::ExecutionFailed);
    }

    #[tokio::test]
    async fn sweep_times_out_requests_past_their_tier_deadline() {
        let (_dir, state) = temp_runtime().await;
        let requestor = test_session("agent-a", "model-a", "/repo");
        state.create_session(&requestor).await.expect("create session");
        let mut request = test_request(&requestor, RiskTier::Caution, 1, false);
        request.created_at = Utc::now() - chrono::Duration::hours(2);
        state.create_request(&request).await.expect("create request");

        let service = service(state.clone());
        let timeouts = TierTimeouts {
            caution: Duration::from_secs(60),
            ..TierTimeouts::default()
        };
        let swept = service
            .sweep_timed_out_requests(&timeouts)
            .await
            .expect("sweep");
        assert_eq!(swept, 1);

        let stored = state.get_request(request.id).await.expect("get").expect("exists");
        assert_eq!(stored.status, RequestStatus::Timeout);
    }
}
