use crate::auto_approve::AutoApproveHandle;
use crate::emit;
use slb_core::PollScope;
use slb_core::RequestPoller;
use slb_state::StateRuntime;
use slb_state::StoreResult;
use std::time::Duration;

/// Drives the watcher's own [`RequestPoller`] when no daemon is reachable
/// for this project. Used both as a standalone mode and as the fallback a
/// watcher drops into if its daemon connection is lost mid-run.
pub struct PollFallback {
    poller: RequestPoller,
    auto_approve: Option<AutoApproveHandle>,
    interval: Duration,
}

impl PollFallback {
    pub fn new(
        state: StateRuntime,
        project_path: String,
        interval: Duration,
        auto_approve: Option<AutoApproveHandle>,
    ) -> Self {
        Self {
            poller: RequestPoller::new(state, PollScope::Project(project_path)),
            auto_approve,
            interval,
        }
    }

    /// Poll forever, emitting every event and auto-approving eligible
    /// caution-tier requests when an [`AutoApproveHandle`] was configured.
    /// Never returns under normal operation; intended to run inside its
    /// own task.
    pub async fn run(&mut self) -> StoreResult<()> {
        loop {
            self.tick().await?;
            tokio::time::sleep(self.interval).await;
        }
    }

    async fn tick(&mut self) -> StoreResult<()> {
        let events = self.poller.poll_once().await?;
        for event in &events {
            emit::emit(event);
            if let Some(handle) = &self.auto_approve {
                if let Some(error_event) = handle.handle_event(event).await {
                    emit::emit(&error_event);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slb_core::Notifier;
    use slb_core::ReviewService;
    use slb_core::TracingNotifier;
    use slb_protocol::RiskTier;
    use slb_state::test_support::temp_runtime;
    use slb_state::test_support::test_request;
    use slb_state::test_support::test_session;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn caution_tier_pending_request_is_auto_approved_on_first_tick() {
        let (_dir, state) = temp_runtime().await;
        let requestor = test_session("agent-a", "model-a", "/repo");
        state.create_session(&requestor).await.expect("create session");
        let request = test_request(&requestor, RiskTier::Caution, 1, false);
        state.create_request(&request).await.expect("create request");

        let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
        let review_service = ReviewService::new(state.clone(), notifier, HashSet::new());
        let handle = AutoApproveHandle::new(state.clone(), review_service, "/repo".to_string());
        let mut fallback = PollFallback::new(
            state.clone(),
            "/repo".to_string(),
            Duration::from_millis(10),
            Some(handle),
        );

        fallback.tick().await.expect("tick");

        let stored = state.get_request(request.id).await.expect("get").expect("exists");
        assert_eq!(stored.status, slb_protocol::RequestStatus::Approved);
    }

    #[tokio::test]
    async fn dangerous_tier_request_is_never_auto_approved() {
        let (_dir, state) = temp_runtime().await;
        let requestor = test_session("agent-a", "model-a", "/repo");
        state.create_session(&requestor).await.expect("create session");
        let request = test_request(&requestor, RiskTier::Dangerous, 1, false);
        state.create_request(&request).await.expect("create request");

        let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
        let review_service = ReviewService::new(state.clone(), notifier, HashSet::new());
        let handle = AutoApproveHandle::new(state.clone(), review_service, "/repo".to_string());
        let mut fallback = PollFallback::new(
            state.clone(),
            "/repo".to_string(),
            Duration::from_millis(10),
            Some(handle),
        );

        fallback.tick().await.expect("tick");

        let stored = state.get_request(request.id).await.expect("get").expect("exists");
        assert_eq!(stored.status, slb_protocol::RequestStatus::Pending);
    }
}
