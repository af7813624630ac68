use async_trait::async_trait;
use slb_protocol::StoredRequest;
use slb_protocol::Review;

/// Out-of-band notification sink (chat, mail, ...). Notifier failures are
/// logged by callers and never roll back an already-committed decision.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_new_request(&self, request: &StoredRequest);
    async fn notify_decision(&self, request: &StoredRequest, latest_review: &Review);
}

/// A `Notifier` that only logs. Used when no external channel is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify_new_request(&self, request: &StoredRequest) {
        tracing::info!(
            request_id = %request.id,
            risk_tier = %request.risk_tier,
            "new request pending review"
        );
    }

    async fn notify_decision(&self, request: &StoredRequest, latest_review: &Review) {
        tracing::info!(
            request_id = %request.id,
            status = %request.status,
            reviewer = %latest_review.reviewer_agent,
            decision = %latest_review.decision,
            "request decision recorded"
        );
    }
}
