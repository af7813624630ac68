use crate::error::ReviewError;
use crate::notifier::Notifier;
use crate::retry::with_retry;
use crate::signing;
use crate::signing::SignablePayload;
use slb_protocol::RequestId;
use slb_protocol::RequestStatus;
use slb_protocol::Review;
use slb_protocol::ReviewDecision;
use slb_protocol::ReviewId;
use slb_protocol::SessionId;
use slb_protocol::StructuredResponses;
use slb_state::StateRuntime;
use std::collections::HashSet;
use std::sync::Arc;

/// Everything the caller provides to cast one vote.
///
/// `signature` is computed client-side over the canonical encoding of the
/// other fields using the reviewer's session key; see [`signing`].
pub struct SubmitReviewInput {
    pub session_id: SessionId,
    pub request_id: RequestId,
    pub decision: ReviewDecision,
    pub comments: String,
    pub responses: StructuredResponses,
    pub signature: String,
}

#[derive(Debug, Clone)]
pub struct SubmitReviewOutcome {
    pub review: Review,
    pub approvals: u32,
    pub rejections: u32,
    pub status_changed: bool,
    pub new_status: Option<RequestStatus>,
}

/// Implements the transactional `SubmitReview` contract: validate, insert,
/// tally, and (conditionally) transition a request's status, all inside one
/// state-store transaction, followed by a best-effort post-commit notify.
pub struct ReviewService {
    state: StateRuntime,
    notifier: Arc<dyn Notifier>,
    trusted_self_approvers: HashSet<SessionId>,
}

impl ReviewService {
    pub fn new(
        state: StateRuntime,
        notifier: Arc<dyn Notifier>,
        trusted_self_approvers: HashSet<SessionId>,
    ) -> Self {
        Self {
            state,
            notifier,
            trusted_self_approvers,
        }
    }

    pub async fn submit_review(
        &self,
        input: SubmitReviewInput,
    ) -> Result<SubmitReviewOutcome, ReviewError> {
        let request = self
            .state
            .get_request(input.request_id)
            .await?
            .ok_or(ReviewError::RequestNotFound(input.request_id))?;
        if !request.is_pending() {
            return Err(ReviewError::RequestNotPending(request.id, request.status));
        }

        let reviewer = self
            .state
            .get_session(input.session_id)
            .await?
            .ok_or(ReviewError::ReviewerSessionNotFound(input.session_id))?;
        if !reviewer.is_active() {
            return Err(ReviewError::ReviewerSessionEnded(input.session_id));
        }

        if input.session_id == request.requestor_session_id
            && !self.trusted_self_approvers.contains(&input.session_id)
        {
            return Err(ReviewError::SelfReviewNotAllowed);
        }

        if input.decision == ReviewDecision::Approve && request.require_different_model {
            if reviewer.model.is_empty() {
                return Err(ReviewError::MissingReviewerModel);
            }
            if reviewer.model == request.requestor_model {
                return Err(ReviewError::SameModelNotAllowed(request.requestor_model));
            }
        }

        let payload = SignablePayload {
            request_id: request.id,
            reviewer_session_id: input.session_id,
            decision: input.decision,
            comments: &input.comments,
            responses: &input.responses,
        };
        if !signing::verify(&reviewer.session_key, &payload, &input.signature)? {
            return Err(ReviewError::InvalidSignature);
        }

        let review = Review {
            id: ReviewId::new(),
            request_id: request.id,
            reviewer_session_id: input.session_id,
            reviewer_agent: reviewer.agent_name.clone(),
            reviewer_model: reviewer.model.clone(),
            decision: input.decision,
            comments: input.comments,
            responses: input.responses,
            signature: input.signature,
            created_at: chrono::Utc::now(),
        };

        let reviewer_session_id = input.session_id;
        let (approvals, rejections, status_changed, new_status) = with_retry(
            ReviewError::is_transient,
            || async {
                let (mut tx, snapshot) = self.state.begin_review_transaction(request.id).await?;
                let snapshot = snapshot.ok_or(ReviewError::RequestNotFound(request.id))?;
                if !snapshot.is_pending() {
                    return Err(ReviewError::RequestNotPending(
                        snapshot.id,
                        snapshot.status,
                    ));
                }

                if let Err(err) = tx.insert_review(&review).await {
                    if slb_state::is_duplicate_vote(&err) {
                        return Err(ReviewError::DuplicateVote(reviewer_session_id, request.id));
                    }
                    return Err(ReviewError::Store(err.into()));
                }

                let reviews = tx.list_reviews(request.id).await?;
                let approvals = reviews
                    .iter()
                    .filter(|r| r.decision == ReviewDecision::Approve)
                    .count() as u32;
                let rejections = reviews
                    .iter()
                    .filter(|r| r.decision == ReviewDecision::Reject)
                    .count() as u32;

                let new_status = if rejections >= 1 {
                    Some(RequestStatus::Rejected)
                } else if approvals >= snapshot.min_approvals {
                    Some(RequestStatus::Approved)
                } else {
                    None
                };

                let status_changed = if let Some(new_status) = new_status {
                    let updated = tx
                        .update_status(request.id, new_status, Some(review.created_at))
                        .await?;
                    if !updated {
                        return Err(ReviewError::RequestNotPending(
                            snapshot.id,
                            snapshot.status,
                        ));
                    }
                    true
                } else {
                    false
                };

                tx.commit().await?;
                Ok((approvals, rejections, status_changed, new_status))
            },
        )
        .await?;

        if let Some(new_status) = new_status {
            if status_changed {
                if let Ok(Some(mut updated_request)) = self.state.get_request(request.id).await {
                    updated_request.status = new_status;
                    self.notifier.notify_decision(&updated_request, &review).await;
                }
            }
        }

        Ok(SubmitReviewOutcome {
            review,
            approvals,
            rejections,
            status_changed,
            new_status,
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

    fn responses() -> StructuredResponses {
        StructuredResponses {
            reason: "needed for deploy".to_string(),
            effect: "restarts the service".to_string(),
            goal: "ship the fix".to_string(),
            safety: "tested in staging".to_string(),
        }
    }

    fn service(state: StateRuntime, trusted: HashSet<SessionId>) -> ReviewService {
        ReviewService::new(state, Arc::new(TracingNotifier), trusted)
    }

    async fn signed_input(
        reviewer_session_id: SessionId,
        reviewer_key: &str,
        request_id: RequestId,
        decision: ReviewDecision,
    ) -> SubmitReviewInput {
        let comments = "lgtm".to_string();
        let responses = responses();
        let signature = signing::sign(
            reviewer_key,
            &SignablePayload {
                request_id,
                reviewer_session_id,
                decision,
                comments: &comments,
                responses: &responses,
            },
        )
        .expect("sign");
        SubmitReviewInput {
            session_id: reviewer_session_id,
            request_id,
            decision,
            comments,
            responses,
            signature,
        }
    }

    #[tokio::test]
    async fn single_approval_reaches_quorum_of_one() {
        let (_dir, state) = temp_runtime().await;
        let requestor = test_session("agent-a", "model-a", "/repo");
        state.create_session(&requestor).await.expect("create requestor");
        let reviewer = test_session("agent-b", "model-b", "/repo");
        state.create_session(&reviewer).await.expect("create reviewer");

        let request = test_request(&requestor, RiskTier::Dangerous, 1, true);
        state.create_request(&request).await.expect("create request");

        let service = service(state.clone(), HashSet::new());
        let input = signed_input(
            reviewer.id,
            &reviewer.session_key,
            request.id,
            ReviewDecision::Approve,
        )
        .await;
        let outcome = service.submit_review(input).await.expect("submit review");

        assert_eq!(outcome.approvals, 1);
        assert_eq!(outcome.rejections, 0);
        assert_eq!(outcome.new_status, Some(RequestStatus::Approved));

        let stored = state.get_request(request.id).await.expect("get").expect("exists");
        assert_eq!(stored.status, RequestStatus::Approved);
    }

    #[tokio::test]
    async fn same_model_approval_is_rejected_when_required_different() {
        let (_dir, state) = temp_runtime().await;
        let requestor = test_session("agent-a", "model-a", "/repo");
        state.create_session(&requestor).await.expect("create requestor");
        let reviewer = test_session("agent-b", "model-a", "/repo");
        state.create_session(&reviewer).await.expect("create reviewer");

        let request = test_request(&requestor, RiskTier::Dangerous, 1, true);
        state.create_request(&request).await.expect("create request");

        let service = service(state.clone(), HashSet::new());
        let input = signed_input(
            reviewer.id,
            &reviewer.session_key,
            request.id,
            ReviewDecision::Approve,
        )
        .await;
        let err = service.submit_review(input).await.expect_err("same model rejected");
        assert!(matches!(err, ReviewError::SameModelNotAllowed(_)));

        let stored = state.get_request(request.id).await.expect("get").expect("exists");
        assert_eq!(stored.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn single_veto_rejects_regardless_of_prior_approvals() {
        let (_dir, state) = temp_runtime().await;
        let requestor = test_session("agent-a", "model-a", "/repo");
        state.create_session(&requestor).await.expect("create requestor");
        let approver = test_session("agent-b", "model-b", "/repo");
        state.create_session(&approver).await.expect("create approver");
        let rejecter = test_session("agent-c", "model-c", "/repo");
        state.create_session(&rejecter).await.expect("create rejecter");

        let request = test_request(&requestor, RiskTier::Critical, 2, true);
        state.create_request(&request).await.expect("create request");

        let service = service(state.clone(), HashSet::new());
        let approve = signed_input(
            approver.id,
            &approver.session_key,
            request.id,
            ReviewDecision::Approve,
        )
        .await;
        service.submit_review(approve).await.expect("first approval");

        let reject = signed_input(
            rejecter.id,
            &rejecter.session_key,
            request.id,
            ReviewDecision::Reject,
        )
        .await;
        let outcome = service.submit_review(reject).await.expect("submit rejection");
        assert_eq!(outcome.new_status, Some(RequestStatus::Rejected));
        assert_eq!(outcome.approvals, 1);
        assert_eq!(outcome.rejections, 1);
    }

    #[tokio::test]
    async fn requestor_cannot_review_their_own_request() {
        let (_dir, state) = temp_runtime().await;
        let requestor = test_session("agent-a", "model-a", "/repo");
        state.create_session(&requestor).await.expect("create requestor");
        let request = test_request(&requestor, RiskTier::Caution, 1, false);
        state.create_request(&request).await.expect("create request");

        let service = service(state.clone(), HashSet::new());
        let input = signed_input(
            requestor.id,
            &requestor.session_key,
            request.id,
            ReviewDecision::Approve,
        )
        .await;
        let err = service.submit_review(input).await.expect_err("self review rejected");
        assert!(matches!(err, ReviewError::SelfReviewNotAllowed));
    }

    #[tokio::test]
    async fn duplicate_vote_from_same_reviewer_is_rejected() {
        let (_dir, state) = temp_runtime().await;
        let requestor = test_session("agent-a", "model-a", "/repo");
        state.create_session(&requestor).await.expect("create requestor");
        let reviewer = test_session("agent-b", "model-b", "/repo");
        state.create_session(&reviewer).await.expect("create reviewer");
        let request = test_request(&requestor, RiskTier::Dangerous, 2, false);
        state.create_request(&request).await.expect("create request");

        let service = service(state.clone(), HashSet::new());
        let first = signed_input(
            reviewer.id,
            &reviewer.session_key,
            request.id,
            ReviewDecision::Approve,
        )
        .await;
        service.submit_review(first).await.expect("first vote");

        let second = signed_input(
            reviewer.id,
            &reviewer.session_key,
            request.id,
            ReviewDecision::Approve,
        )
        .await;
        let err = service.submit_review(second).await.expect_err("duplicate rejected");
        assert!(matches!(err, ReviewError::DuplicateVote(_, _)));
    }
}
