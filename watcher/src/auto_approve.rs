use chrono::Utc;
use slb_core::RequestPoller;
use slb_core::ReviewError;
use slb_core::ReviewService;
use slb_core::SignablePayload;
use slb_core::SubmitReviewInput;
use slb_core::should_auto_approve_caution;
use slb_core::signing;
use slb_protocol::RequestId;
use slb_protocol::RequestStatus;
use slb_protocol::RequestStreamEvent;
use slb_protocol::ReviewDecision;
use slb_protocol::Session;
use slb_protocol::SessionId;
use slb_protocol::StructuredResponses;
use slb_state::StateRuntime;
use slb_state::StoreError;

pub const AUTO_APPROVE_SESSION_NAME: &str = "auto-approve";
const AUTO_APPROVE_SESSION_KEY: &str = "auto-approve-watcher-key";

/// Look up the watcher's dedicated auto-approver session for `project_path`,
/// creating it on first use. The session id is deterministic by default
/// (stable across watcher restarts); `override_id` lets a caller pin it to
/// something else, e.g. via `--session-id`.
pub async fn ensure_auto_approve_session(
    state: &StateRuntime,
    project_path: &str,
    override_id: Option<SessionId>,
) -> Result<Session, StoreError> {
    let id = override_id.unwrap_or_else(|| SessionId::from_stable_name(AUTO_APPROVE_SESSION_NAME));
    if let Some(session) = state.get_session(id).await? {
        return Ok(session);
    }
    let session = Session {
        id,
        agent_name: AUTO_APPROVE_SESSION_NAME.to_string(),
        model: "none".to_string(),
        program: "slb-watcher".to_string(),
        project_path: project_path.to_string(),
        session_key: AUTO_APPROVE_SESSION_KEY.to_string(),
        started_at: Utc::now(),
        ended_at: None,
    };
    state.create_session(&session).await?;
    Ok(session)
}

/// Cast an auto-approval vote for `request_id`. The caller turns any error
/// here into an `auto_approve_error` event; this never retries on its own.
pub async fn submit_auto_approval(
    review_service: &ReviewService,
    session: &Session,
    request_id: RequestId,
) -> Result<(), ReviewError> {
    let comments = "auto-approved".to_string();
    let responses = StructuredResponses {
        reason: "caution-tier command auto-approved by watcher policy".to_string(),
        effect: "not reviewed by a human or peer agent".to_string(),
        goal: "unblock low-risk automation without a manual step".to_string(),
        safety: "risk tier is caution; dangerous and critical tiers are never auto-approved"
            .to_string(),
    };
    let signature = signing::sign(
        &session.session_key,
        &SignablePayload {
            request_id,
            reviewer_session_id: session.id,
            decision: ReviewDecision::Approve,
            comments: &comments,
            responses: &responses,
        },
    )?;
    review_service
        .submit_review(SubmitReviewInput {
            session_id: session.id,
            request_id,
            decision: ReviewDecision::Approve,
            comments,
            responses,
            signature,
        })
        .await?;
    Ok(())
}

/// Bundles what `--auto-approve-caution` needs to act on a `RequestPending`
/// event: the store (to load/create the dedicated session) and the review
/// service (to cast the vote). Shared between the daemon-attached stream
/// and the standalone poll fallback so caution-tier auto-approval behaves
/// identically whichever path the watcher took to learn about the request.
pub struct AutoApproveHandle {
    state: StateRuntime,
    review_service: ReviewService,
    project_path: String,
}

impl AutoApproveHandle {
    pub fn new(state: StateRuntime, review_service: ReviewService, project_path: String) -> Self {
        Self {
            state,
            review_service,
            project_path,
        }
    }

    /// Act on `event` if it is a caution-tier `RequestPending`. Returns an
    /// `auto_approve_error` event on failure, for the caller to emit
    /// alongside the original event; returns `None` otherwise.
    pub async fn handle_event(&self, event: &RequestStreamEvent) -> Option<RequestStreamEvent> {
        let RequestStreamEvent::RequestPending(body) = event else {
            return None;
        };
        if !should_auto_approve_caution(RequestStatus::Pending, body.risk_tier) {
            return None;
        }
        let request_id = body.request_id;
        let session = match ensure_auto_approve_session(&self.state, &self.project_path, None).await {
            Ok(session) => session,
            Err(err) => {
                return Some(RequestPoller::auto_approve_error_event(
                    request_id,
                    format!("failed to load auto-approve session: {err}"),
                ));
            }
        };
        if let Err(err) =
            submit_auto_approval(&self.review_service, &session, request_id).await
        {
            return Some(RequestPoller::auto_approve_error_event(
                request_id,
                format!("auto-approve vote failed: {err}"),
            ));
        }
        None
    }
}
