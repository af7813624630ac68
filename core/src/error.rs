use thiserror::Error;

/// Errors surfaced by [`crate::review_service::ReviewService::submit_review`].
///
/// Every variant here is a validation/authorization/conflict failure per the
/// error handling policy: none of them are retried and none of them mutate
/// stored state.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("request {0} not found")]
    RequestNotFound(slb_protocol::RequestId),

    #[error("request {0} is not pending (status: {1})")]
    RequestNotPending(slb_protocol::RequestId, slb_protocol::RequestStatus),

    #[error("reviewer session {0} not found")]
    ReviewerSessionNotFound(slb_protocol::SessionId),

    #[error("reviewer session {0} has already ended")]
    ReviewerSessionEnded(slb_protocol::SessionId),

    #[error("requestor session {0} not found")]
    RequestorSessionNotFound(slb_protocol::SessionId),

    #[error("review signature does not verify")]
    InvalidSignature,

    #[error("reviewer may not approve their own request")]
    SelfReviewNotAllowed,

    #[error("request requires a reviewer on a different model, but reviewer model is empty")]
    MissingReviewerModel,

    #[error("request requires a reviewer on a different model than {0}")]
    SameModelNotAllowed(String),

    #[error("reviewer {0} has already voted on request {1}")]
    DuplicateVote(slb_protocol::SessionId, slb_protocol::RequestId),

    #[error(transparent)]
    Store(#[from] slb_state::StoreError),

    #[error(transparent)]
    Signing(#[from] crate::signing::SigningError),
}

impl ReviewError {
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, ReviewError::Store(err) if err.is_transient())
    }
}

/// Errors surfaced by [`crate::request_service::RequestService`].
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request {0} not found")]
    RequestNotFound(slb_protocol::RequestId),

    #[error("request {0} is not pending (status: {1})")]
    RequestNotPending(slb_protocol::RequestId, slb_protocol::RequestStatus),

    #[error("only the original requestor may cancel request {0}")]
    NotRequestor(slb_protocol::RequestId),

    #[error("request {0} already has a rollback attached")]
    RollbackAlreadyAttached(slb_protocol::RequestId),

    #[error("request {0} is not approved (status: {1})")]
    RequestNotApproved(slb_protocol::RequestId, slb_protocol::RequestStatus),

    #[error(transparent)]
    Store(#[from] slb_state::StoreError),
}

impl RequestError {
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, RequestError::Store(err) if err.is_transient())
    }
}

/// Errors loading [`crate::config::BrokerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
