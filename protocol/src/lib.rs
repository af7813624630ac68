//! Wire and storage types shared by every crate in the approval broker.

mod command;
mod event;
mod ids;
mod outcome;
mod request;
mod review;
mod session;

pub use command::Command;
pub use event::AutoApproveErrorBody;
pub use event::DaemonDegradedBody;
pub use event::RequestEventBody;
pub use event::RequestStreamEvent;
pub use ids::OutcomeId;
pub use ids::RequestId;
pub use ids::ReviewId;
pub use ids::SessionId;
pub use outcome::Outcome;
pub use request::RequestStatus;
pub use request::RiskTier;
pub use request::StoredRequest;
pub use review::Review;
pub use review::ReviewDecision;
pub use review::StructuredResponses;
pub use session::Session;

/// Statuses for which a request is still awaiting reviewer action.
pub fn is_pending(status: RequestStatus) -> bool {
    status == RequestStatus::Pending
}

/// Statuses from which no further review vote can change the outcome.
///
/// `Approved` is terminal for voting purposes even though the executor may
/// still drive it on to `Executed` or `ExecutionFailed`.
pub fn is_terminal(status: RequestStatus) -> bool {
    status != RequestStatus::Pending
}
