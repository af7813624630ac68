//! Business logic for the command-approval broker: the review and request
//! services that sit between the daemon's IPC surface and [`slb_state`].

pub mod config;
pub mod decision;
pub mod error;
pub mod logging;
pub mod notifier;
pub mod poller;
pub mod request_service;
mod retry;
pub mod review_service;
pub mod signing;

pub use config::BrokerConfig;
pub use config::TierTimeouts;
pub use decision::EventKind;
pub use decision::PendingTracker;
pub use decision::should_auto_approve_caution;
pub use decision::status_to_event;
pub use error::ConfigError;
pub use poller::PollScope;
pub use poller::RequestPoller;
pub use error::RequestError;
pub use error::ReviewError;
pub use notifier::Notifier;
pub use notifier::TracingNotifier;
pub use request_service::RequestService;
pub use review_service::ReviewService;
pub use review_service::SubmitReviewInput;
pub use review_service::SubmitReviewOutcome;
pub use signing::SignablePayload;
pub use signing::SigningError;
