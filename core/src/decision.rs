use slb_protocol::RequestId;
use slb_protocol::RequestStatus;
use slb_protocol::RiskTier;
use std::collections::HashMap;

/// The event kind a status transition maps to, independent of how the
/// transition was observed (push subscription or poll diff).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    RequestPending,
    RequestApproved,
    RequestRejected,
    RequestExecuted,
    RequestTimeout,
    RequestCancelled,
}

/// Maps a terminal-or-approved status to the event it produces. `Pending`
/// has no event of its own here: a request only becomes "pending" news via
/// [`PendingTracker::observe`] the first time it's seen.
pub fn status_to_event(status: RequestStatus) -> Option<EventKind> {
    match status {
        RequestStatus::Pending => None,
        RequestStatus::Approved => Some(EventKind::RequestApproved),
        RequestStatus::Rejected => Some(EventKind::RequestRejected),
        RequestStatus::Executed | RequestStatus::ExecutionFailed => {
            Some(EventKind::RequestExecuted)
        }
        RequestStatus::Timeout => Some(EventKind::RequestTimeout),
        RequestStatus::Cancelled => Some(EventKind::RequestCancelled),
    }
}

/// Whether a caution-tier pending request should be auto-approved.
///
/// Security-critical: only `(pending, caution)` ever returns `true`.
/// `dangerous` and `critical` requests are never auto-approved regardless
/// of status.
pub fn should_auto_approve_caution(status: RequestStatus, tier: RiskTier) -> bool {
    status == RequestStatus::Pending && tier == RiskTier::Caution
}

/// Tracks `request_id -> last observed status` across poll cycles and turns
/// each observation into the event (if any) it should produce, per the
/// polling decision table: unseen ids always emit `request_pending`
/// regardless of their current status; seen ids emit only on a status
/// change, mapped through [`status_to_event`].
#[derive(Debug, Default)]
pub struct PendingTracker {
    seen: HashMap<RequestId, RequestStatus>,
}

impl PendingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, id: RequestId, new_status: RequestStatus) -> Option<EventKind> {
        match self.seen.insert(id, new_status) {
            None => Some(EventKind::RequestPending),
            Some(prev) if prev == new_status => None,
            Some(_) => status_to_event(new_status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn status_to_event_maps_every_terminal_status() {
        assert_eq!(
            status_to_event(RequestStatus::Approved),
            Some(EventKind::RequestApproved)
        );
        assert_eq!(
            status_to_event(RequestStatus::Rejected),
            Some(EventKind::RequestRejected)
        );
        assert_eq!(
            status_to_event(RequestStatus::Executed),
            Some(EventKind::RequestExecuted)
        );
        assert_eq!(
            status_to_event(RequestStatus::ExecutionFailed),
            Some(EventKind::RequestExecuted)
        );
        assert_eq!(
            status_to_event(RequestStatus::Timeout),
            Some(EventKind::RequestTimeout)
        );
        assert_eq!(
            status_to_event(RequestStatus::Cancelled),
            Some(EventKind::RequestCancelled)
        );
        assert_eq!(status_to_event(RequestStatus::Pending), None);
    }

    #[test]
    fn auto_approve_caution_only_fires_for_pending_caution() {
        assert!(should_auto_approve_caution(
            RequestStatus::Pending,
            RiskTier::Caution
        ));
    }

    #[test]
    fn auto_approve_never_fires_for_dangerous_or_critical() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::Rejected,
        ] {
            assert!(!should_auto_approve_caution(status, RiskTier::Dangerous));
            assert!(!should_auto_approve_caution(status, RiskTier::Critical));
        }
    }

    #[test]
    fn auto_approve_never_fires_for_non_pending_caution() {
        assert!(!should_auto_approve_caution(
            RequestStatus::Approved,
            RiskTier::Caution
        ));
        assert!(!should_auto_approve_caution(
            RequestStatus::Rejected,
            RiskTier::Caution
        ));
    }

    #[test]
    fn auto_approve_never_fires_for_safe_tier() {
        assert!(!should_auto_approve_caution(
            RequestStatus::Pending,
            RiskTier::Safe
        ));
    }

    #[test]
    fn pending_tracker_emits_request_pending_on_first_sight() {
        let mut tracker = PendingTracker::new();
        let id: RequestId = Uuid::nil().into();
        assert_eq!(
            tracker.observe(id, RequestStatus::Pending),
            Some(EventKind::RequestPending)
        );
    }

    #[test]
    fn pending_tracker_skips_unchanged_status() {
        let mut tracker = PendingTracker::new();
        let id: RequestId = Uuid::nil().into();
        tracker.observe(id, RequestStatus::Pending);
        assert_eq!(tracker.observe(id, RequestStatus::Pending), None);
    }

    #[test]
    fn pending_tracker_emits_status_change() {
        let mut tracker = PendingTracker::new();
        let id: RequestId = Uuid::nil().into();
        tracker.observe(id, RequestStatus::Pending);
        assert_eq!(
            tracker.observe(id, RequestStatus::Approved),
            Some(EventKind::RequestApproved)
        );
    }

    #[test]
    fn pending_tracker_first_sight_ignores_actual_status() {
        let mut tracker = PendingTracker::new();
        let id: RequestId = Uuid::nil().into();
        assert_eq!(
            tracker.observe(id, RequestStatus::Approved),
            Some(EventKind::RequestPending)
        );
    }
}
