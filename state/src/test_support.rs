//! Test-only helpers for spinning up an isolated [`StateRuntime`].

use crate::StateRuntime;
use chrono::DateTime;
use chrono::Utc;
use slb_protocol::Command;
use slb_protocol::RequestId;
use slb_protocol::RequestStatus;
use slb_protocol::RiskTier;
use slb_protocol::Session;
use slb_protocol::SessionId;
use slb_protocol::StoredRequest;
use tempfile::TempDir;

/// A fresh, migrated database in a temp directory. The `TempDir` must be
/// kept alive for as long as the runtime is in use.
pub async fn temp_runtime() -> (TempDir, StateRuntime) {
    let dir = TempDir::new().expect("create temp dir");
    let runtime = StateRuntime::init(dir.path())
        .await
        .expect("init state runtime");
    (dir, runtime)
}

pub fn test_session(agent_name: &str, model: &str, project_path: &str) -> Session {
    Session {
        id: SessionId::new(),
        agent_name: agent_name.to_string(),
        model: model.to_string(),
        program: "test-harness".to_string(),
        project_path: project_path.to_string(),
        session_key: "test-session-key".to_string(),
        started_at: test_now(),
        ended_at: None,
    }
}

pub fn test_request(
    requestor: &Session,
    risk_tier: RiskTier,
    min_approvals: u32,
    require_different_model: bool,
) -> StoredRequest {
    StoredRequest {
        id: RequestId::new(),
        requestor_session_id: requestor.id,
        requestor_agent: requestor.agent_name.clone(),
        requestor_model: requestor.model.clone(),
        command: Command::new("echo hello", None),
        risk_tier,
        min_approvals,
        require_different_model,
        project_path: requestor.project_path.clone(),
        status: RequestStatus::Pending,
        created_at: test_now(),
        resolved_at: None,
        rollback: None,
    }
}

pub fn test_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
}
