use super::StateRuntime;
use crate::error::StoreResult;
use crate::model::RequestRow;
use crate::model::datetime_to_epoch_seconds;
use chrono::DateTime;
use chrono::Utc;
use slb_protocol::RequestId;
use slb_protocol::RequestStatus;
use slb_protocol::StoredRequest;
use sqlx::QueryBuilder;
use sqlx::Sqlite;

const REQUEST_COLUMNS: &str = r#"
    id, requestor_session_id, requestor_agent, requestor_model,
    command_raw, command_display_redacted, command_hash,
    risk_tier, min_approvals, require_different_model, project_path,
    status, created_at, resolved_at, rollback_path, rolled_back_at
"#;

impl StateRuntime {
    pub async fn create_request(&self, request: &StoredRequest) -> StoreResult<()> {
        sqlx::query(
            r#"
INSERT INTO requests (
    id, requestor_session_id, requestor_agent, requestor_model,
    command_raw, command_display_redacted, command_hash,
    risk_tier, min_approvals, require_different_model, project_path,
    status, created_at, resolved_at, rollback_path, rolled_back_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, NULL)
            "#,
        )
        .bind(request.id.to_string())
        .bind(request.requestor_session_id.to_string())
        .bind(&request.requestor_agent)
        .bind(&request.requestor_model)
        .bind(&request.command.raw)
        .bind(&request.command.display_redacted)
        .bind(&request.command.hash)
        .bind(request.risk_tier.to_string())
        .bind(i64::from(request.min_approvals))
        .bind(i64::from(request.require_different_model))
        .bind(&request.project_path)
        .bind(request.status.to_string())
        .bind(datetime_to_epoch_seconds(request.created_at))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_request(&self, id: RequestId) -> StoreResult<Option<StoredRequest>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?");
        let row = sqlx::query_as::<_, RequestRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.map(StoredRequest::try_from).transpose()
    }

    pub async fn list_pending_requests(&self, project_path: &str) -> StoreResult<Vec<StoredRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE project_path = ? AND status = ? ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, RequestRow>(&sql)
            .bind(project_path)
            .bind(RequestStatus::Pending.to_string())
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(StoredRequest::try_from).collect()
    }

    pub async fn list_pending_requests_all_projects(&self) -> StoreResult<Vec<StoredRequest>> {
        let sql =
            format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE status = ? ORDER BY created_at ASC");
        let rows = sqlx::query_as::<_, RequestRow>(&sql)
            .bind(RequestStatus::Pending.to_string())
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(StoredRequest::try_from).collect()
    }

    /// Transition `id` to `new_status`, guarded by a single
    /// `WHERE status IN (...)` clause over `new_status`'s legal
    /// predecessors rather than a separate read. Returns `false` (no error)
    /// if the request was not found or was not in a predecessor status,
    /// which covers both "already terminal" and a lost race with a
    /// concurrent reviewer.
    pub async fn update_request_status(
        &self,
        id: RequestId,
        new_status: RequestStatus,
        resolved_at: Option<DateTime<Utc>>,
    ) -> StoreResult<bool> {
        let predecessors = RequestStatus::predecessors_of(new_status);
        if predecessors.is_empty() {
            return Ok(false);
        }
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE requests SET status = ");
        builder.push_bind(new_status.to_string());
        builder.push(", resolved_at = ");
        builder.push_bind(resolved_at.map(datetime_to_epoch_seconds));
        builder.push(" WHERE id = ");
        builder.push_bind(id.to_string());
        builder.push(" AND status IN (");
        let mut separated = builder.separated(", ");
        for status in &predecessors {
            separated.push_bind(status.to_string());
        }
        separated.push_unseparated(")");
        let result = builder.build().execute(self.pool()).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_request_rollback(&self, id: RequestId, path: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
UPDATE requests SET rollback_path = ? WHERE id = ? AND rollback_path IS NULL
            "#,
        )
        .bind(path)
        .bind(id.to_string())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_request_rolled_back_at(
        &self,
        id: RequestId,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
UPDATE requests
SET rolled_back_at = ?
WHERE id = ? AND rollback_path IS NOT NULL AND rolled_back_at IS NULL
            "#,
        )
        .bind(datetime_to_epoch_seconds(at))
        .bind(id.to_string())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_request_stats_by_agent(&self) -> StoreResult<Vec<AgentRequestStats>> {
        let rows = sqlx::query_as::<_, AgentRequestStatsRow>(
            r#"
SELECT
    requestor_agent,
    COUNT(*) AS total_requests,
    SUM(CASE WHEN status = 'approved' OR status = 'executed' THEN 1 ELSE 0 END) AS approved_requests,
    SUM(CASE WHEN status = 'rejected' THEN 1 ELSE 0 END) AS rejected_requests
FROM requests
GROUP BY requestor_agent
ORDER BY requestor_agent ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(AgentRequestStats::from).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequestStats {
    pub agent: String,
    pub total_requests: u64,
    pub approved_requests: u64,
    pub rejected_requests: u64,
}

#[derive(Debug, sqlx::FromRow)]
struct AgentRequestStatsRow {
    requestor_agent: String,
    total_requests: i64,
    approved_requests: i64,
    rejected_requests: i64,
}

impl From<AgentRequestStatsRow> for AgentRequestStats {
    fn from(row: AgentRequestStatsRow) -> Self {
        Self {
            agent: row.requestor_agent,
            total_requests: row.total_requests.max(0) as u64,
            approved_requests: row.approved_requests.max(0) as u64,
            rejected_requests: row.rejected_requests.max(0) as u64,
        }
    }
}
