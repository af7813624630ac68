use super::StateRuntime;
use crate::error::StoreResult;
use crate::model::SessionRow;
use crate::model::datetime_to_epoch_seconds;
use chrono::DateTime;
use chrono::Utc;
use slb_protocol::Session;
use slb_protocol::SessionId;

impl StateRuntime {
    pub async fn create_session(&self, session: &Session) -> StoreResult<()> {
        sqlx::query(
            r#"
INSERT INTO sessions (id, agent_name, model, program, project_path, session_key, started_at, ended_at)
VALUES (?, ?, ?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(session.id.to_string())
        .bind(&session.agent_name)
        .bind(&session.model)
        .bind(&session.program)
        .bind(&session.project_path)
        .bind(&session.session_key)
        .bind(datetime_to_epoch_seconds(session.started_at))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_session(&self, id: SessionId) -> StoreResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
SELECT id, agent_name, model, program, project_path, session_key, started_at, ended_at
FROM sessions
WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await?;
        row.map(Session::try_from).transpose()
    }

    pub async fn end_session(&self, id: SessionId, at: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
UPDATE sessions SET ended_at = ? WHERE id = ? AND ended_at IS NULL
            "#,
        )
        .bind(datetime_to_epoch_seconds(at))
        .bind(id.to_string())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_active_sessions(&self, project_path: &str) -> StoreResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
SELECT id, agent_name, model, program, project_path, session_key, started_at, ended_at
FROM sessions
WHERE project_path = ? AND ended_at IS NULL
ORDER BY started_at ASC
            "#,
        )
        .bind(project_path)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(Session::try_from).collect()
    }
}
