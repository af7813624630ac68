use super::StateRuntime;
use crate::error::StoreResult;
use crate::model::RequestRow;
use crate::model::ReviewRow;
use crate::model::datetime_to_epoch_seconds;
use chrono::DateTime;
use chrono::Utc;
use slb_protocol::RequestId;
use slb_protocol::RequestStatus;
use slb_protocol::Review;
use slb_protocol::StoredRequest;
use sqlx::Sqlite;
use sqlx::Transaction;

const REQUEST_COLUMNS: &str = r#"
    id, requestor_session_id, requestor_agent, requestor_model,
    command_raw, command_display_redacted, command_hash,
    risk_tier, min_approvals, require_different_model, project_path,
    status, created_at, resolved_at, rollback_path, rolled_back_at
"#;

const REVIEW_COLUMNS: &str = r#"
    id, request_id, reviewer_session_id, reviewer_agent, reviewer_model,
    decision, comments, response_reason, response_effect, response_goal,
    response_safety, signature, created_at
"#;

/// Whether a unique-constraint violation on `(request_id,
/// reviewer_session_id)` was the cause of an insert failure. Lets the
/// review service distinguish "already voted" from any other store error
/// without string-matching a driver message.
pub fn is_duplicate_vote(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// A single review submission pinned to one SQLite transaction: load the
/// request, insert the review, tally, and (conditionally) update status all
/// commit together or not at all.
pub struct ReviewTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl StateRuntime {
    /// Begin a transaction and load `request_id` within it. The returned
    /// snapshot is read with the transaction's isolation, so a concurrent
    /// writer cannot change `status` out from under the caller before
    /// `update_status` runs.
    pub async fn begin_review_transaction(
        &self,
        request_id: RequestId,
    ) -> StoreResult<(ReviewTransaction, Option<StoredRequest>)> {
        let mut tx = self.pool().begin().await?;
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?");
        let row = sqlx::query_as::<_, RequestRow>(&sql)
            .bind(request_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        let request = row.map(StoredRequest::try_from).transpose()?;
        Ok((ReviewTransaction { tx }, request))
    }
}

impl ReviewTransaction {
    pub async fn insert_review(&mut self, review: &Review) -> Result<(), sqlx::Error> {
        sqlx::query(
            &format!("INSERT INTO reviews ({REVIEW_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"),
        )
        .bind(review.id.to_string())
        .bind(review.request_id.to_string())
        .bind(review.reviewer_session_id.to_string())
        .bind(&review.reviewer_agent)
        .bind(&review.reviewer_model)
        .bind(review.decision.to_string())
        .bind(&review.comments)
        .bind(&review.responses.reason)
        .bind(&review.responses.effect)
        .bind(&review.responses.goal)
        .bind(&review.responses.safety)
        .bind(&review.signature)
        .bind(datetime_to_epoch_seconds(review.created_at))
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub async fn list_reviews(&mut self, request_id: RequestId) -> StoreResult<Vec<Review>> {
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE request_id = ? ORDER BY created_at ASC, rowid ASC"
        );
        let rows = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(request_id.to_string())
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(Review::try_from).collect()
    }

    /// Guarded the same way as [`StateRuntime::update_request_status`], but
    /// scoped to this transaction so the tally and the write are atomic.
    pub async fn update_status(
        &mut self,
        id: RequestId,
        new_status: RequestStatus,
        resolved_at: Option<DateTime<Utc>>,
    ) -> StoreResult<bool> {
        let predecessors = RequestStatus::predecessors_of(new_status);
        if predecessors.is_empty() {
            return Ok(false);
        }
        let mut builder = sqlx::QueryBuilder::<Sqlite>::new("UPDATE requests SET status = ");
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
        let result = builder.build().execute(&mut *self.tx).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
