use super::StateRuntime;
use crate::error::StoreResult;
use crate::model::ReviewRow;
use crate::model::datetime_to_epoch_seconds;
use slb_protocol::RequestId;
use slb_protocol::Review;

impl StateRuntime {
    /// Insert a review row. Fails with `StoreError::Database` (unique
    /// constraint violation wrapped by sqlx) if `(request_id,
    /// reviewer_session_id)` already exists.
    pub async fn create_review(&self, review: &Review) -> StoreResult<()> {
        sqlx::query(
            r#"
INSERT INTO reviews (
    id, request_id, reviewer_session_id, reviewer_agent, reviewer_model,
    decision, comments, response_reason, response_effect, response_goal,
    response_safety, signature, created_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
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
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn list_reviews_for_request(&self, request_id: RequestId) -> StoreResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r#"
SELECT
    id, request_id, reviewer_session_id, reviewer_agent, reviewer_model,
    decision, comments, response_reason, response_effect, response_goal,
    response_safety, signature, created_at
FROM reviews
WHERE request_id = ?
ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(request_id.to_string())
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(Review::try_from).collect()
    }
}
