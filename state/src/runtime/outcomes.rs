use super::StateRuntime;
use crate::error::StoreError;
use crate::error::StoreResult;
use crate::model::OutcomeRow;
use crate::model::datetime_to_epoch_seconds;
use slb_protocol::Outcome;
use slb_protocol::RiskTier;
use std::str::FromStr;

const OUTCOME_COLUMNS: &str =
    "id, request_id, caused_problems, problem_description, human_rating, notes, created_at";

impl StateRuntime {
    pub async fn record_outcome(&self, outcome: &Outcome) -> StoreResult<()> {
        let sql = format!("INSERT INTO outcomes ({OUTCOME_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)");
        sqlx::query(&sql)
            .bind(outcome.id.to_string())
            .bind(outcome.request_id.to_string())
            .bind(i64::from(outcome.caused_problems))
            .bind(&outcome.problem_description)
            .bind(outcome.human_rating.map(i64::from))
            .bind(&outcome.notes)
            .bind(datetime_to_epoch_seconds(outcome.created_at))
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn list_outcomes(&self) -> StoreResult<Vec<Outcome>> {
        let sql = format!("SELECT {OUTCOME_COLUMNS} FROM outcomes ORDER BY created_at ASC");
        let rows = sqlx::query_as::<_, OutcomeRow>(&sql)
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(Outcome::try_from).collect()
    }

    pub async fn list_problematic_outcomes(&self) -> StoreResult<Vec<Outcome>> {
        let sql = format!(
            "SELECT {OUTCOME_COLUMNS} FROM outcomes WHERE caused_problems = 1 ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, OutcomeRow>(&sql)
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(Outcome::try_from).collect()
    }

    pub async fn get_outcome_stats(&self) -> StoreResult<OutcomeStats> {
        let row = sqlx::query_as::<_, OutcomeStatsRow>(
            r#"
SELECT
    COUNT(*) AS total,
    SUM(CASE WHEN caused_problems = 1 THEN 1 ELSE 0 END) AS problematic,
    AVG(human_rating) AS average_rating
FROM outcomes
            "#,
        )
        .fetch_one(self.pool())
        .await?;
        Ok(OutcomeStats {
            total: row.total.max(0) as u64,
            problematic: row.problematic.unwrap_or(0).max(0) as u64,
            average_rating: row.average_rating,
        })
    }

    /// Mean seconds between `request.created_at` and `request.resolved_at`
    /// for requests that reached a decision, bucketed by risk tier.
    pub async fn get_time_to_approval_stats(&self) -> StoreResult<Vec<TimeToApprovalStats>> {
        let rows = sqlx::query_as::<_, TimeToApprovalStatsRow>(
            r#"
SELECT
    risk_tier,
    AVG(resolved_at - created_at) AS average_seconds,
    COUNT(*) AS sample_size
FROM requests
WHERE resolved_at IS NOT NULL
GROUP BY risk_tier
ORDER BY risk_tier ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;
        rows.into_iter()
            .map(|row| {
                let risk_tier = RiskTier::from_str(&row.risk_tier).map_err(|_| {
                    StoreError::CorruptRow(format!("invalid risk tier {}", row.risk_tier))
                })?;
                Ok(TimeToApprovalStats {
                    risk_tier,
                    average_seconds: row.average_seconds.unwrap_or(0.0),
                    sample_size: row.sample_size.max(0) as u64,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomeStats {
    pub total: u64,
    pub problematic: u64,
    pub average_rating: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
struct OutcomeStatsRow {
    total: i64,
    problematic: Option<i64>,
    average_rating: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeToApprovalStats {
    pub risk_tier: RiskTier,
    pub average_seconds: f64,
    pub sample_size: u64,
}

#[derive(Debug, sqlx::FromRow)]
struct TimeToApprovalStatsRow {
    risk_tier: String,
    average_seconds: Option<f64>,
    sample_size: i64,
}
