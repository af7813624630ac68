use crate::error::StoreError;
use crate::error::StoreResult;
use chrono::DateTime;
use chrono::Utc;
use slb_protocol::Command;
use slb_protocol::Outcome;
use slb_protocol::OutcomeId;
use slb_protocol::RequestId;
use slb_protocol::RequestStatus;
use slb_protocol::Review;
use slb_protocol::ReviewDecision;
use slb_protocol::ReviewId;
use slb_protocol::RiskTier;
use slb_protocol::Rollback;
use slb_protocol::Session;
use slb_protocol::SessionId;
use slb_protocol::StoredRequest;
use slb_protocol::StructuredResponses;
use std::str::FromStr;

pub(crate) fn epoch_seconds_to_datetime(secs: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or(StoreError::InvalidTimestamp(secs))
}

pub(crate) fn datetime_to_epoch_seconds(at: DateTime<Utc>) -> i64 {
    at.timestamp()
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SessionRow {
    pub(crate) id: String,
    pub(crate) agent_name: String,
    pub(crate) model: String,
    pub(crate) program: String,
    pub(crate) project_path: String,
    pub(crate) session_key: String,
    pub(crate) started_at: i64,
    pub(crate) ended_at: Option<i64>,
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> StoreResult<Self> {
        Ok(Self {
            id: SessionId::from_str(&row.id)
                .map_err(|e| StoreError::CorruptRow(e.to_string()))?,
            agent_name: row.agent_name,
            model: row.model,
            program: row.program,
            project_path: row.project_path,
            session_key: row.session_key,
            started_at: epoch_seconds_to_datetime(row.started_at)?,
            ended_at: row.ended_at.map(epoch_seconds_to_datetime).transpose()?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RequestRow {
    pub(crate) id: String,
    pub(crate) requestor_session_id: String,
    pub(crate) requestor_agent: String,
    pub(crate) requestor_model: String,
    pub(crate) command_raw: String,
    pub(crate) command_display_redacted: String,
    pub(crate) command_hash: String,
    pub(crate) risk_tier: String,
    pub(crate) min_approvals: i64,
    pub(crate) require_different_model: i64,
    pub(crate) project_path: String,
    pub(crate) status: String,
    pub(crate) created_at: i64,
    pub(crate) resolved_at: Option<i64>,
    pub(crate) rollback_path: Option<String>,
    pub(crate) rolled_back_at: Option<i64>,
}

impl TryFrom<RequestRow> for StoredRequest {
    type Error = StoreError;

    fn try_from(row: RequestRow) -> StoreResult<Self> {
        let rollback = row.rollback_path.map(|path| -> StoreResult<Rollback> {
            Ok(Rollback {
                path,
                rolled_back_at: row
                    .rolled_back_at
                    .map(epoch_seconds_to_datetime)
                    .transpose()?,
            })
        });
        Ok(Self {
            id: RequestId::from_str(&row.id).map_err(|e| StoreError::CorruptRow(e.to_string()))?,
            requestor_session_id: SessionId::from_str(&row.requestor_session_id)
                .map_err(|e| StoreError::CorruptRow(e.to_string()))?,
            requestor_agent: row.requestor_agent,
            requestor_model: row.requestor_model,
            command: Command {
                raw: row.command_raw,
                display_redacted: row.command_display_redacted,
                hash: row.command_hash,
            },
            risk_tier: RiskTier::from_str(&row.risk_tier)
                .map_err(|_| StoreError::CorruptRow(format!("invalid risk tier {}", row.risk_tier)))?,
            min_approvals: u32::try_from(row.min_approvals)
                .map_err(|_| StoreError::CorruptRow("negative min_approvals".to_string()))?,
            require_different_model: row.require_different_model != 0,
            project_path: row.project_path,
            status: RequestStatus::from_str(&row.status)
                .map_err(|_| StoreError::CorruptRow(format!("invalid status {}", row.status)))?,
            created_at: epoch_seconds_to_datetime(row.created_at)?,
            resolved_at: row.resolved_at.map(epoch_seconds_to_datetime).transpose()?,
            rollback: rollback.transpose()?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ReviewRow {
    pub(crate) id: String,
    pub(crate) request_id: String,
    pub(crate) reviewer_session_id: String,
    pub(crate) reviewer_agent: String,
    pub(crate) reviewer_model: String,
    pub(crate) decision: String,
    pub(crate) comments: String,
    pub(crate) response_reason: String,
    pub(crate) response_effect: String,
    pub(crate) response_goal: String,
    pub(crate) response_safety: String,
    pub(crate) signature: String,
    pub(crate) created_at: i64,
}

impl TryFrom<ReviewRow> for Review {
    type Error = StoreError;

    fn try_from(row: ReviewRow) -> StoreResult<Self> {
        Ok(Self {
            id: ReviewId::from_str(&row.id).map_err(|e| StoreError::CorruptRow(e.to_string()))?,
            request_id: RequestId::from_str(&row.request_id)
                .map_err(|e| StoreError::CorruptRow(e.to_string()))?,
            reviewer_session_id: SessionId::from_str(&row.reviewer_session_id)
                .map_err(|e| StoreError::CorruptRow(e.to_string()))?,
            reviewer_agent: row.reviewer_agent,
            reviewer_model: row.reviewer_model,
            decision: ReviewDecision::from_str(&row.decision)
                .map_err(|_| StoreError::CorruptRow(format!("invalid decision {}", row.decision)))?,
            comments: row.comments,
            responses: StructuredResponses {
                reason: row.response_reason,
                effect: row.response_effect,
                goal: row.response_goal,
                safety: row.response_safety,
            },
            signature: row.signature,
            created_at: epoch_seconds_to_datetime(row.created_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OutcomeRow {
    pub(crate) id: String,
    pub(crate) request_id: String,
    pub(crate) caused_problems: i64,
    pub(crate) problem_description: Option<String>,
    pub(crate) human_rating: Option<i64>,
    pub(crate) notes: Option<String>,
    pub(crate) created_at: i64,
}

impl TryFrom<OutcomeRow> for Outcome {
    type Error = StoreError;

    fn try_from(row: OutcomeRow) -> StoreResult<Self> {
        Ok(Self {
            id: OutcomeId::from_str(&row.id).map_err(|e| StoreError::CorruptRow(e.to_string()))?,
            request_id: RequestId::from_str(&row.request_id)
                .map_err(|e| StoreError::CorruptRow(e.to_string()))?,
            caused_problems: row.caused_problems != 0,
            problem_description: row.problem_description,
            human_rating: row
                .human_rating
                .map(|v| u8::try_from(v).unwrap_or(u8::MAX)),
            notes: row.notes,
            created_at: epoch_seconds_to_datetime(row.created_at)?,
        })
    }
}
