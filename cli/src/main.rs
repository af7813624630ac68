use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use clap::Subcommand;
use slb_core::BrokerConfig;
use slb_core::Notifier;
use slb_core::RequestService;
use slb_core::ReviewService;
use slb_core::SubmitReviewInput;
use slb_core::TracingNotifier;
use slb_core::signing;
use slb_core::signing::SignablePayload;
use slb_protocol::Command;
use slb_protocol::Outcome;
use slb_protocol::OutcomeId;
use slb_protocol::RequestId;
use slb_protocol::RequestStatus;
use slb_protocol::ReviewDecision;
use slb_protocol::RiskTier;
use slb_protocol::SessionId;
use slb_protocol::StoredRequest;
use slb_protocol::StructuredResponses;
use slb_state::StateRuntime;
use slb_watcher::auto_approve;
use slb_watcher::auto_approve::AutoApproveHandle;
use slb_watcher::daemon_client;
use slb_watcher::poll_fallback::PollFallback;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Command-line front end for the multi-party command-approval broker.
#[derive(Debug, Parser)]
#[command(name = "slb", about = "Multi-party command-approval broker")]
struct Cli {
    /// Project directory whose store this invocation targets.
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    #[command(subcommand)]
    command: SlbCommand,
}

#[derive(Debug, Subcommand)]
enum SlbCommand {
    /// Submit a new command for review.
    Submit(SubmitArgs),
    /// Cast a review vote on a pending request.
    Review(ReviewArgs),
    /// Tail the request stream: attaches to a running daemon, or falls
    /// back to polling the store directly.
    Watch(WatchArgs),
    /// Report the daemon's status for this project.
    Status,
    /// Record the execution outcome of an approved request.
    Outcome(OutcomeArgs),
}

#[derive(Debug, clap::Args)]
struct SubmitArgs {
    /// Session id of the requesting agent; must already exist.
    #[arg(long)]
    session_id: SessionId,
    /// The literal command text.
    #[arg(long)]
    command: String,
    /// Optional redacted form to show in events instead of the raw text.
    #[arg(long)]
    redacted_command: Option<String>,
    #[arg(long)]
    risk_tier: RiskTier,
    #[arg(long, default_value_t = 1)]
    min_approvals: u32,
    #[arg(long, default_value_t = false)]
    require_different_model: bool,
}

#[derive(Debug, clap::Args)]
struct ReviewArgs {
    #[arg(long)]
    session_id: SessionId,
    /// The reviewer session's signing key.
    #[arg(long)]
    session_key: String,
    #[arg(long)]
    request_id: RequestId,
    #[arg(long)]
    decision: ReviewDecision,
    #[arg(long, default_value = "")]
    comments: String,
    #[arg(long, default_value = "")]
    reason: String,
    #[arg(long, default_value = "")]
    effect: String,
    #[arg(long, default_value = "")]
    goal: String,
    #[arg(long, default_value = "")]
    safety: String,
}

#[derive(Debug, clap::Args)]
struct WatchArgs {
    #[arg(long, default_value_t = false)]
    auto_approve_caution: bool,
    #[arg(long, default_value_t = 1)]
    poll_interval_secs: u64,
}

#[derive(Debug, clap::Args)]
struct OutcomeArgs {
    #[arg(long)]
    request_id: RequestId,
    #[arg(long)]
    exit_code: i32,
    /// Mark this execution as having caused a problem, for offline review.
    #[arg(long, default_value_t = false)]
    caused_problems: bool,
    #[arg(long)]
    problem_description: Option<String>,
    /// 1-5 human rating of how well the approval process handled this request.
    #[arg(long)]
    human_rating: Option<u8>,
    #[arg(long)]
    notes: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    slb_core::logging::init();
    let cli = Cli::parse();
    let project_dir = cli.project_dir.canonicalize().unwrap_or(cli.project_dir);

    match cli.command {
        SlbCommand::Submit(args) => run_submit(&project_dir, args).await,
        SlbCommand::Review(args) => run_review(&project_dir, args).await,
        SlbCommand::Watch(args) => run_watch(&project_dir, args).await,
        SlbCommand::Status => run_status(&project_dir).await,
        SlbCommand::Outcome(args) => run_outcome(&project_dir, args).await,
    }
}

async fn open_state(project_dir: &Path) -> Result<StateRuntime> {
    Ok(StateRuntime::init(project_dir).await?)
}

async fn run_submit(project_dir: &Path, args: SubmitArgs) -> Result<()> {
    let state = open_state(project_dir).await?;
    let requestor = state
        .get_session(args.session_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("session {} not found", args.session_id))?;
    if !requestor.is_active() {
        anyhow::bail!("session {} has already ended", args.session_id);
    }

    let request = StoredRequest {
        id: RequestId::new(),
        requestor_session_id: requestor.id,
        requestor_agent: requestor.agent_name,
        requestor_model: requestor.model,
        command: Command::new(args.command, args.redacted_command),
        risk_tier: args.risk_tier,
        min_approvals: args.min_approvals,
        require_different_model: args.require_different_model,
        project_path: requestor.project_path,
        status: RequestStatus::Pending,
        created_at: Utc::now(),
        resolved_at: None,
        rollback: None,
    };
    let request_id = request.id;

    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let request_service = RequestService::new(state, notifier);
    request_service.submit_request(request).await?;
    println!("{request_id}");
    Ok(())
}

async fn run_review(project_dir: &Path, args: ReviewArgs) -> Result<()> {
    let state = open_state(project_dir).await?;
    let reviewer = state
        .get_session(args.session_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("session {} not found", args.session_id))?;

    let responses = StructuredResponses {
        reason: args.reason,
        effect: args.effect,
        goal: args.goal,
        safety: args.safety,
    };
    let signature = signing::sign(
        &args.session_key,
        &SignablePayload {
            request_id: args.request_id,
            reviewer_session_id: reviewer.id,
            decision: args.decision,
            comments: &args.comments,
            responses: &responses,
        },
    )?;

    let config = BrokerConfig::load(&project_dir.join(".slb/config.toml")).await?;
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let review_service = ReviewService::new(state, notifier, config.trusted_self_approvers);
    let outcome = review_service
        .submit_review(SubmitReviewInput {
            session_id: reviewer.id,
            request_id: args.request_id,
            decision: args.decision,
            comments: args.comments,
            responses,
            signature,
        })
        .await?;
    println!(
        "approvals={} rejections={} status_changed={}",
        outcome.approvals, outcome.rejections, outcome.status_changed
    );
    Ok(())
}

async fn run_watch(project_dir: &Path, args: WatchArgs) -> Result<()> {
    let state = open_state(project_dir).await?;
    let project_path = project_dir.to_string_lossy().into_owned();
    let auto_approve_handle = if args.auto_approve_caution {
        let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
        let service = ReviewService::new(state.clone(), notifier, HashSet::new());
        auto_approve::ensure_auto_approve_session(&state, &project_path, None).await?;
        Some(AutoApproveHandle::new(state.clone(), service, project_path.clone()))
    } else {
        None
    };

    if daemon_client::is_daemon_reachable(project_dir).await {
        tracing::info!("attached to running daemon");
        daemon_client::follow_request_stream(project_dir, auto_approve_handle.as_ref()).await?;
        return Ok(());
    }

    let interval = Duration::from_secs(args.poll_interval_secs.max(1));
    let mut fallback = PollFallback::new(state, project_path, interval, auto_approve_handle);
    fallback.run().await?;
    Ok(())
}

async fn run_status(project_dir: &Path) -> Result<()> {
    let status = slb_daemon::query_status(project_dir);
    println!("{}", serde_json::to_string(&status)?);
    Ok(())
}

async fn run_outcome(project_dir: &Path, args: OutcomeArgs) -> Result<()> {
    let state = open_state(project_dir).await?;
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let request_service = RequestService::new(state.clone(), notifier);
    let status = request_service
        .record_execution_result(args.request_id, args.exit_code)
        .await?;

    let outcome = Outcome {
        id: OutcomeId::new(),
        request_id: args.request_id,
        caused_problems: args.caused_problems,
        problem_description: args.problem_description,
        human_rating: args.human_rating,
        notes: args.notes,
        created_at: Utc::now(),
    };
    state.record_outcome(&outcome).await?;

    println!("{status}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_parses_required_flags() {
        let cli = Cli::try_parse_from([
            "slb",
            "submit",
            "--session-id",
            "11111111-1111-1111-1111-111111111111",
            "--command",
            "rm -rf /tmp/scratch",
            "--risk-tier",
            "caution",
        ])
        .expect("parse should succeed");
        let SlbCommand::Submit(args) = cli.command else {
            panic!("expected submit subcommand");
        };
        assert_eq!(args.min_approvals, 1);
        assert!(!args.require_different_model);
        assert_eq!(args.risk_tier, RiskTier::Caution);
    }

    #[test]
    fn review_requires_decision() {
        let result = Cli::try_parse_from([
            "slb",
            "review",
            "--session-id",
            "11111111-1111-1111-1111-111111111111",
            "--session-key",
            "key",
            "--request-id",
            "22222222-2222-2222-2222-222222222222",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn outcome_parses_negative_exit_code_is_rejected_by_type() {
        let cli = Cli::try_parse_from([
            "slb",
            "outcome",
            "--request-id",
            "22222222-2222-2222-2222-222222222222",
            "--exit-code",
            "1",
        ])
        .expect("parse should succeed");
        let SlbCommand::Outcome(args) = cli.command else {
            panic!("expected outcome subcommand");
        };
        assert_eq!(args.exit_code, 1);
        assert!(!args.caused_problems);
        assert_eq!(args.human_rating, None);
    }

    #[test]
    fn outcome_parses_human_feedback_flags() {
        let cli = Cli::try_parse_from([
            "slb",
            "outcome",
            "--request-id",
            "22222222-2222-2222-2222-222222222222",
            "--exit-code",
            "1",
            "--caused-problems",
            "--problem-description",
            "deleted an untracked file",
            "--human-rating",
            "2",
            "--notes",
            "should have required a rollback plan",
        ])
        .expect("parse should succeed");
        let SlbCommand::Outcome(args) = cli.command else {
            panic!("expected outcome subcommand");
        };
        assert!(args.caused_problems);
        assert_eq!(args.problem_description.as_deref(), Some("deleted an untracked file"));
        assert_eq!(args.human_rating, Some(2));
        assert_eq!(args.notes.as_deref(), Some("should have required a rollback plan"));
    }

    #[test]
    fn watch_defaults_to_one_second_poll_interval() {
        let cli = Cli::try_parse_from(["slb", "watch"]).expect("parse should succeed");
        let SlbCommand::Watch(args) = cli.command else {
            panic!("expected watch subcommand");
        };
        assert_eq!(args.poll_interval_secs, 1);
        assert!(!args.auto_approve_caution);
    }
}
