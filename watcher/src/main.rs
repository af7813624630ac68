use anyhow::Result;
use clap::Parser;
use slb_core::ReviewService;
use slb_core::TracingNotifier;
use slb_protocol::SessionId;
use slb_state::StateRuntime;
use slb_watcher::auto_approve;
use slb_watcher::auto_approve::AutoApproveHandle;
use slb_watcher::daemon_client;
use slb_watcher::poll_fallback::PollFallback;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "slb-watcher", about = "Tails the command-approval request stream")]
struct Args {
    /// Project directory to watch. Defaults to the current directory.
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,

    /// Auto-approve caution-tier requests using a dedicated session.
    #[arg(long)]
    auto_approve_caution: bool,

    /// Poll interval, in seconds, used when no daemon is reachable.
    #[arg(long, default_value_t = 1)]
    poll_interval_secs: u64,

    /// Fixed session id to use instead of the deterministic auto-approve id.
    #[arg(long)]
    session_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    slb_core::logging::init();
    let args = Args::parse();
    let project_dir = args.project_dir.canonicalize().unwrap_or(args.project_dir);
    let project_path = project_dir.to_string_lossy().into_owned();

    let state = StateRuntime::init(&project_dir).await?;
    let auto_approve_handle = if args.auto_approve_caution {
        let notifier: Arc<dyn slb_core::Notifier> = Arc::new(TracingNotifier);
        let service = ReviewService::new(state.clone(), notifier, HashSet::new());
        let override_id = match &args.session_id {
            Some(raw) => Some(raw.parse::<SessionId>()?),
            None => None,
        };
        auto_approve::ensure_auto_approve_session(&state, &project_path, override_id).await?;
        Some(AutoApproveHandle::new(state.clone(), service, project_path.clone()))
    } else {
        None
    };

    if daemon_client::is_daemon_reachable(&project_dir).await {
        tracing::info!("attached to running daemon");
        if let Err(err) =
            daemon_client::follow_request_stream(&project_dir, auto_approve_handle.as_ref()).await
        {
            tracing::warn!("daemon connection lost ({err}); falling back to polling");
        } else {
            return Ok(());
        }
    }

    let poll_interval = Duration::from_secs(args.poll_interval_secs.max(1));
    let mut fallback = PollFallback::new(state, project_path, poll_interval, auto_approve_handle);
    fallback.run().await?;
    Ok(())
}
