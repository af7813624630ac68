use anyhow::Result;
use clap::Parser;
use slb_daemon::DaemonServer;
use slb_state::StateRuntime;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(name = "slb-daemon", about = "Command-approval broker daemon")]
struct Args {
    /// Project directory this daemon serves. Defaults to the current directory.
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    slb_core::logging::init();

    let args = Args::parse();
    let project_dir = args.project_dir.canonicalize().unwrap_or(args.project_dir);
    let state = StateRuntime::init(&project_dir).await?;
    let server = DaemonServer::new(state, &project_dir);

    let cancellation = CancellationToken::new();
    let shutdown = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    server.run(cancellation).await
}
