use crate::framing::FrameError;
use crate::framing::read_frame;
use crate::framing::write_frame;
use crate::paths;
use crate::pid_file;
use crate::rpc::DaemonRequest;
use crate::rpc::DaemonResponse;
use crate::rpc::DaemonStatus;
use crate::rpc::GetStatusResponse;
use slb_core::BrokerConfig;
use slb_core::PollScope;
use slb_core::RequestPoller;
use slb_core::RequestService;
use slb_core::TracingNotifier;
use slb_protocol::DaemonDegradedBody;
use slb_protocol::RequestStreamEvent;
use slb_state::StateRuntime;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixListener;
use tokio::net::UnixStream;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

/// Bounded per-subscriber buffer. A subscriber that falls this far behind is
/// not disconnected; it simply observes a `DaemonDegraded` event for the
/// events it missed, same as the teacher's connection registry sheds oldest
/// rather than killing a slow reader outright.
const CHANNEL_CAPACITY: usize = 256;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How often the background sweep checks pending requests against their
/// risk tier's timeout. Coarser than `POLL_INTERVAL`: timeouts are measured
/// in minutes, not milliseconds.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

pub struct DaemonServer {
    state: StateRuntime,
    project_dir: PathBuf,
    project_path: String,
    socket_path: PathBuf,
    pid_path: PathBuf,
}

impl DaemonServer {
    pub fn new(state: StateRuntime, project_dir: &Path) -> Self {
        let project_path = project_dir.to_string_lossy().into_owned();
        Self {
            state,
            project_dir: project_dir.to_path_buf(),
            socket_path: paths::socket_path(project_dir),
            pid_path: paths::pid_path(project_dir),
            project_path,
        }
    }

    /// Bind the socket, write the PID file, and serve connections until
    /// `cancellation` fires. Removes both files on the way out.
    pub async fn run(self, cancellation: CancellationToken) -> anyhow::Result<()> {
        self.remove_stale_socket()?;
        if let Some(parent) = self.socket_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let listener = UnixListener::bind(&self.socket_path).inspect_err(|err| {
            error!(
                "failed to bind daemon socket at {}: {err}",
                self.socket_path.display()
            );
        })?;
        pid_file::write(&self.pid_path, std::process::id())?;
        info!(socket = %self.socket_path.display(), "daemon listening");

        let (events_tx, _) = broadcast::channel::<RequestStreamEvent>(CHANNEL_CAPACITY);

        let poll_task = tokio::spawn(run_poll_loop(
            self.state.clone(),
            self.project_path.clone(),
            events_tx.clone(),
            cancellation.clone(),
        ));

        let config = BrokerConfig::load(&self.project_dir.join(".slb/config.toml"))
            .await
            .unwrap_or_else(|err| {
                warn!("failed to load broker config, using defaults: {err}");
                BrokerConfig::default()
            });
        let request_service = Arc::new(RequestService::new(
            self.state.clone(),
            Arc::new(TracingNotifier),
        ));
        let sweeper_task = request_service.spawn_timeout_sweeper(
            config.timeouts,
            SWEEP_INTERVAL,
            cancellation.clone(),
        );

        let accept_result = self.accept_loop(listener, events_tx, cancellation.clone()).await;

        cancellation.cancel();
        let _ = poll_task.await;
        let _ = sweeper_task.await;
        let _ = pid_file::remove(&self.pid_path);
        let _ = std::fs::remove_file(&self.socket_path);
        accept_result
    }

    fn remove_stale_socket(&self) -> anyhow::Result<()> {
        let Ok(existing_pid) = pid_file::read(&self.pid_path) else {
            return Ok(());
        };
        if let Some(pid) = existing_pid {
            if pid_file::is_alive(pid) {
                anyhow::bail!(
                    "daemon already running for this project (pid {pid}, socket {})",
                    self.socket_path.display()
                );
            }
        }
        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }

    async fn accept_loop(
        &self,
        listener: UnixListener,
        events_tx: broadcast::Sender<RequestStreamEvent>,
        cancellation: CancellationToken,
    ) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => return Ok(()),
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let events_rx = events_tx.subscribe();
                            let status = self.status_response();
                            let connection_cancellation = cancellation.clone();
                            tokio::spawn(async move {
                                if let Err(err) =
                                    handle_connection(stream, events_rx, status, connection_cancellation).await
                                {
                                    warn!("connection handler exited: {err}");
                                }
                            });
                        }
                        Err(err) => {
                            error!("failed to accept connection: {err}");
                        }
                    }
                }
            }
        }
    }

    fn status_response(&self) -> GetStatusResponse {
        GetStatusResponse {
            status: DaemonStatus::Running,
            pid: Some(std::process::id()),
            socket_path: self.socket_path.to_string_lossy().into_owned(),
            socket_alive: true,
            message: "daemon is running".to_string(),
        }
    }
}

/// Query the on-disk status of a daemon for `project_dir` without starting
/// one: used by `slb status` and by a daemon refusing to double-start.
pub fn query_status(project_dir: &Path) -> GetStatusResponse {
    let socket_path = paths::socket_path(project_dir);
    let pid_path = paths::pid_path(project_dir);
    let pid = pid_file::read(&pid_path).ok().flatten();
    let socket_alive = socket_path.exists();
    let status = match pid {
        Some(pid) if pid_file::is_alive(pid) && socket_alive => DaemonStatus::Running,
        Some(_) => DaemonStatus::Stale,
        None => DaemonStatus::Stopped,
    };
    let message = match status {
        DaemonStatus::Running => "daemon is running".to_string(),
        DaemonStatus::Stale => "PID file present but process is gone".to_string(),
        DaemonStatus::Stopped => "no daemon running".to_string(),
    };
    GetStatusResponse {
        status,
        pid,
        socket_path: socket_path.to_string_lossy().into_owned(),
        socket_alive,
        message,
    }
}

async fn run_poll_loop(
    state: StateRuntime,
    project_path: String,
    events_tx: broadcast::Sender<RequestStreamEvent>,
    cancellation: CancellationToken,
) {
    let mut poller = RequestPoller::new(state, PollScope::Project(project_path));
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = cancellation.cancelled() => break,
            _ = ticker.tick() => {
                match poller.poll_once().await {
                    Ok(events) => {
                        for event in events {
                            // No subscribers is not an error; the event is simply dropped.
                            let _ = events_tx.send(event);
                        }
                    }
                    Err(err) => warn!("poll cycle failed: {err}"),
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: UnixStream,
    mut events_rx: broadcast::Receiver<RequestStreamEvent>,
    status: GetStatusResponse,
    cancellation: CancellationToken,
) -> Result<(), FrameError> {
    let request: DaemonRequest = read_frame(&mut stream).await?;
    match request {
        DaemonRequest::GetStatus => {
            write_frame(&mut stream, &DaemonResponse::Status(status)).await?;
            Ok(())
        }
        DaemonRequest::SubscribeRequestStream => loop {
            tokio::select! {
                _ = cancellation.cancelled() => return Ok(()),
                received = events_rx.recv() => {
                    match received {
                        Ok(event) => {
                            write_frame(&mut stream, &DaemonResponse::Event(event)).await?;
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            let degraded = RequestStreamEvent::DaemonDegraded(DaemonDegradedBody {
                                dropped_events: skipped,
                                ts: chrono::Utc::now(),
                            });
                            write_frame(&mut stream, &DaemonResponse::Event(degraded)).await?;
                        }
                        Err(broadcast::error::RecvError::Closed) => return Ok(()),
                    }
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_status_round_trips_over_the_socket() {
        let (_state_dir, state) = slb_state::test_support::temp_runtime().await;
        let project_dir = tempfile::TempDir::new().expect("project dir");
        let server = DaemonServer::new(state, project_dir.path());
        let socket_path = server.socket_path.clone();

        let cancellation = CancellationToken::new();
        let server_cancellation = cancellation.clone();
        let handle = tokio::spawn(async move { server.run(server_cancellation).await });

        let mut connected = None;
        for _ in 0..50 {
            if let Ok(stream) = UnixStream::connect(&socket_path).await {
                connected = Some(stream);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let mut stream = connected.expect("daemon socket should become connectable");

        write_frame(&mut stream, &DaemonRequest::GetStatus)
            .await
            .expect("write GetStatus");
        let response: DaemonResponse = read_frame(&mut stream).await.expect("read status");
        assert!(matches!(response, DaemonResponse::Status(_)));

        cancellation.cancel();
        let _ = handle.await;
    }
}
