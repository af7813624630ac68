use crate::auto_approve::AutoApproveHandle;
use crate::emit;
use slb_daemon::DaemonRequest;
use slb_daemon::DaemonResponse;
use slb_daemon::framing;
use slb_daemon::framing::FrameError;
use slb_daemon::paths;
use std::path::Path;
use tokio::net::UnixStream;

/// True when a daemon looks reachable for `project_dir`: its socket file
/// exists and `GetStatus` answers over it. Callers fall back to polling on
/// any `false`/error rather than trying to resurrect the daemon themselves.
pub async fn is_daemon_reachable(project_dir: &Path) -> bool {
    let socket_path = paths::socket_path(project_dir);
    if !socket_path.exists() {
        return false;
    }
    match UnixStream::connect(&socket_path).await {
        Ok(mut stream) => {
            let probe = framing::write_frame(&mut stream, &DaemonRequest::GetStatus).await;
            if probe.is_err() {
                return false;
            }
            matches!(
                framing::read_frame::<_, DaemonResponse>(&mut stream).await,
                Ok(DaemonResponse::Status(_))
            )
        }
        Err(_) => false,
    }
}

/// Connect to the daemon for `project_dir`, subscribe to its request
/// stream, and emit every event received until the connection closes or
/// errors. Returns the error that ended the stream so the caller can decide
/// whether to fall back to polling.
///
/// When `auto_approve` is set, every `RequestPending` event is evaluated
/// the same way the standalone poll fallback does, so `--auto-approve-caution`
/// behaves identically whether or not a daemon is attached: the daemon only
/// relays events, it does not vote on them.
pub async fn follow_request_stream(
    project_dir: &Path,
    auto_approve: Option<&AutoApproveHandle>,
) -> Result<(), FrameError> {
    let socket_path = paths::socket_path(project_dir);
    let mut stream = UnixStream::connect(&socket_path).await?;
    framing::write_frame(&mut stream, &DaemonRequest::SubscribeRequestStream).await?;
    loop {
        let response: DaemonResponse = framing::read_frame(&mut stream).await?;
        match response {
            DaemonResponse::Event(event) => {
                emit::emit(&event);
                if let Some(handle) = auto_approve {
                    if let Some(error_event) = handle.handle_event(&event).await {
                        emit::emit(&error_event);
                    }
                }
            }
            DaemonResponse::Status(_) => {}
            DaemonResponse::Error { message } => {
                tracing::error!("daemon reported an error: {message}");
            }
        }
    }
}
