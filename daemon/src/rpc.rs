use serde::Deserialize;
use serde::Serialize;
use slb_protocol::RequestStreamEvent;

/// One client->daemon frame. The daemon reads exactly one of these per
/// connection before deciding whether to reply once (`GetStatus`) or stream
/// (`SubscribeRequestStream`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DaemonRequest {
    GetStatus,
    SubscribeRequestStream,
}

/// Daemon->client frames. `GetStatus` gets exactly one `Status` frame back;
/// `SubscribeRequestStream` gets zero or more `Event` frames until the
/// client disconnects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DaemonResponse {
    Status(GetStatusResponse),
    Event(RequestStreamEvent),
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonStatus {
    Running,
    Stopped,
    Stale,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetStatusResponse {
    pub status: DaemonStatus,
    pub pid: Option<u32>,
    pub socket_path: String,
    pub socket_alive: bool,
    pub message: String,
}
