//! Per-project IPC daemon: owns a Unix-domain socket and PID file, serves
//! `GetStatus` and `SubscribeRequestStream`, and bridges state-store writes
//! to subscribers via an internal poll loop.

pub mod framing;
pub mod paths;
pub mod pid_file;
pub mod rpc;
pub mod server;

pub use rpc::DaemonRequest;
pub use rpc::DaemonResponse;
pub use rpc::DaemonStatus;
pub use rpc::GetStatusResponse;
pub use server::DaemonServer;
pub use server::query_status;
