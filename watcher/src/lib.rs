//! Per-project watcher: tails the request stream, either by attaching to a
//! running daemon or, when none is reachable, by polling the state store
//! directly. Optionally auto-approves caution-tier requests.

pub mod auto_approve;
pub mod daemon_client;
pub mod emit;
pub mod poll_fallback;
