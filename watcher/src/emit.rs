use slb_protocol::RequestStreamEvent;

/// Print `event` as one JSON line on stdout. Serialization failures are
/// logged, not propagated: a single malformed event should never take the
/// watcher down.
#[allow(clippy::print_stdout)]
pub fn emit(event: &RequestStreamEvent) {
    match event.to_jsonl() {
        Ok(line) => println!("{line}"),
        Err(err) => tracing::error!("failed to serialize event: {err}"),
    }
}
