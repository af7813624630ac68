use rand::Rng;
use std::future::Future;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_DELAY_MS: u64 = 20;
const BACKOFF_FACTOR: f64 = 2.0;

fn backoff(attempt: u32) -> Duration {
    let exp = BACKOFF_FACTOR.powi(attempt.saturating_sub(1) as i32);
    let base = (INITIAL_DELAY_MS as f64 * exp) as u64;
    let jitter = rand::rng().random_range(0.9..1.1);
    Duration::from_millis((base as f64 * jitter) as u64)
}

/// Retry `op` up to [`MAX_ATTEMPTS`] times while `is_transient` says the
/// error is worth retrying (a contended SQLite write), backing off between
/// attempts. The first permanent error, or the last attempt's transient
/// one, is returned as is.
pub(crate) async fn with_retry<T, E, F, Fut>(is_transient: impl Fn(&E) -> bool, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < MAX_ATTEMPTS && is_transient(&err) => {
                tracing::warn!(attempt, "transient store error, retrying");
                tokio::time::sleep(backoff(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
