//! Background health-check task (§4.3, §4.6).
//!
//! The monitor itself is transport-agnostic: it just calls a supplied async
//! ping closure on an interval and reports pass/fail events. The endpoint
//! owns the failure counter and the decision to transition to `Failed`
//! after `max_reconnect_attempts` — keeping the counter there (rather than
//! inside this task) is what avoids the historical
//! `reconnectAttempts += newAttempts` compounding bug: this task reports
//! exactly one event per check, never a batch.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One outcome of a health-check tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEvent {
    Ok,
    Failed,
}

/// Spawns a task that calls `ping` every `interval` and reports the outcome
/// on the returned channel. Dropping the returned `JoinHandle`'s abort
/// handle (or calling `.abort()`) stops the monitor; this is how
/// `Endpoint::stop` tears it down.
pub fn spawn<P, Fut>(interval: Duration, mut ping: P) -> (mpsc::Receiver<HealthEvent>, JoinHandle<()>)
where
    P: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send,
{
    let (tx, rx) = mpsc::channel(8);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            let ok = ping().await;
            let event = if ok { HealthEvent::Ok } else { HealthEvent::Failed };
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });
    (rx, handle)
}
