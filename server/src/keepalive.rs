//! Periodic liveness sweep (§4.8): every 30s, each connected peer either
//! answered the previous round's ping (and gets a fresh one) or didn't (and
//! is terminated).

use std::sync::Arc;
use std::time::Duration;

use crate::registry::Registry;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

pub async fn run(registry: Arc<Registry>) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    ticker.tick().await; // first tick fires immediately; skip it
    loop {
        ticker.tick().await;
        sweep(&registry).await;
    }
}

async fn sweep(registry: &Arc<Registry>) {
    let sessions: Vec<_> = registry.sessions.lock().await.values().cloned().collect();
    for session in sessions {
        if session.take_alive() {
            session.ping();
        } else {
            tracing::debug!(session = %session.id, "missed keep-alive, terminating");
            session.terminate();
        }
    }
}
