//! Event fan-out sink.
//!
//! Logs every engine event as structured JSON. Webhook and dashboard delivery
//! would subscribe the same way.

use tokio::sync::broadcast;
use trust_engine::TrustEvent;

/// Drains `rx` until the engine is dropped, logging each event.
///
/// Returns the number of events logged.
pub async fn log_events(mut rx: broadcast::Receiver<TrustEvent>) -> usize {
    let mut logged = 0;
    loop {
        match rx.recv().await {
            Ok(event) => {
                let payload = serde_json::to_string(&event).unwrap_or_default();
                tracing::info!(
                    target: "trust_gateway::events",
                    kind = event.kind(),
                    agent_id = %event.agent_id(),
                    %payload,
                    "trust event"
                );
                logged += 1;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    logged
}
