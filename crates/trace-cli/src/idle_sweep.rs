use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;
use trace_ingester::TraceAccumulator;

const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Drives `TraceAccumulator::sweep_idle` on a fixed tick, applying the
/// idle-timeout and max-duration completion-policy rules (spec.md §4.1
/// completion policies 1-2) without needing a push to arrive to trigger
/// them.
pub fn spawn(accumulator: Arc<TraceAccumulator>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        loop {
            ticker.tick().await;
            let sealed = accumulator.sweep_idle().await;
            if sealed > 0 {
                debug!(sealed, "idle sweep sealed traces");
            }
        }
    })
}
