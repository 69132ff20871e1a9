use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use trace_block::seal;
use trace_config::BlockConfig;
use trace_ingester::SealedTrace;
use trace_objectstore::ObjectStore;
use trace_types::Trace;

const FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Drains the accumulator's sealed-trace channel (C1 -> C3, spec.md §3),
/// batching per tenant and sealing a block whenever a tenant's buffer
/// reaches `config.rows_per_row_group` traces or `FLUSH_INTERVAL` elapses,
/// whichever comes first. Runs until the channel closes (accumulator
/// shutdown), flushing whatever remains buffered before exiting.
pub fn spawn(mut sealed_rx: mpsc::UnboundedReceiver<SealedTrace>, store: Arc<dyn ObjectStore>, config: BlockConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut pending: HashMap<String, Vec<Trace>> = HashMap::new();
        let mut ticker = tokio::time::interval(FLUSH_INTERVAL);

        loop {
            tokio::select! {
                received = sealed_rx.recv() => {
                    let Some(sealed) = received else {
                        flush_all(&store, &config, &mut pending).await;
                        break;
                    };
                    let tenant_id = sealed.tenant_id.clone();
                    pending.entry(tenant_id.clone()).or_default().push(sealed.trace);
                    if pending[&tenant_id].len() >= config.rows_per_row_group.max(1) {
                        flush_one(&store, &config, &tenant_id, &mut pending).await;
                    }
                }
                _ = ticker.tick() => {
                    flush_all(&store, &config, &mut pending).await;
                }
            }
        }
        info!("block writer stopped");
    })
}

async fn flush_one(store: &Arc<dyn ObjectStore>, config: &BlockConfig, tenant_id: &str, pending: &mut HashMap<String, Vec<Trace>>) {
    let Some(batch) = pending.get_mut(tenant_id) else { return };
    if batch.is_empty() {
        return;
    }
    let traces = std::mem::take(batch);
    let count = traces.len();
    match seal(tenant_id, traces, config, store.as_ref()).await {
        Ok(meta) => info!(tenant_id, block_id = %meta.block_id, traces = count, "sealed block"),
        Err(error) => warn!(tenant_id, %error, traces = count, "failed to seal block; buffered traces were lost"),
    }
}

async fn flush_all(store: &Arc<dyn ObjectStore>, config: &BlockConfig, pending: &mut HashMap<String, Vec<Trace>>) {
    let tenants: Vec<String> = pending.iter().filter(|(_, v)| !v.is_empty()).map(|(k, _)| k.clone()).collect();
    for tenant_id in tenants {
        flush_one(store, config, &tenant_id, pending).await;
    }
}
