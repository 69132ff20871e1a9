use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tracing::warn;
use trace_compactor::Compactor;
use trace_config::{BlockConfig, CompactorConfig};
use trace_objectstore::ObjectStore;

const TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Periodically drives compaction (spec.md §4.4) for every tenant with
/// blocks in the store: runs `compact_once` to exhaustion, then
/// `sweep_expired` to delete inputs past their grace period. No dedicated
/// tenant registry exists outside the object store, so tenants are
/// discovered from the store's top-level key prefixes each tick.
pub fn spawn(store: Arc<dyn ObjectStore>, compactor_config: CompactorConfig, block_config: BlockConfig, max_query_deadline_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let compactor = Compactor::new(store.clone(), compactor_config, block_config);
        let mut ticker = tokio::time::interval(TICK_INTERVAL);

        loop {
            ticker.tick().await;
            let tenants = match discover_tenants(store.as_ref()).await {
                Ok(tenants) => tenants,
                Err(error) => {
                    warn!(%error, "failed to list tenants for the compaction sweep");
                    continue;
                }
            };

            for tenant_id in tenants {
                loop {
                    match compactor.compact_once(&tenant_id).await {
                        Ok(Some(_)) => continue,
                        Ok(None) => break,
                        Err(error) => {
                            warn!(tenant_id, %error, "compaction pass failed");
                            break;
                        }
                    }
                }
                if let Err(error) = compactor.sweep_expired(&tenant_id, unix_nanos_now(), max_query_deadline_secs).await {
                    warn!(tenant_id, %error, "grace-period sweep failed");
                }
            }
        }
    })
}

pub(crate) async fn discover_tenants(store: &dyn ObjectStore) -> Result<Vec<String>, trace_objectstore::ObjectStoreError> {
    let paths = store.list("").await?;
    let mut tenants: Vec<String> = paths.iter().filter_map(|path| path.split('/').next()).map(str::to_string).collect();
    tenants.sort();
    tenants.dedup();
    Ok(tenants)
}

fn unix_nanos_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as u64
}
