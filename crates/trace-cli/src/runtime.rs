use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, instrument};
use trace_config::{Config, OverrideTable, TenantOverrides, WILDCARD};
use trace_ingester::{IngestSpan, TraceAccumulator};
use trace_objectstore::ObjectStore;
use trace_query::Coordinator;
use trace_types::ResourceSpans;
use trace_wal::{ReplayedPush, Wal};

use crate::dag::{topological_order, ComponentId, Registry};
use crate::error::CliError;
use crate::{block_writer, compaction_loop, idle_sweep, objectstore_factory};

/// Every live object and background task `trace-cli` owns, assembled in
/// [`dag::topological_order`]. No config-driven tenant-override source
/// exists yet, so every tenant resolves through a single `"*"` wildcard
/// entry built from `accumulator` defaults (see DESIGN.md).
pub struct Runtime {
    pub store: Arc<dyn ObjectStore>,
    pub accumulator: Arc<TraceAccumulator>,
    pub coordinator: Arc<Coordinator>,
    pub config: Config,
    registry: Registry,
    block_writer: JoinHandle<()>,
    idle_sweeper: JoinHandle<()>,
    compaction_loop: JoinHandle<()>,
}

impl Runtime {
    #[instrument(skip(config))]
    pub async fn start(config: Config) -> Result<Self, CliError> {
        let mut registry = Registry::new();
        let mut store: Option<Arc<dyn ObjectStore>> = None;
        let mut wal: Option<Arc<Wal>> = None;
        let mut accumulator: Option<Arc<TraceAccumulator>> = None;
        let mut coordinator: Option<Arc<Coordinator>> = None;
        let mut block_writer_handle: Option<JoinHandle<()>> = None;
        let mut compaction_handle: Option<JoinHandle<()>> = None;
        let mut pending_sealed_rx: Option<tokio::sync::mpsc::UnboundedReceiver<trace_ingester::SealedTrace>> = None;

        for id in topological_order() {
            if !registry.mark_started(id) {
                continue;
            }
            match id {
                ComponentId::ObjectStore => {
                    info!(component = id.name(), "starting");
                    store = Some(objectstore_factory::build(&config.objectstore).await?);
                }
                ComponentId::Wal => {
                    info!(component = id.name(), "starting");
                    wal = Some(Arc::new(Wal::open(&config.wal.dir, config.wal.max_segment_bytes).await?));
                }
                ComponentId::Ingester => {
                    info!(component = id.name(), "starting");
                    let wal = wal.clone().expect("wal starts before ingester");
                    let overrides = Arc::new(OverrideTable::new(
                        config.accumulator.clone(),
                        HashMap::from([(WILDCARD.to_string(), TenantOverrides::default())]),
                    ));
                    let replayed = wal.recover().await?;
                    let (new_accumulator, sealed_rx) = TraceAccumulator::new(config.accumulator.clone(), overrides, wal);
                    replay_wal(&new_accumulator, replayed).await;
                    accumulator = Some(new_accumulator);
                    // `sealed_rx` is handed to the block writer component below.
                    pending_sealed_rx = Some(sealed_rx);
                }
                ComponentId::BlockWriter => {
                    info!(component = id.name(), "starting");
                    let store = store.clone().expect("object store starts before block writer");
                    let sealed_rx = pending_sealed_rx.take().expect("ingester starts before block writer");
                    block_writer_handle = Some(block_writer::spawn(sealed_rx, store, config.block.clone()));
                }
                ComponentId::Compactor => {
                    info!(component = id.name(), "starting");
                    let store = store.clone().expect("object store starts before compactor");
                    compaction_handle = Some(compaction_loop::spawn(
                        store,
                        config.compactor.clone(),
                        config.block.clone(),
                        config.query.max_deadline_secs,
                    ));
                }
                ComponentId::QueryEngine => {
                    info!(component = id.name(), "starting");
                    let store = store.clone().expect("object store starts before query engine");
                    coordinator = Some(Arc::new(Coordinator::new(store, config.query.clone())));
                }
                ComponentId::Server => {
                    info!(component = id.name(), "wiring complete, server starts separately");
                }
            }
        }

        let accumulator = accumulator.expect("ingester always starts");
        let idle_sweeper = idle_sweep::spawn(accumulator.clone());

        Ok(Self {
            store: store.expect("object store always starts"),
            accumulator,
            coordinator: coordinator.expect("query engine always starts"),
            config,
            registry,
            block_writer: block_writer_handle.expect("block writer always starts"),
            idle_sweeper,
            compaction_loop: compaction_handle.expect("compactor always starts"),
        })
    }

    /// Idempotent shutdown, in reverse topological order: stops the
    /// background tasks, then drains every in-flight trace (spec.md §4.1
    /// `Shutdown`) so nothing buffered in memory is lost.
    pub async fn stop(&mut self) {
        for id in topological_order().into_iter().rev() {
            if !self.registry.mark_stopped(id) {
                continue;
            }
            info!(component = id.name(), "stopping");
        }
        self.block_writer.abort();
        self.idle_sweeper.abort();
        self.compaction_loop.abort();
        let sealed = self.accumulator.shutdown().await;
        info!(drained_traces = sealed.len(), "accumulator drained on shutdown");
    }
}

async fn replay_wal(accumulator: &TraceAccumulator, replayed: Vec<ReplayedPush>) {
    if replayed.is_empty() {
        return;
    }
    info!(count = replayed.len(), "replaying WAL records from a prior crash");
    for push in replayed {
        let spans = flatten(&push);
        accumulator.replay(&push.tenant_id, spans).await;
    }
}

/// Each `ReplayedPush` corresponds to exactly one trace: `TraceAccumulator`
/// only ever appends one trace id per WAL record (see
/// `trace-ingester`'s `push`), so `trace_ids` is always a single-element
/// slice here.
fn flatten(push: &ReplayedPush) -> Vec<IngestSpan> {
    let Some(&trace_id) = push.trace_ids.first() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for rs in &push.resource_spans {
        push_resource_spans(&mut out, trace_id, rs);
    }
    out
}

fn push_resource_spans(out: &mut Vec<IngestSpan>, trace_id: trace_types::TraceId, rs: &ResourceSpans) {
    for ss in &rs.scope_spans {
        for span in &ss.spans {
            out.push(IngestSpan {
                trace_id,
                resource: rs.resource.clone(),
                scope: ss.scope.clone(),
                span: span.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_config::ObjectStoreConfig;

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.wal.dir = dir.join("wal");
        config.objectstore = ObjectStoreConfig::Local { root: dir.join("objects") };
        config.server.listen_addr = "127.0.0.1:0".to_string();
        config
    }

    #[tokio::test]
    async fn starts_every_component_and_drains_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = Runtime::start(test_config(dir.path())).await.unwrap();
        assert!(app.registry.is_started(ComponentId::QueryEngine));
        assert!(app.registry.is_started(ComponentId::Server));
        app.stop().await;
        assert!(!app.registry.is_started(ComponentId::Wal));
    }

    #[tokio::test]
    async fn restarting_from_an_existing_wal_dir_replays_nothing_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut first = Runtime::start(config.clone()).await.unwrap();
        first.stop().await;

        let mut second = Runtime::start(test_config(dir.path())).await.unwrap();
        second.stop().await;
    }
}
