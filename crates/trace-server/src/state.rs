use std::sync::Arc;

use trace_config::ServerConfig;
use trace_ingester::TraceAccumulator;
use trace_query::Coordinator;

/// Shared state for every handler: the accumulator for `Push`, the
/// coordinator for `FindTraceById`/`Search`, and the server-level config
/// knobs (request body caps) that don't belong to either.
#[derive(Clone)]
pub struct AppState {
    pub accumulator: Arc<TraceAccumulator>,
    pub coordinator: Arc<Coordinator>,
    pub config: ServerConfig,
}
