//! The query engine (C5): `FindTraceById`, `Search`, job planning, per-job
//! worker execution, and a small TraceQL-flavored predicate language.

mod coordinator;
mod error;
mod planner;
mod predicate;
mod traceql;
mod types;
mod worker;

pub use coordinator::{summarize, Coordinator};
pub use error::QueryError;
pub use planner::{plan_search, Job};
pub use predicate::{Op, Predicate, Query, Value};
pub use traceql::parse as parse_query;
pub use types::{JobState, Metrics, SearchRequest, SearchResponse, TraceMetadata};
pub use worker::{run_job, JobResult};
