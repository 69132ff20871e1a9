//! The trace accumulator (C1): in-memory per-trace builders partitioned
//! into stripes, admission control, completion policy, and data-quality
//! accounting.

mod accumulator;
mod builder;
mod error;
mod stripe;
mod token_bucket;

pub use accumulator::{SealedTrace, TraceAccumulator};
pub use builder::{IngestSpan, TraceBuilder};
pub use error::{IngestError, RejectKind};
