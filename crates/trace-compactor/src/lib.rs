//! The compactor (C4): block selection, k-way trace-id merge, and the
//! mark-then-grace-period-delete lifecycle for compacted inputs.

mod compactor;
mod error;
mod merge;
mod selection;

pub use compactor::Compactor;
pub use error::CompactorError;
pub use merge::merge_sorted_traces;
pub use selection::select_group;
