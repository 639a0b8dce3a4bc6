pub mod dedupe;
pub mod run;

pub use dedupe::{dedupe, Deduplicator, FlushMode};
pub use run::{Pipeline, PipelineOptions, Tables};
