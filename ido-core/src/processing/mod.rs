//! The filter -> batch -> summarise -> persist pipeline.

pub mod batch;
pub mod pipeline;
pub mod queue;
pub mod record_filter;

pub use batch::segment_records;
pub use pipeline::{PipelineStats, ProcessingPipeline};
pub use queue::RecordQueue;
pub use record_filter::RecordFilter;
