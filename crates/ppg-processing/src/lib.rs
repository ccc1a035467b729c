//! PPG-Processing: Streaming filters and statistics for PPG signals
//!
//! Every component consumes one sample per call and returns one value per
//! call. Nothing here allocates after construction, blocks or locks.

pub mod filters;
pub mod statistics;
pub mod pipeline;
pub mod config;

pub use filters::{
    SampleFilter, FilterType, HighPassFilter, LowPassFilter, Differentiator,
    MovingAverageFilter, BandpassFilter, BaselineBlend,
};
pub use statistics::{RunningStatistic, StatisticSummary};
pub use pipeline::{FilterChain, PipelineBuilder};
pub use config::PipelineConfig;
