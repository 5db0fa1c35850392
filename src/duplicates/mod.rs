//! Duplicate detection and reclaim pipeline.
//!
//! This module provides functionality for:
//! - Size-based grouping (driven by the walk)
//! - Prefix hash comparison (worker pool)
//! - Full hash confirmation and partner pairing (worker pool)
//! - Handing confirmed duplicates to the reclaim stage (worker pool)
//!
//! # Architecture
//!
//! - [`candidate`]: The [`FileCandidate`] that flows between stages
//! - [`groups`]: The generic first-seen [`GroupIndex`]
//! - [`stages`]: The three filtering stages
//! - [`stats`]: Shared [`RunStatistics`]
//! - [`pipeline`]: Queues, worker pools and teardown

pub mod candidate;
pub mod groups;
pub mod pipeline;
pub mod stages;
pub mod stats;

pub use candidate::FileCandidate;
pub use groups::{Admission, GroupIndex, Partnered, Promotion};
pub use pipeline::{
    Pipeline, PipelineConfig, PipelineError, RunSummary, DEFAULT_MIN_SIZE, DEFAULT_QUEUE_CAPACITY,
};
pub use stages::{FullHashStage, PartialHashStage, SizeBucketStage, Stage};
pub use stats::{RunStatistics, StatsSnapshot};
