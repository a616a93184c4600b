pub mod assembler;
pub mod config;
pub mod fetcher;
pub mod manager;
pub mod models;
pub mod planner;
pub mod probe;
pub mod progress;
pub mod tracker;

/// Convenient type alias exposing common structs.
pub mod prelude {
    pub use crate::assembler::{merge, AssembleError};
    pub use crate::config::{DownloadOptions, ConfigError};
    pub use crate::fetcher::{FetchError, SegmentFetcher};
    pub use crate::manager::{download, DownloadCoordinator, DownloadReport, JobError};
    pub use crate::models::{DownloadJob, DownloadResult, ResourceMetadata, Segment, SegmentProgress};
    pub use crate::probe::MetadataError;
    pub use crate::progress::{LogProgress, NoProgress, ProgressFactory, ProgressSink};
    pub use crate::tracker::BarTracker;
}
