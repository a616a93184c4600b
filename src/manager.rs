// src/manager.rs

use reqwest::Client;
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::assembler::{self, AssembleError};
use crate::config::ConfigError;
use crate::fetcher::{FetchError, SegmentFetcher};
use crate::models::{DownloadJob, DownloadResult, ResourceMetadata, Segment};
use crate::planner;
use crate::probe::{self, MetadataError};
use crate::progress::{NoProgress, ProgressFactory, ProgressSink};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid options: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("cannot create directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} segment(s) failed, first: {}", .failed.len(), .failed[0])]
    Segments { failed: Vec<FetchError> },
    #[error("assembly failed: {0}")]
    Assemble(#[from] AssembleError),
}

impl DownloadResult {
    /// Turns the per-segment slots into a single result. Every recorded
    /// failure is kept, in index order.
    pub fn into_result(self) -> Result<(ResourceMetadata, Vec<Segment>), JobError> {
        let failed: Vec<FetchError> = self.errors.into_iter().flatten().collect();
        if failed.is_empty() {
            Ok((self.metadata, self.segments))
        } else {
            Err(JobError::Segments { failed })
        }
    }
}

/// Summary of a finished download.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    pub destination: PathBuf,
    pub metadata: ResourceMetadata,
    pub segments: usize,
    pub bytes: u64,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

fn as_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

/// Runs every segment of a job concurrently and assembles the result.
pub struct DownloadCoordinator<P = NoProgress> {
    client: Client,
    progress: P,
}

impl DownloadCoordinator<NoProgress> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            progress: NoProgress,
        }
    }
}

impl<P: ProgressFactory> DownloadCoordinator<P> {
    pub fn with_progress(client: Client, progress: P) -> Self {
        Self { client, progress }
    }

    /// Probes the resource, plans the segments and fetches all of them.
    ///
    /// Only the probe and creating the destination directory abort the job
    /// early. Segment failures are collected, one slot per index, after
    /// every worker has finished; a failing segment never stops the others.
    pub async fn run(&self, job: &DownloadJob) -> Result<DownloadResult, JobError> {
        let metadata = probe::probe(&self.client, &job.url).await?;

        let dir = job.directory();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| JobError::Directory {
                path: dir.to_path_buf(),
                source,
            })?;

        let segments = planner::plan_segments(job, &metadata);
        if !metadata.supports_range && job.segments > 1 {
            warn!(url = %job.url, "server does not accept byte ranges, downloading in one segment");
        }
        info!(
            url = %job.url,
            total_size = metadata.total_size,
            segments = segments.len(),
            "starting download"
        );

        let fetcher = SegmentFetcher::new(self.client.clone(), job.url.as_str());
        let handles: Vec<JoinHandle<Result<(), FetchError>>> = segments
            .iter()
            .map(|segment| {
                let fetcher = fetcher.clone();
                let segment = segment.clone();
                let mut sink = self.progress.sink_for(&segment);
                tokio::spawn(async move {
                    let result = fetcher.fetch(&segment, &mut sink).await;
                    sink.finish(result.is_ok());
                    result
                })
            })
            .collect();

        let mut errors = Vec::with_capacity(handles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            let slot = match handle.await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(join_err) => Some(FetchError::Task {
                    index,
                    reason: join_err.to_string(),
                }),
            };
            if let Some(e) = &slot {
                error!(segment = index, "{}", e);
            }
            errors.push(slot);
        }

        Ok(DownloadResult {
            metadata,
            segments,
            errors,
        })
    }

    /// Runs the job and, when every segment succeeded, merges the segment
    /// files into the destination. Temp files are left on disk on any
    /// failure so the next run can resume from them.
    pub async fn download(&self, job: &DownloadJob) -> Result<DownloadReport, JobError> {
        let started = Instant::now();
        let (metadata, segments) = self.run(job).await?.into_result()?;
        let bytes = assembler::merge(&job.destination, &segments).await?;

        let report = DownloadReport {
            destination: job.destination.clone(),
            metadata,
            segments: segments.len(),
            bytes,
            elapsed: started.elapsed(),
        };
        info!(
            path = %report.destination.display(),
            bytes = report.bytes,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "download complete"
        );
        Ok(report)
    }
}

/// Validates `options`, builds the client and runs the whole download.
pub async fn download<P: ProgressFactory>(
    options: &crate::config::DownloadOptions,
    progress: P,
) -> Result<DownloadReport, JobError> {
    let job = options.to_job()?;
    let client = options.build_client()?;
    DownloadCoordinator::with_progress(client, progress)
        .download(&job)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_flat_with_millis() {
        let report = DownloadReport {
            destination: PathBuf::from("out/file.bin"),
            metadata: ResourceMetadata {
                total_size: 1000,
                supports_range: true,
            },
            segments: 4,
            bytes: 1000,
            elapsed: Duration::from_millis(1500),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["destination"], "out/file.bin");
        assert_eq!(value["metadata"]["total_size"], 1000);
        assert_eq!(value["metadata"]["supports_range"], true);
        assert_eq!(value["segments"], 4);
        assert_eq!(value["bytes"], 1000);
        assert_eq!(value["elapsed_ms"], 1500);
    }

    #[test]
    fn failures_are_collected_in_index_order() {
        let result = DownloadResult {
            metadata: ResourceMetadata {
                total_size: 10,
                supports_range: true,
            },
            segments: Vec::new(),
            errors: vec![
                None,
                Some(FetchError::Task {
                    index: 1,
                    reason: "panicked".into(),
                }),
                Some(FetchError::Task {
                    index: 2,
                    reason: "cancelled".into(),
                }),
            ],
        };
        match result.into_result() {
            Err(JobError::Segments { failed }) => {
                let indices: Vec<_> = failed.iter().map(FetchError::index).collect();
                assert_eq!(indices, vec![1, 2]);
            }
            other => panic!("expected segment failures, got {other:?}"),
        }
    }
}
