use futures_util::StreamExt;
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use std::io::ErrorKind;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::models::{Segment, SegmentProgress};
use crate::progress::ProgressSink;

/// Why a single segment could not be fetched. Every variant names the
/// segment it belongs to.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("segment {index}: network error: {source}")]
    Network {
        index: usize,
        #[source]
        source: reqwest::Error,
    },
    #[error("segment {index}: io error: {source}")]
    Io {
        index: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("segment {index}: server answered {status} to a range request that does not start at 0")]
    RangeIgnored { index: usize, status: StatusCode },
    #[error("segment {index}: stream ended after {received} of {expected} bytes")]
    Incomplete {
        index: usize,
        expected: u64,
        received: u64,
    },
    #[error("segment {index}: worker task failed: {reason}")]
    Task { index: usize, reason: String },
}

impl FetchError {
    pub fn index(&self) -> usize {
        match self {
            FetchError::Network { index, .. }
            | FetchError::Io { index, .. }
            | FetchError::RangeIgnored { index, .. }
            | FetchError::Incomplete { index, .. }
            | FetchError::Task { index, .. } => *index,
        }
    }
}

/// Downloads one segment into its temporary file, picking up where a
/// previous run stopped.
#[derive(Debug, Clone)]
pub struct SegmentFetcher {
    client: Client,
    url: Arc<str>,
}

impl SegmentFetcher {
    pub fn new(client: Client, url: impl Into<Arc<str>>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches `segment` into `segment.temp_path`, reporting to `sink`.
    ///
    /// Bytes already in the temp file are trusted and not fetched again.
    /// On success the file holds exactly `segment.len` bytes.
    pub async fn fetch<S: ProgressSink>(
        &self,
        segment: &Segment,
        sink: &mut S,
    ) -> Result<(), FetchError> {
        let index = segment.index;
        let io_err = |source| FetchError::Io { index, source };
        let net_err = |source| FetchError::Network { index, source };

        let existing = match tokio::fs::metadata(&segment.temp_path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(io_err(e)),
        };

        let mut progress = SegmentProgress::new(existing);
        if existing > 0 {
            sink.update(&progress);
        }

        if existing >= segment.len {
            if existing > segment.len {
                warn!(
                    segment = index,
                    on_disk = existing,
                    expected = segment.len,
                    path = %segment.temp_path.display(),
                    "temp file is larger than its segment; was the segment count changed?"
                );
            } else if existing == 0 {
                // Empty segment: the assembler still expects a file.
                File::create(&segment.temp_path).await.map_err(io_err)?;
            }
            debug!(segment = index, bytes = existing, "segment already complete");
            return Ok(());
        }

        let start = segment.start_byte + existing;
        let end = segment.start_byte + segment.len - 1;
        debug!(segment = index, start, end, resumed = existing > 0, "requesting range");

        let resp = self
            .client
            .get(self.url())
            .header(RANGE, format!("bytes={}-{}", start, end))
            .send()
            .await
            .map_err(net_err)?
            .error_for_status()
            .map_err(net_err)?;

        // A plain 200 carries the body from byte 0. That is only usable when
        // the segment itself starts at 0, and then we start it over.
        let mut append = existing > 0;
        if resp.status() != StatusCode::PARTIAL_CONTENT && start != 0 {
            if segment.start_byte != 0 {
                return Err(FetchError::RangeIgnored {
                    index,
                    status: resp.status(),
                });
            }
            warn!(segment = index, discarded = existing, "server ignored range, restarting segment");
            append = false;
            progress.reset();
            sink.update(&progress);
        }

        let mut file = if append {
            OpenOptions::new()
                .append(true)
                .open(&segment.temp_path)
                .await
                .map_err(io_err)?
        } else {
            File::create(&segment.temp_path).await.map_err(io_err)?
        };

        let mut remaining = segment.len - progress.bytes_transferred;
        let mut stream = resp.bytes_stream();
        while remaining > 0 {
            let Some(chunk) = stream.next().await else {
                break;
            };
            let bytes = chunk.map_err(net_err)?;
            // Never write past the end of the segment, whatever the server sends.
            let take = usize::try_from(remaining).map_or(bytes.len(), |r| bytes.len().min(r));
            file.write_all(&bytes[..take]).await.map_err(io_err)?;
            remaining -= take as u64;
            progress.advance(take as u64);
            sink.update(&progress);
        }
        file.flush().await.map_err(io_err)?;

        if remaining > 0 {
            return Err(FetchError::Incomplete {
                index,
                expected: segment.len,
                received: progress.bytes_transferred,
            });
        }

        debug!(segment = index, bytes = progress.bytes_transferred, "segment fetched");
        Ok(())
    }
}
