// src/models.rs

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::ConfigError;
use crate::fetcher::FetchError;

/// An immutable description of one download: what to fetch, where to put it,
/// and how many segments to split it into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: String,
    pub destination: PathBuf,
    /// Always at least 1.
    pub segments: usize,
}

impl DownloadJob {
    /// Fails when `destination` has no file name (e.g. `..` or `/`), since
    /// segment files are named after it.
    pub fn new(
        url: impl Into<String>,
        destination: impl Into<PathBuf>,
        segments: usize,
    ) -> Result<Self, ConfigError> {
        let destination = destination.into();
        if destination.file_name().is_none() {
            return Err(ConfigError::NoFileName(destination));
        }
        Ok(Self {
            url: url.into(),
            destination,
            segments: segments.max(1),
        })
    }

    /// Directory the destination and its segment files live in.
    pub fn directory(&self) -> &Path {
        match self.destination.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// Returns the temporary file for segment `index`.
    /// e.g., for "/path/to/file.zip" and index 3 it returns "/path/to/file.zip-3.tmp"
    ///
    /// The name depends only on the destination and the index, which is what
    /// lets a restarted job find the bytes a previous run left behind.
    pub fn segment_path(&self, index: usize) -> PathBuf {
        let name = self
            .destination
            .file_name()
            .unwrap_or(self.destination.as_os_str())
            .to_string_lossy();
        self.directory().join(format!("{}-{}.tmp", name, index))
    }
}

/// What the metadata probe learned about the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceMetadata {
    pub total_size: u64,
    pub supports_range: bool,
}

/// One contiguous byte range of the resource and the file it is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub start_byte: u64,
    /// Number of bytes in the range. Zero for the empty segments produced
    /// when there are more segments than bytes.
    pub len: u64,
    pub temp_path: PathBuf,
}

impl Segment {
    /// Inclusive last byte of the range, or `None` for an empty segment.
    pub fn end_byte(&self) -> Option<u64> {
        (self.len > 0).then(|| self.start_byte + self.len - 1)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Byte counter for a single segment. Only the fetcher working on the
/// segment mutates it; sinks receive copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentProgress {
    pub bytes_transferred: u64,
    pub last_update: Instant,
}

impl SegmentProgress {
    pub fn new(bytes_transferred: u64) -> Self {
        Self {
            bytes_transferred,
            last_update: Instant::now(),
        }
    }

    pub(crate) fn advance(&mut self, bytes: u64) {
        self.bytes_transferred += bytes;
        self.last_update = Instant::now();
    }

    pub(crate) fn reset(&mut self) {
        self.bytes_transferred = 0;
        self.last_update = Instant::now();
    }
}

/// Outcome of running every segment of a job. `errors[i]` belongs to
/// `segments[i]`; `None` means that segment finished.
#[derive(Debug)]
pub struct DownloadResult {
    pub metadata: ResourceMetadata,
    pub segments: Vec<Segment>,
    pub errors: Vec<Option<FetchError>>,
}

impl DownloadResult {
    pub fn is_success(&self) -> bool {
        self.errors.iter().all(Option::is_none)
    }

    /// Indices and errors of the segments that failed, in index order.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &FetchError)> {
        self.errors
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (i, e)))
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures().map(|(i, _)| i).collect()
    }
}
