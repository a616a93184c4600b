use std::time::{Duration, Instant};
use tracing::debug;

use crate::models::{Segment, SegmentProgress};

/// Receives byte-count updates for one segment.
///
/// `update` is called once right away with whatever a resumed segment
/// already holds, then once per chunk written. The value is cumulative for
/// the segment, never a delta.
pub trait ProgressSink: Send + 'static {
    fn update(&mut self, progress: &SegmentProgress);

    /// Called once when the segment stops, `ok` telling whether it finished.
    fn finish(&mut self, _ok: bool) {}
}

/// Hands out one dedicated sink per segment.
pub trait ProgressFactory: Send + Sync {
    type Sink: ProgressSink;

    fn sink_for(&self, segment: &Segment) -> Self::Sink;
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&mut self, _progress: &SegmentProgress) {}
}

impl ProgressFactory for NoProgress {
    type Sink = NoProgress;

    fn sink_for(&self, _segment: &Segment) -> Self::Sink {
        NoProgress
    }
}

/// Writes progress to the `tracing` debug log, at most once per interval.
#[derive(Debug, Clone, Copy)]
pub struct LogProgress {
    pub interval: Duration,
}

impl Default for LogProgress {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
        }
    }
}

impl ProgressFactory for LogProgress {
    type Sink = LogSink;

    fn sink_for(&self, segment: &Segment) -> Self::Sink {
        LogSink {
            index: segment.index,
            total: segment.len,
            interval: self.interval,
            started: Instant::now(),
            last_logged: None,
            last_bytes: 0,
        }
    }
}

#[derive(Debug)]
pub struct LogSink {
    index: usize,
    total: u64,
    interval: Duration,
    started: Instant,
    last_logged: Option<Instant>,
    last_bytes: u64,
}

impl ProgressSink for LogSink {
    fn update(&mut self, progress: &SegmentProgress) {
        self.last_bytes = progress.bytes_transferred;
        let due = self
            .last_logged
            .map_or(true, |at| progress.last_update.duration_since(at) >= self.interval);
        if !due {
            return;
        }
        self.last_logged = Some(progress.last_update);
        debug!(
            segment = self.index,
            bytes = progress.bytes_transferred,
            total = self.total,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "segment progress"
        );
    }

    fn finish(&mut self, ok: bool) {
        debug!(
            segment = self.index,
            bytes = self.last_bytes,
            total = self.total,
            ok,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "segment done"
        );
    }
}
