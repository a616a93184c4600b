use crate::models::{DownloadJob, ResourceMetadata, Segment};

/// A planned byte range: `len` bytes starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub len: u64,
}

/// Splits `total_size` bytes into the ranges that will be fetched.
///
/// Without range support the whole resource is a single range. With it,
/// there are exactly `segment_count` ranges of `total_size / segment_count`
/// bytes each and the last one takes the remainder, so the ranges always
/// cover `0..total_size` with no gaps or overlaps. When there are more
/// segments than bytes the leading ranges are empty.
pub fn plan(total_size: u64, segment_count: usize, supports_range: bool) -> Vec<ByteRange> {
    if !supports_range {
        return vec![ByteRange { start: 0, len: total_size }];
    }

    let count = segment_count.max(1) as u64;
    let chunk = total_size / count;

    (0..count)
        .map(|i| {
            let start = i * chunk;
            let len = if i == count - 1 { total_size - start } else { chunk };
            ByteRange { start, len }
        })
        .collect()
}

/// Plans the segments of `job`, attaching each one's temporary file.
pub fn plan_segments(job: &DownloadJob, metadata: &ResourceMetadata) -> Vec<Segment> {
    plan(metadata.total_size, job.segments, metadata.supports_range)
        .into_iter()
        .enumerate()
        .map(|(index, range)| Segment {
            index,
            start_byte: range.start,
            len: range.len,
            temp_path: job.segment_path(index),
        })
        .collect()
}
