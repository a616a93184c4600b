use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use tracing_subscriber::fmt::MakeWriter;

use crate::models::{Segment, SegmentProgress};
use crate::progress::{ProgressFactory, ProgressSink};

const BAR_TEMPLATE: &str =
    "{prefix:>4} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

const BAR_CHARS: &str = "█▓▒░  ";

/// Terminal renderer: one bar per segment, stacked.
#[derive(Clone)]
pub struct BarTracker {
    bars: MultiProgress,
    style: ProgressStyle,
}

impl BarTracker {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// A tracker that draws nothing; bars still count.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars(BAR_CHARS);
        Self {
            bars: MultiProgress::with_draw_target(target),
            style,
        }
    }

    /// Log writer that hides the bars while a line is printed, so log
    /// output and bars never interleave.
    pub fn log_writer(&self) -> BarWriter {
        BarWriter {
            bars: self.bars.clone(),
        }
    }
}

impl Default for BarTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressFactory for BarTracker {
    type Sink = BarSink;

    fn sink_for(&self, segment: &Segment) -> Self::Sink {
        let bar = self.bars.add(ProgressBar::new(segment.len));
        bar.set_style(self.style.clone());
        bar.set_prefix(format!("#{}", segment.index));
        BarSink { bar }
    }
}

/// `tracing-subscriber` writer that prints to stderr around the bars.
#[derive(Clone)]
pub struct BarWriter {
    bars: MultiProgress,
}

impl Write for BarWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bars.suspend(|| io::stderr().lock().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for BarWriter {
    type Writer = BarWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl ProgressSink for BarSink {
    fn update(&mut self, progress: &SegmentProgress) {
        self.bar.set_position(progress.bytes_transferred);
    }

    fn finish(&mut self, ok: bool) {
        if ok {
            self.bar.finish();
        } else {
            self.bar.abandon_with_message("failed");
        }
    }
}
