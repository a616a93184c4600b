// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use segdl::config::DEFAULT_SEGMENTS;
use segdl::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Downloads one file over HTTP in parallel byte-range segments.
///
/// Interrupted downloads resume from the segment files left next to the
/// destination when run again with the same arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the file to download.
    url: String,

    /// Where to save the file. Defaults to the last path segment of the URL.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of segments to download concurrently.
    #[arg(short = 'n', long, default_value_t = DEFAULT_SEGMENTS)]
    segments: usize,

    /// Extra request header, e.g. "Authorization: Bearer xyz". Repeatable.
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Do not draw progress bars.
    #[arg(short, long)]
    quiet: bool,

    /// Log segment-level detail.
    #[arg(short, long)]
    verbose: bool,

    /// Print the final report as JSON instead of a summary line.
    #[arg(long)]
    json: bool,
}

fn init_logging<W>(verbose: bool, writer: W)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let default = if verbose { "segdl=debug" } else { "segdl=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let json = args.json;
    let options = DownloadOptions {
        destination: args.output.unwrap_or_default(),
        segments: args.segments,
        headers: args.headers,
        ..DownloadOptions::new(args.url)
    };

    let report = if args.quiet {
        init_logging(args.verbose, std::io::stderr);
        download(&options, NoProgress).await
    } else {
        let tracker = BarTracker::new();
        init_logging(args.verbose, tracker.log_writer());
        download(&options, tracker).await
    }
    .with_context(|| format!("downloading {} failed", options.url))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} ({} bytes, {} segment(s)) in {:.2}s",
            report.destination.display(),
            report.bytes,
            report.segments,
            report.elapsed.as_secs_f64()
        );
    }
    Ok(())
}
