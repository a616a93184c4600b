use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use std::sync::{Arc, Mutex};

use segdl::prelude::{ProgressFactory, ProgressSink, Segment, SegmentProgress};

/// Deterministic, non-repeating-looking payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 251) as u8).collect()
}

/// How the server answers a GET that carries a usable `Range`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ranges {
    /// No `Accept-Ranges`; every GET gets the whole body with `200`.
    Unsupported,
    /// Honest `206` answers.
    Honoured,
    /// Advertises `Accept-Ranges: bytes` but still answers `200` with the
    /// whole body.
    Ignored,
    /// Answers `206` with only the first half of the requested bytes.
    Truncated,
}

#[derive(Clone)]
struct ServerState {
    body: Arc<Vec<u8>>,
    ranges: Ranges,
    fail_start: Option<u64>,
    requests: Arc<Mutex<Vec<Option<String>>>>,
}

/// In-process HTTP server for one file at `/file.bin`.
///
/// HEAD is answered by axum from the GET handler. Every GET is recorded
/// with its `Range` header.
pub struct RangeServer {
    pub url: String,
    requests: Arc<Mutex<Vec<Option<String>>>>,
}

impl RangeServer {
    pub async fn start(body: Vec<u8>, ranges: bool) -> Self {
        let mode = if ranges { Ranges::Honoured } else { Ranges::Unsupported };
        Self::start_with(body, mode, None).await
    }

    pub async fn start_mode(body: Vec<u8>, ranges: Ranges) -> Self {
        Self::start_with(body, ranges, None).await
    }

    /// Like `start`, but any GET whose range begins at `fail_start` gets a 500.
    pub async fn start_failing(body: Vec<u8>, fail_start: u64) -> Self {
        Self::start_with(body, Ranges::Honoured, Some(fail_start)).await
    }

    async fn start_with(body: Vec<u8>, ranges: Ranges, fail_start: Option<u64>) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = ServerState {
            body: Arc::new(body),
            ranges,
            fail_start,
            requests: requests.clone(),
        };
        let app = Router::new()
            .route("/file.bin", get(serve_file))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}/file.bin", addr),
            requests,
        }
    }

    pub fn missing_url(&self) -> String {
        self.url.replace("/file.bin", "/nope.bin")
    }

    /// `Range` headers of the GETs received so far, sorted.
    pub fn ranges(&self) -> Vec<Option<String>> {
        let mut ranges = self.requests.lock().unwrap().clone();
        ranges.sort();
        ranges
    }
}

fn parse_range(value: &str, len: u64) -> Option<(u64, u64)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: u64 = start.parse().ok()?;
    let end: u64 = end.parse().ok()?;
    if start > end || start >= len {
        return None;
    }
    Some((start, end.min(len - 1)))
}

async fn serve_file(State(state): State<ServerState>, method: Method, headers: HeaderMap) -> Response {
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if method == Method::GET {
        state.requests.lock().unwrap().push(range.clone());
    }

    let len = state.body.len() as u64;
    let mut builder = Response::builder();
    if state.ranges != Ranges::Unsupported {
        builder = builder.header(header::ACCEPT_RANGES, "bytes");
    }

    let requested = range
        .as_deref()
        .filter(|_| matches!(state.ranges, Ranges::Honoured | Ranges::Truncated))
        .and_then(|r| parse_range(r, len));

    if let (Some((start, _)), Some(fail)) = (requested, state.fail_start) {
        if start == fail {
            return builder
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::empty())
                .unwrap();
        }
    }

    match requested {
        Some((start, end)) if state.ranges == Ranges::Truncated => {
            let short = start + (end - start + 1) / 2;
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, len))
                .body(Body::from(state.body[start as usize..short as usize].to_vec()))
                .unwrap()
        }
        Some((start, end)) => builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, len))
            .body(Body::from(state.body[start as usize..=end as usize].to_vec()))
            .unwrap(),
        None => builder
            .status(StatusCode::OK)
            .body(Body::from(state.body.as_ref().clone()))
            .unwrap(),
    }
}

/// Records every progress update as `(segment, bytes)`.
#[derive(Clone, Default)]
pub struct Recorder {
    pub updates: Arc<Mutex<Vec<(usize, u64)>>>,
    pub finished: Arc<Mutex<Vec<(usize, bool)>>>,
}

impl Recorder {
    pub fn updates_for(&self, index: usize) -> Vec<u64> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, b)| *b)
            .collect()
    }
}

pub struct RecordingSink {
    index: usize,
    recorder: Recorder,
}

impl ProgressSink for RecordingSink {
    fn update(&mut self, progress: &SegmentProgress) {
        self.recorder
            .updates
            .lock()
            .unwrap()
            .push((self.index, progress.bytes_transferred));
    }

    fn finish(&mut self, ok: bool) {
        self.recorder.finished.lock().unwrap().push((self.index, ok));
    }
}

impl ProgressFactory for Recorder {
    type Sink = RecordingSink;

    fn sink_for(&self, segment: &Segment) -> Self::Sink {
        RecordingSink {
            index: segment.index,
            recorder: self.clone(),
        }
    }
}
