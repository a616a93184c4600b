use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::models::DownloadJob;

pub const DEFAULT_SEGMENTS: usize = 8;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36";

/// Used when the URL has no file name to derive a destination from.
const FALLBACK_FILE_NAME: &str = "download";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no url given")]
    MissingUrl,
    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("segment count must be at least 1")]
    ZeroSegments,
    #[error("invalid header {0:?}, expected \"Name: value\"")]
    InvalidHeader(String),
    #[error("destination {0:?} does not name a file")]
    NoFileName(PathBuf),
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Caller input for a download.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub url: String,
    /// Empty means "use the last path segment of the url".
    pub destination: PathBuf,
    pub segments: usize,
    pub user_agent: String,
    /// Extra request headers sent verbatim with every request, as
    /// `"Name: value"` strings.
    pub headers: Vec<String>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            destination: PathBuf::new(),
            segments: DEFAULT_SEGMENTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: Vec::new(),
        }
    }
}

impl DownloadOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Validates the options and fixes the destination, producing the job.
    pub fn to_job(&self) -> Result<DownloadJob, ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingUrl);
        }
        if self.segments == 0 {
            return Err(ConfigError::ZeroSegments);
        }
        let parsed = Url::parse(&self.url).map_err(|source| ConfigError::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;

        let destination = if self.destination.as_os_str().is_empty() {
            PathBuf::from(file_name_from_url(&parsed))
        } else {
            self.destination.clone()
        };

        DownloadJob::new(self.url.clone(), destination, self.segments)
    }

    /// Builds the client shared by the probe and every segment.
    pub fn build_client(&self) -> Result<Client, ConfigError> {
        let mut headers = HeaderMap::new();
        for raw in &self.headers {
            let (name, value) = parse_header(raw)?;
            headers.append(name, value);
        }

        let client = Client::builder()
            .user_agent(self.user_agent.as_str())
            .default_headers(headers)
            .build()?;
        Ok(client)
    }
}

/// Final non-empty path segment of `url`.
pub fn file_name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .and_then(|name| Path::new(name).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), ConfigError> {
    let invalid = || ConfigError::InvalidHeader(raw.to_string());
    let (name, value) = raw.split_once(':').ok_or_else(invalid)?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| invalid())?;
    let value = HeaderValue::from_str(value.trim()).map_err(|_| invalid())?;
    Ok((name, value))
}
