use reqwest::header::{HeaderMap, ACCEPT_RANGES, CONTENT_LENGTH};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::models::ResourceMetadata;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server did not report a Content-Length")]
    MissingLength,
    #[error("unparsable Content-Length {0:?}")]
    InvalidLength(String),
}

/// Asks the server for the size of `url` and whether it honours byte ranges.
pub async fn probe(client: &Client, url: &str) -> Result<ResourceMetadata, MetadataError> {
    let resp = client.head(url).send().await?.error_for_status()?;
    let metadata = metadata_from_headers(resp.headers())?;
    debug!(
        url,
        total_size = metadata.total_size,
        supports_range = metadata.supports_range,
        "probed resource"
    );
    Ok(metadata)
}

pub(crate) fn metadata_from_headers(headers: &HeaderMap) -> Result<ResourceMetadata, MetadataError> {
    let raw = headers
        .get(CONTENT_LENGTH)
        .ok_or(MetadataError::MissingLength)?;
    let text = raw
        .to_str()
        .map_err(|_| MetadataError::InvalidLength(String::from_utf8_lossy(raw.as_bytes()).into_owned()))?;
    let total_size = text
        .trim()
        .parse::<u64>()
        .map_err(|_| MetadataError::InvalidLength(text.to_string()))?;

    let supports_range = headers
        .get_all(ACCEPT_RANGES)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|unit| unit.trim().eq_ignore_ascii_case("bytes"));

    Ok(ResourceMetadata {
        total_size,
        supports_range,
    })
}
