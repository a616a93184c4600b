use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{self, AsyncWriteExt};
use tracing::{debug, info};

use crate::models::Segment;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("cannot create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot copy segment {index} from {path}: {source}")]
    Copy {
        index: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("merged file written but temp files could not be removed: {}", describe(.failed))]
    Cleanup { failed: Vec<(PathBuf, std::io::Error)> },
}

fn describe(failed: &[(PathBuf, std::io::Error)]) -> String {
    failed
        .iter()
        .map(|(path, e)| format!("{}: {}", path.display(), e))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Concatenates the segment files into `destination` in ascending index
/// order, then deletes them. Returns the number of bytes written.
///
/// A failure while copying leaves `destination` partially written and every
/// temp file in place. A failure while deleting is reported after the merged
/// file is complete; it is not rolled back.
pub async fn merge(destination: &Path, segments: &[Segment]) -> Result<u64, AssembleError> {
    let mut ordered: Vec<&Segment> = segments.iter().collect();
    ordered.sort_by_key(|s| s.index);

    let mut out = File::create(destination)
        .await
        .map_err(|source| AssembleError::Create {
            path: destination.to_path_buf(),
            source,
        })?;

    let mut written = 0u64;
    for segment in &ordered {
        let copy_err = |source| AssembleError::Copy {
            index: segment.index,
            path: segment.temp_path.clone(),
            source,
        };
        let mut part = File::open(&segment.temp_path).await.map_err(copy_err)?;
        let n = io::copy(&mut part, &mut out).await.map_err(copy_err)?;
        debug!(segment = segment.index, bytes = n, "merged segment");
        written += n;
    }
    out.flush().await.map_err(|source| AssembleError::Create {
        path: destination.to_path_buf(),
        source,
    })?;
    drop(out);

    let mut failed = Vec::new();
    for segment in &ordered {
        if let Err(e) = fs::remove_file(&segment.temp_path).await {
            failed.push((segment.temp_path.clone(), e));
        }
    }
    if !failed.is_empty() {
        return Err(AssembleError::Cleanup { failed });
    }

    info!(path = %destination.display(), bytes = written, "assembled file");
    Ok(written)
}
