//! Input resolution: turn a user-supplied path or URL into a [`SourceArtifact`].
//!
//! The whole payload is read into memory. Every backend (pdfium, `image`,
//! resvg, the DOCX reader) works from a byte slice, so there is no temp file
//! to keep alive. The format comes from the file name only, exactly as for
//! an upload; the `Content-Type` of a download is passed along and ignored.

use crate::artifact::SourceArtifact;
use crate::error::DocShiftError;
use crate::format::{detect_format, FormatId};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// The display name an input will carry once resolved: the last URL path
/// segment, or the local file name.
pub fn input_name(input: &str) -> Option<String> {
    if is_url(input) {
        filename_from_url(input)
    } else {
        Path::new(input)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }
}

/// Detect an input's format from its name alone, without touching the
/// file system or the network.
pub fn detect_input_format(input: &str) -> Result<FormatId, DocShiftError> {
    if input.trim().is_empty() {
        return Err(DocShiftError::InvalidInput {
            input: input.to_string(),
        });
    }
    input_name(input)
        .and_then(|name| detect_format(&name, None))
        .ok_or_else(|| DocShiftError::UnsupportedUpload {
            file_name: input_name(input).unwrap_or_else(|| input.to_string()),
        })
}

/// Resolve the input string to a source artifact.
///
/// URLs are downloaded with `timeout_secs` as the whole-request timeout.
/// Local paths are read after existence and permission checks.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SourceArtifact, DocShiftError> {
    if input.trim().is_empty() {
        return Err(DocShiftError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<SourceArtifact, DocShiftError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(DocShiftError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(DocShiftError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocShiftError::PermissionDenied { path });
        }
        Err(_) => return Err(DocShiftError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read {} bytes from {}", bytes.len(), path.display());
    SourceArtifact::from_upload(name, bytes, None)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceArtifact, DocShiftError> {
    info!("Downloading from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocShiftError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocShiftError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocShiftError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocShiftError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let declared_mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            DocShiftError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocShiftError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    let name = filename_from_url(url).ok_or_else(|| DocShiftError::UnsupportedUpload {
        file_name: url.to_string(),
    })?;

    info!("Downloaded {} bytes as '{}'", bytes.len(), name);
    SourceArtifact::from_upload(name, bytes.to_vec(), declared_mime.as_deref())
}

/// The last non-empty path segment of `url`, if it has an extension.
fn filename_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    last.contains('.').then(|| last.to_string())
}
