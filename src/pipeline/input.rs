//! Input resolution: turn a user-supplied path or URL into an in-memory upload.
//!
//! Both the problem statement and the FBD image are small files, so they are
//! read fully into memory. Extraction and encoding work on byte slices and
//! never touch the file system again.

use crate::error::Fbd2ApdlError;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

/// A file handed to the pipeline: its display name and its raw bytes.
#[derive(Clone)]
pub struct Upload {
    /// File name (or URL) shown in logs and the session view.
    pub name: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a local file or download a URL into an [`Upload`].
pub async fn load_source(input: &str, timeout_secs: u64) -> Result<Upload, Fbd2ApdlError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<Upload, Fbd2ApdlError> {
    let path = PathBuf::from(path_str);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => {
            Fbd2ApdlError::PermissionDenied { path: path.clone() }
        }
        _ => Fbd2ApdlError::FileNotFound { path: path.clone() },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read local file {} ({} bytes)", path.display(), bytes.len());
    Ok(Upload::new(name, bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Upload, Fbd2ApdlError> {
    info!("Downloading from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Fbd2ApdlError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Fbd2ApdlError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Fbd2ApdlError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Fbd2ApdlError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Fbd2ApdlError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(Upload::new(file_name_from_url(url), bytes.to_vec()))
}

/// Last path segment of a URL when it looks like a file name.
fn file_name_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    url.to_string()
}
