//! Direct file retrieval from the APPLAUSE web server.
//!
//! Binary artifacts (plate scans, logbook pages, previews) are not served
//! through the TAP protocol: the database tables reference them by
//! server-relative path, and they are fetched with a plain HTTP GET from the
//! archive's file area. This module performs that one-shot fetch and streams
//! the body to disk.
//!
//! # Example
//!
//! ```no_run
//! use applause_query::download_file;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Saved as POT050-OB1-000390-000392.jpg in the current directory.
//! download_file("DR3/logbooks/POT050/POT050-OB1-000390-000392.jpg", None).await?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use crate::tap::TapError;

/// Base URL of the archive's static file area.
pub const FILES_BASE_URL: &str = "https://www.plate-archive.org/files/";

/// HTTP connect timeout for file downloads (30 seconds).
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Client for downloading files from the archive web server.
///
/// Designed to be created once and reused, taking advantage of connection
/// pooling. Downloads bypass the TAP job protocol entirely and carry no
/// authentication.
#[derive(Debug, Clone)]
pub struct FileDownloader {
    client: Client,
    base_url: String,
}

impl Default for FileDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl FileDownloader {
    /// Creates a downloader bound to the fixed archive file area.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    /// This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_base_url(FILES_BASE_URL)
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a downloader against a non-default file area.
    ///
    /// Intended for mirror deployments and tests.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::InvalidUrl`] if `base_url` is not a valid URL, or
    /// [`TapError::Session`] if the client cannot be built.
    pub fn with_base_url(base_url: &str) -> Result<Self, TapError> {
        Url::parse(base_url).map_err(|_| TapError::invalid_url(base_url))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .gzip(true)
            .build()
            .map_err(|e| TapError::session(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: format!("{}/", base_url.trim_end_matches('/')),
        })
    }

    /// Downloads a file given its server-relative path.
    ///
    /// `path` is the value listed in the database tables, e.g.
    /// `DR3/logbooks/POT050/POT050-OB1-000390-000392.jpg`. When
    /// `save_filename` is `None` the file is saved under the path's basename
    /// in the current directory; otherwise `save_filename` is used verbatim.
    ///
    /// Returns the path the file was written to.
    ///
    /// # Errors
    ///
    /// Returns `TapError` if:
    /// - `path` is empty or ends in a separator (no basename)
    /// - the request fails (network error, missing file, server error)
    /// - writing to disk fails
    ///
    /// There is no retry.
    #[must_use = "download result contains the path to the saved file"]
    #[instrument(skip(self), fields(path = %path))]
    pub async fn download(
        &self,
        path: &str,
        save_filename: Option<&Path>,
    ) -> Result<PathBuf, TapError> {
        let target = match save_filename {
            Some(name) => name.to_path_buf(),
            None => PathBuf::from(default_filename(path)?),
        };
        let url = format!("{}{}", self.base_url, path.trim_start_matches('/'));
        debug!(url = %url, target = %target.display(), "starting file download");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TapError::network(&url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TapError::status(&url, status.as_u16()));
        }

        let file = File::create(&target)
            .await
            .map_err(|e| TapError::io(target.clone(), e))?;
        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TapError::network(&url, e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| TapError::io(target.clone(), e))?;
            bytes_written += chunk.len() as u64;
        }
        writer
            .flush()
            .await
            .map_err(|e| TapError::io(target.clone(), e))?;

        info!(path = %target.display(), bytes = bytes_written, "download complete");
        Ok(target)
    }
}

/// Downloads a file from the APPLAUSE web server.
///
/// Convenience wrapper constructing a one-shot [`FileDownloader`] against the
/// fixed archive file area; see [`FileDownloader::download`].
///
/// # Errors
///
/// See [`FileDownloader::download`].
pub async fn download_file(
    path: &str,
    save_filename: Option<&Path>,
) -> Result<PathBuf, TapError> {
    FileDownloader::new().download(path, save_filename).await
}

/// Default output filename: the basename of the server-relative path.
fn default_filename(path: &str) -> Result<&str, TapError> {
    path.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| TapError::invalid_url(path))
}
