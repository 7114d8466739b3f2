//! HTTP client wrapper for streaming one remote file onto one local path.
//!
//! A single [`HttpClient`] is built per run and cloned into every slot, so
//! all slots share one connection pool.

use std::path::Path;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{ACCEPT_ENCODING, HeaderMap, RETRY_AFTER};
use reqwest::redirect;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{MAX_REDIRECTS, WRITE_CHUNK_SIZE};
use super::error::DownloadError;
use super::policy::RequestPolicy;

/// HTTP client shared by every slot of a run.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Builds a client for `policy`, with an idle pool of at least `pool_size`
    /// connections per host so slots never starve each other.
    ///
    /// Compression is negotiated unless the policy already pins
    /// `Accept-Encoding`.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialised.
    pub fn for_policy(policy: &RequestPolicy, pool_size: usize) -> Result<Self, reqwest::Error> {
        let negotiate_compression = !policy.headers().contains_key(ACCEPT_ENCODING);
        let client = Client::builder()
            .connect_timeout(policy.timeout())
            .read_timeout(policy.timeout())
            .pool_max_idle_per_host(pool_size.max(1))
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .gzip(negotiate_compression)
            .build()?;
        debug!(pool_size, negotiate_compression, "built HTTP client");
        Ok(Self { client })
    }

    /// Issues one GET for `url` and, on 200, streams the body over `dest`.
    ///
    /// Nothing is written unless the final status is 200, so a failing fetch
    /// leaves any existing file untouched. Missing parent directories are
    /// created before the file is opened.
    ///
    /// # Returns
    ///
    /// Bytes written to `dest`.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::Network`] / [`DownloadError::Timeout`] for transport failures
    /// - [`DownloadError::HttpStatus`] for any final status other than 200
    /// - [`DownloadError::BodyRead`] if the body stream breaks mid-transfer
    /// - [`DownloadError::Io`] for local file system failures
    #[instrument(level = "debug", skip(self, headers), fields(url = %url, dest = %dest.display()))]
    pub async fn fetch_to_file(
        &self,
        url: &Url,
        headers: &HeaderMap,
        dest: &Path,
    ) -> Result<u64, DownloadError> {
        let response = self
            .client
            .get(url.clone())
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| DownloadError::transport(url.as_str(), e))?;

        let status = response.status().as_u16();
        if status != 200 {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            return Err(DownloadError::http_status_with_retry_after(
                url.as_str(),
                status,
                retry_after,
            ));
        }

        if let Some(parent) = dest.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let file = File::create(dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;

        stream_to_file(file, response, url, dest).await
    }
}

async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &Url,
    dest: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::with_capacity(WRITE_CHUNK_SIZE, file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::body_read(url.as_str(), e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| DownloadError::io(dest, e))?;

    debug!(bytes = bytes_written, "body written");
    Ok(bytes_written)
}
