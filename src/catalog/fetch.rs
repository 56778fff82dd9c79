//! HTTP fetching with timeouts and retry.
//!
//! All network access in the updater funnels through [`Fetcher`] so the
//! retry policy lives in one place: every call is attempted up to
//! [`RETRY_ATTEMPTS`](crate::constants::RETRY_ATTEMPTS) times with short
//! exponential backoff and jitter. Client errors (4xx) are definitive
//! answers and are not retried; transport failures and server errors
//! are. Timeouts apply per call: metadata fetches get a short budget,
//! payload downloads a longer one. There is no whole-run timeout.
//!
//! Downloads are streamed to disk chunk by chunk; a release archive is
//! never buffered whole in memory.

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::debug;

use crate::constants::{DOWNLOAD_TIMEOUT, FETCH_TIMEOUT, RETRY_ATTEMPTS, RETRY_BASE_DELAY_MS};
use crate::core::UpdaterError;

/// Shared HTTP client with the updater's retry policy.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    /// Build a fetcher with a fresh connection pool.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Fetch a small text resource (manifest, listing, info.txt).
    pub async fn fetch_text(&self, url: &str) -> Result<String, UpdaterError> {
        debug!(url, "Fetching text");
        let client = self.client.clone();
        let owned = url.to_string();
        retrying(url, move || {
            let client = client.clone();
            let url = owned.clone();
            async move {
                let response = client
                    .get(&url)
                    .timeout(FETCH_TIMEOUT)
                    .send()
                    .await?
                    .error_for_status()?;
                response.text().await
            }
        })
        .await
    }

    /// Download a payload file to `dest`, creating parent directories.
    ///
    /// The body is streamed to the destination file; only the request
    /// itself is retried. A failure mid-body surfaces as
    /// [`UpdaterError::Unreachable`] and the caller restages.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        debug!(url, dest = %dest.display(), "Downloading");
        let client = self.client.clone();
        let owned = url.to_string();
        let mut response = retrying(url, move || {
            let client = client.clone();
            let url = owned.clone();
            async move {
                client
                    .get(&url)
                    .timeout(DOWNLOAD_TIMEOUT)
                    .send()
                    .await?
                    .error_for_status()
            }
        })
        .await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create download: {}", dest.display()))?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| UpdaterError::Unreachable {
                url: url.to_string(),
                reason: e.to_string(),
            })?
        {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write download: {}", dest.display()))?;
        }
        file.flush()
            .await
            .with_context(|| format!("Failed to flush download: {}", dest.display()))?;
        Ok(())
    }
}

/// Run `op` with exponential backoff; on exhaustion map the transport
/// error to [`UpdaterError::Unreachable`].
async fn retrying<T, F, Fut>(url: &str, op: F) -> Result<T, UpdaterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = reqwest::Result<T>>,
{
    let strategy = ExponentialBackoff::from_millis(RETRY_BASE_DELAY_MS)
        .map(jitter)
        .take(RETRY_ATTEMPTS - 1);

    RetryIf::spawn(strategy, op, is_retryable)
        .await
        .map_err(|e| UpdaterError::Unreachable {
            url: url.to_string(),
            reason: e.to_string(),
        })
}

/// A 4xx is the server's final answer (a missing info.txt stays
/// missing); everything else may be transient.
fn is_retryable(e: &reqwest::Error) -> bool {
    match e.status() {
        Some(status) => status.is_server_error(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Minimal HTTP server: answers every connection with a fixed
    /// response and counts the requests it saw.
    async fn spawn_server(status_line: &'static str, body: Vec<u8>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let head = format!(
                    "{status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}/"), hits)
    }

    #[tokio::test]
    async fn download_streams_body_to_disk() {
        // Large enough to arrive in multiple chunks.
        let payload = vec![0xA5u8; 512 * 1024];
        let (base, _) = spawn_server("HTTP/1.1 200 OK", payload.clone()).await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("staging/update.zip");
        Fetcher::new()
            .download(&format!("{base}update.zip"), &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), payload);
    }

    #[tokio::test]
    async fn fetch_text_returns_body() {
        let (base, hits) = spawn_server("HTTP/1.1 200 OK", b"v1.1.0 notes".to_vec()).await;
        let body = Fetcher::new()
            .fetch_text(&format!("{base}info.txt"))
            .await
            .unwrap();
        assert_eq!(body, "v1.1.0 notes");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_resource_is_not_retried() {
        let (base, hits) = spawn_server("HTTP/1.1 404 Not Found", b"gone".to_vec()).await;
        let err = Fetcher::new()
            .fetch_text(&format!("{base}info.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, UpdaterError::Unreachable { .. }));
        // One request, no backoff attempts: a 404 is a final answer.
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_exhaustion() {
        let (base, hits) =
            spawn_server("HTTP/1.1 503 Service Unavailable", b"busy".to_vec()).await;
        let err = Fetcher::new()
            .fetch_text(&format!("{base}catalog.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, UpdaterError::Unreachable { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), RETRY_ATTEMPTS);
    }

    #[tokio::test]
    async fn unresolvable_host_is_unreachable() {
        let err = Fetcher::new()
            .fetch_text("http://releases.invalid/catalog.json")
            .await
            .unwrap_err();
        assert!(matches!(err, UpdaterError::Unreachable { .. }));
    }
}
