//! Best-effort download of a remote URL into a local file.

use anyhow::{Context, Result, bail};
use reqwest::{Client, Response};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::FetchOptions;

/// Result of [`fetch_from_url`]. Failures are reported here, never as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Saved { path: PathBuf, bytes: u64 },
    Failed { reason: String },
}

impl FetchOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, FetchOutcome::Saved { .. })
    }
}

/// Download `remote_url` into `local_path`, creating missing parent
/// directories. The whole body is read before the file is written.
///
/// Every failure (bad URL, network, HTTP status, filesystem) is logged and
/// returned as [`FetchOutcome::Failed`]; a failed fetch may still leave
/// newly created parent directories behind.
pub async fn fetch_from_url(remote_url: &str, local_path: &Path, options: &FetchOptions) -> FetchOutcome {
    match try_fetch(remote_url, local_path, options).await {
        Ok(bytes) => {
            info!(url = remote_url, path = %local_path.display(), bytes, "fetched");
            FetchOutcome::Saved {
                path: local_path.to_path_buf(),
                bytes,
            }
        }
        Err(e) => {
            let reason = format!("{e:#}");
            warn!(url = remote_url, path = %local_path.display(), error = %reason, "fetch failed");
            FetchOutcome::Failed { reason }
        }
    }
}

async fn try_fetch(remote_url: &str, local_path: &Path, options: &FetchOptions) -> Result<u64> {
    let url = Url::parse(remote_url).with_context(|| format!("invalid URL {remote_url}"))?;
    let client = Client::builder()
        .timeout(Duration::from_secs(options.timeout_secs))
        .build()?;

    let resp = get_with_retry(&client, url, options.max_attempts).await?;
    if !resp.status().is_success() {
        bail!("HTTP request failed with status: {}", resp.status());
    }

    if let Some(parent) = local_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    let body = resp.bytes().await.context("reading response body")?;
    fs::write(local_path, &body)
        .await
        .with_context(|| format!("writing {}", local_path.display()))?;

    Ok(body.len() as u64)
}

/// GET with retries on connect and timeout errors, backing off 500ms per attempt.
async fn get_with_retry(client: &Client, url: Url, max_attempts: u32) -> Result<Response> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match client.get(url.clone()).send().await {
            Ok(resp) => return Ok(resp),
            Err(e) if (e.is_timeout() || e.is_connect()) && attempt < max_attempts => {
                debug!(attempt, max_attempts, error = %e, "connection error, retrying");
                tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
            }
            Err(e) => return Err(e).context(format!("GET {url}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_url_is_a_failed_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out/file.png");

        let outcome = fetch_from_url("not a url", &dest, &FetchOptions::default()).await;

        match outcome {
            FetchOutcome::Failed { reason } => assert!(reason.contains("invalid URL")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!dest.exists());
        assert!(!dest.parent().unwrap().exists());
    }

    #[test]
    fn is_saved_reflects_variant() {
        let saved = FetchOutcome::Saved {
            path: PathBuf::from("/tmp/x"),
            bytes: 1,
        };
        assert!(saved.is_saved());
        assert!(!FetchOutcome::Failed { reason: "boom".into() }.is_saved());
    }
}
