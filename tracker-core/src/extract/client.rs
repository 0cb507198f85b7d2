//! Asynchronous RPC client to the (out-of-process, out-of-scope) metadata
//! extractor. Requests are keyed by `(url, mime)` and receive three UTF-8
//! blobs (preupdate, update, where) over a pipe, split on NUL bytes.

use crate::error::{Result, TrackerError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, warn};

/// One request's reply: any of the three fragments may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    pub preupdate: String,
    pub update: String,
    pub where_clause: String,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_POOL_SIZE: usize = 10;

/// Narrow boundary over the sandboxed extractor process; the wire protocol
/// and the process itself are out of scope.
#[async_trait]
pub trait ExtractorClient: Send + Sync {
    async fn extract(&self, url: &str, mime: &str) -> Result<ExtractionResult>;
}

/// Bounds concurrent in-flight requests to the extractor pool (default 10)
/// and applies the 60s per-request timeout.
pub struct PooledExtractorClient<C: ExtractorClient> {
    inner: C,
    permits: Semaphore,
    poisoned: std::sync::atomic::AtomicBool,
}

impl<C: ExtractorClient> PooledExtractorClient<C> {
    pub fn new(inner: C) -> Self {
        Self::with_pool_size(inner, DEFAULT_POOL_SIZE)
    }

    pub fn with_pool_size(inner: C, pool_size: usize) -> Self {
        Self {
            inner,
            permits: Semaphore::new(pool_size),
            poisoned: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(std::sync::atomic::Ordering::Acquire)
    }

    pub async fn extract(&self, path: &PathBuf, mime: &str) -> Result<ExtractionResult> {
        if self.is_poisoned() {
            return Err(TrackerError::ExtractorFailed {
                path: path.clone(),
                reason: "extractor pool previously poisoned".to_string(),
            });
        }

        let _permit = self.permits.acquire().await.map_err(|_| TrackerError::Shutdown)?;
        let url = format!("file://{}", path.display());

        match tokio::time::timeout(REQUEST_TIMEOUT, self.inner.extract(&url, mime)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => {
                self.poison();
                error!(?path, %err, "extractor protocol error, killing extractor");
                Err(TrackerError::ExtractorFailed {
                    path: path.clone(),
                    reason: err.to_string(),
                })
            }
            Err(_) => {
                self.poison();
                warn!(?path, "extractor timed out after 60s, killing extractor");
                Err(TrackerError::ExtractorFailed {
                    path: path.clone(),
                    reason: "timeout".to_string(),
                })
            }
        }
    }

    fn poison(&self) {
        self.poisoned.store(true, std::sync::atomic::Ordering::Release);
    }

    /// Called once a fresh extractor process has been spawned to replace
    /// the poisoned one.
    pub fn reset(&self) {
        self.poisoned.store(false, std::sync::atomic::Ordering::Release);
    }
}

/// Extractor that is never actually spawned: every call returns an empty
/// reply, so the pipeline falls back to base-triples-only indexing. Used
/// when no real extractor process is wired in.
pub struct NullExtractorClient;

#[async_trait]
impl ExtractorClient for NullExtractorClient {
    async fn extract(&self, _url: &str, _mime: &str) -> Result<ExtractionResult> {
        Ok(ExtractionResult::default())
    }
}

/// Splits the raw pipe payload into its three NUL-separated fragments.
pub fn parse_wire_format(bytes: &[u8]) -> ExtractionResult {
    let mut parts = bytes.splitn(3, |&b| b == 0);
    let preupdate = parts.next().unwrap_or(&[]);
    let update = parts.next().unwrap_or(&[]);
    let where_clause = parts.next().unwrap_or(&[]);
    ExtractionResult {
        preupdate: String::from_utf8_lossy(preupdate).into_owned(),
        update: String::from_utf8_lossy(update).into_owned(),
        where_clause: String::from_utf8_lossy(where_clause).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_splits_on_nul() {
        let result = parse_wire_format(b"pre\0upd\0where");
        assert_eq!(result.preupdate, "pre");
        assert_eq!(result.update, "upd");
        assert_eq!(result.where_clause, "where");
    }

    #[test]
    fn wire_format_tolerates_missing_trailing_fragments() {
        let result = parse_wire_format(b"pre\0upd");
        assert_eq!(result.preupdate, "pre");
        assert_eq!(result.update, "upd");
        assert_eq!(result.where_clause, "");
    }

    struct EchoClient;

    #[async_trait]
    impl ExtractorClient for EchoClient {
        async fn extract(&self, _url: &str, _mime: &str) -> Result<ExtractionResult> {
            Ok(ExtractionResult {
                update: "<u> a <File> .".to_string(),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn pooled_client_delegates_to_inner() {
        let pool = PooledExtractorClient::new(EchoClient);
        let result = pool.extract(&PathBuf::from("/tmp/a.txt"), "text/plain").await.unwrap();
        assert_eq!(result.update, "<u> a <File> .");
    }
}
