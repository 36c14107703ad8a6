//! # Remote Snapshot Client
//!
//! Whole-document transfer against the shared snapshot endpoint.
//!
//! ## Wire Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Remote Snapshot Endpoint                            │
//! │                                                                         │
//! │  PULL                                                                  │
//! │  ────                                                                  │
//! │  GET {endpoint}                                                        │
//! │    ◄── 200 { "items": [...], "logs": [...], "timestamp": 1700000000 }  │
//! │        items missing/null   → MalformedSnapshot                        │
//! │        logs missing/null    → []                                       │
//! │                                                                         │
//! │  PUSH                                                                  │
//! │  ────                                                                  │
//! │  POST {endpoint}   body = { items, logs, timestamp }                   │
//! │    ◄── response body ignored                                           │
//! │        status ignored unless verify_push_status = true                 │
//! │                                                                         │
//! │  The remote keeps whatever was posted last. There are no versions.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use safeman_core::Snapshot;
use tracing::{debug, warn};

use crate::config::RemoteSettings;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Client Trait
// =============================================================================

/// Transfers full snapshots to and from a remote endpoint.
#[async_trait]
pub trait RemoteSnapshotClient: Send + Sync {
    /// Fetches the current remote snapshot.
    async fn pull(&self, endpoint: &str) -> SyncResult<Snapshot>;

    /// Replaces the remote snapshot with `snapshot`.
    async fn push(&self, endpoint: &str, snapshot: &Snapshot) -> SyncResult<()>;
}

// =============================================================================
// HTTP Client
// =============================================================================

/// reqwest-backed snapshot client.
#[derive(Debug, Clone)]
pub struct HttpSnapshotClient {
    client: reqwest::Client,
    timeout: Duration,
    verify_push_status: bool,
}

impl HttpSnapshotClient {
    /// Creates a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration, verify_push_status: bool) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(HttpSnapshotClient {
            client,
            timeout,
            verify_push_status,
        })
    }

    /// Creates a client from the `[remote]` settings.
    pub fn from_settings(settings: &RemoteSettings) -> SyncResult<Self> {
        Self::new(settings.request_timeout(), settings.verify_push_status)
    }

    fn map_send_error(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(self.timeout.as_secs())
        } else {
            SyncError::from(err)
        }
    }
}

#[async_trait]
impl RemoteSnapshotClient for HttpSnapshotClient {
    async fn pull(&self, endpoint: &str) -> SyncResult<Snapshot> {
        debug!(endpoint = %endpoint, "Pulling remote snapshot");

        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| self.map_send_error(e))?;
        let snapshot =
            Snapshot::from_json(&body).map_err(|e| SyncError::MalformedSnapshot(e.to_string()))?;

        debug!(
            items = snapshot.items.len(),
            logs = snapshot.logs.len(),
            "Remote snapshot received"
        );
        Ok(snapshot)
    }

    async fn push(&self, endpoint: &str, snapshot: &Snapshot) -> SyncResult<()> {
        debug!(
            endpoint = %endpoint,
            items = snapshot.items.len(),
            logs = snapshot.logs.len(),
            "Pushing snapshot"
        );

        let response = self
            .client
            .post(endpoint)
            .json(snapshot)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            if self.verify_push_status {
                return Err(SyncError::HttpStatus(status.as_u16()));
            }
            debug!(status = status.as_u16(), "Ignoring push response status");
        }

        Ok(())
    }
}

// =============================================================================
// Retry Wrapper
// =============================================================================

/// Retries retryable failures of an inner client with exponential backoff.
///
/// With `max_retries = 0` every call is a single attempt.
pub struct RetryingClient<C> {
    inner: C,
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl<C: RemoteSnapshotClient> RetryingClient<C> {
    pub fn new(inner: C, max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        RetryingClient {
            inner,
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    /// Wraps `inner` using the `[remote]` retry settings.
    pub fn from_settings(inner: C, settings: &RemoteSettings) -> Self {
        Self::new(
            inner,
            settings.max_retries,
            Duration::from_millis(settings.initial_backoff_ms),
            Duration::from_secs(settings.max_backoff_secs),
        )
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Sleeps before the next attempt, or returns false when out of retries.
    async fn wait_for_retry(
        &self,
        backoff: &mut ExponentialBackoff,
        retry_count: &mut u32,
        err: &SyncError,
    ) -> bool {
        if !err.is_retryable() || *retry_count >= self.max_retries {
            return false;
        }

        match backoff.next_backoff() {
            Some(duration) => {
                *retry_count += 1;
                warn!(
                    error = %err,
                    attempt = *retry_count,
                    ?duration,
                    "Remote call failed, retrying"
                );
                tokio::time::sleep(duration).await;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl<C: RemoteSnapshotClient> RemoteSnapshotClient for RetryingClient<C> {
    async fn pull(&self, endpoint: &str) -> SyncResult<Snapshot> {
        let mut backoff = self.create_backoff();
        let mut retry_count = 0u32;

        loop {
            match self.inner.pull(endpoint).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) => {
                    if !self.wait_for_retry(&mut backoff, &mut retry_count, &e).await {
                        return Err(e);
                    }
                }
            }
        }
    }

    async fn push(&self, endpoint: &str, snapshot: &Snapshot) -> SyncResult<()> {
        let mut backoff = self.create_backoff();
        let mut retry_count = 0u32;

        loop {
            match self.inner.push(endpoint, snapshot).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if !self.wait_for_retry(&mut backoff, &mut retry_count, &e).await {
                        return Err(e);
                    }
                }
            }
        }
    }
}

/// Builds the client described by `[remote]`: HTTP, wrapped for retries.
pub fn client_from_settings(settings: &RemoteSettings) -> SyncResult<Arc<dyn RemoteSnapshotClient>> {
    let http = HttpSnapshotClient::from_settings(settings)?;
    Ok(Arc::new(RetryingClient::from_settings(http, settings)))
}
