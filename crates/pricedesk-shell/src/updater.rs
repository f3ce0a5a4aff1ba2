use crate::bridge::UiChannel;
use crate::shell::ShellEvent;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Debug, Clone, Error)]
pub enum UpdateError {
    #[error("feed request failed: {0}")]
    Feed(String),
    #[error("malformed release manifest: {0}")]
    Manifest(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ReleaseInfo {
    pub version: String,
    pub url: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Source of release manifests. Fetching and verifying the actual update
/// binary belongs to the external updater; the host only checks the feed.
pub trait ReleaseFeed: Send + Sync + 'static {
    fn latest(&self) -> impl Future<Output = Result<ReleaseInfo, UpdateError>> + Send;
}

pub struct HttpReleaseFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpReleaseFeed {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl ReleaseFeed for HttpReleaseFeed {
    fn latest(&self) -> impl Future<Output = Result<ReleaseInfo, UpdateError>> + Send {
        let client = self.client.clone();
        let url = self.url.clone();
        async move {
            let response = client
                .get(&url)
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|err| UpdateError::Feed(err.to_string()))?;
            response
                .json::<ReleaseInfo>()
                .await
                .map_err(|err| UpdateError::Manifest(err.to_string()))
        }
    }
}

/// Shared with the capability surface: download progress reported by the
/// external updater, and the restart gate.
#[derive(Clone)]
pub struct UpdaterHandle {
    events: broadcast::Sender<ShellEvent>,
    downloaded: Arc<AtomicBool>,
}

impl UpdaterHandle {
    pub fn new(events: broadcast::Sender<ShellEvent>) -> Self {
        Self {
            events,
            downloaded: Arc::new(AtomicBool::new(false)),
        }
    }

    fn emit(&self, channel: UiChannel, payload: Value) {
        let _ = self.events.send(ShellEvent { channel, payload });
    }

    pub fn report_download_progress(&self, percent: f64) {
        self.emit(
            UiChannel::UpdateDownloadProgress,
            json!({ "percent": percent }),
        );
    }

    pub fn report_downloaded(&self) {
        self.downloaded.store(true, Ordering::SeqCst);
        self.emit(UiChannel::UpdateDownloaded, Value::Null);
    }

    /// True when the restart may proceed. Before a download has completed
    /// the request is refused with a log line, not an error.
    pub fn restart_and_update(&self) -> bool {
        if self.downloaded.load(Ordering::SeqCst) {
            info!("restarting to apply downloaded update");
            true
        } else {
            warn!("restart-and-update requested with no downloaded update");
            false
        }
    }
}

/// Periodic background check. Every failure is a non-fatal `error` event on
/// the update channel; the host never aborts over it.
pub struct UpdateChecker<F> {
    feed: F,
    current_version: String,
    interval: Duration,
    handle: UpdaterHandle,
}

impl<F: ReleaseFeed> UpdateChecker<F> {
    pub fn new(
        feed: F,
        current_version: impl Into<String>,
        interval: Duration,
        handle: UpdaterHandle,
    ) -> Self {
        Self {
            feed,
            current_version: current_version.into(),
            interval,
            handle,
        }
    }

    pub async fn check_once(&self) {
        self.handle.emit(UiChannel::UpdateChecking, Value::Null);
        match self.feed.latest().await {
            Ok(info) if info.version != self.current_version => {
                info!("update available: {}", info.version);
                self.handle.emit(
                    UiChannel::UpdateAvailable,
                    json!({
                        "version": info.version,
                        "url": info.url,
                        "notes": info.notes,
                    }),
                );
            }
            Ok(_) => self.handle.emit(UiChannel::UpdateNotAvailable, Value::Null),
            Err(err) => {
                warn!("update check failed: {err}");
                self.handle.emit(
                    UiChannel::UpdateError,
                    json!({ "message": err.to_string() }),
                );
            }
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.check_once().await;
        }
    }
}
