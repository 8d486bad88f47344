//! Batched "this feed changed" notifications to the subscription hub.
//!
//! Fire-and-forget, at most once: each batch of changed feed URLs is
//! POSTed to the hub exactly once, a failed batch is logged as a warning
//! and never retried, and later batches are sent regardless. Notifier
//! failures never affect the sync cycle that triggered them.

use crate::error::{Error, Result};
use std::time::Duration;

/// Feed URLs per notification request.
pub const DEFAULT_HUB_BATCH_SIZE: usize = 100;

/// Transport for one publish notification.
#[allow(async_fn_in_trait)]
pub trait HubTransport {
    /// Notify the hub that these feed URLs changed. Success is defined by
    /// the transport; anything else is an error the notifier logs.
    async fn publish(&self, feed_urls: &[String]) -> Result<()>;
}

/// HTTP hub transport: form-encoded POST with a "publish" intent.
///
/// The request body carries `hub.mode=publish` and one `hub.url` field
/// per feed URL. The hub signals acceptance with `204 No Content`; any
/// other status, a timeout, or a transport failure is an error.
pub struct HttpHubTransport {
    client: reqwest::Client,
    hub_url: String,
}

impl HttpHubTransport {
    pub fn new(hub_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("building hub HTTP client: {e}")))?;
        Ok(Self {
            client,
            hub_url: hub_url.into(),
        })
    }
}

impl HubTransport for HttpHubTransport {
    async fn publish(&self, feed_urls: &[String]) -> Result<()> {
        let mut form: Vec<(&str, &str)> = vec![("hub.mode", "publish")];
        for url in feed_urls {
            form.push(("hub.url", url));
        }

        let response = self
            .client
            .post(&self.hub_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Notifier(format!("posting to hub: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::Notifier(format!(
            "hub returned {status}, response: \"{}\"",
            body.chars().take(200).collect::<String>()
        )))
    }
}

/// Counts from one notification run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyStats {
    pub batches_sent: usize,
    pub batches_failed: usize,
}

/// Splits changed feed URLs into batches and pushes them to the hub.
pub struct HubNotifier<T> {
    transport: T,
    batch_size: usize,
}

impl<T: HubTransport> HubNotifier<T> {
    pub fn new(transport: T) -> Self {
        Self::with_batch_size(transport, DEFAULT_HUB_BATCH_SIZE)
    }

    pub fn with_batch_size(transport: T, batch_size: usize) -> Self {
        Self {
            transport,
            batch_size: batch_size.max(1),
        }
    }

    /// Notify the hub about every URL, one request per batch.
    ///
    /// Never fails: a batch that errors is logged and skipped, and the
    /// remaining batches are still sent.
    pub async fn notify(&self, feed_urls: &[String]) -> NotifyStats {
        let mut stats = NotifyStats::default();

        for batch in feed_urls.chunks(self.batch_size) {
            tracing::info!(urls = batch.len(), "pinging hub");
            match self.transport.publish(batch).await {
                Ok(()) => stats.batches_sent += 1,
                Err(e) => {
                    tracing::warn!(error = %e, urls = batch.len(), "hub notification failed");
                    stats.batches_failed += 1;
                }
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records batch sizes; fails the first `failing` calls.
    #[derive(Default)]
    struct RecordingTransport {
        batch_sizes: Mutex<Vec<usize>>,
        failing: AtomicUsize,
    }

    impl HubTransport for RecordingTransport {
        async fn publish(&self, feed_urls: &[String]) -> Result<()> {
            self.batch_sizes.lock().push(feed_urls.len());
            if self.failing.load(Ordering::SeqCst) > 0 {
                self.failing.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::Notifier("injected failure".to_string()));
            }
            Ok(())
        }
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://feeds.test/f{i}")).collect()
    }

    #[tokio::test]
    async fn partitions_into_fixed_size_batches() {
        let notifier = HubNotifier::new(RecordingTransport::default());
        let stats = notifier.notify(&urls(250)).await;

        assert_eq!(stats, NotifyStats { batches_sent: 3, batches_failed: 0 });
        assert_eq!(
            notifier.transport.batch_sizes.lock().as_slice(),
            &[100, 100, 50]
        );
    }

    #[tokio::test]
    async fn failed_batch_does_not_stop_the_rest() {
        let transport = RecordingTransport::default();
        transport.failing.store(1, Ordering::SeqCst);
        let notifier = HubNotifier::new(transport);

        let stats = notifier.notify(&urls(250)).await;
        assert_eq!(stats, NotifyStats { batches_sent: 2, batches_failed: 1 });
        assert_eq!(
            notifier.transport.batch_sizes.lock().as_slice(),
            &[100, 100, 50]
        );
    }

    #[tokio::test]
    async fn empty_url_list_sends_nothing() {
        let notifier = HubNotifier::new(RecordingTransport::default());
        let stats = notifier.notify(&[]).await;
        assert_eq!(stats, NotifyStats::default());
        assert!(notifier.transport.batch_sizes.lock().is_empty());
    }
}
