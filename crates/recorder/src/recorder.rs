//! Impression intake with two independent, best-effort effects: a
//! fast-path counter bump in the decision cache and a durable-path
//! hand-off to the batched ClickHouse writer. The caller is
//! acknowledged once the event is queued; neither effect can fail the
//! other or the HTTP response.

use crate::writer::BatchWriter;
use adserver_cache::DecisionCache;
use adserver_core::config::ClickHouseConfig;
use adserver_core::types::ImpressionEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

const CHANNEL_CAPACITY: usize = 100_000;

pub struct ImpressionRecorder<C> {
    cache: Arc<C>,
    durable: mpsc::Sender<ImpressionEvent>,
}

impl<C: DecisionCache + 'static> ImpressionRecorder<C> {
    /// Build the recorder and spawn the ClickHouse batch writer.
    pub async fn new(cache: Arc<C>, config: &ClickHouseConfig) -> anyhow::Result<Self> {
        let (sender, receiver) = mpsc::channel::<ImpressionEvent>(CHANNEL_CAPACITY);

        let writer = BatchWriter::new(config).await?;
        let batch_size = config.batch_size;
        let flush_interval = std::time::Duration::from_millis(config.flush_interval_ms);

        tokio::spawn(async move {
            writer.run(receiver, batch_size, flush_interval).await;
        });

        info!("Impression recorder initialized with ClickHouse backend");

        Ok(Self::with_sender(cache, sender))
    }

    /// Build a recorder over an externally owned channel. Tests use
    /// this to assert hand-off without a ClickHouse instance.
    pub fn with_sender(cache: Arc<C>, durable: mpsc::Sender<ImpressionEvent>) -> Self {
        Self { cache, durable }
    }

    /// Record one impression. Synchronously cheap: the fast-path
    /// increment is detached and the durable hand-off is a try_send.
    pub fn record(&self, event: ImpressionEvent) {
        metrics::counter!("impressions.received").increment(1);

        let cache = self.cache.clone();
        let creative_id = event.creative_id.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.incr_impression_counter(&creative_id).await {
                metrics::counter!("counters.impression_errors").increment(1);
                warn!(creative_id = %creative_id, error = %e, "Impression counter increment failed");
            }
        });

        if let Err(e) = self.durable.try_send(event) {
            metrics::counter!("impressions.dropped").increment(1);
            warn!(error = %e, "Impression event dropped before durable hand-off");
        } else {
            metrics::counter!("impressions.queued").increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adserver_cache::MemoryDecisionCache;
    use std::time::Duration;

    fn event(creative_id: &str) -> ImpressionEvent {
        ImpressionEvent {
            ad_id: "ad-1".to_string(),
            campaign_id: "c1".to_string(),
            creative_id: creative_id.to_string(),
            device_id: "dev-1".to_string(),
            timestamp: None,
            duration: Some(30),
            completed: Some(true),
        }
    }

    #[tokio::test]
    async fn event_is_handed_off_to_durable_channel() {
        let cache = Arc::new(MemoryDecisionCache::new());
        let (sender, mut receiver) = mpsc::channel(8);
        let recorder = ImpressionRecorder::with_sender(cache, sender);

        recorder.record(event("v1"));

        let delivered = receiver.try_recv().expect("event should be queued");
        assert_eq!(delivered.creative_id, "v1");
        assert_eq!(delivered.completed, Some(true));
    }

    #[tokio::test]
    async fn fast_path_counter_increments_exactly_once() {
        let cache = Arc::new(MemoryDecisionCache::new());
        let (sender, _receiver) = mpsc::channel(8);
        let recorder = ImpressionRecorder::with_sender(cache.clone(), sender);

        recorder.record(event("v1"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.impression_count("v1"), 1);
    }

    #[tokio::test]
    async fn cache_failure_does_not_block_durable_path() {
        let cache = Arc::new(MemoryDecisionCache::new());
        cache.set_unavailable(true);
        let (sender, mut receiver) = mpsc::channel(8);
        let recorder = ImpressionRecorder::with_sender(cache, sender);

        recorder.record(event("v1"));

        assert!(receiver.try_recv().is_ok());
    }

    #[tokio::test]
    async fn full_channel_does_not_block_fast_path() {
        let cache = Arc::new(MemoryDecisionCache::new());
        let (sender, mut receiver) = mpsc::channel(1);
        let recorder = ImpressionRecorder::with_sender(cache.clone(), sender);

        recorder.record(event("v1"));
        recorder.record(event("v1")); // channel full, dropped
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.impression_count("v1"), 2);
        assert!(receiver.try_recv().is_ok());
        assert!(receiver.try_recv().is_err());
    }
}
