//! Background writer that batches impression events and flushes them
//! to ClickHouse. Fed by a channel; the HTTP path never waits on it.

use adserver_core::config::ClickHouseConfig;
use adserver_core::types::ImpressionEvent;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

pub struct BatchWriter {
    client: clickhouse::Client,
}

impl BatchWriter {
    pub async fn new(config: &ClickHouseConfig) -> anyhow::Result<Self> {
        let client = clickhouse::Client::default()
            .with_url(&config.url)
            .with_database(&config.database);

        Self::ensure_schema(&client).await?;

        Ok(Self { client })
    }

    async fn ensure_schema(client: &clickhouse::Client) -> anyhow::Result<()> {
        client
            .query(
                "CREATE TABLE IF NOT EXISTS impressions (
                    ad_id String,
                    campaign_id String,
                    creative_id String,
                    device_id String,
                    timestamp Nullable(DateTime64(3)),
                    duration Nullable(UInt32),
                    completed Nullable(Bool),
                    received_at DateTime64(3) DEFAULT now64(3)
                ) ENGINE = MergeTree()
                ORDER BY (received_at, campaign_id)
                PARTITION BY toYYYYMM(received_at)
                TTL toDateTime(received_at) + INTERVAL 90 DAY",
            )
            .execute()
            .await?;

        info!("ClickHouse impressions schema verified");
        Ok(())
    }

    pub async fn run(
        self,
        mut receiver: mpsc::Receiver<ImpressionEvent>,
        batch_size: usize,
        flush_interval: std::time::Duration,
    ) {
        let mut buffer: Vec<ImpressionEvent> = Vec::with_capacity(batch_size);
        let mut interval = tokio::time::interval(flush_interval);

        loop {
            tokio::select! {
                Some(event) = receiver.recv() => {
                    buffer.push(event);
                    if buffer.len() >= batch_size {
                        self.flush(&mut buffer).await;
                    }
                }
                _ = interval.tick() => {
                    if !buffer.is_empty() {
                        self.flush(&mut buffer).await;
                    }
                }
            }
        }
    }

    async fn flush(&self, buffer: &mut Vec<ImpressionEvent>) {
        let count = buffer.len();
        debug!(count = count, "Flushing impression batch to ClickHouse");

        let mut json_rows = Vec::with_capacity(buffer.len());
        for e in buffer.iter() {
            if let Ok(json) = serde_json::to_string(e) {
                json_rows.push(json);
            }
        }

        if json_rows.is_empty() {
            buffer.clear();
            return;
        }

        let insert_sql = format!(
            "INSERT INTO impressions FORMAT JSONEachRow {}",
            json_rows.join("\n")
        );

        match self.client.query(&insert_sql).execute().await {
            Ok(_) => {
                metrics::counter!("impressions.flushed").increment(count as u64);
            }
            Err(e) => {
                metrics::counter!("impressions.flush_errors").increment(1);
                error!(error = %e, count = count, "Failed to flush impression batch");
            }
        }

        buffer.clear();
    }
}
