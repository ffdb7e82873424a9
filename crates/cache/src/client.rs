//! Redis-backed decision cache client. Every read follows
//! parse-or-absent semantics: a missing or malformed record comes back
//! as `None` so one bad entry can never fail a whole decision.

use crate::keys;
use crate::DecisionCache;
use adserver_core::config::RedisConfig;
use adserver_core::types::{CampaignRecord, CreativeRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

pub struct RedisDecisionCache {
    conn: ConnectionManager,
}

impl RedisDecisionCache {
    /// Connect and verify with a PING. Startup fails fast when the
    /// cache is down; per-request resilience is the engine's job.
    pub async fn connect(config: &RedisConfig) -> anyhow::Result<Self> {
        info!(url = %config.url, "Connecting to Redis");

        let client = redis::Client::open(config.url.as_str())?;
        let conn = tokio::time::timeout(
            Duration::from_millis(config.connect_timeout_ms),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connect timed out after {}ms", config.connect_timeout_ms))??;

        let mut probe = conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut probe).await?;
        info!(response = %pong, "Redis connection established");

        Ok(Self { conn })
    }
}

#[async_trait]
impl DecisionCache for RedisDecisionCache {
    async fn active_campaign_ids(&self) -> anyhow::Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.zrange(keys::ACTIVE_CAMPAIGNS, 0, -1).await?;
        Ok(ids)
    }

    async fn campaign(&self, id: &str) -> anyhow::Result<Option<CampaignRecord>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(keys::campaign(id)).await?;
        if fields.is_empty() {
            metrics::counter!("cache.campaign.miss").increment(1);
            return Ok(None);
        }
        Ok(parse_campaign(id, &fields))
    }

    async fn random_creative_id(&self, campaign_id: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let member: Option<String> = conn.srandmember(keys::campaign_creatives(campaign_id)).await?;
        Ok(member)
    }

    async fn creative(&self, id: &str) -> anyhow::Result<Option<CreativeRecord>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(keys::creative(id)).await?;
        if fields.is_empty() {
            metrics::counter!("cache.creative.miss").increment(1);
            return Ok(None);
        }
        Ok(parse_creative(id, &fields))
    }

    async fn incr_request_counter(&self, campaign_id: &str) -> anyhow::Result<u64> {
        let mut conn = self.conn.clone();
        let key = keys::campaign_requests(campaign_id, Utc::now());
        let count: u64 = conn.incr(&key, 1).await?;
        let _: bool = conn.expire(&key, keys::COUNTER_TTL_SECS as i64).await?;
        Ok(count)
    }

    async fn incr_impression_counter(&self, creative_id: &str) -> anyhow::Result<u64> {
        let mut conn = self.conn.clone();
        let key = keys::creative_impressions(creative_id, Utc::now());
        let count: u64 = conn.incr(&key, 1).await?;
        let _: bool = conn.expire(&key, keys::COUNTER_TTL_SECS as i64).await?;
        Ok(count)
    }
}

/// Parse a campaign hash into a record. Any missing or unparsable
/// field degrades the whole record to `None`.
pub fn parse_campaign(id: &str, fields: &HashMap<String, String>) -> Option<CampaignRecord> {
    let record = (|| {
        Some(CampaignRecord {
            id: id.to_string(),
            name: fields.get("name")?.clone(),
            status: fields.get("status")?.parse().ok()?,
            budget_total: fields.get("budget_total")?.parse().ok()?,
            budget_spent: fields.get("budget_spent")?.parse().ok()?,
            start_date: parse_rfc3339(fields.get("start_date")?)?,
            end_date: parse_rfc3339(fields.get("end_date")?)?,
        })
    })();

    if record.is_none() {
        metrics::counter!("cache.campaign.malformed").increment(1);
        debug!(campaign_id = id, "Malformed campaign record, treating as absent");
    }
    record
}

/// Parse a creative hash into a record, same degradation rule.
pub fn parse_creative(id: &str, fields: &HashMap<String, String>) -> Option<CreativeRecord> {
    let record = (|| {
        Some(CreativeRecord {
            id: id.to_string(),
            name: fields.get("name")?.clone(),
            video_url: fields.get("video_url")?.clone(),
            duration: fields.get("duration")?.parse().ok()?,
            format: fields.get("format")?.clone(),
            status: fields.get("status")?.parse().ok()?,
        })
    })();

    if record.is_none() {
        metrics::counter!("cache.creative.malformed").increment(1);
        debug!(creative_id = id, "Malformed creative record, treating as absent");
    }
    record
}

fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
